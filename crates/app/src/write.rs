//! Write use case: convert records into points and buffer them.

use crate::buffer::AppendOutcome;
use crate::streams::StreamManager;
use call_telemetry_domain::{
    AlertRecord, CallCountRecord, CdrRecord, ScopeLevel, StreamKind, SystemAlertRecord,
    TelemetryPoint,
};
use call_telemetry_ports::{
    ClockPort, LogFields, LoggerPort, StoreErrorKind, TelemetryPort, log_fields, telemetry_tags,
};
use call_telemetry_shared::{ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Records of one write call, grouped by target stream.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteBatch {
    /// Call detail records.
    Cdrs(Vec<CdrRecord>),
    /// Operational alerts.
    Alerts(Vec<AlertRecord>),
    /// Call gauges at one scope level.
    CallCounts {
        /// Level selecting the gauge stream.
        level: ScopeLevel,
        /// Samples.
        records: Vec<CallCountRecord>,
    },
    /// Platform component alerts; always written through.
    SystemAlerts(Vec<SystemAlertRecord>),
}

impl WriteBatch {
    /// Target stream.
    #[must_use]
    pub const fn stream(&self) -> StreamKind {
        match self {
            Self::Cdrs(_) => StreamKind::Cdrs,
            Self::Alerts(_) => StreamKind::Alerts,
            Self::CallCounts { level, .. } => CallCountRecord::stream(*level),
            Self::SystemAlerts(_) => StreamKind::SystemAlerts,
        }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Cdrs(records) => records.len(),
            Self::Alerts(records) => records.len(),
            Self::CallCounts { records, .. } => records.len(),
            Self::SystemAlerts(records) => records.len(),
        }
    }

    /// Whether the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert every record; the first malformed record fails the batch.
    fn into_points(self, deps: &WriteDeps) -> Result<Vec<TelemetryPoint>> {
        let points: std::result::Result<Vec<_>, _> = match self {
            Self::Cdrs(records) => records.into_iter().map(CdrRecord::into_point).collect(),
            Self::Alerts(records) => records.into_iter().map(AlertRecord::into_point).collect(),
            Self::CallCounts { level, records } => records
                .into_iter()
                .map(|record| record.into_point(level))
                .collect(),
            Self::SystemAlerts(records) => {
                let now = deps.clock.now();
                records
                    .into_iter()
                    .map(|record| record.into_point(now))
                    .collect()
            },
        };
        points.map_err(ErrorEnvelope::from)
    }
}

/// Dependencies required by writes.
#[derive(Clone)]
pub struct WriteDeps {
    /// Stream buffers.
    pub streams: Arc<StreamManager>,
    /// Clock stamping system alerts.
    pub clock: Arc<dyn ClockPort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

/// Buffer a batch of records.
///
/// Nothing is buffered unless every record converts. If the append reaches
/// the commit size, the flush runs before this returns and its failure is
/// returned here.
#[tracing::instrument(skip_all, fields(stream = batch.stream().measurement(), records = batch.len()))]
pub async fn write_records(
    ctx: &RequestContext,
    deps: &WriteDeps,
    batch: WriteBatch,
) -> Result<AppendOutcome> {
    let started_at = Instant::now();
    let stream = batch.stream();
    let records = batch.len();

    let result = async {
        ctx.ensure_not_cancelled("write_records.start")?;
        let points = batch
            .into_points(deps)
            .map_err(|error| StoreErrorKind::Write.wrap(error))?;
        let buffer = deps.streams.buffer(stream);
        let outcome = buffer.append_all(ctx, points).await?;
        if !stream.is_periodic() {
            buffer.flush_waiting(ctx).await?;
        }
        Ok(outcome)
    }
    .await;

    match &result {
        Ok(outcome) => {
            if let Some(logger) = deps.logger.as_ref() {
                logger.debug(
                    "telemetry.write.accepted",
                    "Records accepted",
                    Some(write_fields(stream, records, started_at, Some(outcome))),
                );
            }
        },
        Err(error) => {
            if let Some(telemetry) = deps.telemetry.as_ref() {
                let tags = telemetry_tags([("stream", stream.measurement())]);
                telemetry.increment_counter("telemetry.write.failed", 1, Some(&tags));
            }
            if let Some(logger) = deps.logger.as_ref() {
                logger.failure(
                    "telemetry.write.failed",
                    "Write failed",
                    error,
                    Some(write_fields(stream, records, started_at, None)),
                );
            }
        },
    }
    result.map_err(|error| error.with_metadata("stream", stream.measurement()))
}

/// Buffer call detail records.
pub async fn write_cdrs(
    ctx: &RequestContext,
    deps: &WriteDeps,
    records: Vec<CdrRecord>,
) -> Result<AppendOutcome> {
    write_records(ctx, deps, WriteBatch::Cdrs(records)).await
}

/// Buffer alerts.
pub async fn write_alerts(
    ctx: &RequestContext,
    deps: &WriteDeps,
    records: Vec<AlertRecord>,
) -> Result<AppendOutcome> {
    write_records(ctx, deps, WriteBatch::Alerts(records)).await
}

/// Buffer call gauges for the stream of `level`.
pub async fn write_call_counts(
    ctx: &RequestContext,
    deps: &WriteDeps,
    level: ScopeLevel,
    records: Vec<CallCountRecord>,
) -> Result<AppendOutcome> {
    write_records(ctx, deps, WriteBatch::CallCounts { level, records }).await
}

/// Write system alerts immediately, stamped with the current time.
pub async fn write_system_alerts(
    ctx: &RequestContext,
    deps: &WriteDeps,
    records: Vec<SystemAlertRecord>,
) -> Result<AppendOutcome> {
    write_records(ctx, deps, WriteBatch::SystemAlerts(records)).await
}

fn write_fields(
    stream: StreamKind,
    records: usize,
    started_at: Instant,
    outcome: Option<&AppendOutcome>,
) -> LogFields {
    let mut fields = log_fields([
        ("stream", Value::from(stream.measurement())),
        ("records", Value::from(records)),
        (
            "durationMs",
            Value::from(u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)),
        ),
    ]);
    if let Some(outcome) = outcome {
        fields.insert("accepted".into(), Value::from(outcome.accepted));
        fields.insert("dropped".into(), Value::from(outcome.dropped));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferDeps, BufferSettings};
    use call_telemetry_domain::{AccountSid, FailurePolicy, OverflowPolicy};
    use call_telemetry_testkit::fixtures::record_fixtures;
    use call_telemetry_testkit::{FixedClock, InMemoryStoreGateway, RecordingLogger};

    struct Harness {
        store: Arc<InMemoryStoreGateway>,
        logger: Arc<RecordingLogger>,
        deps: WriteDeps,
    }

    fn harness(commit_size: usize) -> Harness {
        let store = Arc::new(InMemoryStoreGateway::new());
        let logger = Arc::new(RecordingLogger::new());
        let buffer_deps = BufferDeps {
            store: store.clone(),
            logger: Some(logger.clone()),
            telemetry: None,
        };
        let settings = BufferSettings::new(
            commit_size,
            1_000,
            OverflowPolicy::DropOldest,
            FailurePolicy::Clear,
        );
        let deps = WriteDeps {
            streams: Arc::new(StreamManager::new(settings, &buffer_deps)),
            clock: Arc::new(FixedClock::at_millis(1_700_000_000_000)),
            logger: Some(logger.clone()),
            telemetry: None,
        };
        Harness { store, logger, deps }
    }

    #[tokio::test]
    async fn default_commit_size_writes_every_record() -> Result<(), Box<dyn std::error::Error>> {
        let h = harness(1);
        let fixtures = record_fixtures()?;
        let ctx = RequestContext::new_request();

        let outcome = write_cdrs(&ctx, &h.deps, fixtures.cdrs).await?;
        assert_eq!(outcome.accepted, 3);
        assert_eq!(h.store.points("cdrs").await.len(), 3);
        assert!(h.logger.has_event("telemetry.write.accepted"));
        Ok(())
    }

    #[tokio::test]
    async fn buffered_writes_wait_for_commit_size() -> Result<()> {
        let h = harness(3);
        let ctx = RequestContext::new_request();
        let alert = AlertRecord {
            account_sid: Some(AccountSid::parse("acct-1")?),
            message: Some("down".into()),
            ..AlertRecord::new("webhook-failure")
        };

        write_alerts(&ctx, &h.deps, vec![alert.clone(), alert.clone()]).await?;
        assert!(h.store.writes().await.is_empty());
        write_alerts(&ctx, &h.deps, vec![alert]).await?;
        assert_eq!(h.store.points("alerts").await.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn call_counts_route_by_level() -> Result<(), Box<dyn std::error::Error>> {
        let h = harness(1);
        let fixtures = record_fixtures()?;
        let ctx = RequestContext::new_request();

        write_call_counts(&ctx, &h.deps, ScopeLevel::ServiceProvider, fixtures.call_counts.clone()).await?;
        write_call_counts(&ctx, &h.deps, ScopeLevel::Application, fixtures.call_counts).await?;
        assert_eq!(h.store.points("sp_call_counts").await.len(), 2);
        assert_eq!(h.store.points("app_call_counts").await.len(), 2);
        assert!(h.store.points("call_counts").await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn system_alerts_flush_immediately_with_clock_time() -> Result<(), Box<dyn std::error::Error>> {
        let h = harness(50);
        let fixtures = record_fixtures()?;
        let ctx = RequestContext::new_request();

        write_system_alerts(&ctx, &h.deps, fixtures.system_alerts).await?;
        let points = h.store.points("system_alerts").await;
        assert_eq!(points.len(), 1);
        let stamped = points.first().and_then(|point| point.timestamp);
        assert_eq!(stamped.map(|at| at.timestamp_millis()), Some(1_700_000_000_000));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_record_rejects_whole_batch() -> Result<()> {
        let h = harness(1);
        let ctx = RequestContext::new_request();
        let good = CallCountRecord {
            account_sid: Some(AccountSid::parse("acct-1")?),
            calls_in_progress: 3,
            ..CallCountRecord::default()
        };
        let bad = CallCountRecord {
            account_sid: None,
            ..good.clone()
        };

        let error = write_call_counts(&ctx, &h.deps, ScopeLevel::Account, vec![good, bad])
            .await
            .err();
        assert_eq!(error.as_ref().and_then(StoreErrorKind::of), Some(StoreErrorKind::Write));
        assert_eq!(
            error.as_ref().and_then(|error| error.metadata_value("stream")),
            Some("call_counts")
        );
        assert!(h.store.writes().await.is_empty());
        assert_eq!(h.deps.streams.buffer(StreamKind::CallCounts).len().await, 0);
        assert!(h.logger.has_event("telemetry.write.failed"));
        Ok(())
    }
}
