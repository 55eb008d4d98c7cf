//! One buffer per stream, owned for the lifetime of a client.

use crate::buffer::{BufferDeps, BufferSettings, FlushOutcome, StreamBuffer};
use call_telemetry_domain::StreamKind;
use call_telemetry_shared::{ErrorEnvelope, RequestContext};
use std::sync::Arc;

/// Owns the six stream buffers of a client.
///
/// System alerts always use write-through settings; every other stream
/// shares the configured thresholds.
#[derive(Debug)]
pub struct StreamManager {
    call_counts: Arc<StreamBuffer>,
    sp_call_counts: Arc<StreamBuffer>,
    app_call_counts: Arc<StreamBuffer>,
    cdrs: Arc<StreamBuffer>,
    alerts: Arc<StreamBuffer>,
    system_alerts: Arc<StreamBuffer>,
}

impl StreamManager {
    /// Build every buffer with `settings`.
    #[must_use]
    pub fn new(settings: BufferSettings, deps: &BufferDeps) -> Self {
        let buffer = |stream: StreamKind| {
            let settings = if stream.is_periodic() {
                settings
            } else {
                settings.write_through()
            };
            Arc::new(StreamBuffer::new(stream, settings, deps.clone()))
        };
        Self {
            call_counts: buffer(StreamKind::CallCounts),
            sp_call_counts: buffer(StreamKind::SpCallCounts),
            app_call_counts: buffer(StreamKind::AppCallCounts),
            cdrs: buffer(StreamKind::Cdrs),
            alerts: buffer(StreamKind::Alerts),
            system_alerts: buffer(StreamKind::SystemAlerts),
        }
    }

    /// Buffer of `stream`.
    #[must_use]
    pub const fn buffer(&self, stream: StreamKind) -> &Arc<StreamBuffer> {
        match stream {
            StreamKind::CallCounts => &self.call_counts,
            StreamKind::SpCallCounts => &self.sp_call_counts,
            StreamKind::AppCallCounts => &self.app_call_counts,
            StreamKind::Cdrs => &self.cdrs,
            StreamKind::Alerts => &self.alerts,
            StreamKind::SystemAlerts => &self.system_alerts,
        }
    }

    /// Buffers driven by the periodic flush timer.
    pub fn periodic_streams(&self) -> impl Iterator<Item = &Arc<StreamBuffer>> {
        StreamKind::ALL
            .into_iter()
            .filter(|stream| stream.is_periodic())
            .map(|stream| self.buffer(stream))
    }

    /// Flush every stream, waiting for in-flight flushes.
    ///
    /// Every stream is attempted; failures are returned per stream.
    pub async fn flush_all(
        &self,
        ctx: &RequestContext,
    ) -> Vec<(StreamKind, Result<FlushOutcome, ErrorEnvelope>)> {
        let flushes = StreamKind::ALL.into_iter().map(|stream| async move {
            (stream, self.buffer(stream).flush_waiting(ctx).await)
        });
        futures_util::future::join_all(flushes).await
    }

    /// Total pending points across streams.
    pub async fn pending(&self) -> usize {
        let mut total = 0;
        for stream in StreamKind::ALL {
            total += self.buffer(stream).len().await;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_telemetry_domain::{FailurePolicy, OverflowPolicy, TelemetryPoint};
    use call_telemetry_shared::Result;
    use call_telemetry_testkit::InMemoryStoreGateway;

    fn manager(store: &Arc<InMemoryStoreGateway>) -> StreamManager {
        let deps = BufferDeps {
            store: store.clone(),
            logger: None,
            telemetry: None,
        };
        let settings = BufferSettings::new(50, 100, OverflowPolicy::DropOldest, FailurePolicy::Clear);
        StreamManager::new(settings, &deps)
    }

    #[test]
    fn system_alerts_are_write_through_and_not_periodic() {
        let store = Arc::new(InMemoryStoreGateway::new());
        let manager = manager(&store);
        assert_eq!(manager.buffer(StreamKind::SystemAlerts).settings().commit_size, 1);
        assert_eq!(manager.buffer(StreamKind::Cdrs).settings().commit_size, 50);

        let periodic: Vec<StreamKind> = manager.periodic_streams().map(|buffer| buffer.stream()).collect();
        assert_eq!(
            periodic,
            vec![
                StreamKind::CallCounts,
                StreamKind::SpCallCounts,
                StreamKind::AppCallCounts,
                StreamKind::Cdrs,
                StreamKind::Alerts,
            ]
        );
    }

    #[tokio::test]
    async fn flush_all_drains_every_stream() -> Result<()> {
        let store = Arc::new(InMemoryStoreGateway::new());
        let manager = manager(&store);
        let ctx = RequestContext::new_request();
        manager
            .buffer(StreamKind::Alerts)
            .append(&ctx, TelemetryPoint::new("alerts").field("message", "a"))
            .await?;
        manager
            .buffer(StreamKind::CallCounts)
            .append(&ctx, TelemetryPoint::new("call_counts").field("calls_in_progress", 2_i64))
            .await?;
        assert_eq!(manager.pending().await, 2);

        let outcomes = manager.flush_all(&ctx).await;
        assert_eq!(outcomes.len(), StreamKind::ALL.len());
        assert!(outcomes.iter().all(|(_, outcome)| outcome.is_ok()));
        assert_eq!(manager.pending().await, 0);
        assert_eq!(store.writes().await.len(), 2);
        Ok(())
    }
}
