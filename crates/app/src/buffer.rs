//! Per-stream pending queue with threshold flush, overflow and failure policies.

use crate::namespace::NamespaceInitializer;
use call_telemetry_domain::{FailurePolicy, OverflowPolicy, StreamKind, TelemetryPoint};
use call_telemetry_ports::{
    LoggerPort, StoreErrorKind, StoreGatewayPort, TelemetryPort, log_fields, telemetry_tags,
};
use call_telemetry_shared::{RequestContext, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Thresholds and policies of one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSettings {
    /// Pending length that triggers a flush.
    pub commit_size: usize,
    /// Maximum pending length.
    pub capacity: usize,
    /// Behavior when an append meets a full queue.
    pub overflow_policy: OverflowPolicy,
    /// Behavior when a bulk write fails.
    pub failure_policy: FailurePolicy,
}

impl BufferSettings {
    /// Settings with the given thresholds; zero values are raised to one and
    /// capacity never drops below the commit size.
    #[must_use]
    pub fn new(
        commit_size: usize,
        capacity: usize,
        overflow_policy: OverflowPolicy,
        failure_policy: FailurePolicy,
    ) -> Self {
        let commit_size = commit_size.max(1);
        Self {
            commit_size,
            capacity: capacity.max(commit_size),
            overflow_policy,
            failure_policy,
        }
    }

    /// Same settings flushing on every append.
    #[must_use]
    pub const fn write_through(self) -> Self {
        Self {
            commit_size: 1,
            ..self
        }
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self::new(1, 10_000, OverflowPolicy::default(), FailurePolicy::default())
    }
}

/// Collaborators shared by every buffer of a client.
#[derive(Clone)]
pub struct BufferDeps {
    /// Store gateway receiving bulk writes.
    pub store: Arc<dyn StoreGatewayPort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

/// Result of a flush attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending.
    Empty,
    /// Another flush of this stream was running; nothing was done.
    InFlight,
    /// This many points were written.
    Written(usize),
}

/// Result of an append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Points added to the queue.
    pub accepted: usize,
    /// Points discarded by the overflow policy (incoming or evicted).
    pub dropped: usize,
}

enum Push {
    Accepted { evicted: bool },
    Rejected,
}

/// Pending points of one stream.
///
/// Appends never wait on a running flush, except under
/// [`OverflowPolicy::Block`]. At most one flush runs at a time; a flush swaps
/// the queue for an empty one, so points appended during the write land in
/// the fresh queue.
pub struct StreamBuffer {
    stream: StreamKind,
    settings: BufferSettings,
    pending: Mutex<VecDeque<TelemetryPoint>>,
    flush_lock: Mutex<()>,
    namespace: Arc<NamespaceInitializer>,
    deps: BufferDeps,
}

impl StreamBuffer {
    /// Empty buffer for `stream`.
    pub fn new(stream: StreamKind, settings: BufferSettings, deps: BufferDeps) -> Self {
        let namespace = Arc::new(NamespaceInitializer::new(
            stream.namespace(),
            Arc::clone(&deps.store),
            deps.logger.clone(),
        ));
        Self {
            stream,
            settings,
            pending: Mutex::new(VecDeque::new()),
            flush_lock: Mutex::new(()),
            namespace,
            deps,
        }
    }

    /// Stream served by this buffer.
    #[must_use]
    pub const fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> BufferSettings {
        self.settings
    }

    /// Namespace initializer of the stream.
    #[must_use]
    pub fn namespace(&self) -> &NamespaceInitializer {
        &self.namespace
    }

    /// Number of pending points.
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Whether nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Append one point; see [`Self::append_all`].
    pub async fn append(&self, ctx: &RequestContext, point: TelemetryPoint) -> Result<AppendOutcome> {
        self.append_all(ctx, vec![point]).await
    }

    /// Append points in order, then flush if the commit size is reached.
    ///
    /// The caller waits for a threshold flush and receives its failure.
    pub async fn append_all(
        &self,
        ctx: &RequestContext,
        points: Vec<TelemetryPoint>,
    ) -> Result<AppendOutcome> {
        let mut outcome = AppendOutcome::default();
        let mut failure = None;
        for point in points {
            match self.push(ctx, point).await {
                Ok(Push::Accepted { evicted }) => {
                    outcome.accepted += 1;
                    outcome.dropped += usize::from(evicted);
                },
                Ok(Push::Rejected) => outcome.dropped += 1,
                Err(error) => {
                    failure = Some(error);
                    break;
                },
            }
        }

        self.count("buffer.points_appended", outcome.accepted);
        if outcome.dropped > 0 {
            self.record_drop(outcome.dropped, self.settings.overflow_policy.as_str());
        }
        if let Some(error) = failure {
            return Err(error);
        }

        if self.len().await >= self.settings.commit_size {
            self.flush(ctx).await?;
        }
        Ok(outcome)
    }

    async fn push(&self, ctx: &RequestContext, point: TelemetryPoint) -> Result<Push> {
        let mut pending = self.pending.lock().await;
        if pending.len() < self.settings.capacity {
            pending.push_back(point);
            return Ok(Push::Accepted { evicted: false });
        }

        match self.settings.overflow_policy {
            OverflowPolicy::DropOldest => {
                pending.pop_front();
                pending.push_back(point);
                Ok(Push::Accepted { evicted: true })
            },
            OverflowPolicy::DropNewest => Ok(Push::Rejected),
            OverflowPolicy::Block => {
                drop(pending);
                let flushed = self.flush_waiting(ctx).await;
                let mut pending = self.pending.lock().await;
                if pending.len() >= self.settings.capacity {
                    let error = match flushed {
                        Err(error) => StoreErrorKind::Write.wrap(error),
                        Ok(_) => StoreErrorKind::Write.error("buffer is still full after flush"),
                    };
                    return Err(error
                        .with_metadata("stream", self.stream.measurement())
                        .with_metadata("capacity", self.settings.capacity.to_string()));
                }
                pending.push_back(point);
                Ok(Push::Accepted { evicted: false })
            },
        }
    }

    /// Flush unless a flush of this stream is already running.
    pub async fn flush(&self, ctx: &RequestContext) -> Result<FlushOutcome> {
        let Ok(_guard) = self.flush_lock.try_lock() else {
            return Ok(FlushOutcome::InFlight);
        };
        self.flush_locked(ctx).await
    }

    /// Flush, waiting for a running flush to finish first.
    pub async fn flush_waiting(&self, ctx: &RequestContext) -> Result<FlushOutcome> {
        let _guard = self.flush_lock.lock().await;
        self.flush_locked(ctx).await
    }

    async fn flush_locked(&self, ctx: &RequestContext) -> Result<FlushOutcome> {
        if self.is_empty().await {
            return Ok(FlushOutcome::Empty);
        }
        self.namespace.ensure(ctx).await?;

        let batch: Vec<TelemetryPoint> = std::mem::take(&mut *self.pending.lock().await).into();
        if batch.is_empty() {
            return Ok(FlushOutcome::Empty);
        }
        let size = batch.len();
        let retained = matches!(self.settings.failure_policy, FailurePolicy::Retain)
            .then(|| batch.clone());

        let tags = telemetry_tags([("stream", self.stream.measurement())]);
        let timer = self
            .deps
            .telemetry
            .as_ref()
            .map(|telemetry| telemetry.start_timer("buffer.flush", Some(&tags)));
        let started = Instant::now();
        let result = self
            .deps
            .store
            .bulk_write(ctx, self.stream.namespace().into(), batch)
            .await;
        if let Some(timer) = timer.as_ref() {
            timer.stop();
        }

        match result {
            Ok(()) => {
                if let Some(logger) = self.deps.logger.as_ref() {
                    logger.debug(
                        "buffer.flush.completed",
                        "Buffer flushed",
                        Some(log_fields([
                            ("stream", Value::from(self.stream.measurement())),
                            ("points", Value::from(size)),
                            ("durationMs", Value::from(elapsed_ms(started))),
                        ])),
                    );
                }
                Ok(FlushOutcome::Written(size))
            },
            Err(error) => {
                let error = StoreErrorKind::Write
                    .wrap(error)
                    .with_metadata("stream", self.stream.measurement());
                self.count("buffer.flush.failed", 1);
                if let Some(logger) = self.deps.logger.as_ref() {
                    logger.failure(
                        "buffer.flush.failed",
                        "Buffer flush failed",
                        &error,
                        Some(log_fields([
                            ("stream", Value::from(self.stream.measurement())),
                            ("points", Value::from(size)),
                            ("failurePolicy", Value::from(self.settings.failure_policy.as_str())),
                        ])),
                    );
                }
                if let Some(batch) = retained {
                    self.restore(batch).await;
                }
                Err(error)
            },
        }
    }

    async fn restore(&self, batch: Vec<TelemetryPoint>) {
        let trimmed = {
            let mut pending = self.pending.lock().await;
            let mut merged: VecDeque<TelemetryPoint> = batch.into();
            merged.append(&mut pending);
            let excess = merged.len().saturating_sub(self.settings.capacity);
            merged.drain(..excess);
            *pending = merged;
            excess
        };
        if trimmed > 0 {
            self.record_drop(trimmed, "retainOverflow");
        }
    }

    fn record_drop(&self, dropped: usize, reason: &str) {
        self.count("buffer.points_dropped", dropped);
        if let Some(logger) = self.deps.logger.as_ref() {
            logger.warn(
                "buffer.points_dropped",
                "Pending points dropped",
                Some(log_fields([
                    ("stream", Value::from(self.stream.measurement())),
                    ("dropped", Value::from(dropped)),
                    ("reason", Value::from(reason)),
                ])),
            );
        }
    }

    fn count(&self, name: &str, value: usize) {
        if value == 0 {
            return;
        }
        if let Some(telemetry) = self.deps.telemetry.as_ref() {
            let tags = telemetry_tags([("stream", self.stream.measurement())]);
            telemetry.increment_counter(name, u64::try_from(value).unwrap_or(u64::MAX), Some(&tags));
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for StreamBuffer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StreamBuffer")
            .field("stream", &self.stream)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
