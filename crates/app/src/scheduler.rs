//! Periodic flush timer for the buffered streams.

use crate::streams::StreamManager;
use call_telemetry_domain::StreamKind;
use call_telemetry_ports::{LoggerPort, log_fields};
use call_telemetry_shared::{CancellationToken, CorrelationId, ErrorEnvelope, RequestContext};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Receives failures of flushes that have no synchronous caller.
pub trait FlushErrorHook: Send + Sync {
    /// Called once per failed periodic flush.
    fn on_flush_error(&self, stream: StreamKind, error: &ErrorEnvelope);
}

impl<F> FlushErrorHook for F
where
    F: Fn(StreamKind, &ErrorEnvelope) + Send + Sync,
{
    fn on_flush_error(&self, stream: StreamKind, error: &ErrorEnvelope) {
        self(stream, error);
    }
}

/// Hook that logs periodic flush failures.
pub struct LoggingFlushErrorHook {
    logger: Arc<dyn LoggerPort>,
}

impl LoggingFlushErrorHook {
    /// Hook writing to `logger`.
    pub fn new(logger: Arc<dyn LoggerPort>) -> Self {
        Self { logger }
    }
}

impl FlushErrorHook for LoggingFlushErrorHook {
    fn on_flush_error(&self, stream: StreamKind, error: &ErrorEnvelope) {
        self.logger.failure(
            "buffer.flush.periodic_failed",
            "Periodic flush failed",
            error,
            Some(log_fields([("stream", Value::from(stream.measurement()))])),
        );
    }
}

/// Background task flushing every periodic stream on a fixed interval.
///
/// Dropping the scheduler aborts the task without a final flush; use
/// [`FlushScheduler::shutdown`] to let a running tick complete.
#[derive(Debug)]
pub struct FlushScheduler {
    handle: Option<JoinHandle<()>>,
    stop: CancellationToken,
}

impl FlushScheduler {
    /// Whether a timer should run for these thresholds.
    ///
    /// With a commit size of one every write flushes itself, and very short
    /// intervals are treated as disabled.
    #[must_use]
    pub const fn is_enabled(commit_size: usize, interval_secs: u64) -> bool {
        commit_size > 1 && interval_secs > 2
    }

    /// Start the timer. The first flush happens one `interval` after start.
    #[must_use]
    pub fn spawn(
        manager: Arc<StreamManager>,
        interval: Duration,
        hook: Arc<dyn FlushErrorHook>,
    ) -> Self {
        let stop = CancellationToken::new();
        let token = stop.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => flush_periodic(&manager, hook.as_ref()).await,
                }
            }
        });
        Self {
            handle: Some(handle),
            stop,
        }
    }

    /// Whether the timer task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the timer and wait for a running tick to finish.
    pub async fn shutdown(mut self) {
        self.stop.cancel();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(error) = handle.await {
            tracing::warn!(%error, "flush scheduler task ended abnormally");
        }
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.cancel();
            handle.abort();
        }
    }
}

async fn flush_periodic(manager: &StreamManager, hook: &dyn FlushErrorHook) {
    let flushes = manager.periodic_streams().map(|buffer| async move {
        let ctx = RequestContext::new(CorrelationId::new_flush_id());
        (buffer.stream(), buffer.flush(&ctx).await)
    });
    for (stream, outcome) in futures_util::future::join_all(flushes).await {
        if let Err(error) = outcome {
            hook.on_flush_error(stream, &error);
        }
    }
}
