//! Request-scoped context: correlation ids and cancellation.
//!
//! Every write, query and flush runs under a `RequestContext`. Ticks of the
//! periodic flush timer get their own `flush_*` ids and an independent token,
//! so stopping the timer never aborts a batch already on its way to the store.

use crate::{ErrorEnvelope, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

static REQUEST_IDS: AtomicU64 = AtomicU64::new(1);
static FLUSH_IDS: AtomicU64 = AtomicU64::new(1);

/// Identifier attached to log events of one request or flush.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    /// Next `req_<n>` id of this process.
    #[must_use]
    pub fn new_request_id() -> Self {
        Self::next(&REQUEST_IDS, "req")
    }

    /// Next `flush_<n>` id of this process.
    #[must_use]
    pub fn new_flush_id() -> Self {
        Self::next(&FLUSH_IDS, "flush")
    }

    fn next(counter: &AtomicU64, prefix: &str) -> Self {
        let n = counter.fetch_add(1, Ordering::Relaxed);
        Self(format!("{prefix}_{n}").into())
    }

    /// The id text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Cloneable one-shot cancellation flag that tasks can await.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sender: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Cancel every clone of this token. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_if_modified(|cancelled| !std::mem::replace(cancelled, true));
    }

    /// Whether [`Self::cancel`] was called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Correlation id plus cancellation for one unit of work.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// A context with a fresh token.
    #[must_use]
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            cancellation: CancellationToken::new(),
        }
    }

    /// A context with a generated `req_*` id.
    #[must_use]
    pub fn new_request() -> Self {
        Self::new(CorrelationId::new_request_id())
    }

    /// The correlation id.
    #[must_use]
    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// A handle that cancels this context from another task.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Whether the context was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel the context.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Resolve once the context is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Fail with `core:cancelled` if the context was cancelled before `operation`.
    pub fn ensure_not_cancelled(&self, operation: &'static str) -> Result<()> {
        if !self.is_cancelled() {
            return Ok(());
        }
        Err(ErrorEnvelope::cancelled("operation cancelled")
            .with_metadata("operation", operation)
            .with_metadata("correlationId", self.correlation_id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use std::time::Duration;

    #[test]
    fn ids_are_prefixed_and_distinct() {
        let first = CorrelationId::new_request_id();
        let second = CorrelationId::new_request_id();
        assert!(first.as_str().starts_with("req_"));
        assert_ne!(first, second);
        assert!(CorrelationId::new_flush_id().to_string().starts_with("flush_"));
    }

    #[tokio::test]
    async fn cancelling_a_token_wakes_the_context_waiter() -> Result<()> {
        let ctx = RequestContext::new(CorrelationId::new_flush_id());
        let token = ctx.cancellation_token();
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.cancelled().await })
        };
        tokio::task::yield_now().await;
        token.cancel();
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .map_err(|_| ErrorEnvelope::expected(ErrorCode::timeout(), "waiter hung"))?
            .map_err(|_| ErrorEnvelope::expected(ErrorCode::internal(), "join failed"))?;

        let error = ctx.ensure_not_cancelled("flush").err();
        assert!(error.as_ref().is_some_and(ErrorEnvelope::is_cancelled));
        assert_eq!(
            error.as_ref().and_then(|error| error.metadata_value("operation")),
            Some("flush")
        );
        Ok(())
    }

    #[tokio::test]
    async fn already_cancelled_token_resolves_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        token.cancelled().await;
    }
}
