//! Lazy, at-most-once namespace initialization.

use call_telemetry_ports::{LoggerPort, StoreErrorKind, StoreGatewayPort, log_fields};
use call_telemetry_shared::{ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Ensures one store namespace exists before it is written or queried.
///
/// Success is cached. A failed attempt leaves the initializer unset so the
/// next caller retries; concurrent first callers wait on a single attempt.
pub struct NamespaceInitializer {
    namespace: &'static str,
    store: Arc<dyn StoreGatewayPort>,
    logger: Option<Arc<dyn LoggerPort>>,
    ready: OnceCell<()>,
}

impl NamespaceInitializer {
    /// Initializer for `namespace` on `store`.
    pub fn new(
        namespace: &'static str,
        store: Arc<dyn StoreGatewayPort>,
        logger: Option<Arc<dyn LoggerPort>>,
    ) -> Self {
        Self {
            namespace,
            store,
            logger,
            ready: OnceCell::new(),
        }
    }

    /// Namespace managed by this initializer.
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Whether the namespace is known to exist.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.ready.initialized()
    }

    /// Create the namespace if it is absent.
    pub async fn ensure(&self, ctx: &RequestContext) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        self.ready
            .get_or_try_init(|| self.initialize(ctx))
            .await
            .map(|_| ())
            .inspect_err(|error| {
                if let Some(logger) = self.logger.as_ref() {
                    logger.failure(
                        "namespace.init.failed",
                        "Namespace initialization failed",
                        error,
                        Some(log_fields([("namespace", Value::from(self.namespace))])),
                    );
                }
            })
    }

    async fn initialize(&self, ctx: &RequestContext) -> Result<()> {
        ctx.ensure_not_cancelled("namespace.ensure")?;
        let exists = self
            .store
            .namespace_exists(ctx, self.namespace.into())
            .await
            .map_err(wrap)?;
        if exists {
            if let Some(logger) = self.logger.as_ref() {
                logger.debug(
                    "namespace.init.exists",
                    "Namespace already present",
                    Some(log_fields([("namespace", Value::from(self.namespace))])),
                );
            }
            return Ok(());
        }

        self.store
            .create_namespace(ctx, self.namespace.into())
            .await
            .map_err(wrap)?;
        if let Some(logger) = self.logger.as_ref() {
            logger.info(
                "namespace.init.created",
                "Namespace created",
                Some(log_fields([
                    ("namespace", Value::from(self.namespace)),
                    ("provider", Value::from(self.store.provider_id())),
                ])),
            );
        }
        Ok(())
    }
}

fn wrap(error: ErrorEnvelope) -> ErrorEnvelope {
    StoreErrorKind::Initialization.wrap(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_telemetry_testkit::errors::store_unavailable_error;
    use call_telemetry_testkit::{InMemoryStoreGateway, RecordingLogger, StoreOperation};

    #[tokio::test]
    async fn creates_missing_namespace_once() -> Result<()> {
        let store = Arc::new(InMemoryStoreGateway::new());
        let init = NamespaceInitializer::new("cdrs", store.clone(), None);
        let ctx = RequestContext::new_request();

        init.ensure(&ctx).await?;
        init.ensure(&ctx).await?;
        assert!(init.is_initialized());
        assert_eq!(store.created_namespaces().await, vec![Box::from("cdrs")]);
        Ok(())
    }

    #[tokio::test]
    async fn existing_namespace_is_not_recreated() -> Result<()> {
        let store = Arc::new(InMemoryStoreGateway::with_namespaces(["alerts"]));
        let init = NamespaceInitializer::new("alerts", store.clone(), None);
        init.ensure(&RequestContext::new_request()).await?;
        assert!(store.created_namespaces().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_attempt_is_retried() -> Result<()> {
        let store = Arc::new(InMemoryStoreGateway::new());
        store
            .fail_next(StoreOperation::CreateNamespace, store_unavailable_error())
            .await;
        let logger = Arc::new(RecordingLogger::new());
        let init = NamespaceInitializer::new("call_counts", store.clone(), Some(logger.clone()));
        let ctx = RequestContext::new_request();

        let error = init.ensure(&ctx).await.err();
        assert_eq!(
            error.as_ref().and_then(StoreErrorKind::of),
            Some(StoreErrorKind::Initialization)
        );
        assert!(!init.is_initialized());
        assert!(logger.has_event("namespace.init.failed"));

        init.ensure(&ctx).await?;
        assert!(init.is_initialized());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_first_callers_share_one_attempt() -> Result<()> {
        let store = Arc::new(InMemoryStoreGateway::new());
        let init = NamespaceInitializer::new("sp_call_counts", store.clone(), None);
        let ctx = RequestContext::new_request();

        let (first, second) = tokio::join!(init.ensure(&ctx), init.ensure(&ctx));
        first?;
        second?;
        assert_eq!(store.created_namespaces().await.len(), 1);
        Ok(())
    }
}
