//! Composition root: a telemetry client owning every stream buffer.

use crate::observability::Observability;
use crate::store_factory::build_store_gateway;
use crate::{InfraError, InfraResult};
use call_telemetry_adapters::SystemClock;
use call_telemetry_app::{
    AppendOutcome, BufferDeps, BufferSettings, FlushErrorHook, FlushScheduler,
    LoggingFlushErrorHook, QueryDeps, QueryInput, StreamManager, WriteBatch, WriteDeps,
    query_telemetry, write_records,
};
use call_telemetry_config::{TelemetryConfig, ValidatedTelemetryConfig};
use call_telemetry_domain::{
    AlertRecord, CallCountRecord, CdrRecord, EntityKind, OneOrMany, PagedResult, QueryOptions,
    Scope, ScopeLevel, StreamKind, SystemAlertRecord,
};
use call_telemetry_ports::{ClockPort, LoggerPort, StoreErrorKind, StoreGatewayPort, log_fields};
use call_telemetry_shared::{ErrorEnvelope, RequestContext, timeout_with_context};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`TelemetryClient`].
///
/// Every collaborator has a default: the store comes from the config, the
/// clock is the system clock, and periodic flush failures are logged.
pub struct TelemetryClientBuilder {
    config: ValidatedTelemetryConfig,
    store: Option<Arc<dyn StoreGatewayPort>>,
    clock: Option<Arc<dyn ClockPort>>,
    observability: Observability,
    error_hook: Option<Arc<dyn FlushErrorHook>>,
    shutdown_timeout: Duration,
}

impl TelemetryClientBuilder {
    /// Start from a validated config.
    #[must_use]
    pub fn new(config: ValidatedTelemetryConfig) -> Self {
        Self {
            config,
            store: None,
            clock: None,
            observability: Observability::default(),
            error_hook: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Start from an unvalidated config.
    pub fn from_config(config: TelemetryConfig) -> InfraResult<Self> {
        Ok(Self::new(config.validate_and_normalize()?))
    }

    /// Use this store gateway instead of building one from the config.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn StoreGatewayPort>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn ClockPort>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use this logger and telemetry sink.
    #[must_use]
    pub fn with_observability(mut self, observability: Observability) -> Self {
        self.observability = observability;
        self
    }

    /// Receive periodic flush failures.
    #[must_use]
    pub fn with_error_hook(mut self, hook: Arc<dyn FlushErrorHook>) -> Self {
        self.error_hook = Some(hook);
        self
    }

    /// Bound the final flush of [`TelemetryClient::shutdown`].
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Assemble the client.
    ///
    /// When the config enables the periodic timer this must run inside a
    /// tokio runtime.
    pub fn build(self) -> InfraResult<TelemetryClient> {
        let store = match self.store {
            Some(store) => store,
            None => build_store_gateway(&self.config)?,
        };
        let clock = self
            .clock
            .unwrap_or_else(|| -> Arc<dyn ClockPort> { Arc::new(SystemClock) });
        let Observability { logger, telemetry } = self.observability;

        let limits = self.config.limits();
        let settings = BufferSettings::new(
            to_usize(limits.commit_size.get()),
            to_usize(limits.buffer_capacity.get()),
            self.config.buffer.overflow_policy,
            self.config.buffer.failure_policy,
        );
        let buffer_deps = BufferDeps {
            store: Arc::clone(&store),
            logger: logger.clone(),
            telemetry: telemetry.clone(),
        };
        let streams = Arc::new(StreamManager::new(settings, &buffer_deps));

        let interval_secs = limits.commit_interval_secs.get();
        let scheduler = if FlushScheduler::is_enabled(settings.commit_size, interval_secs) {
            if tokio::runtime::Handle::try_current().is_err() {
                return Err(InfraError::expected(
                    call_telemetry_shared::ErrorCode::invalid_input(),
                    "periodic flushing requires a tokio runtime",
                )
                .with_metadata("commitIntervalSecs", interval_secs.to_string()));
            }
            let hook = self.error_hook.unwrap_or_else(|| default_hook(logger.as_ref()));
            Some(FlushScheduler::spawn(
                Arc::clone(&streams),
                Duration::from_secs(interval_secs),
                hook,
            ))
        } else {
            None
        };

        if let Some(logger) = logger.as_ref() {
            logger.info(
                "telemetry.client.started",
                "Telemetry client started",
                Some(log_fields([
                    ("provider", Value::from(store.provider_id())),
                    ("commitSize", Value::from(settings.commit_size)),
                    ("capacity", Value::from(settings.capacity)),
                    ("periodicFlush", Value::from(scheduler.is_some())),
                ])),
            );
        }

        Ok(TelemetryClient {
            write_deps: WriteDeps {
                streams: Arc::clone(&streams),
                clock: Arc::clone(&clock),
                logger: logger.clone(),
                telemetry: telemetry.clone(),
            },
            query_deps: QueryDeps {
                store,
                streams: Arc::clone(&streams),
                clock,
                logger: logger.clone(),
                telemetry,
            },
            streams,
            scheduler: Mutex::new(scheduler),
            logger,
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}

fn default_hook(logger: Option<&Arc<dyn LoggerPort>>) -> Arc<dyn FlushErrorHook> {
    match logger {
        Some(logger) => Arc::new(LoggingFlushErrorHook::new(Arc::clone(logger))),
        None => Arc::new(|stream: StreamKind, error: &ErrorEnvelope| {
            tracing::warn!(stream = stream.measurement(), code = %error.code, "periodic flush failed");
        }),
    }
}

fn to_usize(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// Telemetry client: buffered writes, scoped paginated queries.
///
/// One client owns one buffer per stream for its whole lifetime. Call
/// [`Self::shutdown`] to stop the periodic timer and flush what is pending;
/// dropping the client stops the timer but discards buffered points.
pub struct TelemetryClient {
    streams: Arc<StreamManager>,
    write_deps: WriteDeps,
    query_deps: QueryDeps,
    scheduler: Mutex<Option<FlushScheduler>>,
    logger: Option<Arc<dyn LoggerPort>>,
    shutdown_timeout: Duration,
}

impl TelemetryClient {
    /// Builder over a validated config.
    #[must_use]
    pub fn builder(config: ValidatedTelemetryConfig) -> TelemetryClientBuilder {
        TelemetryClientBuilder::new(config)
    }

    /// Stream buffers, for inspection.
    #[must_use]
    pub const fn streams(&self) -> &Arc<StreamManager> {
        &self.streams
    }

    /// Whether the periodic flush timer is running.
    pub async fn has_scheduler(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    /// Buffer call detail records.
    pub async fn write_cdrs(
        &self,
        ctx: &RequestContext,
        records: impl Into<OneOrMany<CdrRecord>>,
    ) -> InfraResult<AppendOutcome> {
        self.write(ctx, WriteBatch::Cdrs(records.into().into_vec()))
            .await
    }

    /// Buffer alerts.
    pub async fn write_alerts(
        &self,
        ctx: &RequestContext,
        records: impl Into<OneOrMany<AlertRecord>>,
    ) -> InfraResult<AppendOutcome> {
        self.write(ctx, WriteBatch::Alerts(records.into().into_vec()))
            .await
    }

    /// Buffer account-level call gauges.
    pub async fn write_call_count(
        &self,
        ctx: &RequestContext,
        records: impl Into<OneOrMany<CallCountRecord>>,
    ) -> InfraResult<AppendOutcome> {
        self.write_call_count_at(ctx, ScopeLevel::Account, records)
            .await
    }

    /// Buffer service-provider-level call gauges.
    pub async fn write_call_count_sp(
        &self,
        ctx: &RequestContext,
        records: impl Into<OneOrMany<CallCountRecord>>,
    ) -> InfraResult<AppendOutcome> {
        self.write_call_count_at(ctx, ScopeLevel::ServiceProvider, records)
            .await
    }

    /// Buffer application-level call gauges.
    pub async fn write_call_count_app(
        &self,
        ctx: &RequestContext,
        records: impl Into<OneOrMany<CallCountRecord>>,
    ) -> InfraResult<AppendOutcome> {
        self.write_call_count_at(ctx, ScopeLevel::Application, records)
            .await
    }

    /// Buffer call gauges for the stream of `level`.
    pub async fn write_call_count_at(
        &self,
        ctx: &RequestContext,
        level: ScopeLevel,
        records: impl Into<OneOrMany<CallCountRecord>>,
    ) -> InfraResult<AppendOutcome> {
        let records = records.into().into_vec();
        self.write(ctx, WriteBatch::CallCounts { level, records })
            .await
    }

    /// Write system alerts now, stamped with the client clock.
    pub async fn write_system_alerts(
        &self,
        ctx: &RequestContext,
        records: impl Into<OneOrMany<SystemAlertRecord>>,
    ) -> InfraResult<AppendOutcome> {
        self.write(ctx, WriteBatch::SystemAlerts(records.into().into_vec()))
            .await
    }

    /// Buffer any batch.
    pub async fn write(&self, ctx: &RequestContext, batch: WriteBatch) -> InfraResult<AppendOutcome> {
        write_records(ctx, &self.write_deps, batch).await
    }

    /// CDRs of one account.
    pub async fn query_cdrs(
        &self,
        ctx: &RequestContext,
        account_sid: &str,
        options: QueryOptions,
    ) -> InfraResult<PagedResult> {
        self.query(ctx, EntityKind::Cdr, ScopeLevel::Account, account_sid, options)
            .await
    }

    /// CDRs of one service provider.
    pub async fn query_cdrs_sp(
        &self,
        ctx: &RequestContext,
        service_provider_sid: &str,
        options: QueryOptions,
    ) -> InfraResult<PagedResult> {
        self.query(
            ctx,
            EntityKind::Cdr,
            ScopeLevel::ServiceProvider,
            service_provider_sid,
            options,
        )
        .await
    }

    /// Alerts of one account.
    pub async fn query_alerts(
        &self,
        ctx: &RequestContext,
        account_sid: &str,
        options: QueryOptions,
    ) -> InfraResult<PagedResult> {
        self.query(ctx, EntityKind::Alert, ScopeLevel::Account, account_sid, options)
            .await
    }

    /// Alerts of one service provider.
    pub async fn query_alerts_sp(
        &self,
        ctx: &RequestContext,
        service_provider_sid: &str,
        options: QueryOptions,
    ) -> InfraResult<PagedResult> {
        self.query(
            ctx,
            EntityKind::Alert,
            ScopeLevel::ServiceProvider,
            service_provider_sid,
            options,
        )
        .await
    }

    /// Call gauges of one account.
    pub async fn query_call_counts(
        &self,
        ctx: &RequestContext,
        account_sid: &str,
        options: QueryOptions,
    ) -> InfraResult<PagedResult> {
        self.query(ctx, EntityKind::CallCount, ScopeLevel::Account, account_sid, options)
            .await
    }

    /// Call gauges of one service provider.
    pub async fn query_call_counts_sp(
        &self,
        ctx: &RequestContext,
        service_provider_sid: &str,
        options: QueryOptions,
    ) -> InfraResult<PagedResult> {
        self.query(
            ctx,
            EntityKind::CallCount,
            ScopeLevel::ServiceProvider,
            service_provider_sid,
            options,
        )
        .await
    }

    /// Call gauges of one application.
    pub async fn query_call_counts_app(
        &self,
        ctx: &RequestContext,
        application_sid: &str,
        options: QueryOptions,
    ) -> InfraResult<PagedResult> {
        self.query(
            ctx,
            EntityKind::CallCount,
            ScopeLevel::Application,
            application_sid,
            options,
        )
        .await
    }

    /// Query any entity at any supported scope level.
    pub async fn query(
        &self,
        ctx: &RequestContext,
        entity: EntityKind,
        level: ScopeLevel,
        scope_id: &str,
        options: QueryOptions,
    ) -> InfraResult<PagedResult> {
        let scope = Scope::parse(level, scope_id)
            .map_err(|error| StoreErrorKind::Query.wrap(error.into()))?;
        let input = QueryInput {
            entity,
            scope,
            options,
        };
        query_telemetry(ctx, &self.query_deps, input).await
    }

    /// Flush every stream, waiting for in-flight flushes.
    ///
    /// Every stream is attempted; the first failure is returned.
    pub async fn flush_all(&self, ctx: &RequestContext) -> InfraResult<usize> {
        let mut written = 0;
        let mut first_error = None;
        for (stream, outcome) in self.streams.flush_all(ctx).await {
            match outcome {
                Ok(call_telemetry_app::FlushOutcome::Written(count)) => written += count,
                Ok(_) => {},
                Err(error) => {
                    tracing::warn!(stream = stream.measurement(), code = %error.code, "flush failed");
                    first_error.get_or_insert(error);
                },
            }
        }
        first_error.map_or(Ok(written), Err)
    }

    /// Stop the periodic timer and flush pending points within the shutdown
    /// timeout. Safe to call more than once.
    pub async fn shutdown(&self, ctx: &RequestContext) -> InfraResult<usize> {
        let scheduler = self.scheduler.lock().await.take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }
        let written = timeout_with_context(
            ctx,
            self.shutdown_timeout,
            "telemetry_client.shutdown",
            self.flush_all(ctx),
        )
        .await?;
        if let Some(logger) = self.logger.as_ref() {
            logger.info(
                "telemetry.client.stopped",
                "Telemetry client stopped",
                Some(log_fields([("flushedPoints", Value::from(written))])),
            );
        }
        Ok(written)
    }
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TelemetryClient")
            .field("streams", &self.streams)
            .finish_non_exhaustive()
    }
}
