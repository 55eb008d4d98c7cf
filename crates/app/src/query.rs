//! Query use case: count, page and normalize one entity within one scope.

use crate::normalize::normalize_series;
use crate::streams::StreamManager;
use call_telemetry_domain::{EntityKind, PagedResult, QueryOptions, QuerySpec, Scope};
use call_telemetry_ports::{
    ClockPort, LogFields, LoggerPort, StoreErrorKind, StoreGatewayPort, TelemetryPort, log_fields,
    telemetry_tags,
};
use call_telemetry_shared::{ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Input payload for a telemetry query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryInput {
    /// Queried entity.
    pub entity: EntityKind,
    /// Mandatory tenant scope.
    pub scope: Scope,
    /// Pagination, time window and entity filters.
    pub options: QueryOptions,
}

/// Dependencies required by queries.
#[derive(Clone)]
pub struct QueryDeps {
    /// Store gateway executing the statements.
    pub store: Arc<dyn StoreGatewayPort>,
    /// Stream buffers, for namespace initialization.
    pub streams: Arc<StreamManager>,
    /// Clock resolving relative windows.
    pub clock: Arc<dyn ClockPort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

/// Run the COUNT and, when rows match, the SELECT of a query.
#[tracing::instrument(skip_all, fields(entity = input.entity.as_str(), scope = input.scope.level().as_str()))]
pub async fn query_telemetry(
    ctx: &RequestContext,
    deps: &QueryDeps,
    input: QueryInput,
) -> Result<PagedResult> {
    let started_at = Instant::now();
    let entity = input.entity;
    let timer = deps.telemetry.as_ref().map(|telemetry| {
        let tags = telemetry_tags([("entity", entity.as_str())]);
        telemetry.start_timer("telemetry.query", Some(&tags))
    });

    let result = run(ctx, deps, input).await;

    if let Some(timer) = timer.as_ref() {
        timer.stop();
    }
    match &result {
        Ok(page) => {
            if let Some(logger) = deps.logger.as_ref() {
                let mut fields = query_fields(entity, started_at);
                fields.insert("total".into(), Value::from(page.total));
                fields.insert("rows".into(), Value::from(page.data.len()));
                logger.debug("telemetry.query.completed", "Query completed", Some(fields));
            }
        },
        Err(error) => {
            if let Some(logger) = deps.logger.as_ref() {
                logger.failure(
                    "telemetry.query.failed",
                    "Query failed",
                    error,
                    Some(query_fields(entity, started_at)),
                );
            }
        },
    }
    result
}

async fn run(ctx: &RequestContext, deps: &QueryDeps, input: QueryInput) -> Result<PagedResult> {
    ctx.ensure_not_cancelled("query_telemetry.start")?;
    let spec = QuerySpec::new(input.entity, input.scope, &input.options).map_err(query_error)?;
    let stream = spec.stream();
    deps.streams.buffer(stream).namespace().ensure(ctx).await?;

    let bound = spec.bind(deps.clock.now()).map_err(query_error)?;
    let count = deps.store.query(ctx, bound.count).await?;
    if count.first_series().is_none() {
        return Ok(PagedResult::empty(spec.page(), spec.page_size()));
    }
    let total = count.count();
    if spec.page_size() == Some(0) || total == 0 {
        return Ok(PagedResult {
            total,
            page: spec.page(),
            page_size: spec.page_size(),
            data: Vec::new(),
        });
    }

    ctx.ensure_not_cancelled("query_telemetry.select")?;
    let rows = deps.store.query(ctx, bound.select).await?;
    let data = normalize_series(stream, rows.first_series())?;
    Ok(PagedResult {
        total,
        page: spec.page(),
        page_size: spec.page_size(),
        data,
    })
}

fn query_error(error: call_telemetry_domain::DomainError) -> ErrorEnvelope {
    StoreErrorKind::Query.wrap(error.into())
}

fn query_fields(entity: EntityKind, started_at: Instant) -> LogFields {
    log_fields([
        ("entity", Value::from(entity.as_str())),
        (
            "durationMs",
            Value::from(u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)),
        ),
    ])
}
