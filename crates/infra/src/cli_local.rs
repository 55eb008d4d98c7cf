//! Local CLI orchestration helpers.
//!
//! Each command builds a client from the effective config, runs on a
//! current-thread runtime, and shuts the client down so buffered points are
//! flushed before the process exits.

use crate::client::{TelemetryClient, TelemetryClientBuilder};
use crate::observability::Observability;
use crate::{InfraError, InfraResult};
use call_telemetry_app::WriteBatch;
use call_telemetry_config::{ValidatedTelemetryConfig, load_telemetry_config_std_env};
use call_telemetry_domain::{
    AlertContext, AlertType, EntityKind, PagedResult, QueryOptions, ScopeLevel, StreamKind,
};
use call_telemetry_shared::{ErrorEnvelope, RequestContext};
use serde::Serialize;
use std::future::Future;
use std::path::Path;

/// Result of a write command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteSummary {
    /// Target stream.
    #[serde(serialize_with = "serialize_stream")]
    pub stream: StreamKind,
    /// Records accepted into the buffer.
    pub accepted: usize,
    /// Points dropped by the overflow policy.
    pub dropped: usize,
    /// Points written by the final flush.
    pub flushed: usize,
}

fn serialize_stream<S: serde::Serializer>(
    stream: &StreamKind,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(stream.measurement())
}

/// A query command.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Entity family.
    pub entity: EntityKind,
    /// Scope level of `scope_id`.
    pub level: ScopeLevel,
    /// Service provider, account or application sid.
    pub scope_id: String,
    /// Paging, time window and filters.
    pub options: QueryOptions,
}

/// One row of the alert type catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertTypeEntry {
    /// Stored alert code.
    pub code: &'static str,
    /// Message rendered with no context, when the type has a template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Every alert type with its context-free message.
#[must_use]
pub fn alert_type_catalog() -> Vec<AlertTypeEntry> {
    AlertType::ALL
        .into_iter()
        .map(|kind| AlertTypeEntry {
            code: kind.as_code(),
            template: kind.render(&AlertContext::default()),
        })
        .collect()
}

/// Write a batch and flush it before returning.
pub fn run_write_local(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    batch: WriteBatch,
) -> InfraResult<WriteSummary> {
    let config = load_telemetry_config_std_env(config_path, overrides_json)?;
    run_write_with_config(config, Observability::from_std_env(), batch)
}

/// Run a scoped query.
pub fn run_query_local(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    request: QueryRequest,
) -> InfraResult<PagedResult> {
    let config = load_telemetry_config_std_env(config_path, overrides_json)?;
    run_query_with_config(config, Observability::from_std_env(), request)
}

/// Write a batch using an already loaded config.
pub fn run_write_with_config(
    config: ValidatedTelemetryConfig,
    observability: Observability,
    batch: WriteBatch,
) -> InfraResult<WriteSummary> {
    let stream = batch.stream();
    run_with_client(config, observability, move |ctx, client| async move {
        let outcome = client.write(&ctx, batch).await;
        let flushed = client.shutdown(&ctx).await;
        let outcome = outcome?;
        Ok(WriteSummary {
            stream,
            accepted: outcome.accepted,
            dropped: outcome.dropped,
            flushed: flushed?,
        })
    })
}

/// Run a query using an already loaded config.
pub fn run_query_with_config(
    config: ValidatedTelemetryConfig,
    observability: Observability,
    request: QueryRequest,
) -> InfraResult<PagedResult> {
    run_with_client(config, observability, move |ctx, client| async move {
        let QueryRequest {
            entity,
            level,
            scope_id,
            options,
        } = request;
        let result = client
            .query(&ctx, entity, level, &scope_id, options)
            .await;
        client.shutdown(&ctx).await?;
        result
    })
}

fn run_with_client<F, T>(
    config: ValidatedTelemetryConfig,
    observability: Observability,
    op: impl FnOnce(RequestContext, TelemetryClient) -> F,
) -> InfraResult<T>
where
    F: Future<Output = InfraResult<T>>,
{
    let ctx = RequestContext::new_request();
    let observability = observability.scoped(&ctx);
    run_async_with_ctx(ctx, move |ctx| async move {
        let client = TelemetryClientBuilder::new(config)
            .with_observability(observability)
            .build()?;
        let watcher = spawn_interrupt_watcher(&ctx);
        let result = op(ctx, client).await;
        watcher.abort();
        result
    })
}

fn run_async_with_ctx<F, T>(
    ctx: RequestContext,
    op: impl FnOnce(RequestContext) -> F,
) -> InfraResult<T>
where
    F: Future<Output = Result<T, ErrorEnvelope>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(InfraError::from)?;
    runtime.block_on(async { op(ctx).await })
}

/// Cancel the request on Ctrl-C.
fn spawn_interrupt_watcher(ctx: &RequestContext) -> tokio::task::JoinHandle<()> {
    let token = ctx.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; cancelling request");
            token.cancel();
        }
    })
}

/// Map an error to the process exit code used by the CLI.
///
/// Wrapped store errors are judged by their `cause`. `2` is invalid input,
/// `3` is a store or I/O failure, `1` is anything else.
#[must_use]
pub fn exit_code_for_error(error: &ErrorEnvelope) -> u8 {
    let origin = error
        .metadata_value("cause")
        .map_or_else(|| error.code.to_string(), str::to_owned);
    let (namespace, code) = origin.split_once(':').unwrap_or(("core", origin.as_str()));
    match (namespace, code) {
        (
            "config",
            "config_file_io" | "config_file_not_found" | "config_file_permission_denied",
        )
        | ("store" | "influx", _) => 3,
        ("core", "io" | "timeout" | "not_found") => 3,
        ("core", "invalid_input") | ("config" | "cli" | "domain", _) => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_telemetry_config::TelemetryConfig;
    use call_telemetry_ports::StoreErrorKind;
    use call_telemetry_shared::{ErrorClass, ErrorCode};

    #[test]
    fn catalog_lists_every_alert_type() {
        let catalog = alert_type_catalog();
        assert_eq!(catalog.len(), AlertType::ALL.len());
        let call_limit = catalog
            .iter()
            .find(|entry| entry.code == "account-call-limit")
            .and_then(|entry| entry.template.as_deref());
        assert_eq!(
            call_limit,
            Some(
                "you have exceeded your account call limit of unknown; please consider upgrading your plan"
            )
        );
    }

    #[test]
    fn exit_codes_follow_error_origin() {
        let invalid = ErrorEnvelope::expected(ErrorCode::invalid_input(), "bad");
        assert_eq!(exit_code_for_error(&invalid), 2);

        let store = StoreErrorKind::Write.wrap(ErrorEnvelope::unexpected(
            ErrorCode::new("influx", "connection"),
            "down",
            ErrorClass::Retriable,
        ));
        assert_eq!(exit_code_for_error(&store), 3);

        let bad_page = StoreErrorKind::Query.wrap(ErrorEnvelope::expected(
            ErrorCode::new("domain", "invalid_query_option"),
            "page must be an integer",
        ));
        assert_eq!(exit_code_for_error(&bad_page), 2);

        let internal = ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            "broken",
            ErrorClass::NonRetriable,
        );
        assert_eq!(exit_code_for_error(&internal), 1);
    }

    #[test]
    fn unreachable_store_fails_write_with_store_error() -> InfraResult<()> {
        let mut config = TelemetryConfig::default();
        config.store.url = "http://127.0.0.1:9".to_owned();
        config.store.timeout_ms = 500;
        let batch = crate::parse_write_batch_json(
            crate::WriteKind::Alert,
            r#"{"alert_type": "no-carrier", "account_sid": "acct-1"}"#,
        )?;
        let error = run_write_with_config(
            config.validate_and_normalize()?,
            Observability::default(),
            batch,
        )
        .err();
        assert_eq!(error.as_ref().map(exit_code_for_error), Some(3));
        Ok(())
    }
}
