//! # call-telemetry-facade
//!
//! Facade API for consumers (the CLI and host services).
//! This crate depends on `infra`, `app`, `domain`, and `config`.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub use call_telemetry_app::{AppendOutcome, FlushErrorHook, WriteBatch};
pub use call_telemetry_config::{
    StoreProvider, TelemetryConfig, ValidatedTelemetryConfig, telemetry_config_schema,
};
pub use call_telemetry_domain::{
    AccountSid, AlertRecord, AlertType, ApplicationSid, CallCountRecord, CdrRecord, EntityKind,
    FailurePolicy, FieldValue, OneOrMany, OverflowPolicy, PagedResult, QueryOptions, RecordValue,
    ScopeLevel, ServiceProviderSid, StreamKind, SystemAlertRecord, TelemetryRecord,
    format_alert_message,
};
pub use call_telemetry_shared::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, RequestContext};

/// Infra error type (shared error envelope).
pub use call_telemetry_infra::InfraError;
/// Telemetry client and builder.
pub use call_telemetry_infra::{Observability, TelemetryClient, TelemetryClientBuilder};
/// CLI command inputs and outputs.
pub use call_telemetry_infra::{AlertTypeEntry, QueryRequest, WriteKind, WriteSummary};
/// Re-export redaction utilities for CLI boundary sanitization.
pub use call_telemetry_infra::{is_secret_key, redact_if_secret};

/// Validate that the provided env overrides can be parsed and merged into a config.
pub fn validate_env_parsing(env: &BTreeMap<String, String>) -> Result<(), InfraError> {
    call_telemetry_infra::validate_env_parsing(env)
}

/// Load and validate the effective config, returning deterministic pretty JSON.
pub fn load_effective_config_json(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<String, InfraError> {
    call_telemetry_infra::load_effective_config_json(env, config_path, overrides_json)
}

/// JSON schema of the config file, pretty printed.
pub fn config_schema_json() -> Result<String, InfraError> {
    serde_json::to_string_pretty(&telemetry_config_schema()).map_err(|error| {
        InfraError::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config schema: {error}"),
            ErrorClass::NonRetriable,
        )
    })
}

/// Every alert type with its context-free message.
#[must_use]
pub fn alert_types() -> Vec<AlertTypeEntry> {
    call_telemetry_infra::alert_type_catalog()
}

/// Parse a JSON record payload for a write command.
pub fn parse_write_payload(kind: WriteKind, input_json: &str) -> Result<WriteBatch, InfraError> {
    call_telemetry_infra::parse_write_batch_json(kind, input_json)
}

/// Parse JSON query options; absent input means defaults.
pub fn parse_query_options(input_json: Option<&str>) -> Result<QueryOptions, InfraError> {
    call_telemetry_infra::parse_query_options_json(input_json)
}

/// Write a batch and flush it before returning.
pub fn run_write_local(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    batch: WriteBatch,
) -> Result<WriteSummary, InfraError> {
    call_telemetry_infra::run_write_local(config_path, overrides_json, batch)
}

/// Run a scoped query.
pub fn run_query_local(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    request: QueryRequest,
) -> Result<PagedResult, InfraError> {
    call_telemetry_infra::run_query_local(config_path, overrides_json, request)
}

/// Process exit code for an error: 2 invalid input, 3 store or I/O, 1 other.
#[must_use]
pub fn exit_code_for_error(error: &InfraError) -> u8 {
    call_telemetry_infra::exit_code_for_error(error)
}

/// Error payload printed by JSON surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    /// Stable error code (e.g. `ERR_STORE_WRITE_FAILED`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether retrying may succeed.
    pub retriable: bool,
    /// Metadata with secrets redacted.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

/// Convert an infra error into its payload (stable code + redacted meta).
#[must_use]
pub fn error_payload(error: &InfraError) -> ErrorPayload {
    let code = format!(
        "ERR_{}_{}",
        sanitize_code_segment(error.code.namespace()),
        sanitize_code_segment(error.code.code())
    );
    let meta = error
        .metadata
        .iter()
        .map(|(key, value)| (key.clone(), redact_if_secret(key, value)))
        .collect();
    ErrorPayload {
        code,
        message: error.message.clone(),
        retriable: error.class == ErrorClass::Retriable,
        meta,
    }
}

fn sanitize_code_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
