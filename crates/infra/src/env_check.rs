//! Environment validation helpers for CLI surfaces.

use call_telemetry_config::{TelemetryConfig, TelemetryEnv, apply_env_overrides};
use call_telemetry_shared::ErrorEnvelope;
use std::collections::BTreeMap;

/// Infra-level error type (shared error envelope).
pub type InfraError = ErrorEnvelope;

/// Infra-level result type.
pub type InfraResult<T> = Result<T, InfraError>;

/// Validate that the provided `CTEL_*` overrides parse and merge into a config.
pub fn validate_env_parsing(env: &BTreeMap<String, String>) -> InfraResult<()> {
    let parsed = TelemetryEnv::from_map(env).map_err(ErrorEnvelope::from)?;
    let _ = apply_env_overrides(TelemetryConfig::default(), &parsed)?;
    Ok(())
}
