//! Config loading helpers for CLI surfaces.

use crate::InfraResult;
use call_telemetry_config::{TelemetryEnv, load_telemetry_config_from_path, to_pretty_json};
use call_telemetry_shared::ErrorEnvelope;
use std::collections::BTreeMap;
use std::path::Path;

/// Load and validate the effective config, returning deterministic pretty JSON.
///
/// Secrets are redacted in the output.
pub fn load_effective_config_json(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<String> {
    let env = TelemetryEnv::from_map(env).map_err(ErrorEnvelope::from)?;
    let config = load_telemetry_config_from_path(config_path, overrides_json, &env)?;
    to_pretty_json(&config)
}
