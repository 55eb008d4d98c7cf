//! # call-telemetry-infra
//!
//! Infrastructure wiring and runtime composition.
//! This crate depends on `app`, `adapters`, `config`, and `shared`.

/// Local CLI orchestration helpers.
pub mod cli_local;
/// Telemetry client and its builder.
pub mod client;
/// Config loading helpers used by CLI surfaces.
pub mod config_check;
/// Environment validation helpers used by CLI surfaces.
pub mod env_check;
/// Logger and telemetry selection.
pub mod observability;
/// Payload parsing helpers used by CLI surfaces.
pub mod request_check;
/// Store gateway selection helpers.
mod store_factory;

pub use cli_local::{
    AlertTypeEntry, QueryRequest, WriteSummary, alert_type_catalog, exit_code_for_error,
    run_query_local, run_query_with_config, run_write_local, run_write_with_config,
};
pub use client::{TelemetryClient, TelemetryClientBuilder};
pub use config_check::load_effective_config_json;
pub use env_check::{InfraError, InfraResult, validate_env_parsing};
pub use observability::{ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_TELEMETRY_FORMAT, Observability};
pub use request_check::{WriteKind, parse_query_options_json, parse_write_batch_json};
pub use store_factory::build_store_gateway;

// Re-export redaction utilities for CLI boundary sanitization
pub use call_telemetry_shared::{is_secret_key, redact_if_secret};

#[cfg(test)]
mod tests {
    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.starts_with('[') {
                in_deps = line == "[dependencies]";
                continue;
            }
            if in_deps && line.starts_with("call-telemetry-") {
                let key = line.split('=').next().unwrap_or("").trim();
                deps.push(key.split('.').next().unwrap_or("").trim().to_string());
            }
        }
        deps
    }

    #[test]
    fn infra_depends_on_app_adapters_config() {
        let deps = workspace_deps();
        for expected in [
            "call-telemetry-app",
            "call-telemetry-adapters",
            "call-telemetry-config",
        ] {
            assert!(
                deps.iter().any(|dep| dep == expected),
                "missing dependency: {expected}"
            );
        }
        assert!(!deps.iter().any(|dep| dep == "call-telemetry-testkit"));
    }
}
