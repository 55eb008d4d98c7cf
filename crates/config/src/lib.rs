//! # call-telemetry-config
//!
//! Client configuration: schema, defaults, env overrides, and validation.
//! This crate depends on `domain` and `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file + overrides).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;

pub use env::{
    ENV_BUFFER_CAPACITY, ENV_COMMIT_INTERVAL_SECS, ENV_COMMIT_SIZE, ENV_FAILURE_POLICY,
    ENV_OVERFLOW_POLICY, ENV_STORE_HOST, ENV_STORE_PASSWORD, ENV_STORE_TIMEOUT_MS,
    ENV_STORE_TOKEN, ENV_STORE_URL, ENV_STORE_USERNAME, EnvParseError, TelemetryEnv,
    apply_env_overrides,
};
pub use load::{
    load_telemetry_config_from_path, load_telemetry_config_from_sources,
    load_telemetry_config_std_env, to_pretty_json, to_pretty_toml,
};
pub use schema::{
    BufferConfig, CURRENT_CONFIG_VERSION, ConfigLimits, ConfigSchemaError, DEFAULT_STORE_PORT,
    DEFAULT_STORE_URL, StoreConfig, StoreProvider, TelemetryConfig, ValidatedTelemetryConfig,
    parse_telemetry_config_json, parse_telemetry_config_toml, telemetry_config_schema,
};
