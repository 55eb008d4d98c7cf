//! Config loading helpers (env + file + overrides).
//!
//! The loader owns the merge order and surfaces user-facing errors as typed
//! `ErrorEnvelope`s.

use crate::{StoreProvider, TelemetryConfig, TelemetryEnv, ValidatedTelemetryConfig, apply_env_overrides};
use call_telemetry_domain::{FailurePolicy, OverflowPolicy};
use call_telemetry_shared::{ErrorClass, ErrorCode, ErrorEnvelope, SecretString};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Load the client config from sources using a deterministic precedence order.
///
/// Precedence (highest wins):
/// - env overrides (`TelemetryEnv`)
/// - overrides JSON (partial config)
/// - config JSON (file content)
/// - defaults (`TelemetryConfig::default()`)
pub fn load_telemetry_config_from_sources(
    config_json: Option<&str>,
    overrides_json: Option<&str>,
    env: &TelemetryEnv,
) -> Result<ValidatedTelemetryConfig, ErrorEnvelope> {
    let config = match config_json {
        None => TelemetryConfig::default(),
        Some(input) => parse_config_unvalidated(input, ConfigFormat::Json)?,
    };
    merge_and_validate(config, overrides_json, env)
}

/// Load the client config from an optional file path (`.json` or `.toml`).
pub fn load_telemetry_config_from_path(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &TelemetryEnv,
) -> Result<ValidatedTelemetryConfig, ErrorEnvelope> {
    let config = match config_path {
        None => TelemetryConfig::default(),
        Some(path) => {
            let config_text = read_config_file(path)?;
            let format = detect_config_format(path)?;
            parse_config_unvalidated(&config_text, format)?
        },
    };
    merge_and_validate(config, overrides_json, env)
}

/// Load the client config from std env and an optional file path.
pub fn load_telemetry_config_std_env(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedTelemetryConfig, ErrorEnvelope> {
    let env = TelemetryEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_telemetry_config_from_path(config_path, overrides_json, &env)
}

/// Serialize the config as deterministic pretty JSON (with trailing newline).
///
/// Secrets serialize redacted.
pub fn to_pretty_json(config: &TelemetryConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the config as deterministic pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &TelemetryConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

fn merge_and_validate(
    mut config: TelemetryConfig,
    overrides_json: Option<&str>,
    env: &TelemetryEnv,
) -> Result<ValidatedTelemetryConfig, ErrorEnvelope> {
    if let Some(input) = overrides_json {
        let overrides = parse_overrides_json(input)?;
        apply_overrides(&mut config, overrides);
    }

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<TelemetryConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

fn parse_overrides_json(input: &str) -> Result<TelemetryConfigOverrides, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid overrides JSON: {error}"),
        )
        .with_metadata("source", "overrides")
    })
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct TelemetryConfigOverrides {
    version: Option<u32>,
    store: StoreConfigOverrides,
    buffer: BufferConfigOverrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct StoreConfigOverrides {
    provider: Option<StoreProvider>,
    url: Option<String>,
    username: Option<String>,
    password: Option<SecretString>,
    token: Option<SecretString>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct BufferConfigOverrides {
    commit_size: Option<u32>,
    commit_interval_secs: Option<u64>,
    capacity: Option<u32>,
    overflow_policy: Option<OverflowPolicy>,
    failure_policy: Option<FailurePolicy>,
}

fn apply_overrides(config: &mut TelemetryConfig, overrides: TelemetryConfigOverrides) {
    if let Some(version) = overrides.version {
        config.version = version;
    }

    let store = overrides.store;
    set(&mut config.store.provider, store.provider);
    set(&mut config.store.url, store.url);
    set(&mut config.store.timeout_ms, store.timeout_ms);
    if store.username.is_some() {
        config.store.username = store.username;
    }
    if store.password.is_some() {
        config.store.password = store.password;
    }
    if store.token.is_some() {
        config.store.token = store.token;
    }

    let buffer = overrides.buffer;
    set(&mut config.buffer.commit_size, buffer.commit_size);
    set(
        &mut config.buffer.commit_interval_secs,
        buffer.commit_interval_secs,
    );
    set(&mut config.buffer.capacity, buffer.capacity);
    set(&mut config.buffer.overflow_policy, buffer.overflow_policy);
    set(&mut config.buffer.failure_policy, buffer.failure_policy);
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn override_precedence_is_deterministic() -> Result<(), Box<dyn Error>> {
        let config_json = r#"{
          "version": 1,
          "store": { "url": "http://file:8086", "timeoutMs": 1000 },
          "buffer": { "commitSize": 10 }
        }"#;
        let overrides_json = r#"{ "store": { "timeoutMs": 2000 }, "buffer": { "commitSize": 20 } }"#;
        let env = TelemetryEnv {
            commit_size: Some(30),
            ..TelemetryEnv::default()
        };

        let config =
            load_telemetry_config_from_sources(Some(config_json), Some(overrides_json), &env)?;
        assert_eq!(config.store.url, "http://file:8086");
        assert_eq!(config.store.timeout_ms, 2000);
        assert_eq!(config.buffer.commit_size, 30);
        Ok(())
    }

    #[test]
    fn serialization_is_deterministic() -> Result<(), Box<dyn Error>> {
        let config = load_telemetry_config_from_sources(None, None, &TelemetryEnv::default())?;
        let first = to_pretty_json(&config)?;
        let second = to_pretty_json(&config)?;
        assert_eq!(first, second);
        assert!(first.ends_with('\n'));
        assert!(to_pretty_toml(&config)?.contains("commitSize = 1"));
        Ok(())
    }

    #[test]
    fn secrets_serialize_redacted() -> Result<(), Box<dyn Error>> {
        let overrides = r#"{ "store": { "username": "ops", "password": "hunter2" } }"#;
        let config =
            load_telemetry_config_from_sources(None, Some(overrides), &TelemetryEnv::default())?;
        assert_eq!(
            config.store.password.as_ref().map(SecretString::expose),
            Some("hunter2")
        );
        let rendered = to_pretty_json(&config)?;
        assert!(!rendered.contains("hunter2"));
        Ok(())
    }

    #[test]
    fn invalid_file_value_overridden_by_valid_env_succeeds() -> Result<(), Box<dyn Error>> {
        let config_json = r#"{ "buffer": { "commitIntervalSecs": 0 } }"#;
        let env = TelemetryEnv {
            commit_interval_secs: Some(5),
            ..TelemetryEnv::default()
        };
        let config = load_telemetry_config_from_sources(Some(config_json), None, &env)?;
        assert_eq!(config.limits().commit_interval_secs.get(), 5);
        Ok(())
    }

    #[test]
    fn unknown_override_fields_fail() {
        let error = load_telemetry_config_from_sources(
            None,
            Some(r#"{ "buffer": { "batch": 5 } }"#),
            &TelemetryEnv::default(),
        )
        .err();
        assert_eq!(
            error.as_ref().and_then(|error| error.metadata_value("source")),
            Some("overrides")
        );
    }

    #[test]
    fn missing_file_and_unknown_extension_are_reported() {
        let env = TelemetryEnv::default();
        let missing = load_telemetry_config_from_path(
            Some(Path::new("/definitely/not/here.json")),
            None,
            &env,
        )
        .err();
        assert_eq!(
            missing.map(|error| error.code.to_string()).as_deref(),
            Some("config:config_file_not_found")
        );

        let format = detect_config_format(Path::new("client.yaml")).err();
        assert_eq!(
            format.map(|error| error.code.to_string()).as_deref(),
            Some("config:unsupported_format")
        );
    }
}
