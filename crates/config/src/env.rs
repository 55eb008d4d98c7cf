//! Environment variable parsing and env-to-config merging.
//!
//! Env parsing is strict: a variable that is present must hold a valid,
//! non-empty value. Secret values never appear in error metadata.

use crate::schema::{DEFAULT_STORE_PORT, TelemetryConfig, ValidatedTelemetryConfig};
use call_telemetry_domain::{FailurePolicy, OverflowPolicy};
use call_telemetry_shared::{ErrorCode, ErrorEnvelope, REDACTED, SecretString, is_secret_key};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Env var: store base URL.
pub const ENV_STORE_URL: &str = "CTEL_STORE_URL";
/// Env var: store host, expanded to `http://<host>:8086` when no URL is set.
pub const ENV_STORE_HOST: &str = "CTEL_STORE_HOST";
/// Env var: store basic-auth user.
pub const ENV_STORE_USERNAME: &str = "CTEL_STORE_USERNAME";
/// Env var: store basic-auth password (secret).
// gitleaks:allow
pub const ENV_STORE_PASSWORD: &str = "CTEL_STORE_PASSWORD";
/// Env var: store API token (secret).
// gitleaks:allow
pub const ENV_STORE_TOKEN: &str = "CTEL_STORE_TOKEN";
/// Env var: store request timeout in milliseconds.
pub const ENV_STORE_TIMEOUT_MS: &str = "CTEL_STORE_TIMEOUT_MS";
/// Env var: flush threshold.
pub const ENV_COMMIT_SIZE: &str = "CTEL_COMMIT_SIZE";
/// Env var: periodic flush interval in seconds.
pub const ENV_COMMIT_INTERVAL_SECS: &str = "CTEL_COMMIT_INTERVAL_SECS";
/// Env var: pending queue capacity.
pub const ENV_BUFFER_CAPACITY: &str = "CTEL_BUFFER_CAPACITY";
/// Env var: overflow policy (`dropOldest` | `dropNewest` | `block`).
pub const ENV_OVERFLOW_POLICY: &str = "CTEL_OVERFLOW_POLICY";
/// Env var: failure policy (`clear` | `retain`).
pub const ENV_FAILURE_POLICY: &str = "CTEL_FAILURE_POLICY";

const ALL_VARS: [&str; 11] = [
    ENV_STORE_URL,
    ENV_STORE_HOST,
    ENV_STORE_USERNAME,
    ENV_STORE_PASSWORD,
    ENV_STORE_TOKEN,
    ENV_STORE_TIMEOUT_MS,
    ENV_COMMIT_SIZE,
    ENV_COMMIT_INTERVAL_SECS,
    ENV_BUFFER_CAPACITY,
    ENV_OVERFLOW_POLICY,
    ENV_FAILURE_POLICY,
];

/// Typed env-derived overrides for [`TelemetryConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryEnv {
    /// Override for `store.url`.
    pub store_url: Option<Box<str>>,
    /// Host shorthand for `store.url`; ignored when `store_url` is set.
    pub store_host: Option<Box<str>>,
    /// Override for `store.username`.
    pub store_username: Option<Box<str>>,
    /// Secret: override for `store.password`.
    pub store_password: Option<SecretString>,
    /// Secret: override for `store.token`.
    pub store_token: Option<SecretString>,
    /// Override for `store.timeoutMs`.
    pub store_timeout_ms: Option<u64>,
    /// Override for `buffer.commitSize`.
    pub commit_size: Option<u32>,
    /// Override for `buffer.commitIntervalSecs`.
    pub commit_interval_secs: Option<u64>,
    /// Override for `buffer.capacity`.
    pub buffer_capacity: Option<u32>,
    /// Override for `buffer.overflowPolicy`.
    pub overflow_policy: Option<OverflowPolicy>,
    /// Override for `buffer.failurePolicy`.
    pub failure_policy: Option<FailurePolicy>,
}

impl TelemetryEnv {
    /// Parse env overrides from a key/value map.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            store_url: parse_optional_url_string(map, ENV_STORE_URL)?,
            store_host: parse_optional_trimmed_string(map, ENV_STORE_HOST)?,
            store_username: parse_optional_trimmed_string(map, ENV_STORE_USERNAME)?,
            store_password: parse_optional_secret(map, ENV_STORE_PASSWORD)?,
            store_token: parse_optional_secret(map, ENV_STORE_TOKEN)?,
            store_timeout_ms: parse_optional_u64(map, ENV_STORE_TIMEOUT_MS)?,
            commit_size: parse_optional_u32(map, ENV_COMMIT_SIZE)?,
            commit_interval_secs: parse_optional_u64(map, ENV_COMMIT_INTERVAL_SECS)?,
            buffer_capacity: parse_optional_u32(map, ENV_BUFFER_CAPACITY)?,
            overflow_policy: parse_optional_enum(map, ENV_OVERFLOW_POLICY, OverflowPolicy::parse)?,
            failure_policy: parse_optional_enum(map, ENV_FAILURE_POLICY, FailurePolicy::parse)?,
        })
    }

    /// Parse env overrides from the current process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for name in ALL_VARS {
            if let Ok(value) = std::env::var(name) {
                map.insert(name.to_string(), value);
            }
        }

        Self::from_map(&map)
    }

    /// True when no variable was set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Apply env overrides to a base config (env wins over file/default values).
pub fn apply_env_overrides(
    base: TelemetryConfig,
    env: &TelemetryEnv,
) -> Result<ValidatedTelemetryConfig, ErrorEnvelope> {
    let mut config = base;
    apply_store_env_overrides(&mut config, env);
    apply_buffer_env_overrides(&mut config, env);

    config.validate_and_normalize().map_err(Into::into)
}

fn apply_store_env_overrides(config: &mut TelemetryConfig, env: &TelemetryEnv) {
    let store = &mut config.store;
    if let Some(url) = env.store_url.as_deref() {
        url.clone_into(&mut store.url);
    } else if let Some(host) = env.store_host.as_deref() {
        store.url = format!("http://{host}:{DEFAULT_STORE_PORT}");
    }
    if let Some(username) = env.store_username.as_deref() {
        store.username = Some(username.to_owned());
    }
    if let Some(password) = env.store_password.as_ref() {
        store.password = Some(password.clone());
    }
    if let Some(token) = env.store_token.as_ref() {
        store.token = Some(token.clone());
    }
    if let Some(timeout_ms) = env.store_timeout_ms {
        store.timeout_ms = timeout_ms;
    }
}

const fn apply_buffer_env_overrides(config: &mut TelemetryConfig, env: &TelemetryEnv) {
    let buffer = &mut config.buffer;
    if let Some(commit_size) = env.commit_size {
        buffer.commit_size = commit_size;
    }
    if let Some(interval) = env.commit_interval_secs {
        buffer.commit_interval_secs = interval;
    }
    if let Some(capacity) = env.buffer_capacity {
        buffer.capacity = capacity;
    }
    if let Some(policy) = env.overflow_policy {
        buffer.overflow_policy = policy;
    }
    if let Some(policy) = env.failure_policy {
        buffer.failure_policy = policy;
    }
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// A secret env var was present but empty after trimming.
    EmptySecret {
        /// Env var name.
        var: &'static str,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// URL env var had an invalid value.
    InvalidUrl {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } | Self::EmptySecret { .. } => {
                ErrorCode::new("config", "empty_env_var")
            },
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidUrl { .. } => ErrorCode::new("config", "invalid_env_url"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } | Self::EmptySecret { var } => {
                write!(formatter, "{var} must be non-empty")
            },
            Self::InvalidInt { var, .. } => write!(formatter, "{var} must be an integer"),
            Self::InvalidUrl { var, .. } => write!(formatter, "{var} must be an http(s) URL"),
            Self::InvalidEnum { var, .. } => write!(formatter, "{var} has an unsupported value"),
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } | EnvParseError::EmptySecret { var } => {
                envelope.with_metadata("env_var", var)
            },
            EnvParseError::InvalidInt { var, value }
            | EnvParseError::InvalidUrl { var, value }
            | EnvParseError::InvalidEnum { var, value } => envelope
                .with_metadata("env_var", var)
                .with_metadata("value", redact_value(var, &value)),
        }
    }
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    Ok(Some(trimmed.to_owned().into_boxed_str()))
}

fn parse_optional_secret(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<SecretString>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptySecret { var });
    }

    Ok(Some(SecretString::new(trimmed.to_owned())))
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.into_string(),
        })
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.into_string(),
        })
}

fn parse_optional_enum<T>(
    map: &BTreeMap<String, String>,
    var: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    parse(&trimmed)
        .map(Some)
        .ok_or_else(|| EnvParseError::InvalidEnum {
            var,
            value: trimmed.into_string(),
        })
}

fn parse_optional_url_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    let parsed = Url::parse(&trimmed).map_err(|_| EnvParseError::InvalidUrl {
        var,
        value: trimmed.to_string(),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(EnvParseError::InvalidUrl {
            var,
            value: trimmed.into_string(),
        });
    }

    Ok(Some(parsed.to_string().into_boxed_str()))
}

fn redact_value(var: &str, value: &str) -> String {
    if is_secret_key(var) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}
