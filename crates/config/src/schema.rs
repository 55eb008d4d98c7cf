//! Client configuration schema, defaults, validation, and normalization.
//!
//! - Deserialization uses `serde` (JSON or TOML).
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.
//! - Numeric settings come out of validation as bounded integers.

use call_telemetry_domain::{FailurePolicy, OverflowPolicy};
use call_telemetry_shared::{BoundedU32, BoundedU64, ErrorCode, ErrorEnvelope, SecretString};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Strip credentials from a URL before it lands in error metadata.
fn sanitize_url_for_error(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if (parsed.password().is_some() || !parsed.username().is_empty())
                && (parsed.set_username("").is_err() || parsed.set_password(None).is_err())
            {
                return "[invalid url: credentials]".to_string();
            }
            parsed.to_string()
        },
        Err(error) => format!("[invalid url: {error}]"),
    }
}

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Default store URL.
pub const DEFAULT_STORE_URL: &str = "http://127.0.0.1:8086";
/// Default store port used by the host shorthand.
pub const DEFAULT_STORE_PORT: u16 = 8086;

const STORE_TIMEOUT_MIN_MS: u64 = 100;
const STORE_TIMEOUT_MAX_MS: u64 = 600_000;
const COMMIT_SIZE_MIN: u32 = 1;
const COMMIT_SIZE_MAX: u32 = 100_000;
const COMMIT_INTERVAL_MIN_SECS: u64 = 1;
const COMMIT_INTERVAL_MAX_SECS: u64 = 86_400;
const CAPACITY_MIN: u32 = 1;
const CAPACITY_MAX: u32 = 10_000_000;

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct TelemetryConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// Time-series store connection.
    pub store: StoreConfig,
    /// Write buffering.
    pub buffer: BufferConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            store: StoreConfig::default(),
            buffer: BufferConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Defaults pointing at `http://<host>:8086`.
    ///
    /// A value that already carries a scheme is used as the full URL.
    #[must_use]
    pub fn from_host(host: &str) -> Self {
        let host = host.trim();
        let url = if host.contains("://") {
            host.to_owned()
        } else {
            format!("http://{host}:{DEFAULT_STORE_PORT}")
        };
        Self {
            store: StoreConfig {
                url,
                ..StoreConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate and normalize the config.
    pub fn validate_and_normalize(
        mut self,
    ) -> Result<ValidatedTelemetryConfig, ConfigSchemaError> {
        self.validate_version()?;
        self.store.normalize();
        self.store.validate()?;

        let limits = ConfigLimits::new(&self)?;
        if limits.buffer_capacity.get() < limits.commit_size.get() {
            return Err(ConfigSchemaError::CapacityBelowCommitSize {
                capacity: limits.buffer_capacity.get(),
                commit_size: limits.commit_size.get(),
            });
        }
        Ok(ValidatedTelemetryConfig { raw: self, limits })
    }

    const fn validate_version(&self) -> Result<(), ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }
        Ok(())
    }
}

/// Store backend implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum StoreProvider {
    /// InfluxDB 1.x HTTP API.
    #[default]
    Influx,
}

impl StoreProvider {
    /// Stable provider identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Influx => "influx",
        }
    }
}

/// Store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct StoreConfig {
    /// Backend implementation.
    pub provider: StoreProvider,
    /// Base URL of the store HTTP API.
    pub url: String,
    /// Basic-auth user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub password: Option<SecretString>,
    /// API token, sent as `Authorization: Token <token>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub token: Option<SecretString>,
    /// Per-request timeout (ms).
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: StoreProvider::Influx,
            url: DEFAULT_STORE_URL.to_owned(),
            username: None,
            password: None,
            token: None,
            timeout_ms: 10_000,
        }
    }
}

impl StoreConfig {
    fn normalize(&mut self) {
        self.url = self.url.trim().trim_end_matches('/').to_owned();
        self.username = self
            .username
            .take()
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty());
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_http_url("store", "url", &self.url)?;
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigSchemaError::InvalidCredentials {
                reason: "password requires username",
            });
        }
        if self.token.is_some() && self.username.is_some() {
            return Err(ConfigSchemaError::InvalidCredentials {
                reason: "use either token or username/password",
            });
        }
        Ok(())
    }
}

/// Write buffering settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct BufferConfig {
    /// Pending points that trigger a flush. `1` writes through.
    pub commit_size: u32,
    /// Periodic flush interval (seconds).
    pub commit_interval_secs: u64,
    /// Maximum pending points per stream.
    pub capacity: u32,
    /// Behaviour when a stream's queue is full.
    #[schemars(with = "String")]
    pub overflow_policy: OverflowPolicy,
    /// Behaviour when a flush fails.
    #[schemars(with = "String")]
    pub failure_policy: FailurePolicy,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            commit_size: 1,
            commit_interval_secs: 10,
            capacity: 10_000,
            overflow_policy: OverflowPolicy::DropOldest,
            failure_policy: FailurePolicy::Clear,
        }
    }
}

/// Validated config wrapper carrying bounded numeric values.
#[derive(Debug, Clone)]
pub struct ValidatedTelemetryConfig {
    raw: TelemetryConfig,
    limits: ConfigLimits,
}

impl ValidatedTelemetryConfig {
    /// Access validated numeric bounds.
    #[must_use]
    pub const fn limits(&self) -> &ConfigLimits {
        &self.limits
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> TelemetryConfig {
        self.raw
    }
}

impl AsRef<TelemetryConfig> for ValidatedTelemetryConfig {
    fn as_ref(&self) -> &TelemetryConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedTelemetryConfig {
    type Target = TelemetryConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Validated numeric limits derived from the config.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLimits {
    /// Store request timeout (ms).
    pub store_timeout_ms: BoundedU64<STORE_TIMEOUT_MIN_MS, STORE_TIMEOUT_MAX_MS>,
    /// Flush threshold.
    pub commit_size: BoundedU32<COMMIT_SIZE_MIN, COMMIT_SIZE_MAX>,
    /// Periodic flush interval (seconds).
    pub commit_interval_secs: BoundedU64<COMMIT_INTERVAL_MIN_SECS, COMMIT_INTERVAL_MAX_SECS>,
    /// Pending queue capacity.
    pub buffer_capacity: BoundedU32<CAPACITY_MIN, CAPACITY_MAX>,
}

impl ConfigLimits {
    fn new(config: &TelemetryConfig) -> Result<Self, ConfigSchemaError> {
        let store_timeout_ms = BoundedU64::try_new(config.store.timeout_ms).map_err(|_| {
            ConfigSchemaError::TimeoutOutOfRange {
                section: "store",
                field: "timeoutMs",
                value_ms: config.store.timeout_ms,
                min_ms: STORE_TIMEOUT_MIN_MS,
                max_ms: STORE_TIMEOUT_MAX_MS,
            }
        })?;
        Ok(Self {
            store_timeout_ms,
            commit_size: bounded_u32(
                "buffer",
                "commitSize",
                config.buffer.commit_size,
                COMMIT_SIZE_MIN,
                COMMIT_SIZE_MAX,
            )?,
            commit_interval_secs: bounded_u64(
                "buffer",
                "commitIntervalSecs",
                config.buffer.commit_interval_secs,
                COMMIT_INTERVAL_MIN_SECS,
                COMMIT_INTERVAL_MAX_SECS,
            )?,
            buffer_capacity: bounded_u32(
                "buffer",
                "capacity",
                config.buffer.capacity,
                CAPACITY_MIN,
                CAPACITY_MAX,
            )?,
        })
    }
}

/// Parse a config from a JSON string, applying validation and normalization.
pub fn parse_telemetry_config_json(
    input: &str,
) -> Result<ValidatedTelemetryConfig, ErrorEnvelope> {
    let config: TelemetryConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Parse a config from a TOML string, applying validation and normalization.
pub fn parse_telemetry_config_toml(
    input: &str,
) -> Result<ValidatedTelemetryConfig, ErrorEnvelope> {
    let config: TelemetryConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// JSON Schema of [`TelemetryConfig`].
#[must_use]
pub fn telemetry_config_schema() -> schemars::Schema {
    schemars::schema_for!(TelemetryConfig)
}

/// Validation failures for config values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// The config version is not supported by this binary.
    UnsupportedVersion {
        /// Version found in the config.
        found: u32,
        /// Version supported by this crate.
        supported: u32,
    },
    /// A timeout value is out of bounds.
    TimeoutOutOfRange {
        /// Schema section (e.g. `store`).
        section: &'static str,
        /// Field name in the config file (e.g. `timeoutMs`).
        field: &'static str,
        /// Value provided (ms).
        value_ms: u64,
        /// Minimum allowed value (ms).
        min_ms: u64,
        /// Maximum allowed value (ms).
        max_ms: u64,
    },
    /// A numeric limit is out of bounds.
    LimitOutOfRange {
        /// Schema section (e.g. `buffer`).
        section: &'static str,
        /// Field name in the config file (e.g. `commitSize`).
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// The queue could never reach its flush threshold.
    CapacityBelowCommitSize {
        /// Configured capacity.
        capacity: u32,
        /// Configured commit size.
        commit_size: u32,
    },
    /// A URL entry is invalid.
    InvalidUrl {
        /// Schema section (e.g. `store`).
        section: &'static str,
        /// Field name in the config file (e.g. `url`).
        field: &'static str,
        /// Invalid URL value.
        url: String,
    },
    /// Credentials are inconsistent.
    InvalidCredentials {
        /// Human readable reason.
        reason: &'static str,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. } => ErrorCode::new("config", "unsupported_version"),
            Self::TimeoutOutOfRange { .. } => ErrorCode::new("config", "invalid_timeout"),
            Self::LimitOutOfRange { .. } | Self::CapacityBelowCommitSize { .. } => {
                ErrorCode::new("config", "invalid_limit")
            },
            Self::InvalidUrl { .. } => ErrorCode::new("config", "invalid_url"),
            Self::InvalidCredentials { .. } => ErrorCode::new("config", "invalid_credentials"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => {
                write!(
                    formatter,
                    "unsupported config version: {found} (supported: {supported})"
                )
            },
            Self::TimeoutOutOfRange {
                section,
                field,
                value_ms,
                min_ms,
                max_ms,
            } => write!(
                formatter,
                "{section}.{field} must be within [{min_ms}, {max_ms}] ms (got {value_ms})"
            ),
            Self::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "{section}.{field} must be within [{min}, {max}] (got {value})"
            ),
            Self::CapacityBelowCommitSize {
                capacity,
                commit_size,
            } => write!(
                formatter,
                "buffer.capacity ({capacity}) must be at least buffer.commitSize ({commit_size})"
            ),
            Self::InvalidUrl { section, field, .. } => {
                write!(formatter, "invalid URL for {section}.{field}")
            },
            Self::InvalidCredentials { reason } => {
                write!(formatter, "invalid store credentials: {reason}")
            },
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);
        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => envelope
                .with_metadata("found", found.to_string())
                .with_metadata("supported", supported.to_string()),
            ConfigSchemaError::TimeoutOutOfRange {
                section,
                field,
                value_ms,
                min_ms,
                max_ms,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("value_ms", value_ms.to_string())
                .with_metadata("min_ms", min_ms.to_string())
                .with_metadata("max_ms", max_ms.to_string()),
            ConfigSchemaError::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("value", value.to_string())
                .with_metadata("min", min.to_string())
                .with_metadata("max", max.to_string()),
            ConfigSchemaError::CapacityBelowCommitSize {
                capacity,
                commit_size,
            } => envelope
                .with_metadata("section", "buffer")
                .with_metadata("capacity", capacity.to_string())
                .with_metadata("commit_size", commit_size.to_string()),
            ConfigSchemaError::InvalidUrl {
                section,
                field,
                url,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("url", sanitize_url_for_error(&url)),
            ConfigSchemaError::InvalidCredentials { reason } => envelope
                .with_metadata("section", "store")
                .with_metadata("reason", reason),
        }
    }
}

fn bounded_u32<const MIN: u32, const MAX: u32>(
    section: &'static str,
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
) -> Result<BoundedU32<MIN, MAX>, ConfigSchemaError> {
    BoundedU32::try_new(value).map_err(|_| ConfigSchemaError::LimitOutOfRange {
        section,
        field,
        value: u64::from(value),
        min: u64::from(min),
        max: u64::from(max),
    })
}

fn bounded_u64<const MIN: u64, const MAX: u64>(
    section: &'static str,
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<BoundedU64<MIN, MAX>, ConfigSchemaError> {
    BoundedU64::try_new(value).map_err(|_| ConfigSchemaError::LimitOutOfRange {
        section,
        field,
        value,
        min,
        max,
    })
}

fn validate_http_url(
    section: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ConfigSchemaError> {
    let parsed = Url::parse(value).map_err(|_| ConfigSchemaError::InvalidUrl {
        section,
        field,
        url: value.to_owned(),
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigSchemaError::InvalidUrl {
            section,
            field,
            url: value.to_owned(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() -> Result<(), ConfigSchemaError> {
        let validated = TelemetryConfig::default().validate_and_normalize()?;
        assert_eq!(validated.limits().commit_size.get(), 1);
        assert_eq!(validated.limits().commit_interval_secs.get(), 10);
        assert_eq!(validated.limits().buffer_capacity.get(), 10_000);
        assert_eq!(validated.store.url, DEFAULT_STORE_URL);
        assert_eq!(validated.buffer.overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(validated.buffer.failure_policy, FailurePolicy::Clear);
        Ok(())
    }

    #[test]
    fn host_shorthand_builds_url() {
        assert_eq!(
            TelemetryConfig::from_host("influx.internal").store.url,
            "http://influx.internal:8086"
        );
        assert_eq!(
            TelemetryConfig::from_host("https://tsdb:9999").store.url,
            "https://tsdb:9999"
        );
    }

    #[test]
    fn rejects_out_of_range_commit_size() {
        let mut config = TelemetryConfig::default();
        config.buffer.commit_size = 0;
        let error = config.validate_and_normalize().err();
        assert!(matches!(
            error,
            Some(ConfigSchemaError::LimitOutOfRange {
                field: "commitSize",
                ..
            })
        ));
    }

    #[test]
    fn rejects_capacity_below_commit_size() {
        let mut config = TelemetryConfig::default();
        config.buffer.commit_size = 500;
        config.buffer.capacity = 100;
        let envelope: Option<ErrorEnvelope> =
            config.validate_and_normalize().err().map(Into::into);
        assert_eq!(
            envelope.map(|error| error.code.to_string()).as_deref(),
            Some("config:invalid_limit")
        );
    }

    #[test]
    fn invalid_url_metadata_is_sanitized() {
        let mut config = TelemetryConfig::default();
        config.store.url = "ftp://user:pw@host".to_owned();
        let Some(error) = config.validate_and_normalize().err() else {
            return;
        };
        let envelope = ErrorEnvelope::from(error);
        assert_eq!(envelope.metadata_value("url"), Some("ftp://host"));
    }

    #[test]
    fn password_without_username_is_rejected() {
        let mut config = TelemetryConfig::default();
        config.store.password = Some(SecretString::new("pw"));
        assert!(matches!(
            config.validate_and_normalize(),
            Err(ConfigSchemaError::InvalidCredentials { .. })
        ));
    }

    #[test]
    fn parses_camel_case_json_and_rejects_unknown_fields() -> Result<(), ErrorEnvelope> {
        let validated = parse_telemetry_config_json(
            r#"{"version":1,"buffer":{"commitSize":50,"commitIntervalSecs":5,"overflowPolicy":"block","failurePolicy":"retain"}}"#,
        )?;
        assert_eq!(validated.buffer.commit_size, 50);
        assert_eq!(validated.buffer.overflow_policy, OverflowPolicy::Block);

        let error = parse_telemetry_config_json(r#"{"buffer":{"commitsize":5}}"#).err();
        assert_eq!(
            error.map(|error| error.code.to_string()).as_deref(),
            Some("config:invalid_json")
        );
        Ok(())
    }

    #[test]
    fn parses_toml() -> Result<(), ErrorEnvelope> {
        let validated = parse_telemetry_config_toml(
            "version = 1\n[store]\nurl = \"http://tsdb:8086/\"\ntimeoutMs = 2500\n",
        )?;
        assert_eq!(validated.store.url, "http://tsdb:8086");
        assert_eq!(validated.limits().store_timeout_ms.get(), 2_500);
        Ok(())
    }

    #[test]
    fn schema_names_every_section() -> Result<(), serde_json::Error> {
        let schema = serde_json::to_value(telemetry_config_schema())?;
        let properties = schema.get("properties");
        assert!(properties.and_then(|p| p.get("store")).is_some());
        assert!(properties.and_then(|p| p.get("buffer")).is_some());
        Ok(())
    }
}
