//! Validation failures raised while building points and query specs.

use call_telemetry_shared::{ErrorCode, ErrorEnvelope};
use std::fmt;

/// Validation failures for domain values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A scope identifier is empty after trimming.
    EmptyScopeId {
        /// Tag key of the identifier (`account_sid`, ...).
        tag: &'static str,
    },
    /// A scope identifier contains a control character (newline, tab, ...).
    ControlCharInScopeId {
        /// Tag key of the identifier.
        tag: &'static str,
    },
    /// A write record is missing the scope id its level requires.
    MissingScopeId {
        /// Target stream.
        stream: &'static str,
        /// Tag key that must be present.
        tag: &'static str,
    },
    /// An alert carries neither a service provider nor an account id.
    UnscopedAlert,
    /// A declared field carries a value of the wrong type.
    FieldTypeMismatch {
        /// Target stream.
        stream: &'static str,
        /// Field name.
        field: String,
        /// Declared type.
        expected: &'static str,
    },
    /// A point has no fields at all.
    EmptyPoint {
        /// Target stream.
        stream: &'static str,
    },
    /// A timestamp could not be parsed or is outside the nanosecond range.
    InvalidTimestamp {
        /// Raw input.
        input: String,
    },
    /// A numeric query option could not be parsed.
    InvalidNumber {
        /// Option name (`page`, `page_size`, `days`).
        option: &'static str,
        /// Raw input.
        input: String,
    },
    /// A numeric query option is negative.
    NegativeNumber {
        /// Option name.
        option: &'static str,
        /// Parsed value.
        value: i64,
    },
    /// The entity kind has no stream at the requested scope level.
    UnsupportedScope {
        /// Entity kind label.
        entity: &'static str,
        /// Scope level label.
        level: &'static str,
    },
}

impl DomainError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyScopeId { .. }
            | Self::ControlCharInScopeId { .. }
            | Self::MissingScopeId { .. }
            | Self::UnscopedAlert => {
                ErrorCode::new("domain", "invalid_scope")
            },
            Self::FieldTypeMismatch { .. } | Self::EmptyPoint { .. } => {
                ErrorCode::new("domain", "malformed_point")
            },
            Self::InvalidTimestamp { .. } => ErrorCode::new("domain", "invalid_timestamp"),
            Self::InvalidNumber { .. } | Self::NegativeNumber { .. } => {
                ErrorCode::new("domain", "invalid_query_option")
            },
            Self::UnsupportedScope { .. } => ErrorCode::new("domain", "unsupported_scope"),
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyScopeId { tag } => write!(formatter, "{tag} must be non-empty"),
            Self::ControlCharInScopeId { tag } => {
                write!(formatter, "{tag} must not contain control characters")
            },
            Self::MissingScopeId { stream, tag } => {
                write!(formatter, "{stream} records require {tag}")
            },
            Self::UnscopedAlert => formatter
                .write_str("alerts require a service_provider_sid or an account_sid"),
            Self::FieldTypeMismatch {
                stream,
                field,
                expected,
            } => write!(formatter, "{stream}.{field} must be {expected}"),
            Self::EmptyPoint { stream } => {
                write!(formatter, "{stream} point must carry at least one field")
            },
            Self::InvalidTimestamp { .. } => {
                formatter.write_str("timestamp must be RFC 3339 text or epoch milliseconds")
            },
            Self::InvalidNumber { option, .. } => write!(formatter, "{option} must be an integer"),
            Self::NegativeNumber { option, .. } => write!(formatter, "{option} must be >= 0"),
            Self::UnsupportedScope { entity, level } => {
                write!(formatter, "{entity} cannot be queried at {level} scope")
            },
        }
    }
}

impl std::error::Error for DomainError {}

impl From<DomainError> for ErrorEnvelope {
    fn from(error: DomainError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());
        match error {
            DomainError::EmptyScopeId { tag } | DomainError::ControlCharInScopeId { tag } => {
                envelope.with_metadata("tag", tag)
            },
            DomainError::MissingScopeId { stream, tag } => envelope
                .with_metadata("stream", stream)
                .with_metadata("tag", tag),
            DomainError::UnscopedAlert => envelope.with_metadata("stream", "alerts"),
            DomainError::FieldTypeMismatch { stream, field, .. } => envelope
                .with_metadata("stream", stream)
                .with_metadata("field", field),
            DomainError::EmptyPoint { stream } => envelope.with_metadata("stream", stream),
            DomainError::InvalidTimestamp { input } => envelope.with_metadata("input", input),
            DomainError::InvalidNumber { option, input } => envelope
                .with_metadata("option", option)
                .with_metadata("input", input),
            DomainError::NegativeNumber { option, value } => envelope
                .with_metadata("option", option)
                .with_metadata("value", value.to_string()),
            DomainError::UnsupportedScope { entity, level } => envelope
                .with_metadata("entity", entity)
                .with_metadata("level", level),
        }
    }
}
