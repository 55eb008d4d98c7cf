//! Error envelope shared by every crate in the workspace.
//!
//! Each failure carries an origin kind, a retry class, a namespaced code and
//! free-form metadata. Store, config and domain errors all convert into this
//! envelope at their crate boundary, and the CLI derives exit codes and
//! `ERR_*` payload codes from it.

use serde::Serialize;
use std::collections::BTreeMap;
use std::{fmt, io};

/// Where a failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Rejected input, bad filters, cancellation.
    Expected,
    /// A broken internal assumption.
    Invariant,
    /// The store, the network or the filesystem failed.
    Unexpected,
}

/// Whether repeating the operation may succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorClass {
    /// A retry may succeed (timeouts, refused connections, 5xx).
    Retriable,
    /// Retrying the same call fails the same way.
    NonRetriable,
}

impl ErrorClass {
    /// `true` for [`Self::Retriable`].
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Retriable)
    }
}

/// `namespace:code` pair, e.g. `store:write_failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ErrorCode {
    namespace: &'static str,
    code: &'static str,
}

impl ErrorCode {
    /// A code in `namespace`.
    #[must_use]
    pub const fn new(namespace: &'static str, code: &'static str) -> Self {
        Self { namespace, code }
    }

    /// `core:cancelled`
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::new("core", "cancelled")
    }

    /// `core:invalid_input`
    #[must_use]
    pub const fn invalid_input() -> Self {
        Self::new("core", "invalid_input")
    }

    /// `core:not_found`
    #[must_use]
    pub const fn not_found() -> Self {
        Self::new("core", "not_found")
    }

    /// `core:timeout`
    #[must_use]
    pub const fn timeout() -> Self {
        Self::new("core", "timeout")
    }

    /// `core:io`
    #[must_use]
    pub const fn io() -> Self {
        Self::new("core", "io")
    }

    /// `core:internal`
    #[must_use]
    pub const fn internal() -> Self {
        Self::new("core", "internal")
    }

    /// Namespace part.
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Code part.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.namespace, self.code)
    }
}

/// The workspace error type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    /// Origin of the failure.
    pub kind: ErrorKind,
    /// Retry hint.
    pub class: ErrorClass,
    /// Stable code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Diagnostic key/value pairs (`stream`, `namespace`, `httpStatus`, ...).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ErrorEnvelope {
    /// Caller-facing failure; never retriable.
    pub fn expected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::unexpected(code, message, ErrorClass::NonRetriable).with_kind(ErrorKind::Expected)
    }

    /// Broken internal assumption; never retriable.
    pub fn invariant(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::unexpected(code, message, ErrorClass::NonRetriable).with_kind(ErrorKind::Invariant)
    }

    /// Failure of an external collaborator.
    pub fn unexpected(code: ErrorCode, message: impl Into<String>, class: ErrorClass) -> Self {
        Self {
            kind: ErrorKind::Unexpected,
            class,
            code,
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// `core:cancelled`, an expected error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::expected(ErrorCode::cancelled(), message)
    }

    const fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Whether this is a `core:cancelled` error.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::cancelled()
    }

    /// Add or replace one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// [`Self::with_metadata`] when `value` is present.
    #[must_use]
    pub fn with_optional_metadata(self, key: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.with_metadata(key, value),
            None => self,
        }
    }

    /// One metadata value.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorEnvelope {}

impl From<io::Error> for ErrorEnvelope {
    fn from(error: io::Error) -> Self {
        use io::ErrorKind as Io;

        let code = match error.kind() {
            Io::NotFound => ErrorCode::not_found(),
            Io::TimedOut => ErrorCode::timeout(),
            Io::Interrupted => ErrorCode::cancelled(),
            _ => ErrorCode::io(),
        };
        let class = match error.kind() {
            Io::WouldBlock
            | Io::TimedOut
            | Io::Interrupted
            | Io::ConnectionAborted
            | Io::ConnectionReset
            | Io::ConnectionRefused
            | Io::NotConnected
            | Io::BrokenPipe => ErrorClass::Retriable,
            _ => ErrorClass::NonRetriable,
        };
        Self::unexpected(code, error.to_string(), class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind_and_class() {
        let expected = ErrorEnvelope::expected(ErrorCode::invalid_input(), "bad page");
        assert_eq!(expected.kind, ErrorKind::Expected);
        assert_eq!(expected.class, ErrorClass::NonRetriable);

        let unexpected = ErrorEnvelope::unexpected(
            ErrorCode::new("influx", "connection"),
            "refused",
            ErrorClass::Retriable,
        );
        assert_eq!(unexpected.kind, ErrorKind::Unexpected);
        assert!(unexpected.class.is_retriable());
        assert_eq!(unexpected.to_string(), "influx:connection: refused");

        let broken = ErrorEnvelope::invariant(ErrorCode::internal(), "negative offset");
        assert_eq!(broken.kind, ErrorKind::Invariant);
    }

    #[test]
    fn io_errors_keep_retry_hint() {
        let envelope = ErrorEnvelope::from(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(envelope.code, ErrorCode::timeout());
        assert!(envelope.class.is_retriable());

        let envelope = ErrorEnvelope::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(envelope.code, ErrorCode::not_found());
        assert!(!envelope.class.is_retriable());
    }

    #[test]
    fn optional_metadata_is_skipped_when_absent() {
        let error = ErrorEnvelope::expected(ErrorCode::invalid_input(), "bad")
            .with_optional_metadata("namespace", Some("cdrs"))
            .with_optional_metadata("endpoint", None);
        assert_eq!(error.metadata_value("namespace"), Some("cdrs"));
        assert!(error.metadata_value("endpoint").is_none());
    }

    #[test]
    fn envelope_serializes_code_parts() -> Result<(), serde_json::Error> {
        let error = ErrorEnvelope::expected(ErrorCode::new("cli", "invalid_payload"), "bad");
        let value = serde_json::to_value(&error)?;
        assert_eq!(value.pointer("/code/namespace"), Some(&serde_json::json!("cli")));
        assert_eq!(value.get("kind"), Some(&serde_json::json!("expected")));
        assert!(value.get("metadata").is_none());
        Ok(())
    }
}
