//! Result alias and context helpers.

use crate::errors::ErrorEnvelope;

/// Shared result type used across the workspace.
pub type Result<T, E = ErrorEnvelope> = std::result::Result<T, E>;

/// Attach diagnostic context to a failing result without changing its code.
pub trait ResultExt<T> {
    /// Add a metadata entry to the error, if any.
    fn with_context(self, key: &'static str, value: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, key: &'static str, value: impl Into<String>) -> Self {
        self.map_err(|error| error.with_metadata(key, value))
    }
}
