//! Secret detection and redaction utilities.
//!
//! Store credentials travel through config files, environment variables and
//! structured log fields; all three paths use these helpers so a password or
//! token never reaches an output stream in clear text.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The redacted placeholder string.
pub const REDACTED: &str = "[REDACTED]";

/// Checks if a key/variable name likely refers to a secret.
///
/// # Examples
///
/// ```
/// use call_telemetry_shared::is_secret_key;
///
/// assert!(is_secret_key("CTEL_STORE_PASSWORD"));
/// assert!(is_secret_key("token"));
/// assert!(!is_secret_key("commitSize"));
/// ```
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    ["KEY", "TOKEN", "SECRET", "PASSWORD", "CREDENTIAL", "AUTH"]
        .iter()
        .any(|marker| key.contains(marker))
}

/// Redacts a value if the key is likely a secret.
///
/// ```
/// use call_telemetry_shared::redact_if_secret;
///
/// assert_eq!(redact_if_secret("CTEL_STORE_TOKEN", "abc"), "[REDACTED]");
/// assert_eq!(redact_if_secret("CTEL_COMMIT_SIZE", "10"), "10");
/// ```
pub fn redact_if_secret(key: &str, value: &str) -> String {
    if is_secret_key(key) {
        REDACTED.to_owned()
    } else {
        value.to_owned()
    }
}

/// A secret string that redacts itself on Display, Debug and serialization.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecretString(Box<str>);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<Box<str>>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying secret.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_store_credentials() {
        assert!(is_secret_key("CTEL_STORE_PASSWORD"));
        assert!(is_secret_key("store.token"));
        assert!(is_secret_key("Authorization"));
        assert!(!is_secret_key("CTEL_STORE_URL"));
        assert!(!is_secret_key("commitIntervalSecs"));
    }

    #[test]
    fn secret_string_never_prints_its_value() {
        let secret = SecretString::new("hunter2");
        assert_eq!(secret.to_string(), REDACTED);
        assert_eq!(format!("{secret:?}"), REDACTED);
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn secret_string_serializes_redacted_but_deserializes_raw() -> Result<(), serde_json::Error> {
        let secret: SecretString = serde_json::from_str("\"hunter2\"")?;
        assert_eq!(secret.expose(), "hunter2");
        assert_eq!(serde_json::to_string(&secret)?, format!("\"{REDACTED}\""));
        Ok(())
    }
}
