//! InfluxDB request authentication.

use call_telemetry_shared::SecretString;
use reqwest::RequestBuilder;
use reqwest::header::AUTHORIZATION;

/// Credentials applied to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfluxAuth {
    /// No credentials.
    Anonymous,
    /// HTTP basic auth.
    Basic {
        /// User name.
        username: Box<str>,
        /// Optional password.
        password: Option<SecretString>,
    },
    /// `Authorization: Token <token>`.
    Token(SecretString),
}

impl InfluxAuth {
    /// Pick the auth scheme; a non-blank token wins over a username.
    pub fn from_credentials(
        username: Option<&str>,
        password: Option<&SecretString>,
        token: Option<&SecretString>,
    ) -> Self {
        if let Some(token) = token.filter(|token| !token.expose().trim().is_empty()) {
            return Self::Token(token.clone());
        }
        match username.map(str::trim).filter(|name| !name.is_empty()) {
            Some(username) => Self::Basic {
                username: username.into(),
                password: password.cloned(),
            },
            None => Self::Anonymous,
        }
    }

    /// Attach credentials to a request.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Anonymous => request,
            Self::Basic { username, password } => {
                request.basic_auth(username, password.as_ref().map(SecretString::expose))
            },
            Self::Token(token) => {
                request.header(AUTHORIZATION, format!("Token {}", token.expose().trim()))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_wins_over_username() {
        let token = SecretString::new("abc");
        let auth = InfluxAuth::from_credentials(Some("ops"), None, Some(&token));
        assert_eq!(auth, InfluxAuth::Token(token));
    }

    #[test]
    fn blank_credentials_are_anonymous() {
        let blank = SecretString::new("  ");
        assert_eq!(
            InfluxAuth::from_credentials(Some(" "), None, Some(&blank)),
            InfluxAuth::Anonymous
        );
    }

    #[test]
    fn username_selects_basic_auth() {
        let password = SecretString::new("pw");
        let auth = InfluxAuth::from_credentials(Some(" ops "), Some(&password), None);
        assert_eq!(
            auth,
            InfluxAuth::Basic {
                username: "ops".into(),
                password: Some(password),
            }
        );
    }
}
