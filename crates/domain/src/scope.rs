//! Tenant scope hierarchy: service provider ⊇ account ⊇ application.

use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! scope_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Box<str>);

        impl $name {
            /// Tag key carrying this identifier on stored points.
            pub const TAG: &'static str = $tag;

            /// Parse an identifier, trimming surrounding whitespace.
            ///
            /// Control characters are rejected: the id is stored as a tag value.
            pub fn parse(input: impl AsRef<str>) -> Result<Self, DomainError> {
                let trimmed = input.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(DomainError::EmptyScopeId { tag: Self::TAG });
                }
                if trimmed.chars().any(char::is_control) {
                    return Err(DomainError::ControlCharInScopeId { tag: Self::TAG });
                }
                Ok(Self(trimmed.into()))
            }

            /// Access the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.into()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(self.as_str())
            }
        }
    };
}

scope_id!(
    /// Service provider identifier (top of the hierarchy).
    ServiceProviderSid,
    "service_provider_sid"
);
scope_id!(
    /// Account identifier, owned by a service provider.
    AccountSid,
    "account_sid"
);
scope_id!(
    /// Application identifier, owned by an account.
    ApplicationSid,
    "application_sid"
);

/// Level of the scope hierarchy a query or gauge is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    /// Service provider level.
    ServiceProvider,
    /// Account level.
    Account,
    /// Application level.
    Application,
}

impl ScopeLevel {
    /// Tag key filtered on at this level.
    #[must_use]
    pub const fn tag_key(self) -> &'static str {
        match self {
            Self::ServiceProvider => ServiceProviderSid::TAG,
            Self::Account => AccountSid::TAG,
            Self::Application => ApplicationSid::TAG,
        }
    }

    /// Stable label used in errors and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServiceProvider => "service_provider",
            Self::Account => "account",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Exactly one scope identifier, at a known level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Scoped to a service provider.
    ServiceProvider(ServiceProviderSid),
    /// Scoped to an account.
    Account(AccountSid),
    /// Scoped to an application.
    Application(ApplicationSid),
}

impl Scope {
    /// Build a scope from a level and a raw identifier.
    pub fn parse(level: ScopeLevel, id: impl AsRef<str>) -> Result<Self, DomainError> {
        Ok(match level {
            ScopeLevel::ServiceProvider => Self::ServiceProvider(ServiceProviderSid::parse(id)?),
            ScopeLevel::Account => Self::Account(AccountSid::parse(id)?),
            ScopeLevel::Application => Self::Application(ApplicationSid::parse(id)?),
        })
    }

    /// Level of this scope.
    #[must_use]
    pub const fn level(&self) -> ScopeLevel {
        match self {
            Self::ServiceProvider(_) => ScopeLevel::ServiceProvider,
            Self::Account(_) => ScopeLevel::Account,
            Self::Application(_) => ScopeLevel::Application,
        }
    }

    /// The bound identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::ServiceProvider(sid) => sid.as_str(),
            Self::Account(sid) => sid.as_str(),
            Self::Application(sid) => sid.as_str(),
        }
    }
}

impl From<ServiceProviderSid> for Scope {
    fn from(value: ServiceProviderSid) -> Self {
        Self::ServiceProvider(value)
    }
}

impl From<AccountSid> for Scope {
    fn from(value: AccountSid) -> Self {
        Self::Account(value)
    }
}

impl From<ApplicationSid> for Scope {
    fn from(value: ApplicationSid) -> Self {
        Self::Application(value)
    }
}
