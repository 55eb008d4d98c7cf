//! Write-side records and their conversion into points.
//!
//! Each record knows which scope ids its level requires; everything that is
//! not a tag or the timestamp becomes a field.

use crate::{
    AccountSid, AlertContext, ApplicationSid, DomainError, FieldValue, ScopeLevel,
    ServiceProviderSid, StreamKind, TelemetryPoint, format_alert_message,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Extra payload keys; `null` values are dropped on conversion.
pub type ExtraFields = BTreeMap<String, Option<FieldValue>>;

/// A single record or a batch, accepted by every write operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// One record.
    One(T),
    /// Several records.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Flatten into a vector, preserving order.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        Self::One(value)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(value: Vec<T>) -> Self {
        Self::Many(value)
    }
}

/// Deserialize an optional timestamp given as RFC 3339 text or epoch milliseconds.
///
/// Blank text is treated as absent.
pub fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Millis(millis)) => epoch_millis(millis)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Raw::Text(text)) => parse_timestamp(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Convert epoch milliseconds into a UTC timestamp.
pub fn epoch_millis(millis: i64) -> Result<DateTime<Utc>, DomainError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| DomainError::InvalidTimestamp {
            input: millis.to_string(),
        })
}

/// Parse RFC 3339 text into a UTC timestamp.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| DomainError::InvalidTimestamp {
            input: text.to_owned(),
        })
}

fn with_extra_fields(mut point: TelemetryPoint, fields: ExtraFields) -> TelemetryPoint {
    for (key, value) in fields {
        if let Some(value) = value {
            point = point.field(&key, value);
        }
    }
    point
}

/// One call detail record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdrRecord {
    /// Owning service provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_provider_sid: Option<ServiceProviderSid>,
    /// Owning account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_sid: Option<AccountSid>,
    /// Media server host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Carrier trunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trunk: Option<String>,
    /// `inbound` or `outbound`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Whether the call was answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered: Option<bool>,
    /// When the call was attempted; becomes the point timestamp.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub attempted_at: Option<DateTime<Utc>>,
    /// Every other key (`call_sid`, `from`, `to`, `duration`, ...).
    #[serde(flatten)]
    pub fields: ExtraFields,
}

impl CdrRecord {
    /// Convert into a `cdrs` point.
    pub fn into_point(self) -> Result<TelemetryPoint, DomainError> {
        if self.account_sid.is_none() && self.service_provider_sid.is_none() {
            return Err(DomainError::MissingScopeId {
                stream: StreamKind::Cdrs.measurement(),
                tag: AccountSid::TAG,
            });
        }
        let point = TelemetryPoint::new(StreamKind::Cdrs.measurement())
            .optional_tag("direction", self.direction)
            .optional_tag("host", self.host)
            .optional_tag("trunk", self.trunk)
            .optional_tag(ServiceProviderSid::TAG, self.service_provider_sid)
            .optional_tag(AccountSid::TAG, self.account_sid)
            .optional_tag("answered", self.answered.map(|answered| answered.to_string()))
            .at(self.attempted_at);
        let point = with_extra_fields(point, self.fields);
        StreamKind::Cdrs.schema().validate(&point)?;
        Ok(point)
    }
}

/// One operational alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Alert code, normally one of [`crate::AlertType`].
    pub alert_type: String,
    /// Owning service provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_provider_sid: Option<ServiceProviderSid>,
    /// Owning account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_sid: Option<AccountSid>,
    /// Entity the alert is about (call, device, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sid: Option<String>,
    /// Explicit message; overrides the template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Additional detail text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Speech vendor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// Webhook or media URL (template input).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// HTTP status (template input).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    /// Limit value (template input).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    /// Explicit timestamp.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AlertRecord {
    /// Start an alert of the given code.
    pub fn new(alert_type: impl Into<String>) -> Self {
        Self {
            alert_type: alert_type.into(),
            ..Self::default()
        }
    }

    /// Message that will be stored: explicit, templated, or empty.
    #[must_use]
    pub fn resolved_message(&self) -> String {
        let context = AlertContext {
            url: self.url.as_deref(),
            status: self.status,
            vendor: self.vendor.as_deref(),
            count: self.count,
            target_sid: self.target_sid.as_deref(),
        };
        format_alert_message(&self.alert_type, self.message.as_deref(), &context)
            .unwrap_or_default()
    }

    /// Convert into an `alerts` point.
    pub fn into_point(self) -> Result<TelemetryPoint, DomainError> {
        if self.account_sid.is_none() && self.service_provider_sid.is_none() {
            return Err(DomainError::UnscopedAlert);
        }
        let message = self.resolved_message();
        let point = TelemetryPoint::new(StreamKind::Alerts.measurement())
            .tag("alert_type", &self.alert_type)
            .optional_tag(ServiceProviderSid::TAG, self.service_provider_sid)
            .optional_tag(AccountSid::TAG, self.account_sid)
            .optional_tag("vendor", self.vendor.filter(|vendor| !vendor.is_empty()))
            .field("message", message)
            .optional_field("target_sid", self.target_sid.filter(|sid| !sid.is_empty()))
            .optional_field("detail", self.detail.filter(|detail| !detail.is_empty()))
            .at(self.timestamp);
        StreamKind::Alerts.schema().validate(&point)?;
        Ok(point)
    }
}

/// One concurrent-call gauge sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallCountRecord {
    /// Owning service provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_provider_sid: Option<ServiceProviderSid>,
    /// Owning account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_sid: Option<AccountSid>,
    /// Owning application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_sid: Option<ApplicationSid>,
    /// Calls in progress at sample time.
    pub calls_in_progress: i64,
    /// Any other payload keys.
    #[serde(flatten)]
    pub fields: ExtraFields,
}

impl CallCountRecord {
    /// Stream receiving samples at the given level.
    #[must_use]
    pub const fn stream(level: ScopeLevel) -> StreamKind {
        match level {
            ScopeLevel::ServiceProvider => StreamKind::SpCallCounts,
            ScopeLevel::Account => StreamKind::CallCounts,
            ScopeLevel::Application => StreamKind::AppCallCounts,
        }
    }

    /// Convert into a gauge point for the given level.
    ///
    /// The level's own id is required; ids of levels the stream does not tag
    /// are ignored.
    pub fn into_point(self, level: ScopeLevel) -> Result<TelemetryPoint, DomainError> {
        let stream = Self::stream(level);
        let missing = |tag| DomainError::MissingScopeId {
            stream: stream.measurement(),
            tag,
        };
        let base = TelemetryPoint::new(stream.measurement());
        let point = match level {
            ScopeLevel::ServiceProvider => {
                let sp = self
                    .service_provider_sid
                    .ok_or_else(|| missing(ServiceProviderSid::TAG))?;
                base.tag(ServiceProviderSid::TAG, sp)
            },
            ScopeLevel::Account => {
                let account = self.account_sid.ok_or_else(|| missing(AccountSid::TAG))?;
                base.optional_tag(ServiceProviderSid::TAG, self.service_provider_sid)
                    .tag(AccountSid::TAG, account)
            },
            ScopeLevel::Application => {
                let application = self
                    .application_sid
                    .ok_or_else(|| missing(ApplicationSid::TAG))?;
                base.optional_tag(ServiceProviderSid::TAG, self.service_provider_sid)
                    .optional_tag(AccountSid::TAG, self.account_sid)
                    .tag(ApplicationSid::TAG, application)
            },
        };
        let point = with_extra_fields(
            point.field("calls_in_progress", self.calls_in_progress),
            self.fields,
        );
        stream.schema().validate(&point)?;
        Ok(point)
    }
}

/// A platform component alert (media server down, database degraded, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemAlertRecord {
    /// Reporting component.
    pub system_component: String,
    /// Component state.
    pub state: String,
    /// Payload (`detail`, `host`, ...).
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl SystemAlertRecord {
    /// Convert into a `system_alerts` point stamped with `now`.
    pub fn into_point(self, now: DateTime<Utc>) -> Result<TelemetryPoint, DomainError> {
        let mut point = TelemetryPoint::new(StreamKind::SystemAlerts.measurement())
            .tag("system_component", &self.system_component)
            .tag("state", &self.state)
            .at(Some(now));
        for (key, value) in self.fields {
            point = point.field(&key, value);
        }
        StreamKind::SystemAlerts.schema().validate(&point)?;
        Ok(point)
    }
}
