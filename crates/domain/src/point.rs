//! Points as written to the store: measurement, tags, typed fields, timestamp.

use crate::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A typed field value.
///
/// Deserialization is untagged: JSON `true` becomes `Boolean`, whole numbers
/// become `Integer`, other numbers `Float`, strings `String`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean payload.
    Boolean(bool),
    /// Signed integer payload.
    Integer(i64),
    /// Floating point payload.
    Float(f64),
    /// Text payload.
    String(Box<str>),
}

impl FieldValue {
    /// Human label of the value's type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => value.fmt(formatter),
            Self::Integer(value) => value.fmt(formatter),
            Self::Float(value) => value.fmt(formatter),
            Self::String(value) => formatter.write_str(value),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value.into_boxed_str())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// One point destined for a stream's measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    /// Measurement name.
    pub measurement: Box<str>,
    /// Indexed string dimensions. Empty values are never stored.
    pub tags: BTreeMap<Box<str>, Box<str>>,
    /// Payload values.
    pub fields: BTreeMap<Box<str>, FieldValue>,
    /// Explicit timestamp; the store assigns ingest time when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

impl TelemetryPoint {
    /// Start a point for the given measurement.
    pub fn new(measurement: impl Into<Box<str>>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
        }
    }

    /// Add a tag; blank values are skipped.
    #[must_use]
    pub fn tag(mut self, key: &str, value: impl AsRef<str>) -> Self {
        let value = value.as_ref();
        if !value.is_empty() {
            self.tags.insert(key.into(), value.into());
        }
        self
    }

    /// Add a tag when a value is present.
    #[must_use]
    pub fn optional_tag<V: AsRef<str>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.tag(key, value),
            None => self,
        }
    }

    /// Add a field.
    #[must_use]
    pub fn field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add a field when a value is present.
    #[must_use]
    pub fn optional_field<V: Into<FieldValue>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    /// Set the explicit timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Tag value lookup.
    #[must_use]
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(AsRef::as_ref)
    }

    /// Explicit timestamp as epoch nanoseconds.
    pub fn timestamp_nanos(&self) -> Result<Option<i64>, DomainError> {
        self.timestamp
            .map(|timestamp| {
                timestamp
                    .timestamp_nanos_opt()
                    .ok_or_else(|| DomainError::InvalidTimestamp {
                        input: timestamp.to_rfc3339(),
                    })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn blank_tags_are_not_stored() {
        let point = TelemetryPoint::new("cdrs")
            .tag("trunk", "")
            .optional_tag("host", Some("fs-1"))
            .optional_tag::<&str>("direction", None);
        assert!(point.tag_value("trunk").is_none());
        assert_eq!(point.tag_value("host"), Some("fs-1"));
        assert_eq!(point.tags.len(), 1);
    }

    #[test]
    fn untagged_field_values_keep_json_types() -> Result<(), serde_json::Error> {
        let values: Vec<FieldValue> = serde_json::from_str(r#"[true, 200, 1.5, "ok"]"#)?;
        assert_eq!(
            values,
            vec![
                FieldValue::Boolean(true),
                FieldValue::Integer(200),
                FieldValue::Float(1.5),
                FieldValue::from("ok"),
            ]
        );
        Ok(())
    }

    #[test]
    fn timestamp_nanos_covers_explicit_and_missing() -> Result<(), DomainError> {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).single();
        let point = TelemetryPoint::new("alerts").at(at);
        assert_eq!(point.timestamp_nanos()?, Some(1_700_000_000_123_000_000));
        assert_eq!(TelemetryPoint::new("alerts").timestamp_nanos()?, None);
        Ok(())
    }
}
