//! Typed rows returned by queries.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A normalized column value.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// Absent column.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Point in time.
    Timestamp(DateTime<Utc>),
}

impl RecordValue {
    /// Text payload, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Timestamp payload, if any.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(at) => Some(*at),
            _ => None,
        }
    }

    /// Whether the column was absent.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Serialize for RecordValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Boolean(value) => serializer.serialize_bool(*value),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Text(value) => serializer.serialize_str(value),
            Self::Timestamp(at) => {
                serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            },
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => formatter.write_str("null"),
            Self::Boolean(value) => value.fmt(formatter),
            Self::Integer(value) => value.fmt(formatter),
            Self::Float(value) => value.fmt(formatter),
            Self::Text(value) => formatter.write_str(value),
            Self::Timestamp(at) => {
                formatter.write_str(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            },
        }
    }
}

/// One normalized row keyed by column name.
pub type TelemetryRecord = BTreeMap<String, RecordValue>;

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult {
    /// Matching rows ignoring pagination.
    pub total: u64,
    /// Requested page.
    pub page: Option<u64>,
    /// Requested page size.
    pub page_size: Option<u64>,
    /// Rows, newest first.
    pub data: Vec<TelemetryRecord>,
}

impl PagedResult {
    /// An empty page.
    #[must_use]
    pub const fn empty(page: Option<u64>, page_size: Option<u64>) -> Self {
        Self {
            total: 0,
            page,
            page_size,
            data: Vec::new(),
        }
    }
}
