//! Static catalog of the six telemetry streams.
//!
//! Each stream lives in its own store namespace, named after its measurement.

use crate::{DomainError, FieldValue, TelemetryPoint};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of a column, used for write validation and result coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Free text.
    Text,
    /// Signed integer.
    Integer,
    /// Integer epoch milliseconds, surfaced as a date/time.
    EpochMillis,
    /// Tag holding `"true"`/`"false"`, surfaced as a boolean.
    BooleanText,
}

impl ValueType {
    const fn label(self) -> &'static str {
        match self {
            Self::Text => "a string",
            Self::Integer | Self::EpochMillis => "an integer",
            Self::BooleanText => "a boolean",
        }
    }

    const fn accepts(self, value: &FieldValue) -> bool {
        match self {
            Self::Text => matches!(value, FieldValue::String(_)),
            Self::Integer | Self::EpochMillis => matches!(value, FieldValue::Integer(_)),
            Self::BooleanText => matches!(value, FieldValue::Boolean(_)),
        }
    }
}

/// A declared column of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name.
    pub name: &'static str,
    /// Semantic type.
    pub value_type: ValueType,
}

const fn text(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        value_type: ValueType::Text,
    }
}

const fn integer(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        value_type: ValueType::Integer,
    }
}

const fn epoch_millis(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        value_type: ValueType::EpochMillis,
    }
}

const fn boolean_text(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        value_type: ValueType::BooleanText,
    }
}

/// Description of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSchema {
    /// Measurement (and namespace) name.
    pub measurement: &'static str,
    /// Declared payload fields.
    pub fields: &'static [ColumnSpec],
    /// Tag dimensions.
    pub tags: &'static [ColumnSpec],
    /// Field counted by COUNT queries.
    pub count_field: &'static str,
    /// Key the store's `time` column is exposed under.
    pub time_key: &'static str,
}

impl StreamSchema {
    /// Find the declared type of a field or tag.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&'static ColumnSpec> {
        self.fields
            .iter()
            .chain(self.tags.iter())
            .find(|column| column.name == name)
    }

    /// All declared column names, fields first.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> {
        self.fields
            .iter()
            .chain(self.tags.iter())
            .map(|column| column.name)
    }

    /// Check a point against this schema before it is buffered.
    ///
    /// Undeclared fields are accepted as extra payload.
    pub fn validate(&self, point: &TelemetryPoint) -> Result<(), DomainError> {
        if point.fields.is_empty() {
            return Err(DomainError::EmptyPoint {
                stream: self.measurement,
            });
        }
        for (name, value) in &point.fields {
            let Some(spec) = self.fields.iter().find(|spec| spec.name == name.as_ref()) else {
                continue;
            };
            if !spec.value_type.accepts(value) {
                return Err(DomainError::FieldTypeMismatch {
                    stream: self.measurement,
                    field: name.to_string(),
                    expected: spec.value_type.label(),
                });
            }
        }
        Ok(())
    }
}

const CDRS: StreamSchema = StreamSchema {
    measurement: "cdrs",
    fields: &[
        text("call_sid"),
        text("application_sid"),
        text("from"),
        text("to"),
        text("sip_callid"),
        text("sip_parent_callid"),
        integer("sip_status"),
        integer("duration"),
        epoch_millis("answered_at"),
        epoch_millis("terminated_at"),
        text("termination_reason"),
        text("remote_host"),
        text("trace_id"),
        text("recording_url"),
    ],
    tags: &[
        text("service_provider_sid"),
        text("account_sid"),
        text("host"),
        text("trunk"),
        text("direction"),
        boolean_text("answered"),
    ],
    count_field: "sip_callid",
    time_key: "attempted_at",
};

const ALERTS: StreamSchema = StreamSchema {
    measurement: "alerts",
    fields: &[text("message"), text("detail"), text("target_sid")],
    tags: &[
        text("service_provider_sid"),
        text("account_sid"),
        text("alert_type"),
        text("vendor"),
    ],
    count_field: "message",
    time_key: "time",
};

const CALL_COUNTS: StreamSchema = StreamSchema {
    measurement: "call_counts",
    fields: &[integer("calls_in_progress")],
    tags: &[text("service_provider_sid"), text("account_sid")],
    count_field: "calls_in_progress",
    time_key: "time",
};

const SP_CALL_COUNTS: StreamSchema = StreamSchema {
    measurement: "sp_call_counts",
    fields: &[integer("calls_in_progress")],
    tags: &[text("service_provider_sid")],
    count_field: "calls_in_progress",
    time_key: "time",
};

const APP_CALL_COUNTS: StreamSchema = StreamSchema {
    measurement: "app_call_counts",
    fields: &[integer("calls_in_progress")],
    tags: &[
        text("service_provider_sid"),
        text("account_sid"),
        text("application_sid"),
    ],
    count_field: "calls_in_progress",
    time_key: "time",
};

const SYSTEM_ALERTS: StreamSchema = StreamSchema {
    measurement: "system_alerts",
    fields: &[text("detail"), text("host")],
    tags: &[text("system_component"), text("state")],
    count_field: "detail",
    time_key: "time",
};

/// The streams managed by a client, one buffer each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Call detail records.
    Cdrs,
    /// Operational alerts.
    Alerts,
    /// Account-level concurrent call gauge.
    CallCounts,
    /// Service-provider-level concurrent call gauge.
    SpCallCounts,
    /// Application-level concurrent call gauge.
    AppCallCounts,
    /// Platform component alerts.
    SystemAlerts,
}

impl StreamKind {
    /// Every stream, in registration order.
    pub const ALL: [Self; 6] = [
        Self::CallCounts,
        Self::SpCallCounts,
        Self::AppCallCounts,
        Self::Cdrs,
        Self::Alerts,
        Self::SystemAlerts,
    ];

    /// Static schema for this stream.
    #[must_use]
    pub const fn schema(self) -> &'static StreamSchema {
        match self {
            Self::Cdrs => &CDRS,
            Self::Alerts => &ALERTS,
            Self::CallCounts => &CALL_COUNTS,
            Self::SpCallCounts => &SP_CALL_COUNTS,
            Self::AppCallCounts => &APP_CALL_COUNTS,
            Self::SystemAlerts => &SYSTEM_ALERTS,
        }
    }

    /// Measurement name.
    #[must_use]
    pub const fn measurement(self) -> &'static str {
        self.schema().measurement
    }

    /// Store namespace; identical to the measurement name.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        self.schema().measurement
    }

    /// Whether the periodic flush timer drains this stream.
    ///
    /// System alerts are always written through synchronously.
    #[must_use]
    pub const fn is_periodic(self) -> bool {
        !matches!(self, Self::SystemAlerts)
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.measurement())
    }
}
