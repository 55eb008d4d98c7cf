//! Payload parsing for CLI surfaces.

use crate::{InfraError, InfraResult};
use call_telemetry_app::WriteBatch;
use call_telemetry_domain::{
    AlertRecord, CallCountRecord, CdrRecord, OneOrMany, QueryOptions, ScopeLevel,
    SystemAlertRecord,
};
use call_telemetry_shared::ErrorCode;
use serde::de::DeserializeOwned;
use std::fmt;

/// Record kinds accepted by write commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Call detail records.
    Cdr,
    /// Alerts.
    Alert,
    /// Call gauges at a scope level.
    CallCount(ScopeLevel),
    /// Platform component alerts.
    SystemAlert,
}

impl WriteKind {
    /// Canonical string representation (for CLI/UI).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cdr => "cdr",
            Self::Alert => "alert",
            Self::CallCount(_) => "callCount",
            Self::SystemAlert => "systemAlert",
        }
    }
}

impl fmt::Display for WriteKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Parse a JSON object or array of records of `kind` into a write batch.
pub fn parse_write_batch_json(kind: WriteKind, input_json: &str) -> InfraResult<WriteBatch> {
    let batch = match kind {
        WriteKind::Cdr => WriteBatch::Cdrs(parse_records::<CdrRecord>(kind, input_json)?),
        WriteKind::Alert => WriteBatch::Alerts(parse_records::<AlertRecord>(kind, input_json)?),
        WriteKind::CallCount(level) => WriteBatch::CallCounts {
            level,
            records: parse_records::<CallCountRecord>(kind, input_json)?,
        },
        WriteKind::SystemAlert => {
            WriteBatch::SystemAlerts(parse_records::<SystemAlertRecord>(kind, input_json)?)
        },
    };
    if batch.is_empty() {
        return Err(invalid_payload(kind, "payload holds no records"));
    }
    Ok(batch)
}

/// Parse query options given as a JSON object; absent input means defaults.
pub fn parse_query_options_json(input_json: Option<&str>) -> InfraResult<QueryOptions> {
    let Some(input) = input_json.map(str::trim).filter(|input| !input.is_empty()) else {
        return Ok(QueryOptions::default());
    };
    serde_json::from_str(input).map_err(|error| {
        InfraError::expected(
            ErrorCode::new("cli", "invalid_query_options"),
            format!("invalid query options: {error}"),
        )
    })
}

fn parse_records<T: DeserializeOwned>(kind: WriteKind, input_json: &str) -> InfraResult<Vec<T>> {
    serde_json::from_str::<OneOrMany<T>>(input_json)
        .map(OneOrMany::into_vec)
        .map_err(|error| invalid_payload(kind, &error.to_string()))
}

fn invalid_payload(kind: WriteKind, reason: &str) -> InfraError {
    InfraError::expected(
        ErrorCode::new("cli", "invalid_payload"),
        format!("invalid {kind} payload: {reason}"),
    )
    .with_metadata("kind", kind.as_str())
}
