//! Raw query series to typed records.

use call_telemetry_domain::{
    RecordValue, StreamKind, TelemetryRecord, ValueType, epoch_millis, parse_timestamp,
};
use call_telemetry_ports::{QuerySeries, StoreErrorKind};
use call_telemetry_shared::{ErrorEnvelope, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

const TIME_COLUMN: &str = "time";

/// Convert the rows of `series` into records of `stream`.
///
/// A missing series is an empty result. Every declared column appears in
/// each record, as null when the store did not return it.
pub fn normalize_series(
    stream: StreamKind,
    series: Option<&QuerySeries>,
) -> Result<Vec<TelemetryRecord>> {
    let Some(series) = series else {
        return Ok(Vec::new());
    };
    let schema = stream.schema();

    let mut records = Vec::with_capacity(series.values.len());
    for row in &series.values {
        let mut record: TelemetryRecord = schema
            .column_names()
            .map(|name| (name.to_owned(), RecordValue::Null))
            .collect();
        for (column, value) in series.columns.iter().zip(row) {
            if column.as_ref() == TIME_COLUMN {
                record.insert(schema.time_key.to_owned(), time_value(value)?);
                continue;
            }
            let coerced = match schema.column(column) {
                Some(spec) => coerce(spec.value_type, value),
                None => native(value),
            };
            record.insert(column.to_string(), coerced);
        }
        records.push(record);
    }
    Ok(records)
}

fn time_value(value: &Value) -> Result<RecordValue> {
    let at = match value {
        Value::String(text) => parse_timestamp(text).map_err(ErrorEnvelope::from),
        Value::Number(number) => number
            .as_i64()
            .map(DateTime::<Utc>::from_timestamp_nanos)
            .ok_or_else(|| invalid_time(value)),
        Value::Null => return Ok(RecordValue::Null),
        _ => Err(invalid_time(value)),
    };
    at.map(RecordValue::Timestamp)
        .map_err(|error| StoreErrorKind::Query.wrap(error))
}

fn invalid_time(value: &Value) -> ErrorEnvelope {
    StoreErrorKind::Query
        .error("store returned an unreadable time value")
        .with_metadata("value", value.to_string())
}

fn coerce(value_type: ValueType, value: &Value) -> RecordValue {
    match (value_type, value) {
        (ValueType::EpochMillis, Value::Number(number)) => number
            .as_i64()
            .and_then(|millis| epoch_millis(millis).ok())
            .map_or_else(|| native(value), RecordValue::Timestamp),
        (ValueType::BooleanText, Value::String(text)) => RecordValue::Boolean(text == "true"),
        _ => native(value),
    }
}

fn native(value: &Value) -> RecordValue {
    match value {
        Value::Null => RecordValue::Null,
        Value::Bool(flag) => RecordValue::Boolean(*flag),
        Value::Number(number) => number.as_i64().map_or_else(
            || RecordValue::Float(number.as_f64().unwrap_or_default()),
            RecordValue::Integer,
        ),
        Value::String(text) => RecordValue::Text(text.clone()),
        other => RecordValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(columns: &[&str], values: Vec<Vec<Value>>) -> QuerySeries {
        QuerySeries {
            name: "cdrs".into(),
            columns: columns.iter().map(|column| Box::from(*column)).collect(),
            values,
        }
    }

    #[test]
    fn missing_series_is_empty() -> Result<()> {
        assert!(normalize_series(StreamKind::Alerts, None)?.is_empty());
        Ok(())
    }

    #[test]
    fn cdr_columns_are_coerced() -> Result<()> {
        let series = series(
            &["time", "answered", "answered_at", "duration", "sip_callid", "mos"],
            vec![vec![
                json!("2023-11-14T22:13:20Z"),
                json!("true"),
                json!(1_700_000_000_000_i64),
                json!(42),
                json!("abc@host"),
                json!(4.3),
            ]],
        );
        let records = normalize_series(StreamKind::Cdrs, Some(&series))?;
        let record = records.first().cloned().unwrap_or_default();
        let expected_at = epoch_millis(1_700_000_000_000).map_err(ErrorEnvelope::from)?;

        assert_eq!(record.get("attempted_at"), Some(&RecordValue::Timestamp(expected_at)));
        assert!(!record.contains_key("time"));
        assert_eq!(record.get("answered"), Some(&RecordValue::Boolean(true)));
        assert_eq!(record.get("answered_at"), Some(&RecordValue::Timestamp(expected_at)));
        assert_eq!(record.get("duration"), Some(&RecordValue::Integer(42)));
        assert_eq!(record.get("sip_callid"), Some(&RecordValue::Text("abc@host".into())));
        assert_eq!(record.get("mos"), Some(&RecordValue::Float(4.3)));
        assert_eq!(record.get("terminated_at"), Some(&RecordValue::Null));
        Ok(())
    }

    #[test]
    fn non_true_text_is_false() -> Result<()> {
        let series = series(&["answered"], vec![vec![json!("yes")], vec![json!("false")]]);
        let records = normalize_series(StreamKind::Cdrs, Some(&series))?;
        assert!(records
            .iter()
            .all(|record| record.get("answered") == Some(&RecordValue::Boolean(false))));
        Ok(())
    }

    #[test]
    fn alerts_keep_time_key_and_null_optional_columns() -> Result<()> {
        let series = series(
            &["time", "alert_type", "message"],
            vec![vec![json!(1_700_000_000_000_000_000_i64), json!("no-tts"), json!("m")]],
        );
        let records = normalize_series(StreamKind::Alerts, Some(&series))?;
        let record = records.first().cloned().unwrap_or_default();
        assert!(record.get("time").is_some_and(|value| value.as_timestamp().is_some()));
        assert_eq!(record.get("target_sid"), Some(&RecordValue::Null));
        assert_eq!(record.get("alert_type").and_then(RecordValue::as_text), Some("no-tts"));
        Ok(())
    }

    #[test]
    fn unreadable_time_is_a_query_error() {
        let series = series(&["time"], vec![vec![json!("yesterday")]]);
        let error = normalize_series(StreamKind::Alerts, Some(&series)).err();
        assert_eq!(error.as_ref().and_then(StoreErrorKind::of), Some(StoreErrorKind::Query));
    }
}
