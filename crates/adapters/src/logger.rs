//! Structured JSON logger adapter.
//!
//! One JSON object per event, written to a [`LogSink`]. Keys that look like
//! secrets (`password`, `storeToken`, ...) are redacted at any depth of
//! `fields` and `error`.

use crate::log_sink::LogSink;
use call_telemetry_ports::{LogEvent, LogFields, LogLevel, LoggerPort};
use call_telemetry_shared::{REDACTED, is_secret_key};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogLine<'a> {
    timestamp_ms: i64,
    level: &'static str,
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "LogFields::is_empty")]
    fields: LogFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
}

/// Writes [`LogEvent`]s as JSON lines.
#[derive(Clone)]
pub struct JsonLogger {
    sink: Arc<dyn LogSink>,
    base_fields: LogFields,
    min_level: LogLevel,
}

impl JsonLogger {
    /// Logger at `info` level with no base fields.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            base_fields: LogFields::new(),
            min_level: LogLevel::Info,
        }
    }

    /// Fields added to every event; event fields win on clashes.
    #[must_use]
    pub fn with_base_fields(mut self, fields: LogFields) -> Self {
        self.base_fields = fields;
        self
    }

    /// Drop events below `level`.
    #[must_use]
    pub const fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }
}

impl LoggerPort for JsonLogger {
    fn log(&self, event: LogEvent) {
        if event.level < self.min_level {
            return;
        }

        let mut fields = self.base_fields.clone();
        fields.extend(event.fields.unwrap_or_default());
        fields.values_mut().for_each(redact_nested);
        fields
            .iter_mut()
            .filter(|(key, _)| is_secret_key(key))
            .for_each(|(_, value)| *value = Value::from(REDACTED));

        let mut error = event.error;
        if let Some(value) = error.as_mut() {
            redact_nested(value);
        }

        let line = LogLine {
            timestamp_ms: Utc::now().timestamp_millis(),
            level: event.level.as_str(),
            event: &event.event,
            message: &event.message,
            fields,
            error,
        };
        match serde_json::to_string(&line) {
            Ok(mut encoded) => {
                encoded.push('\n');
                self.sink.write_line(&encoded);
            },
            Err(error) => tracing::warn!(%error, event = line.event, "log serialization failed"),
        }
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut child = self.clone();
        child.base_fields.extend(fields);
        Box::new(child)
    }
}

fn redact_nested(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map.iter_mut() {
                if is_secret_key(key) {
                    *nested = Value::from(REDACTED);
                } else {
                    redact_nested(nested);
                }
            }
        },
        Value::Array(items) => items.iter_mut().for_each(redact_nested),
        _ => {},
    }
}
