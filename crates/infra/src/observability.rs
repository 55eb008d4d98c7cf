//! Logger and telemetry selection from `CTEL_LOG_*` variables.

use call_telemetry_adapters::{JsonLogger, JsonTelemetry, LogSink, StderrLogSink, TaggedTelemetry};
use call_telemetry_ports::{LogFields, LogLevel, LoggerPort, TelemetryPort, TelemetryTags};
use call_telemetry_shared::RequestContext;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Selects JSON log lines on stderr.
pub const ENV_LOG_FORMAT: &str = "CTEL_LOG_FORMAT";
/// Minimum level: `debug`, `info`, `warn` or `error`.
pub const ENV_LOG_LEVEL: &str = "CTEL_LOG_LEVEL";
/// Selects JSON metric lines; follows the log format when unset.
pub const ENV_TELEMETRY_FORMAT: &str = "CTEL_TELEMETRY_FORMAT";

/// Optional logger and telemetry sink of a client.
#[derive(Clone, Default)]
pub struct Observability {
    /// Structured logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Metrics sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl Observability {
    /// Read the process environment.
    #[must_use]
    pub fn from_std_env() -> Self {
        Self::from_map(&std::env::vars().collect())
    }

    /// Build from a variable map, writing to stderr.
    #[must_use]
    pub fn from_map(env: &BTreeMap<String, String>) -> Self {
        Self::from_map_with_sink(env, Arc::new(StderrLogSink))
    }

    /// Build from a variable map, writing to `sink`.
    #[must_use]
    pub fn from_map_with_sink(env: &BTreeMap<String, String>, sink: Arc<dyn LogSink>) -> Self {
        let is_json = |key: &str| {
            env.get(key)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("json"))
        };
        let log_enabled = is_json(ENV_LOG_FORMAT);
        let telemetry_enabled = env
            .get(ENV_TELEMETRY_FORMAT)
            .map_or(log_enabled, |value| value.trim().eq_ignore_ascii_case("json"));

        let logger: Option<Arc<dyn LoggerPort>> = log_enabled.then(|| -> Arc<dyn LoggerPort> {
            let level = parse_log_level(env.get(ENV_LOG_LEVEL).map(String::as_str));
            Arc::new(JsonLogger::new(Arc::clone(&sink)).with_min_level(level))
        });
        let telemetry: Option<Arc<dyn TelemetryPort>> = telemetry_enabled
            .then(|| -> Arc<dyn TelemetryPort> { Arc::new(JsonTelemetry::new(Arc::clone(&sink))) });
        Self { logger, telemetry }
    }

    /// Copy carrying the request's correlation id on every event and metric.
    #[must_use]
    pub fn scoped(&self, ctx: &RequestContext) -> Self {
        let correlation_id = ctx.correlation_id().as_str();
        let logger = self.logger.as_ref().map(|logger| {
            let mut fields = LogFields::new();
            fields.insert("correlationId".into(), Value::from(correlation_id));
            Arc::from(logger.child(fields))
        });
        let telemetry = self.telemetry.as_ref().map(|telemetry| -> Arc<dyn TelemetryPort> {
            let mut tags = TelemetryTags::new();
            tags.insert("correlationId".into(), correlation_id.into());
            Arc::new(TaggedTelemetry::new(Arc::clone(telemetry), tags))
        });
        Self { logger, telemetry }
    }
}

fn parse_log_level(value: Option<&str>) -> LogLevel {
    match value.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        Some("debug") => LogLevel::Debug,
        Some("warn") => LogLevel::Warn,
        Some("error") => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_telemetry_adapters::MemoryLogSink;

    fn env(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn disabled_by_default() {
        let observability = Observability::from_map(&BTreeMap::new());
        assert!(observability.logger.is_none());
        assert!(observability.telemetry.is_none());
    }

    #[test]
    fn json_logs_carry_correlation_id() {
        let sink = Arc::new(MemoryLogSink::default());
        let observability = Observability::from_map_with_sink(
            &env(&[(ENV_LOG_FORMAT, "json"), (ENV_TELEMETRY_FORMAT, "off")]),
            sink.clone(),
        );
        assert!(observability.telemetry.is_none());

        let ctx = RequestContext::new_request();
        let scoped = observability.scoped(&ctx);
        if let Some(logger) = scoped.logger.as_ref() {
            logger.info("telemetry.write.accepted", "ok", None);
        }
        let lines = sink.take();
        assert_eq!(lines.len(), 1);
        assert!(lines
            .first()
            .is_some_and(|line| line.contains(ctx.correlation_id().as_str())));
    }

    #[test]
    fn debug_events_need_debug_level() {
        let sink = Arc::new(MemoryLogSink::default());
        let quiet = Observability::from_map_with_sink(&env(&[(ENV_LOG_FORMAT, "json")]), sink.clone());
        if let Some(logger) = quiet.logger.as_ref() {
            logger.debug("buffer.flush.completed", "flushed", None);
        }
        assert!(sink.take().is_empty());

        let verbose = Observability::from_map_with_sink(
            &env(&[(ENV_LOG_FORMAT, "json"), (ENV_LOG_LEVEL, "debug")]),
            sink.clone(),
        );
        if let Some(logger) = verbose.logger.as_ref() {
            logger.debug("buffer.flush.completed", "flushed", None);
        }
        assert_eq!(sink.take().len(), 1);
    }
}
