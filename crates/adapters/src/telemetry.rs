//! JSON telemetry adapter (counters and timers).
//!
//! Metric lines share the log sink with [`crate::JsonLogger`] and are told
//! apart by `"type": "metric"`.

use crate::log_sink::LogSink;
use call_telemetry_ports::{TelemetryPort, TelemetryTags, TelemetryTimer};
use call_telemetry_shared::{REDACTED, is_secret_key};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricLine<'a> {
    #[serde(rename = "type")]
    line_type: &'static str,
    timestamp_ms: i64,
    metric_type: &'static str,
    name: &'a str,
    value: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'static str>,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a TelemetryTags,
}

fn no_tags(tags: &&TelemetryTags) -> bool {
    tags.is_empty()
}

impl<'a> MetricLine<'a> {
    fn counter(name: &'a str, value: u64, tags: &'a TelemetryTags) -> Self {
        Self {
            line_type: "metric",
            timestamp_ms: Utc::now().timestamp_millis(),
            metric_type: "counter",
            name,
            value,
            unit: None,
            tags,
        }
    }

    fn timer(name: &'a str, duration_ms: u64, tags: &'a TelemetryTags) -> Self {
        Self {
            metric_type: "timer",
            unit: Some("ms"),
            ..Self::counter(name, duration_ms, tags)
        }
    }

    fn emit(&self, sink: &dyn LogSink) {
        match serde_json::to_string(self) {
            Ok(mut line) => {
                line.push('\n');
                sink.write_line(&line);
            },
            Err(error) => tracing::warn!(%error, metric = self.name, "metric serialization failed"),
        }
    }
}

/// Emits one JSON metric per line.
#[derive(Clone)]
pub struct JsonTelemetry {
    sink: Arc<dyn LogSink>,
}

impl JsonTelemetry {
    /// Metrics written to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl TelemetryPort for JsonTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let tags = redacted(tags.cloned().unwrap_or_default());
        MetricLine::counter(name, value, &tags).emit(self.sink.as_ref());
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        let tags = redacted(tags.cloned().unwrap_or_default());
        MetricLine::timer(name, duration_ms, &tags).emit(self.sink.as_ref());
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(SinkTimer {
            sink: Arc::clone(&self.sink),
            name: name.into(),
            tags: redacted(tags.cloned().unwrap_or_default()),
            started_at: Instant::now(),
            stopped: AtomicBool::new(false),
        })
    }
}

/// Adds fixed tags (client id, correlation id) to every metric of an inner port.
#[derive(Clone)]
pub struct TaggedTelemetry {
    inner: Arc<dyn TelemetryPort>,
    tags: TelemetryTags,
}

impl TaggedTelemetry {
    /// Wrap `inner`; per-call tags win over `tags` on key clashes.
    #[must_use]
    pub fn new(inner: Arc<dyn TelemetryPort>, tags: TelemetryTags) -> Self {
        Self { inner, tags }
    }

    fn merged(&self, extra: Option<&TelemetryTags>) -> TelemetryTags {
        let mut tags = self.tags.clone();
        tags.extend(extra.into_iter().flatten().map(|(k, v)| (k.clone(), v.clone())));
        tags
    }
}

impl TelemetryPort for TaggedTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        self.inner.increment_counter(name, value, Some(&self.merged(tags)));
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        self.inner.record_timer_ms(name, duration_ms, Some(&self.merged(tags)));
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        self.inner.start_timer(name, Some(&self.merged(tags)))
    }
}

struct SinkTimer {
    sink: Arc<dyn LogSink>,
    name: Box<str>,
    tags: TelemetryTags,
    started_at: Instant,
    stopped: AtomicBool,
}

impl TelemetryTimer for SinkTimer {
    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let elapsed = u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        MetricLine::timer(&self.name, elapsed, &self.tags).emit(self.sink.as_ref());
    }
}

fn redacted(mut tags: TelemetryTags) -> TelemetryTags {
    tags.iter_mut()
        .filter(|(key, _)| is_secret_key(key))
        .for_each(|(_, value)| *value = REDACTED.into());
    tags
}
