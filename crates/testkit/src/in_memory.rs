//! In-memory adapter implementations for port contracts.
//!
//! These implementations are intended for:
//! - Unit/integration tests
//! - Deterministic contract tests for the ports layer
//! - Local experimentation without a running store

use call_telemetry_domain::{
    BoundQuery, Comparison, FieldValue, ParamValue, Predicate, Projection, TelemetryPoint,
};
use call_telemetry_ports::{
    BoxFuture, ClockPort, LogEvent, LogFields, LoggerPort, QueryResponse, QuerySeries,
    StoreErrorKind, StoreGatewayPort, TelemetryPort, TelemetryTags, TelemetryTimer,
};
use call_telemetry_shared::{ErrorEnvelope, RequestContext, Result};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A no-op logger implementation.
#[derive(Debug, Default)]
pub struct NoopLogger;

impl LoggerPort for NoopLogger {
    fn log(&self, _event: LogEvent) {}

    fn child(&self, _fields: LogFields) -> Box<dyn LoggerPort> {
        Box::new(Self)
    }
}

/// A no-op telemetry timer.
#[derive(Debug, Default)]
pub struct NoopTimer;

impl TelemetryTimer for NoopTimer {
    fn stop(&self) {}
}

/// A no-op telemetry implementation.
#[derive(Debug, Default)]
pub struct NoopTelemetry;

impl TelemetryPort for NoopTelemetry {
    fn increment_counter(&self, _name: &str, _value: u64, _tags: Option<&TelemetryTags>) {}

    fn record_timer_ms(&self, _name: &str, _duration_ms: u64, _tags: Option<&TelemetryTags>) {}

    fn start_timer(&self, _name: &str, _tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(NoopTimer)
    }
}

/// Logger that keeps every event for later assertions.
///
/// Children share the same event list; their base fields are merged into
/// each event.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    events: Arc<Mutex<Vec<LogEvent>>>,
    base_fields: LogFields,
}

impl RecordingLogger {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events with the given name.
    pub fn events_named(&self, event: &str) -> Vec<LogEvent> {
        self.events()
            .into_iter()
            .filter(|logged| logged.event.as_ref() == event)
            .collect()
    }

    /// Whether an event with this name was logged.
    pub fn has_event(&self, event: &str) -> bool {
        !self.events_named(event).is_empty()
    }
}

impl LoggerPort for RecordingLogger {
    fn log(&self, mut event: LogEvent) {
        if !self.base_fields.is_empty() {
            let mut fields = self.base_fields.clone();
            fields.extend(event.fields.take().unwrap_or_default());
            event.fields = Some(fields);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut base_fields = self.base_fields.clone();
        base_fields.extend(fields);
        Box::new(Self {
            events: Arc::clone(&self.events),
            base_fields,
        })
    }
}

#[derive(Debug, Default)]
struct TelemetryRecords {
    counters: BTreeMap<String, u64>,
    timers: BTreeMap<String, u64>,
}

/// Telemetry sink that sums counters and counts timer samples.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    records: Arc<Mutex<TelemetryRecords>>,
}

impl RecordingTelemetry {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all increments of `name`.
    pub fn counter(&self, name: &str) -> u64 {
        self.lock().counters.get(name).copied().unwrap_or(0)
    }

    /// Number of samples recorded for timer `name`.
    pub fn timer_samples(&self, name: &str) -> u64 {
        self.lock().timers.get(name).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TelemetryRecords> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct RecordingTimer {
    name: String,
    records: Arc<Mutex<TelemetryRecords>>,
}

impl TelemetryTimer for RecordingTimer {
    fn stop(&self) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        *records.timers.entry(self.name.clone()).or_default() += 1;
    }
}

impl TelemetryPort for RecordingTelemetry {
    fn increment_counter(&self, name: &str, value: u64, _tags: Option<&TelemetryTags>) {
        *self.lock().counters.entry(name.to_owned()).or_default() += value;
    }

    fn record_timer_ms(&self, name: &str, _duration_ms: u64, _tags: Option<&TelemetryTags>) {
        *self.lock().timers.entry(name.to_owned()).or_default() += 1;
    }

    fn start_timer(&self, name: &str, _tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(RecordingTimer {
            name: name.to_owned(),
            records: Arc::clone(&self.records),
        })
    }
}

/// Clock pinned to a settable instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Clock reading `at` until changed.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(at)),
        }
    }

    /// Clock reading the given epoch milliseconds.
    pub fn at_millis(millis: i64) -> Self {
        Self::new(DateTime::from_timestamp_millis(millis).unwrap_or_default())
    }

    /// Move the clock to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::zero());
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// `list_namespaces` (and `namespace_exists`).
    ListNamespaces,
    /// `create_namespace`.
    CreateNamespace,
    /// `bulk_write`.
    BulkWrite,
    /// `query`.
    Query,
}

impl StoreOperation {
    const fn stage(self) -> StoreErrorKind {
        match self {
            Self::ListNamespaces | Self::CreateNamespace => StoreErrorKind::Initialization,
            Self::BulkWrite => StoreErrorKind::Write,
            Self::Query => StoreErrorKind::Query,
        }
    }
}

/// One accepted `bulk_write` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    /// Target namespace.
    pub namespace: Box<str>,
    /// Points as received.
    pub points: Vec<TelemetryPoint>,
}

#[derive(Debug, Clone)]
struct StoredPoint {
    time_ns: i64,
    point: TelemetryPoint,
}

#[derive(Debug, Default)]
struct StoreState {
    namespaces: BTreeSet<Box<str>>,
    data: HashMap<Box<str>, Vec<StoredPoint>>,
    writes: Vec<RecordedWrite>,
    created: Vec<Box<str>>,
    queries: Vec<BoundQuery>,
    fail_next: HashMap<StoreOperation, VecDeque<ErrorEnvelope>>,
    fail_always: HashMap<StoreOperation, ErrorEnvelope>,
    last_time_ns: i64,
}

impl StoreState {
    fn take_failure(&mut self, operation: StoreOperation) -> Option<ErrorEnvelope> {
        if let Some(error) = self
            .fail_next
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            return Some(error);
        }
        self.fail_always.get(&operation).cloned()
    }

    fn next_time_ns(&mut self, requested: Option<i64>) -> i64 {
        let time_ns = requested.unwrap_or_else(|| {
            let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
            now.max(self.last_time_ns.saturating_add(1))
        });
        self.last_time_ns = self.last_time_ns.max(time_ns);
        time_ns
    }
}

/// In-memory store gateway evaluating bound queries over written points.
///
/// Namespaces must be created before writes, like the real store. Untimed
/// points get a strictly increasing wall-clock timestamp.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStoreGateway {
    state: Arc<tokio::sync::Mutex<StoreState>>,
    write_delay: Option<Duration>,
}

impl InMemoryStoreGateway {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the given namespaces already present.
    pub fn with_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Box<str>>,
    {
        let state = StoreState {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
            ..StoreState::default()
        };
        Self {
            state: Arc::new(tokio::sync::Mutex::new(state)),
            write_delay: None,
        }
    }

    /// Delay every accepted write, to observe in-flight behavior.
    #[must_use]
    pub const fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Fail the next call of `operation` with `error`.
    pub async fn fail_next(&self, operation: StoreOperation, error: ErrorEnvelope) {
        self.state
            .lock()
            .await
            .fail_next
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Fail every call of `operation` until [`Self::clear_failures`].
    pub async fn fail_always(&self, operation: StoreOperation, error: ErrorEnvelope) {
        self.state
            .lock()
            .await
            .fail_always
            .insert(operation, error);
    }

    /// Remove all injected failures.
    pub async fn clear_failures(&self) {
        let mut state = self.state.lock().await;
        state.fail_next.clear();
        state.fail_always.clear();
    }

    /// Accepted writes, in order.
    pub async fn writes(&self) -> Vec<RecordedWrite> {
        self.state.lock().await.writes.clone()
    }

    /// Points stored in `namespace`, in write order.
    pub async fn points(&self, namespace: &str) -> Vec<TelemetryPoint> {
        self.state
            .lock()
            .await
            .data
            .get(namespace)
            .map(|stored| stored.iter().map(|entry| entry.point.clone()).collect())
            .unwrap_or_default()
    }

    /// Current namespaces.
    pub async fn namespaces(&self) -> Vec<Box<str>> {
        self.state.lock().await.namespaces.iter().cloned().collect()
    }

    /// Every `create_namespace` call, in order.
    pub async fn created_namespaces(&self) -> Vec<Box<str>> {
        self.state.lock().await.created.clone()
    }

    /// Every query received, in order.
    pub async fn queries(&self) -> Vec<BoundQuery> {
        self.state.lock().await.queries.clone()
    }
}

impl StoreGatewayPort for InMemoryStoreGateway {
    fn provider_id(&self) -> &str {
        "memory"
    }

    fn list_namespaces(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<Vec<Box<str>>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory_store.list_namespaces")?;
            let mut state = self.state.lock().await;
            if let Some(error) = state.take_failure(StoreOperation::ListNamespaces) {
                return Err(StoreOperation::ListNamespaces.stage().wrap(error));
            }
            Ok(state.namespaces.iter().cloned().collect())
        })
    }

    fn create_namespace(
        &self,
        ctx: &RequestContext,
        namespace: Box<str>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory_store.create_namespace")?;
            let mut state = self.state.lock().await;
            if let Some(error) = state.take_failure(StoreOperation::CreateNamespace) {
                return Err(StoreOperation::CreateNamespace.stage().wrap(error));
            }
            state.created.push(namespace.clone());
            state.namespaces.insert(namespace);
            Ok(())
        })
    }

    fn bulk_write(
        &self,
        ctx: &RequestContext,
        namespace: Box<str>,
        points: Vec<TelemetryPoint>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory_store.bulk_write")?;
            if points.is_empty() {
                return Ok(());
            }
            if let Some(delay) = self.write_delay {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.state.lock().await;
            if let Some(error) = state.take_failure(StoreOperation::BulkWrite) {
                return Err(StoreOperation::BulkWrite.stage().wrap(error));
            }
            if !state.namespaces.contains(&namespace) {
                return Err(StoreErrorKind::Write
                    .error(format!("database not found: {namespace}"))
                    .with_metadata("namespace", namespace.to_string()));
            }

            let mut stored = Vec::with_capacity(points.len());
            for point in &points {
                let requested = point.timestamp_nanos().map_err(ErrorEnvelope::from)?;
                let time_ns = state.next_time_ns(requested);
                stored.push(StoredPoint {
                    time_ns,
                    point: point.clone(),
                });
            }
            state
                .data
                .entry(namespace.clone())
                .or_default()
                .extend(stored);
            state.writes.push(RecordedWrite { namespace, points });
            Ok(())
        })
    }

    fn query(
        &self,
        ctx: &RequestContext,
        query: BoundQuery,
    ) -> BoxFuture<'_, Result<QueryResponse>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory_store.query")?;
            let mut state = self.state.lock().await;
            state.queries.push(query.clone());
            if let Some(error) = state.take_failure(StoreOperation::Query) {
                return Err(StoreOperation::Query.stage().wrap(error));
            }
            let rows = state
                .data
                .get(query.namespace)
                .map(|stored| evaluate(&query, stored))
                .unwrap_or_default();
            Ok(rows)
        })
    }
}

fn evaluate(query: &BoundQuery, stored: &[StoredPoint]) -> QueryResponse {
    let mut matched: Vec<&StoredPoint> = stored
        .iter()
        .filter(|entry| entry.point.measurement.as_ref() == query.measurement)
        .filter(|entry| {
            query
                .predicates
                .iter()
                .all(|predicate| matches_predicate(predicate, entry, query))
        })
        .collect();

    match query.projection {
        Projection::Count(field) => {
            let count = matched
                .iter()
                .filter(|entry| entry.point.fields.contains_key(field))
                .count();
            if count == 0 {
                return QueryResponse::default();
            }
            QueryResponse {
                series: vec![QuerySeries {
                    name: query.measurement.into(),
                    columns: vec!["time".into(), "count".into()],
                    values: vec![vec![Value::from("1970-01-01T00:00:00Z"), Value::from(count)]],
                }],
            }
        },
        Projection::All => {
            if query.order_time_desc {
                matched.sort_by(|a, b| b.time_ns.cmp(&a.time_ns));
            } else {
                matched.sort_by_key(|entry| entry.time_ns);
            }
            let offset = usize::try_from(query.offset.unwrap_or(0)).unwrap_or(usize::MAX);
            let limit = query
                .limit
                .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
            let page: Vec<&StoredPoint> = matched.into_iter().skip(offset).take(limit).collect();
            if page.is_empty() {
                return QueryResponse::default();
            }

            let keys: BTreeSet<&str> = page
                .iter()
                .flat_map(|entry| {
                    entry
                        .point
                        .tags
                        .keys()
                        .chain(entry.point.fields.keys())
                        .map(AsRef::as_ref)
                })
                .collect();
            let mut columns: Vec<Box<str>> = vec!["time".into()];
            columns.extend(keys.iter().map(|key| Box::from(*key)));

            let values = page
                .iter()
                .map(|entry| {
                    let mut row = vec![Value::from(render_time(entry.time_ns))];
                    row.extend(keys.iter().map(|key| column_json(&entry.point, key)));
                    row
                })
                .collect();
            QueryResponse {
                series: vec![QuerySeries {
                    name: query.measurement.into(),
                    columns,
                    values,
                }],
            }
        },
    }
}

fn matches_predicate(predicate: &Predicate, entry: &StoredPoint, query: &BoundQuery) -> bool {
    match predicate {
        Predicate::AnyOf(alternatives) => alternatives
            .iter()
            .any(|alternative| matches_predicate(alternative, entry, query)),
        Predicate::Compare { column, op, param } => {
            let Some(param) = query.params.get(param) else {
                return false;
            };
            if *column == "time" {
                return match param {
                    ParamValue::Integer(bound) => compare_ordered(entry.time_ns, *op, *bound),
                    _ => false,
                };
            }
            let Some(actual) = column_text(&entry.point, column) else {
                return false;
            };
            match (op, param) {
                (Comparison::Eq, ParamValue::Text(expected)) => actual == *expected,
                (Comparison::Eq, ParamValue::Integer(expected)) => {
                    actual == expected.to_string()
                },
                (Comparison::Matches, ParamValue::Pattern(pattern)) => {
                    actual.contains(&pattern.literal)
                },
                (_, ParamValue::Integer(bound)) => actual
                    .parse::<i64>()
                    .is_ok_and(|actual| compare_ordered(actual, *op, *bound)),
                _ => false,
            }
        },
    }
}

const fn compare_ordered(actual: i64, op: Comparison, bound: i64) -> bool {
    match op {
        Comparison::Eq => actual == bound,
        Comparison::Gt => actual > bound,
        Comparison::Gte => actual >= bound,
        Comparison::Lte => actual <= bound,
        Comparison::Matches => false,
    }
}

fn column_text(point: &TelemetryPoint, column: &str) -> Option<String> {
    if let Some(tag) = point.tag_value(column) {
        return Some(tag.to_owned());
    }
    point.fields.get(column).map(|value| match value {
        FieldValue::Boolean(value) => value.to_string(),
        FieldValue::Integer(value) => value.to_string(),
        FieldValue::Float(value) => value.to_string(),
        FieldValue::String(value) => value.to_string(),
    })
}

fn column_json(point: &TelemetryPoint, column: &str) -> Value {
    if let Some(tag) = point.tag_value(column) {
        return Value::from(tag);
    }
    match point.fields.get(column) {
        None => Value::Null,
        Some(FieldValue::Boolean(value)) => Value::from(*value),
        Some(FieldValue::Integer(value)) => Value::from(*value),
        Some(FieldValue::Float(value)) => Value::from(*value),
        Some(FieldValue::String(value)) => Value::from(value.as_ref()),
    }
}

fn render_time(time_ns: i64) -> String {
    DateTime::from_timestamp_nanos(time_ns).to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
