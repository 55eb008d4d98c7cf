//! Query specs and their structured, always-parameterized bound form.
//!
//! A [`QuerySpec`] is the validated caller intent. [`QuerySpec::bind`] turns it
//! into a COUNT and a SELECT [`BoundQuery`]; user values only ever travel as
//! named parameters, never inside the rendered statement text.

use crate::records::deserialize_optional_timestamp;
use crate::{DomainError, Scope, ScopeLevel, StreamKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const NANOS_PER_DAY: i64 = 86_400_000_000_000;

/// Entity families that can be queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Call detail records.
    Cdr,
    /// Operational alerts.
    Alert,
    /// Concurrent call gauges.
    CallCount,
}

impl EntityKind {
    /// Stable label used in errors and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cdr => "cdr",
            Self::Alert => "alert",
            Self::CallCount => "call_count",
        }
    }

    /// Stream holding this entity at the given scope level.
    pub fn stream(self, level: ScopeLevel) -> Result<StreamKind, DomainError> {
        match (self, level) {
            (Self::Cdr, ScopeLevel::ServiceProvider | ScopeLevel::Account) => Ok(StreamKind::Cdrs),
            (Self::Alert, ScopeLevel::ServiceProvider | ScopeLevel::Account) => {
                Ok(StreamKind::Alerts)
            },
            (Self::CallCount, ScopeLevel::Account) => Ok(StreamKind::CallCounts),
            (Self::CallCount, ScopeLevel::ServiceProvider) => Ok(StreamKind::SpCallCounts),
            (Self::CallCount, ScopeLevel::Application) => Ok(StreamKind::AppCallCounts),
            (Self::Cdr | Self::Alert, ScopeLevel::Application) => {
                Err(DomainError::UnsupportedScope {
                    entity: self.as_str(),
                    level: level.as_str(),
                })
            },
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Integer option accepted either as a JSON number or as numeric text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseInt {
    /// Already numeric.
    Integer(i64),
    /// Text to be parsed; blank text counts as absent.
    Text(String),
}

impl LooseInt {
    /// Resolve to a non-negative integer, `None` when blank.
    pub fn resolve(&self, option: &'static str) -> Result<Option<u64>, DomainError> {
        let value = match self {
            Self::Integer(value) => *value,
            Self::Text(text) if text.trim().is_empty() => return Ok(None),
            Self::Text(text) => {
                text.trim()
                    .parse::<i64>()
                    .map_err(|_| DomainError::InvalidNumber {
                        option,
                        input: text.clone(),
                    })?
            },
        };
        u64::try_from(value)
            .map(Some)
            .map_err(|_| DomainError::NegativeNumber { option, value })
    }
}

impl From<i64> for LooseInt {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for LooseInt {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Raw query options as received from a caller.
///
/// Filters that do not apply to the queried entity are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// 1-based page number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<LooseInt>,
    /// Rows per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<LooseInt>,
    /// Relative lookback in days; `0` counts as absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<LooseInt>,
    /// Inclusive lower time bound.
    #[serde(
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper time bound.
    #[serde(
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<DateTime<Utc>>,
    /// CDR trunk equality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trunk: Option<String>,
    /// CDR direction equality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// CDR answered flag; only `"true"` and `"false"` filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered: Option<String>,
    /// CDR free text matched against `from`, `to` and `call_sid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Alert type equality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_type: Option<String>,
    /// Alert target equality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_sid: Option<String>,
}

impl QueryOptions {
    /// Set the page number.
    #[must_use]
    pub fn with_page(mut self, page: impl Into<LooseInt>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// Set the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: impl Into<LooseInt>) -> Self {
        self.page_size = Some(page_size.into());
        self
    }

    /// Set the relative lookback.
    #[must_use]
    pub fn with_days(mut self, days: impl Into<LooseInt>) -> Self {
        self.days = Some(days.into());
        self
    }

    /// Set the absolute window; either bound may be open.
    #[must_use]
    pub const fn with_window(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Set the CDR trunk filter.
    #[must_use]
    pub fn with_trunk(mut self, trunk: impl Into<String>) -> Self {
        self.trunk = Some(trunk.into());
        self
    }

    /// Set the CDR direction filter.
    #[must_use]
    pub fn with_direction(mut self, direction: impl Into<String>) -> Self {
        self.direction = Some(direction.into());
        self
    }

    /// Set the CDR answered filter.
    #[must_use]
    pub fn with_answered(mut self, answered: impl Into<String>) -> Self {
        self.answered = Some(answered.into());
        self
    }

    /// Set the CDR free-text filter.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set the alert type filter.
    #[must_use]
    pub fn with_alert_type(mut self, alert_type: impl Into<String>) -> Self {
        self.alert_type = Some(alert_type.into());
        self
    }

    /// Set the alert target filter.
    #[must_use]
    pub fn with_target_sid(mut self, target_sid: impl Into<String>) -> Self {
        self.target_sid = Some(target_sid.into());
        self
    }
}

/// Time restriction of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// No restriction.
    Unbounded,
    /// Rows newer than `now - days`.
    LookbackDays(u64),
    /// Absolute bounds, at least one present.
    Range {
        /// Inclusive lower bound.
        start: Option<DateTime<Utc>>,
        /// Inclusive upper bound.
        end: Option<DateTime<Utc>>,
    },
}

/// A validated query for one entity within one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    entity: EntityKind,
    stream: StreamKind,
    scope: Scope,
    page: Option<u64>,
    page_size: Option<u64>,
    window: TimeWindow,
    equality: Vec<(&'static str, String)>,
    text_filter: Option<String>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

impl QuerySpec {
    /// Validate options against the entity and scope.
    pub fn new(
        entity: EntityKind,
        scope: Scope,
        options: &QueryOptions,
    ) -> Result<Self, DomainError> {
        let stream = entity.stream(scope.level())?;
        let page = options
            .page
            .as_ref()
            .map(|page| page.resolve("page"))
            .transpose()?
            .flatten();
        let page_size = options
            .page_size
            .as_ref()
            .map(|size| size.resolve("page_size"))
            .transpose()?
            .flatten();
        let days = options
            .days
            .as_ref()
            .map(|days| days.resolve("days"))
            .transpose()?
            .flatten()
            .filter(|days| *days > 0);

        let window = match (days, options.start, options.end) {
            (Some(days), _, _) => TimeWindow::LookbackDays(days),
            (None, None, None) => TimeWindow::Unbounded,
            (None, start, end) => TimeWindow::Range { start, end },
        };

        let mut equality = Vec::new();
        let mut text_filter = None;
        match entity {
            EntityKind::Cdr => {
                if let Some(trunk) = present(options.trunk.as_deref()) {
                    equality.push(("trunk", trunk.to_owned()));
                }
                if let Some(direction) = present(options.direction.as_deref()) {
                    equality.push(("direction", direction.to_owned()));
                }
                if let Some(answered @ ("true" | "false")) = options.answered.as_deref() {
                    equality.push(("answered", answered.to_owned()));
                }
                text_filter = present(options.filter.as_deref()).map(str::to_owned);
            },
            EntityKind::Alert => {
                if let Some(alert_type) = present(options.alert_type.as_deref()) {
                    equality.push(("alert_type", alert_type.to_owned()));
                }
                if let Some(target_sid) = present(options.target_sid.as_deref()) {
                    equality.push(("target_sid", target_sid.to_owned()));
                }
            },
            EntityKind::CallCount => {},
        }

        Ok(Self {
            entity,
            stream,
            scope,
            page,
            page_size,
            window,
            equality,
            text_filter,
        })
    }

    /// Queried entity.
    #[must_use]
    pub const fn entity(&self) -> EntityKind {
        self.entity
    }

    /// Backing stream.
    #[must_use]
    pub const fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Bound scope.
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Requested page, if any.
    #[must_use]
    pub const fn page(&self) -> Option<u64> {
        self.page
    }

    /// Requested page size, if any.
    #[must_use]
    pub const fn page_size(&self) -> Option<u64> {
        self.page_size
    }

    /// Resolved time window.
    #[must_use]
    pub const fn window(&self) -> TimeWindow {
        self.window
    }

    /// Row offset: `(page - 1) * page_size` for page >= 1 with a size, else 0.
    #[must_use]
    pub fn offset(&self) -> u64 {
        pagination_offset(self.page, self.page_size)
    }

    /// Produce the COUNT and SELECT queries, resolving relative time against `now`.
    pub fn bind(&self, now: DateTime<Utc>) -> Result<BoundQueries, DomainError> {
        let mut predicates = Vec::new();
        let mut params = BTreeMap::new();

        let scope_key = self.scope.level().tag_key();
        predicates.push(Predicate::compare(scope_key, Comparison::Eq, scope_key));
        params.insert(scope_key, ParamValue::Text(self.scope.id().to_owned()));

        for &(column, ref value) in &self.equality {
            predicates.push(Predicate::compare(column, Comparison::Eq, column));
            params.insert(column, ParamValue::Text(value.clone()));
        }

        if let Some(filter) = &self.text_filter {
            predicates.push(Predicate::AnyOf(vec![
                Predicate::compare("from", Comparison::Matches, "filter_pattern"),
                Predicate::compare("to", Comparison::Matches, "filter_pattern"),
                Predicate::compare("call_sid", Comparison::Eq, "filter"),
            ]));
            params.insert("filter_pattern", ParamValue::contains(filter));
            params.insert("filter", ParamValue::Text(filter.clone()));
        }

        match self.window {
            TimeWindow::Unbounded => {},
            TimeWindow::LookbackDays(days) => {
                predicates.push(Predicate::compare("time", Comparison::Gt, "timestamp"));
                params.insert("timestamp", ParamValue::Integer(lookback_boundary(now, days)?));
            },
            TimeWindow::Range { start, end } => {
                if let Some(start) = start {
                    predicates.push(Predicate::compare("time", Comparison::Gte, "start"));
                    params.insert("start", ParamValue::Integer(epoch_nanos(start)?));
                }
                if let Some(end) = end {
                    predicates.push(Predicate::compare("time", Comparison::Lte, "end"));
                    params.insert("end", ParamValue::Integer(epoch_nanos(end)?));
                }
            },
        }

        let schema = self.stream.schema();
        let count = BoundQuery {
            namespace: schema.measurement,
            measurement: schema.measurement,
            projection: Projection::Count(schema.count_field),
            predicates: predicates.clone(),
            order_time_desc: false,
            limit: None,
            offset: None,
            params: params.clone(),
        };
        let select = BoundQuery {
            namespace: schema.measurement,
            measurement: schema.measurement,
            projection: Projection::All,
            predicates,
            order_time_desc: true,
            limit: self.page_size,
            offset: self.page.map(|_| self.offset()),
            params,
        };
        Ok(BoundQueries { count, select })
    }
}

/// Pagination offset rule shared by binder and tests.
#[must_use]
pub fn pagination_offset(page: Option<u64>, page_size: Option<u64>) -> u64 {
    match (page, page_size) {
        (Some(page), Some(size)) if page >= 1 => (page - 1).saturating_mul(size),
        _ => 0,
    }
}

fn epoch_nanos(at: DateTime<Utc>) -> Result<i64, DomainError> {
    at.timestamp_nanos_opt()
        .ok_or_else(|| DomainError::InvalidTimestamp {
            input: at.to_rfc3339(),
        })
}

fn lookback_boundary(now: DateTime<Utc>, days: u64) -> Result<i64, DomainError> {
    let invalid = || DomainError::InvalidNumber {
        option: "days",
        input: days.to_string(),
    };
    let span = i64::try_from(days)
        .ok()
        .and_then(|days| days.checked_mul(NANOS_PER_DAY))
        .ok_or_else(invalid)?;
    epoch_nanos(now)?.checked_sub(span).ok_or_else(invalid)
}

/// Escape regular expression metacharacters so `text` matches literally.
#[must_use]
pub fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(
            ch,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '/'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// COUNT and SELECT for the same predicate chain.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQueries {
    /// Total-count query.
    pub count: BoundQuery,
    /// Page query.
    pub select: BoundQuery,
}

/// Selected columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Every column.
    All,
    /// `COUNT(<field>)`.
    Count(&'static str),
}

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
    /// `=~` against a regex parameter.
    Matches,
}

impl Comparison {
    const fn operator(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Matches => "=~",
        }
    }
}

/// One element of the WHERE chain. Top-level predicates are AND-ed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `<column> <op> $<param>`
    Compare {
        /// Column name.
        column: &'static str,
        /// Operator.
        op: Comparison,
        /// Bound parameter name.
        param: &'static str,
    },
    /// Parenthesised disjunction.
    AnyOf(Vec<Predicate>),
}

impl Predicate {
    const fn compare(column: &'static str, op: Comparison, param: &'static str) -> Self {
        Self::Compare { column, op, param }
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Compare { column, op, param } => {
                out.push_str(&quote_ident(column));
                out.push(' ');
                out.push_str(op.operator());
                out.push_str(" $");
                out.push_str(param);
            },
            Self::AnyOf(alternatives) => {
                out.push('(');
                for (index, alternative) in alternatives.iter().enumerate() {
                    if index > 0 {
                        out.push_str(" OR ");
                    }
                    alternative.render(out);
                }
                out.push(')');
            },
        }
    }
}

/// Regex parameter; the store receives `{"regex": "<pattern>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegexParam {
    /// Anchored-anywhere pattern with the literal escaped.
    pub regex: String,
    /// Literal text the pattern matches.
    #[serde(skip)]
    pub literal: String,
}

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Text parameter.
    Text(String),
    /// Integer parameter (counts, epoch nanoseconds).
    Integer(i64),
    /// Regular expression parameter.
    Pattern(RegexParam),
}

impl ParamValue {
    /// Pattern matching any value that contains `literal`.
    #[must_use]
    pub fn contains(literal: &str) -> Self {
        Self::Pattern(RegexParam {
            regex: format!(".*{}.*", escape_regex(literal)),
            literal: literal.to_owned(),
        })
    }
}

/// A fully bound, structured query against one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    /// Namespace (database) queried.
    pub namespace: &'static str,
    /// Measurement queried.
    pub measurement: &'static str,
    /// Selected columns.
    pub projection: Projection,
    /// AND-ed predicate chain.
    pub predicates: Vec<Predicate>,
    /// Whether rows are ordered newest first.
    pub order_time_desc: bool,
    /// Row limit, bound as `$page_size`.
    pub limit: Option<u64>,
    /// Row offset, bound as `$offset`.
    pub offset: Option<u64>,
    /// Predicate parameters.
    pub params: BTreeMap<&'static str, ParamValue>,
}

impl BoundQuery {
    /// Every bound parameter, pagination included.
    #[must_use]
    pub fn parameters(&self) -> BTreeMap<&'static str, ParamValue> {
        let mut params = self.params.clone();
        if let Some(limit) = self.limit {
            params.insert("page_size", ParamValue::Integer(saturating_i64(limit)));
        }
        if let Some(offset) = self.offset {
            params.insert("offset", ParamValue::Integer(saturating_i64(offset)));
        }
        params
    }

    /// Render the InfluxQL statement; values are referenced as `$name`.
    #[must_use]
    pub fn to_influxql(&self) -> String {
        let mut out = String::from("SELECT ");
        match self.projection {
            Projection::All => out.push('*'),
            Projection::Count(field) => {
                out.push_str("COUNT(");
                out.push_str(&quote_ident(field));
                out.push(')');
            },
        }
        out.push_str(" FROM ");
        out.push_str(&quote_ident(self.measurement));
        for (index, predicate) in self.predicates.iter().enumerate() {
            out.push_str(if index == 0 { " WHERE " } else { " AND " });
            predicate.render(&mut out);
        }
        if self.order_time_desc {
            out.push_str(" ORDER BY time DESC");
        }
        if self.limit.is_some() {
            out.push_str(" LIMIT $page_size");
        }
        if self.offset.is_some() {
            out.push_str(" OFFSET $offset");
        }
        out
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

const KEYWORDS: &[&str] = &[
    "all", "alter", "any", "as", "asc", "begin", "by", "create", "continuous", "database",
    "databases", "default", "delete", "desc", "destinations", "diagnostics", "distinct", "drop",
    "duration", "end", "every", "explain", "field", "for", "from", "grant", "grants", "group",
    "groups", "in", "inf", "insert", "into", "key", "keys", "kill", "limit", "measurement",
    "measurements", "name", "offset", "on", "order", "password", "policies", "policy", "queries",
    "query", "read", "replication", "resample", "retention", "revoke", "select", "series", "set",
    "shard", "shards", "slimit", "soffset", "stats", "subscription", "subscriptions", "tag", "to",
    "user", "users", "values", "where", "with", "write",
];

/// Quote an identifier when it is a keyword or not a bare word.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    let bare = name
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        && !KEYWORDS.contains(&name.to_ascii_lowercase().as_str());
    if bare {
        name.to_owned()
    } else {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default()
    }

    fn account(id: &str) -> Result<Scope, DomainError> {
        Scope::parse(ScopeLevel::Account, id)
    }

    #[test]
    fn cdr_predicates_follow_fixed_order() -> Result<(), DomainError> {
        let options = QueryOptions::default()
            .with_answered("true")
            .with_direction("inbound")
            .with_trunk("twilio")
            .with_filter("1508")
            .with_days(7_i64)
            .with_page(2_i64)
            .with_page_size(25_i64);
        let bound = QuerySpec::new(EntityKind::Cdr, account("yyyy")?, &options)?.bind(now())?;

        assert_eq!(
            bound.select.to_influxql(),
            "SELECT * FROM cdrs WHERE account_sid = $account_sid AND trunk = $trunk \
             AND direction = $direction AND answered = $answered \
             AND (\"from\" =~ $filter_pattern OR \"to\" =~ $filter_pattern OR call_sid = $filter) \
             AND time > $timestamp ORDER BY time DESC LIMIT $page_size OFFSET $offset"
        );
        assert_eq!(
            bound.count.to_influxql(),
            "SELECT COUNT(sip_callid) FROM cdrs WHERE account_sid = $account_sid AND trunk = $trunk \
             AND direction = $direction AND answered = $answered \
             AND (\"from\" =~ $filter_pattern OR \"to\" =~ $filter_pattern OR call_sid = $filter) \
             AND time > $timestamp"
        );
        let params = bound.select.parameters();
        assert_eq!(params.get("offset"), Some(&ParamValue::Integer(25)));
        assert_eq!(
            params.get("timestamp"),
            Some(&ParamValue::Integer(1_700_000_000_000_000_000 - 7 * NANOS_PER_DAY))
        );
        Ok(())
    }

    #[test]
    fn alert_filters_bind_type_then_target() -> Result<(), DomainError> {
        let options = QueryOptions::default()
            .with_target_sid("CA-1")
            .with_alert_type("webhook-failure")
            .with_trunk("ignored");
        let spec = QuerySpec::new(
            EntityKind::Alert,
            Scope::parse(ScopeLevel::ServiceProvider, "sp")?,
            &options,
        )?;
        let select = spec.bind(now())?.select;
        assert_eq!(
            select.to_influxql(),
            "SELECT * FROM alerts WHERE service_provider_sid = $service_provider_sid \
             AND alert_type = $alert_type AND target_sid = $target_sid ORDER BY time DESC"
        );
        Ok(())
    }

    #[test]
    fn answered_filter_requires_exact_boolean_text() -> Result<(), DomainError> {
        let options = QueryOptions::default().with_answered("yes");
        let spec = QuerySpec::new(EntityKind::Cdr, account("a")?, &options)?;
        assert!(!spec.bind(now())?.select.params.contains_key("answered"));
        Ok(())
    }

    #[test]
    fn relative_days_take_precedence_over_range() -> Result<(), DomainError> {
        let options = QueryOptions::default()
            .with_days("3")
            .with_window(Some(now()), Some(now()));
        let spec = QuerySpec::new(EntityKind::CallCount, account("a")?, &options)?;
        assert_eq!(spec.window(), TimeWindow::LookbackDays(3));

        let zero_days = QueryOptions::default()
            .with_days(0_i64)
            .with_window(Some(now()), None);
        let spec = QuerySpec::new(EntityKind::CallCount, account("a")?, &zero_days)?;
        let select = spec.bind(now())?.select;
        assert!(select.to_influxql().ends_with("AND time >= $start ORDER BY time DESC"));
        assert_eq!(
            select.params.get("start"),
            Some(&ParamValue::Integer(1_700_000_000_000_000_000))
        );
        Ok(())
    }

    #[test]
    fn loose_integers_parse_text_and_reject_garbage() {
        assert_eq!(LooseInt::from("25").resolve("page_size"), Ok(Some(25)));
        assert_eq!(LooseInt::from("  ").resolve("page_size"), Ok(None));
        assert!(matches!(
            LooseInt::from("ten").resolve("page"),
            Err(DomainError::InvalidNumber { option: "page", .. })
        ));
        assert_eq!(
            LooseInt::from(-1_i64).resolve("days"),
            Err(DomainError::NegativeNumber {
                option: "days",
                value: -1
            })
        );
    }

    #[test]
    fn options_deserialize_from_mixed_json() -> Result<(), Box<dyn std::error::Error>> {
        let options: QueryOptions = serde_json::from_value(serde_json::json!({
            "page": "1",
            "page_size": 25,
            "start": "2024-01-01T00:00:00Z",
            "end": ""
        }))?;
        let spec = QuerySpec::new(EntityKind::Cdr, account("a")?, &options)?;
        assert_eq!(spec.page(), Some(1));
        assert_eq!(spec.page_size(), Some(25));
        assert!(matches!(
            spec.window(),
            TimeWindow::Range {
                start: Some(_),
                end: None
            }
        ));
        Ok(())
    }

    #[test]
    fn application_scope_only_serves_call_counts() -> Result<(), DomainError> {
        let scope = Scope::parse(ScopeLevel::Application, "app")?;
        assert!(matches!(
            QuerySpec::new(EntityKind::Cdr, scope.clone(), &QueryOptions::default()),
            Err(DomainError::UnsupportedScope { .. })
        ));
        let spec = QuerySpec::new(EntityKind::CallCount, scope, &QueryOptions::default())?;
        assert_eq!(spec.stream(), StreamKind::AppCallCounts);
        Ok(())
    }

    #[test]
    fn page_without_size_only_offsets_by_zero() -> Result<(), DomainError> {
        let options = QueryOptions::default().with_page(3_i64);
        let select = QuerySpec::new(EntityKind::Alert, account("a")?, &options)?
            .bind(now())?
            .select;
        assert!(select.limit.is_none());
        assert_eq!(select.offset, Some(0));
        Ok(())
    }

    #[test]
    fn pattern_params_serialize_as_regex_objects() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(ParamValue::contains("+1 (508)"))?;
        assert_eq!(value, serde_json::json!({ "regex": ".*\\+1 \\(508\\).*" }));
        Ok(())
    }

    #[test]
    fn identifiers_are_quoted_only_when_needed() {
        assert_eq!(quote_ident("sip_callid"), "sip_callid");
        assert_eq!(quote_ident("from"), "\"from\"");
        assert_eq!(quote_ident("weird name"), "\"weird name\"");
    }

    proptest! {
        #[test]
        fn offset_matches_page_arithmetic(page in 0u64..10_000, size in 0u64..10_000) {
            let expected = if page >= 1 { (page - 1) * size } else { 0 };
            prop_assert_eq!(pagination_offset(Some(page), Some(size)), expected);
            prop_assert_eq!(pagination_offset(Some(page), None), 0);
        }

        #[test]
        fn escaped_text_contains_no_bare_metacharacters(text in ".{0,40}") {
            let escaped = escape_regex(&text);
            let mut chars = escaped.chars();
            while let Some(ch) = chars.next() {
                if ch == '\\' {
                    prop_assert!(chars.next().is_some());
                } else {
                    let metacharacters = ".+*?()|[]{}^$/";
                    prop_assert!(!metacharacters.contains(ch));
                }
            }
        }
    }
}
