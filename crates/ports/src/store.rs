//! Time-series store boundary contract.

use crate::BoxFuture;
use call_telemetry_domain::{BoundQuery, TelemetryPoint};
use call_telemetry_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::Value;

/// Stage of the store interaction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// Listing or creating a namespace failed.
    Initialization,
    /// A bulk write was rejected.
    Write,
    /// A query was rejected or malformed.
    Query,
}

impl StoreErrorKind {
    /// Stable error code for this stage.
    #[must_use]
    pub fn error_code(self) -> ErrorCode {
        match self {
            Self::Initialization => ErrorCode::new("store", "initialization_failed"),
            Self::Write => ErrorCode::new("store", "write_failed"),
            Self::Query => ErrorCode::new("store", "query_failed"),
        }
    }

    /// Classify an envelope produced by [`Self::wrap`] or [`Self::error`].
    #[must_use]
    pub fn of(error: &ErrorEnvelope) -> Option<Self> {
        [Self::Initialization, Self::Write, Self::Query]
            .into_iter()
            .find(|kind| kind.error_code() == error.code)
    }

    /// Non-retriable failure raised directly at this stage.
    pub fn error(self, message: impl Into<String>) -> ErrorEnvelope {
        ErrorEnvelope::expected(self.error_code(), message)
    }

    /// Re-code an underlying failure as this stage.
    ///
    /// Retry class, kind and metadata are kept; the original code moves to the
    /// `cause` metadata entry. Cancellations and already-classified store
    /// errors pass through untouched.
    #[must_use]
    pub fn wrap(self, source: ErrorEnvelope) -> ErrorEnvelope {
        if source.is_cancelled() || Self::of(&source).is_some() {
            return source;
        }
        let cause = source.code.to_string();
        ErrorEnvelope {
            kind: source.kind,
            class: source.class,
            code: self.error_code(),
            message: source.message,
            metadata: source.metadata,
        }
        .with_metadata("cause", cause)
    }
}

/// One series of a query response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuerySeries {
    /// Measurement name.
    pub name: Box<str>,
    /// Column names, `time` first.
    pub columns: Vec<Box<str>>,
    /// Rows aligned with `columns`.
    pub values: Vec<Vec<Value>>,
}

/// Raw response of a query: zero or more series.
///
/// A query matching nothing returns no series at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResponse {
    /// Returned series.
    pub series: Vec<QuerySeries>,
}

impl QueryResponse {
    /// First series, if any rows matched.
    #[must_use]
    pub fn first_series(&self) -> Option<&QuerySeries> {
        self.series.first()
    }

    /// Value of a COUNT query: second column of the first row of the first
    /// series, or 0 when no series came back.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.first_series()
            .and_then(|series| series.values.first())
            .and_then(|row| row.get(1))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

/// Boundary contract for the time-series store.
pub trait StoreGatewayPort: Send + Sync {
    /// Stable provider identifier (`influx`, `memory`, ...).
    fn provider_id(&self) -> &str;

    /// List existing namespaces.
    fn list_namespaces(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<Vec<Box<str>>>>;

    /// Return true when the namespace exists.
    fn namespace_exists(
        &self,
        ctx: &RequestContext,
        namespace: Box<str>,
    ) -> BoxFuture<'_, Result<bool>> {
        let listed = self.list_namespaces(ctx);
        Box::pin(async move { Ok(listed.await?.contains(&namespace)) })
    }

    /// Create a namespace; creating an existing one is not an error.
    fn create_namespace(
        &self,
        ctx: &RequestContext,
        namespace: Box<str>,
    ) -> BoxFuture<'_, Result<()>>;

    /// Write all points in one request.
    fn bulk_write(
        &self,
        ctx: &RequestContext,
        namespace: Box<str>,
        points: Vec<TelemetryPoint>,
    ) -> BoxFuture<'_, Result<()>>;

    /// Execute a bound query.
    fn query(&self, ctx: &RequestContext, query: BoundQuery)
    -> BoxFuture<'_, Result<QueryResponse>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_telemetry_shared::{ErrorClass, ErrorKind};

    #[test]
    fn wrap_keeps_class_and_metadata() {
        let source = ErrorEnvelope::unexpected(
            ErrorCode::new("influx", "transport"),
            "connection refused",
            ErrorClass::Retriable,
        )
        .with_metadata("endpoint", "/write");

        let wrapped = StoreErrorKind::Write.wrap(source);
        assert_eq!(wrapped.code.to_string(), "store:write_failed");
        assert_eq!(wrapped.class, ErrorClass::Retriable);
        assert_eq!(wrapped.kind, ErrorKind::Unexpected);
        assert_eq!(wrapped.metadata_value("endpoint"), Some("/write"));
        assert_eq!(wrapped.metadata_value("cause"), Some("influx:transport"));
        assert_eq!(StoreErrorKind::of(&wrapped), Some(StoreErrorKind::Write));
    }

    #[test]
    fn wrap_passes_cancellation_and_store_errors_through() {
        let cancelled = ErrorEnvelope::cancelled("stop");
        assert!(StoreErrorKind::Query.wrap(cancelled).is_cancelled());

        let init = StoreErrorKind::Initialization.error("create failed");
        let rewrapped = StoreErrorKind::Write.wrap(init);
        assert_eq!(StoreErrorKind::of(&rewrapped), Some(StoreErrorKind::Initialization));
    }

    #[test]
    fn count_reads_second_column_or_zero() {
        assert_eq!(QueryResponse::default().count(), 0);
        let response = QueryResponse {
            series: vec![QuerySeries {
                name: "alerts".into(),
                columns: vec!["time".into(), "count".into()],
                values: vec![vec![Value::from("1970-01-01T00:00:00Z"), Value::from(11)]],
            }],
        };
        assert_eq!(response.count(), 11);
    }
}
