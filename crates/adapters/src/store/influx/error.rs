//! InfluxDB error mapping helpers.

use call_telemetry_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use serde::Deserialize;

/// Context attached to InfluxDB error envelopes.
#[derive(Debug, Clone)]
pub struct InfluxErrorContext {
    /// Operation label (`influx.bulk_write`, ...).
    pub operation: &'static str,
    /// Database the request targeted, when scoped.
    pub namespace: Option<String>,
    /// Endpoint path (`/write`, `/query`).
    pub endpoint: &'static str,
}

impl InfluxErrorContext {
    /// Context for a request against `endpoint`.
    #[must_use]
    pub fn new(operation: &'static str, endpoint: &'static str, namespace: Option<&str>) -> Self {
        Self {
            operation,
            namespace: namespace.map(ToOwned::to_owned),
            endpoint,
        }
    }

    fn decorate(&self, envelope: ErrorEnvelope) -> ErrorEnvelope {
        envelope
            .with_metadata("provider", "influx")
            .with_metadata("operation", self.operation)
            .with_metadata("endpoint", self.endpoint)
            .with_optional_metadata("namespace", self.namespace.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Map a non-2xx response into an envelope.
///
/// 401/403 are non-retriable auth failures; 408, 429 and 5xx are retriable.
pub fn map_http_error(status: u16, body: &str, ctx: &InfluxErrorContext) -> ErrorEnvelope {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .unwrap_or_else(|| body.trim().to_owned());
    let (code, class) = match status {
        401 | 403 => (auth_code(), ErrorClass::NonRetriable),
        408 | 504 => (timeout_code(), ErrorClass::Retriable),
        429 | 500..=599 => (unavailable_code(), ErrorClass::Retriable),
        _ => (request_code(), ErrorClass::NonRetriable),
    };

    ctx.decorate(ErrorEnvelope::unexpected(
        code,
        format!("InfluxDB HTTP {status}: {detail}"),
        class,
    ))
    .with_metadata("httpStatus", status.to_string())
}

/// Map a statement-level `error` returned with HTTP 200.
pub fn map_statement_error(message: &str, ctx: &InfluxErrorContext) -> ErrorEnvelope {
    let code = if message.contains("authorization") || message.contains("authenticat") {
        auth_code()
    } else {
        ErrorCode::new("influx", "statement_error")
    };
    ctx.decorate(ErrorEnvelope::unexpected(
        code,
        format!("InfluxDB statement failed: {message}"),
        ErrorClass::NonRetriable,
    ))
}

/// Map a reqwest transport failure.
pub fn map_transport_error(error: &reqwest::Error, ctx: &InfluxErrorContext) -> ErrorEnvelope {
    let (code, class, message) = if error.is_timeout() {
        (
            timeout_code(),
            ErrorClass::Retriable,
            format!("InfluxDB request timed out: {error}"),
        )
    } else if error.is_connect() {
        (
            connection_code(),
            ErrorClass::Retriable,
            format!("InfluxDB connection failed: {error}"),
        )
    } else {
        (
            request_code(),
            ErrorClass::NonRetriable,
            format!("InfluxDB request failed: {error}"),
        )
    };
    ctx.decorate(ErrorEnvelope::unexpected(code, message, class))
}

/// Per-request deadline elapsed.
pub fn timeout_error(ctx: &InfluxErrorContext) -> ErrorEnvelope {
    ctx.decorate(ErrorEnvelope::unexpected(
        timeout_code(),
        "InfluxDB request timed out",
        ErrorClass::Retriable,
    ))
}

/// Response body could not be decoded.
pub fn invalid_response_error(message: impl Into<String>, ctx: &InfluxErrorContext) -> ErrorEnvelope {
    ctx.decorate(ErrorEnvelope::unexpected(
        ErrorCode::new("influx", "invalid_response"),
        message,
        ErrorClass::NonRetriable,
    ))
}

/// The request's context was cancelled.
pub fn cancelled_error(ctx: &InfluxErrorContext) -> ErrorEnvelope {
    ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", ctx.operation)
}

fn auth_code() -> ErrorCode {
    ErrorCode::new("influx", "auth")
}

fn timeout_code() -> ErrorCode {
    ErrorCode::new("influx", "timeout")
}

fn connection_code() -> ErrorCode {
    ErrorCode::new("influx", "connection")
}

fn unavailable_code() -> ErrorCode {
    ErrorCode::new("influx", "unavailable")
}

fn request_code() -> ErrorCode {
    ErrorCode::new("influx", "request_failed")
}
