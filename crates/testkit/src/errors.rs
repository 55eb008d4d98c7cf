//! Test fixtures for shared and store error envelopes.

use call_telemetry_ports::StoreErrorKind;
use call_telemetry_shared::{ErrorClass, ErrorCode, ErrorEnvelope};

/// Return a list of common error codes used in tests.
pub fn common_error_codes() -> Vec<ErrorCode> {
    vec![
        ErrorCode::cancelled(),
        ErrorCode::invalid_input(),
        ErrorCode::timeout(),
        ErrorCode::internal(),
        StoreErrorKind::Initialization.error_code(),
        StoreErrorKind::Write.error_code(),
        StoreErrorKind::Query.error_code(),
    ]
}

/// A cancellation error fixture.
pub fn cancelled_error() -> ErrorEnvelope {
    ErrorEnvelope::cancelled("cancelled")
}

/// A store outage, as an HTTP adapter reports a 503.
pub fn store_unavailable_error() -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("influx", "unavailable"),
        "service unavailable",
        ErrorClass::Retriable,
    )
    .with_metadata("httpStatus", "503")
}

/// A rejected-credentials failure.
pub fn store_auth_error() -> ErrorEnvelope {
    ErrorEnvelope::expected(ErrorCode::new("influx", "auth"), "authorization failed")
        .with_metadata("httpStatus", "401")
}
