//! # call-telemetry-shared
//!
//! Foundational types used by every crate in the call-telemetry workspace:
//!
//! - the `ErrorEnvelope` error currency and `Result` alias
//! - request context (correlation ids, cancellation) and deadlines
//! - bounded integers for validated settings
//! - secret redaction
//!
//! This crate has no workspace dependencies.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod concurrency;
pub mod errors;
pub mod invariants;
pub mod redaction;
pub mod result;
pub mod timeout;

pub use concurrency::{CancellationToken, CorrelationId, RequestContext};
pub use errors::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind};
pub use invariants::{BoundedU32, BoundedU64, BoundedUsize, BoundsError};
pub use redaction::{REDACTED, SecretString, is_secret_key, redact_if_secret};
pub use result::{Result, ResultExt};
pub use timeout::timeout_with_context;
