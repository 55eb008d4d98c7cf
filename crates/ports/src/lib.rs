//! # call-telemetry-ports
//!
//! Port traits for the call-telemetry hexagonal architecture.
//!
//! This crate defines the interfaces between the application layer and the
//! adapters: the time-series store, logging, telemetry and the clock. It
//! depends only on `domain` and `shared`.

use std::future::Future;
use std::pin::Pin;

/// Boxed future used by port traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub mod clock;
pub mod logger;
pub mod store;
pub mod telemetry;

pub use clock::*;
pub use logger::*;
pub use store::*;
pub use telemetry::*;

// Re-export domain types used in port signatures, so adapter crates can
// implement ports without naming `call-telemetry-domain` for them.
pub use call_telemetry_domain::{BoundQuery, TelemetryPoint};
