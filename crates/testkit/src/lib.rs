//! # call-telemetry-testkit
//!
//! Test helpers and in-memory adapters.
//! This crate depends on `ports`, `domain` and `shared`.

pub mod errors;
pub mod fixtures;
pub mod in_memory;

pub use in_memory::{
    FixedClock, InMemoryStoreGateway, NoopLogger, NoopTelemetry, RecordedWrite, RecordingLogger,
    RecordingTelemetry, StoreOperation,
};
