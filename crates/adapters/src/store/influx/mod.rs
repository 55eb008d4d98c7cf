//! InfluxDB 1.x HTTP API adapter.
//!
//! Each stream lives in its own database. Writes use the line protocol at
//! nanosecond precision; queries are sent as InfluxQL with bound parameters.

mod auth;
pub mod error;
pub mod line_protocol;
mod rest;

pub use rest::{InfluxRestConfig, InfluxStoreGateway};
