//! Time-series store adapters.

#[cfg(feature = "influx")]
pub mod influx;

#[cfg(feature = "influx")]
pub use influx::{InfluxRestConfig, InfluxStoreGateway};
