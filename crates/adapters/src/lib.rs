//! # call-telemetry-adapters
//!
//! Adapter implementations for ports (InfluxDB store, JSON logger,
//! telemetry, clock). This crate depends on `ports`, `shared`, `domain`
//! and `config`.

pub mod clock;
pub mod log_sink;
pub mod logger;
pub mod store;
pub mod telemetry;

pub use clock::SystemClock;
pub use log_sink::{LogSink, MemoryLogSink, StderrLogSink};
pub use logger::JsonLogger;
#[cfg(feature = "influx")]
pub use store::{InfluxRestConfig, InfluxStoreGateway};
pub use telemetry::{JsonTelemetry, TaggedTelemetry};

#[cfg(test)]
mod tests {
    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]" || line == "[dev-dependencies]";
                continue;
            }
            if in_deps && line.starts_with("call-telemetry-") {
                let key = line.split('=').next().unwrap_or("").trim();
                let name = key.split('.').next().unwrap_or("").trim();
                deps.push(name.to_string());
            }
        }

        deps
    }

    #[test]
    fn adapters_do_not_depend_on_app_or_infra() {
        let forbidden = ["call-telemetry-app", "call-telemetry-infra"];
        for dep in &workspace_deps() {
            assert!(
                !forbidden.contains(&dep.as_str()),
                "forbidden dependency found: {dep}"
            );
        }
    }

    #[test]
    fn adapters_reach_ports_and_shared() {
        let deps = workspace_deps();
        assert!(deps.iter().any(|dep| dep == "call-telemetry-ports"));
        assert!(deps.iter().any(|dep| dep == "call-telemetry-shared"));
    }
}
