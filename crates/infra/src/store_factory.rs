//! Store gateway selection and initialization.

use crate::InfraResult;
use call_telemetry_config::{StoreProvider, ValidatedTelemetryConfig};
use call_telemetry_ports::StoreGatewayPort;
use std::sync::Arc;

#[cfg(feature = "influx")]
use call_telemetry_adapters::{InfluxRestConfig, InfluxStoreGateway};

/// Build the store gateway named by the config.
pub fn build_store_gateway(
    config: &ValidatedTelemetryConfig,
) -> InfraResult<Arc<dyn StoreGatewayPort>> {
    match config.store.provider {
        StoreProvider::Influx => build_influx(config),
    }
}

#[cfg(feature = "influx")]
fn build_influx(config: &ValidatedTelemetryConfig) -> InfraResult<Arc<dyn StoreGatewayPort>> {
    let rest = InfluxRestConfig::from_store_config(&config.store);
    let gateway = InfluxStoreGateway::new(&rest)?;
    tracing::debug!(url = %config.store.url, "influx store gateway ready");
    Ok(Arc::new(gateway))
}

#[cfg(not(feature = "influx"))]
fn build_influx(_config: &ValidatedTelemetryConfig) -> InfraResult<Arc<dyn StoreGatewayPort>> {
    Err(call_telemetry_shared::ErrorEnvelope::expected(
        call_telemetry_shared::ErrorCode::invalid_input(),
        "influx store adapter is not enabled in this build",
    )
    .with_metadata("provider", StoreProvider::Influx.as_str()))
}

#[cfg(all(test, feature = "influx"))]
mod tests {
    use super::*;
    use call_telemetry_config::TelemetryConfig;

    #[test]
    fn default_config_builds_influx_gateway() -> InfraResult<()> {
        let config = TelemetryConfig::from_host("influx.internal").validate_and_normalize()?;
        let gateway = build_store_gateway(&config)?;
        assert_eq!(gateway.provider_id(), "influx");
        Ok(())
    }
}
