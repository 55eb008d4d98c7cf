//! Integration tests for parsing config fixtures from the workspace testkit.

use call_telemetry_config::{
    CURRENT_CONFIG_VERSION, StoreProvider, TelemetryConfig, parse_telemetry_config_json,
    parse_telemetry_config_toml, to_pretty_json,
};
use call_telemetry_domain::{FailurePolicy, OverflowPolicy};
use call_telemetry_shared::ErrorCode;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| manifest_dir.to_path_buf())
}

fn read_fixture(relative: &str) -> Result<String, Box<dyn Error>> {
    let path = workspace_root()
        .join("crates")
        .join("testkit")
        .join("fixtures")
        .join(relative);
    Ok(fs::read_to_string(path)?)
}

#[test]
fn parses_valid_fixture_and_normalizes() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/telemetry-config.valid.json")?;
    let config = parse_telemetry_config_json(&contents)?;

    assert_eq!(config.version, CURRENT_CONFIG_VERSION);
    assert_eq!(config.store.provider, StoreProvider::Influx);
    assert_eq!(config.store.url, "http://influx.internal:8086");
    assert_eq!(config.store.username.as_deref(), Some("telemetry"));
    assert_eq!(config.limits().store_timeout_ms.get(), 5_000);
    assert_eq!(config.limits().commit_size.get(), 500);
    assert_eq!(config.buffer.overflow_policy, OverflowPolicy::DropNewest);
    assert_eq!(config.buffer.failure_policy, FailurePolicy::Retain);

    let rendered = to_pretty_json(&config)?;
    assert!(!rendered.contains("s3cret"));
    Ok(())
}

#[test]
fn parses_default_toml_fixture() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/telemetry-config.default.toml")?;
    let config = parse_telemetry_config_toml(&contents)?;

    assert_eq!(config.into_inner(), TelemetryConfig::default());
    Ok(())
}

#[test]
fn rejects_unsupported_version() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/telemetry-config.invalid-version.json")?;
    let error = parse_telemetry_config_json(&contents).err();

    let envelope = error.ok_or_else(|| std::io::Error::other("expected version error"))?;
    assert_eq!(envelope.code, ErrorCode::new("config", "unsupported_version"));
    assert_eq!(envelope.metadata_value("found"), Some("2"));
    Ok(())
}
