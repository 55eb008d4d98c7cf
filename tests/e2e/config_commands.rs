//! Config command E2E tests.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn run_cli(args: &[&str], envs: &[(&str, &str)]) -> std::io::Result<Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ctel"));
    command.args(args);
    for (key, _) in std::env::vars() {
        if key.starts_with("CTEL_") {
            command.env_remove(key);
        }
    }
    command.envs(envs.iter().copied());
    command.output()
}

fn fixture(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../crates/testkit/fixtures")
        .join(relative)
}

fn json_stdout(output: &Output) -> std::io::Result<serde_json::Value> {
    serde_json::from_slice(&output.stdout).map_err(std::io::Error::other)
}

#[test]
fn defaults_validate_without_a_file() -> std::io::Result<()> {
    let output = run_cli(&["--output", "json", "config", "validate"], &[])?;
    assert_eq!(output.status.code(), Some(0));
    let value = json_stdout(&output)?;
    assert_eq!(value.get("status").and_then(serde_json::Value::as_str), Some("ok"));
    Ok(())
}

#[test]
fn unsupported_version_is_invalid_input() -> std::io::Result<()> {
    let path = fixture("config/telemetry-config.invalid-version.json");
    let output = run_cli(
        &[
            "--output",
            "json",
            "config",
            "validate",
            "--config",
            path.to_string_lossy().as_ref(),
        ],
        &[],
    )?;
    assert_eq!(output.status.code(), Some(2));
    let value = json_stdout(&output)?;
    assert_eq!(
        value.pointer("/error/code").and_then(serde_json::Value::as_str),
        Some("ERR_CONFIG_UNSUPPORTED_VERSION")
    );
    Ok(())
}

#[test]
fn host_shorthand_expands_to_url() -> std::io::Result<()> {
    let output = run_cli(
        &["--output", "json", "config", "show"],
        &[("CTEL_STORE_HOST", "tsdb")],
    )?;
    assert_eq!(output.status.code(), Some(0));
    let value = json_stdout(&output)?;
    assert_eq!(
        value
            .pointer("/effectiveConfig/store/url")
            .and_then(serde_json::Value::as_str),
        Some("http://tsdb:8086")
    );
    Ok(())
}

#[test]
fn malformed_env_int_is_rejected() -> std::io::Result<()> {
    let output = run_cli(&["config", "validate"], &[("CTEL_COMMIT_SIZE", "many")])?;
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("status: error"));
    assert!(stdout.contains("ERR_CONFIG_INVALID_ENV_INT"));
    Ok(())
}

#[test]
fn capacity_below_commit_size_is_rejected() -> std::io::Result<()> {
    let output = run_cli(
        &[
            "config",
            "validate",
            "--overrides-json",
            r#"{"buffer": {"commitSize": 500, "capacity": 100}}"#,
        ],
        &[],
    )?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}
