//! Exit code E2E tests.

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

#[test]
fn malformed_payload_exits_with_invalid_input() -> std::io::Result<()> {
    let output = run_cli(&["write", "alert", "--json", "{not json"], &[])?;
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stdout).contains("ERR_CLI_INVALID_PAYLOAD"));
    Ok(())
}

#[test]
fn empty_payload_exits_with_invalid_input() -> std::io::Result<()> {
    let output = run_cli(&["write", "cdr", "--json", "   "], &[])?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

#[test]
fn unreachable_store_exits_with_io_error() -> std::io::Result<()> {
    let output = run_cli(
        &[
            "--output",
            "json",
            "write",
            "system-alert",
            "--json",
            r#"{"system_component": "rtpengine", "state": "down", "host": "fs-1"}"#,
        ],
        &[
            ("CTEL_STORE_URL", "http://127.0.0.1:9"),
            ("CTEL_STORE_TIMEOUT_MS", "500"),
        ],
    )?;
    assert_eq!(output.status.code(), Some(3));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(std::io::Error::other)?;
    assert_eq!(value.get("status").and_then(serde_json::Value::as_str), Some("error"));
    Ok(())
}

#[test]
fn missing_config_file_exits_with_io_error() -> std::io::Result<()> {
    let output = run_cli(
        &["config", "validate", "--config", "/nonexistent/ctel/config.toml"],
        &[],
    )?;
    assert_eq!(output.status.code(), Some(3));
    Ok(())
}

#[test]
fn blank_scope_id_exits_with_invalid_input() -> std::io::Result<()> {
    let output = run_cli(
        &["query", "cdrs", "--scope", "account", "--id", " "],
        &[("CTEL_STORE_URL", "http://127.0.0.1:9")],
    )?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

#[test]
fn unknown_subcommand_is_a_usage_error() -> std::io::Result<()> {
    let output = run_cli(&["frobnicate"], &[])?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}
