//! CLI integration tests.

use std::path::Path;
use std::process::Command;

fn run_cli(args: &[&str]) -> std::io::Result<std::process::Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ctel"));
    command.args(args);
    scrub_scoped_env(&mut command);
    command.output()
}

fn scrub_scoped_env(command: &mut Command) {
    for (key, _) in std::env::vars() {
        if key.starts_with("CTEL_") {
            command.env_remove(key);
        }
    }
    command.env_remove("RUST_LOG");
}

fn fixture_path(relative: &str) -> std::path::PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(Path::parent)
        .map_or_else(|| manifest_dir.to_path_buf(), Path::to_path_buf)
        .join("crates")
        .join("testkit")
        .join("fixtures")
        .join(relative)
}

fn parse_stdout(output: &std::process::Output) -> std::io::Result<serde_json::Value> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).map_err(std::io::Error::other)
}

#[test]
fn cli_version_runs() -> std::io::Result<()> {
    let output = run_cli(&["--version"])?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.starts_with("ctel "));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_alert_types_lists_codes() -> std::io::Result<()> {
    let output = run_cli(&["--output", "json", "alert-types"])?;
    assert!(output.status.success());

    let value = parse_stdout(&output)?;
    let codes: Vec<&str> = value
        .get("alertTypes")
        .and_then(serde_json::Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("code").and_then(serde_json::Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(codes.len(), 20);
    assert!(codes.contains(&"webhook-failure"));
    Ok(())
}

#[test]
fn cli_config_schema_is_json() -> std::io::Result<()> {
    let output = run_cli(&["config", "schema"])?;
    assert!(output.status.success());

    let schema = parse_stdout(&output)?;
    assert!(schema.get("properties").is_some());
    Ok(())
}

#[test]
fn cli_config_validate_accepts_toml_fixture() -> std::io::Result<()> {
    let path = fixture_path("config/telemetry-config.default.toml");
    let output = run_cli(&[
        "config",
        "validate",
        "--config",
        path.to_string_lossy().as_ref(),
    ])?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "config validate failed: {stderr}");
    assert!(stdout.contains("status: ok"));
    Ok(())
}

#[test]
fn cli_config_show_redacts_password() -> std::io::Result<()> {
    let path = fixture_path("config/telemetry-config.valid.json");
    let output = run_cli(&[
        "--output",
        "json",
        "config",
        "show",
        "--config",
        path.to_string_lossy().as_ref(),
    ])?;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("s3cret"));
    let value = parse_stdout(&output)?;
    assert_eq!(
        value
            .pointer("/effectiveConfig/store/url")
            .and_then(serde_json::Value::as_str),
        Some("http://influx.internal:8086")
    );
    Ok(())
}

#[test]
fn cli_env_overrides_win_over_file() -> std::io::Result<()> {
    let path = fixture_path("config/telemetry-config.valid.json");
    let output = Command::new(env!("CARGO_BIN_EXE_ctel"))
        .args(["--output", "json", "--quiet", "config", "show", "--config"])
        .arg(path)
        .env("CTEL_COMMIT_SIZE", "25")
        .output()?;
    assert!(output.status.success());

    let value = parse_stdout(&output)?;
    assert_eq!(
        value
            .pointer("/effectiveConfig/buffer/commitSize")
            .and_then(serde_json::Value::as_u64),
        Some(25)
    );
    Ok(())
}

#[test]
fn cli_quiet_suppresses_progress_lines() -> std::io::Result<()> {
    let output = run_cli(&["--quiet", "config", "validate"])?;
    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stderr).contains("info:"));
    Ok(())
}
