//! Config inspection commands.

use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, to_json_line};
use crate::{CliOutput, collect_scoped_env, format_error_output, infra_exit_code, log_info};
use call_telemetry_facade::{config_schema_json, load_effective_config_json};
use std::path::Path;

const ENV_PREFIX: &str = "CTEL_";

/// Print the effective config (file, overrides and `CTEL_*` env merged).
pub fn run_config_show(
    mode: OutputMode,
    path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<CliOutput, CliError> {
    let env = collect_scoped_env(ENV_PREFIX);
    let config_json = match load_effective_config_json(&env, path, overrides_json) {
        Ok(config) => config,
        Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    };

    let mut stderr = String::new();
    log_info(&mut stderr, "config show completed", mode.quiet);

    let stdout = if mode.is_json() {
        let config_value: serde_json::Value = serde_json::from_str(config_json.trim())?;
        to_json_line(&serde_json::json!({
            "status": "ok",
            "configPath": path.map(|value| value.to_string_lossy().to_string()),
            "effectiveConfig": config_value,
        }))?
    } else {
        let mut out = String::from("status: ok\nconfig:\n");
        out.push_str(&config_json);
        out
    };

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

/// Validate the effective config without printing it.
pub fn run_config_validate(
    mode: OutputMode,
    path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<CliOutput, CliError> {
    let env = collect_scoped_env(ENV_PREFIX);
    if let Err(error) = load_effective_config_json(&env, path, overrides_json) {
        return Ok(format_error_output(mode, &error, infra_exit_code(&error)));
    }

    let mut stderr = String::new();
    log_info(&mut stderr, "config validate completed", mode.quiet);

    let stdout = if mode.is_json() {
        to_json_line(&serde_json::json!({
            "status": "ok",
            "configPath": path.map(|value| value.to_string_lossy().to_string()),
        }))?
    } else {
        path.map_or_else(
            || "status: ok\nconfig: ok\n".to_string(),
            |path| format!("status: ok\nconfig: ok\npath: {}\n", path.to_string_lossy()),
        )
    };

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

/// Print the JSON schema of the config file.
pub fn run_config_schema(mode: OutputMode) -> Result<CliOutput, CliError> {
    let schema = match config_schema_json() {
        Ok(schema) => schema,
        Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    };
    let mut stdout = schema;
    stdout.push('\n');
    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}
