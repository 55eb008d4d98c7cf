//! Write commands: one JSON record or an array of records.

use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, to_json_line};
use crate::{CliOutput, format_error_output, infra_exit_code, log_info};
use call_telemetry_facade::{WriteKind, WriteSummary, parse_write_payload, run_write_local};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Where the JSON payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    /// Given on the command line.
    Inline(String),
    /// Read from a file.
    File(PathBuf),
    /// Read from stdin.
    Stdin,
}

impl PayloadSource {
    fn read(&self) -> Result<String, CliError> {
        let text = match self {
            Self::Inline(text) => text.clone(),
            Self::File(path) => std::fs::read_to_string(path)?,
            Self::Stdin => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            },
        };
        if text.trim().is_empty() {
            return Err(CliError::InvalidInput("payload is empty".to_string()));
        }
        Ok(text)
    }
}

/// Inputs for write command execution.
pub struct WriteCommandInput<'a> {
    pub config_path: Option<&'a Path>,
    pub overrides_json: Option<&'a str>,
    pub kind: WriteKind,
    pub payload: &'a PayloadSource,
}

/// Run a write command and flush before exiting.
pub fn run_write(mode: OutputMode, input: &WriteCommandInput<'_>) -> Result<CliOutput, CliError> {
    let payload = input.payload.read()?;
    let batch = match parse_write_payload(input.kind, &payload) {
        Ok(batch) => batch,
        Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    };
    let records = batch.len();

    match run_write_local(input.config_path, input.overrides_json, batch) {
        Ok(summary) => {
            let mut stderr = String::new();
            log_info(
                &mut stderr,
                &format!("wrote {records} {} record(s)", input.kind),
                mode.quiet,
            );
            Ok(CliOutput {
                stdout: format_summary(mode, &summary)?,
                stderr,
                exit_code: ExitCode::Ok,
            })
        },
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}

fn format_summary(mode: OutputMode, summary: &WriteSummary) -> Result<String, CliError> {
    if mode.is_json() {
        return Ok(to_json_line(&serde_json::json!({
            "status": "ok",
            "write": summary,
        }))?);
    }
    Ok(format!(
        "status: ok\nstream: {}\naccepted: {}\ndropped: {}\nflushed: {}\n",
        summary.stream.measurement(),
        summary.accepted,
        summary.dropped,
        summary.flushed,
    ))
}
