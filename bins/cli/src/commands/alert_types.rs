//! Alert type catalog command.

use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, to_json_line};
use crate::CliOutput;
use call_telemetry_facade::{AlertTypeEntry, alert_types};
use std::fmt::Write;

/// List every alert code and its context-free message.
pub fn run_alert_types(mode: OutputMode) -> Result<CliOutput, CliError> {
    let entries = alert_types();
    let stdout = if mode.is_json() {
        to_json_line(&serde_json::json!({
            "status": "ok",
            "alertTypes": entries,
        }))?
    } else {
        format_text(&entries)
    };
    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}

fn format_text(entries: &[AlertTypeEntry]) -> String {
    let width = entries
        .iter()
        .map(|entry| entry.code.len())
        .max()
        .unwrap_or_default();
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            &mut out,
            "{:<width$}  {}",
            entry.code,
            entry.template.as_deref().unwrap_or("-"),
        );
    }
    out
}
