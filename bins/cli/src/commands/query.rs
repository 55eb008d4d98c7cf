//! Query commands.

use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, to_json_line};
use crate::{CliOutput, format_error_output, infra_exit_code, log_info};
use call_telemetry_facade::{
    EntityKind, ErrorCode, InfraError, PagedResult, QueryOptions, QueryRequest, ScopeLevel,
    parse_query_options, run_query_local,
};
use serde_json::{Map, Value};
use std::fmt::Write;
use std::path::Path;

/// Filter and paging flags; each overrides the same key of `options_json`.
#[derive(Debug, Default, Clone)]
pub struct QueryFilters<'a> {
    pub options_json: Option<&'a str>,
    pub page: Option<&'a str>,
    pub page_size: Option<&'a str>,
    pub days: Option<&'a str>,
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
    pub trunk: Option<&'a str>,
    pub direction: Option<&'a str>,
    pub answered: Option<&'a str>,
    pub filter: Option<&'a str>,
    pub alert_type: Option<&'a str>,
    pub target_sid: Option<&'a str>,
}

impl QueryFilters<'_> {
    fn to_options(&self) -> Result<QueryOptions, InfraError> {
        let mut object = match self.options_json.map(str::trim).filter(|json| !json.is_empty()) {
            None => Map::new(),
            Some(json) => match serde_json::from_str::<Value>(json) {
                Ok(Value::Object(object)) => object,
                Ok(_) => return Err(invalid_options("--options-json must be a JSON object")),
                Err(error) => return Err(invalid_options(&format!("--options-json: {error}"))),
            },
        };
        let flags = [
            ("page", self.page),
            ("page_size", self.page_size),
            ("days", self.days),
            ("start", self.start),
            ("end", self.end),
            ("trunk", self.trunk),
            ("direction", self.direction),
            ("answered", self.answered),
            ("filter", self.filter),
            ("alert_type", self.alert_type),
            ("target_sid", self.target_sid),
        ];
        for (key, value) in flags {
            if let Some(value) = value {
                object.insert(key.to_owned(), Value::from(value));
            }
        }
        parse_query_options(Some(&Value::Object(object).to_string()))
    }
}

fn invalid_options(message: &str) -> InfraError {
    InfraError::expected(ErrorCode::invalid_input(), message)
}

/// Inputs for query command execution.
pub struct QueryCommandInput<'a> {
    pub config_path: Option<&'a Path>,
    pub overrides_json: Option<&'a str>,
    pub entity: EntityKind,
    pub level: ScopeLevel,
    pub scope_id: &'a str,
    pub filters: QueryFilters<'a>,
}

/// Run a scoped, paginated query.
pub fn run_query(mode: OutputMode, input: &QueryCommandInput<'_>) -> Result<CliOutput, CliError> {
    let options = match input.filters.to_options() {
        Ok(options) => options,
        Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    };
    let request = QueryRequest {
        entity: input.entity,
        level: input.level,
        scope_id: input.scope_id.to_owned(),
        options,
    };

    match run_query_local(input.config_path, input.overrides_json, request) {
        Ok(result) => {
            let mut stderr = String::new();
            log_info(
                &mut stderr,
                &format!("query returned {} of {} row(s)", result.data.len(), result.total),
                mode.quiet,
            );
            Ok(CliOutput {
                stdout: format_result(mode, &result)?,
                stderr,
                exit_code: ExitCode::Ok,
            })
        },
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}

fn format_result(mode: OutputMode, result: &PagedResult) -> Result<String, CliError> {
    if mode.is_json() {
        return Ok(to_json_line(&serde_json::json!({
            "status": "ok",
            "result": result,
        }))?);
    }
    let mut out = String::new();
    let _ = writeln!(&mut out, "status: ok");
    let _ = writeln!(&mut out, "total: {}", result.total);
    if let Some(page) = result.page {
        let _ = writeln!(&mut out, "page: {page}");
    }
    if let Some(page_size) = result.page_size {
        let _ = writeln!(&mut out, "pageSize: {page_size}");
    }
    let _ = writeln!(&mut out, "rows: {}", result.data.len());
    for row in &result.data {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}
