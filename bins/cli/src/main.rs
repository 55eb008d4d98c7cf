//! CLI binary entrypoint.

mod commands;
mod error;
mod format;

use call_telemetry_facade::{
    EntityKind, ErrorPayload, InfraError, ScopeLevel, WriteKind, error_payload,
    exit_code_for_error,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use commands::{
    PayloadSource, QueryCommandInput, QueryFilters, WriteCommandInput, run_alert_types,
    run_config_schema, run_config_show, run_config_validate, run_query, run_write,
};
use error::{CliError, ExitCode};
use format::{LogFormat, OutputArgs, OutputMode};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(
    name = "ctel",
    version,
    about = "Buffered call telemetry writer and scoped query CLI",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Config-related commands.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// List alert codes and their message templates.
    AlertTypes,
    /// Write records (a JSON object or array) and flush them.
    Write {
        #[command(subcommand)]
        command: WriteCommands,
    },
    /// Query one page of records for a scope.
    Query {
        #[command(subcommand)]
        command: QueryCommands,
    },
}

#[derive(Debug, Args)]
struct ConfigSource {
    /// Optional config file path (JSON/TOML).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Partial config JSON merged over the file.
    #[arg(long)]
    overrides_json: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the effective config with secrets redacted.
    Show {
        #[command(flatten)]
        source: ConfigSource,
    },
    /// Validate the effective config.
    Validate {
        #[command(flatten)]
        source: ConfigSource,
    },
    /// Print the config JSON schema.
    Schema,
}

#[derive(Debug, Args)]
struct WriteArgs {
    #[command(flatten)]
    source: ConfigSource,
    /// Inline JSON payload.
    #[arg(long, conflicts_with = "file")]
    json: Option<String>,
    /// Read the JSON payload from a file (stdin when neither is given).
    #[arg(long)]
    file: Option<PathBuf>,
}

impl WriteArgs {
    fn payload(&self) -> PayloadSource {
        match (&self.json, &self.file) {
            (Some(json), _) => PayloadSource::Inline(json.clone()),
            (None, Some(path)) => PayloadSource::File(path.clone()),
            (None, None) => PayloadSource::Stdin,
        }
    }
}

#[derive(Debug, Subcommand)]
enum WriteCommands {
    /// Write alerts.
    Alert(WriteArgs),
    /// Write call detail records.
    Cdr(WriteArgs),
    /// Write call gauges at a scope level.
    CallCount {
        /// Scope level selecting the gauge stream.
        #[arg(long, value_enum, default_value_t = ScopeArg::Account)]
        scope: ScopeArg,
        #[command(flatten)]
        args: WriteArgs,
    },
    /// Write platform component alerts.
    SystemAlert(WriteArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScopeArg {
    /// Service provider.
    #[value(name = "sp", alias = "service-provider")]
    ServiceProvider,
    /// Account.
    Account,
    /// Application.
    #[value(name = "app", alias = "application")]
    Application,
}

impl From<ScopeArg> for ScopeLevel {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::ServiceProvider => Self::ServiceProvider,
            ScopeArg::Account => Self::Account,
            ScopeArg::Application => Self::Application,
        }
    }
}

#[derive(Debug, Args)]
struct QueryArgs {
    #[command(flatten)]
    source: ConfigSource,
    /// Scope level of `--id`.
    #[arg(long, value_enum, default_value_t = ScopeArg::Account)]
    scope: ScopeArg,
    /// Service provider, account or application sid.
    #[arg(long)]
    id: String,
    /// Query options as a JSON object; flags below override its keys.
    #[arg(long)]
    options_json: Option<String>,
    /// 1-based page number.
    #[arg(long)]
    page: Option<String>,
    /// Rows per page.
    #[arg(long)]
    page_size: Option<String>,
    /// Only rows from the last N days.
    #[arg(long)]
    days: Option<String>,
    /// Inclusive lower bound (RFC 3339 or epoch millis).
    #[arg(long)]
    start: Option<String>,
    /// Inclusive upper bound (RFC 3339 or epoch millis).
    #[arg(long)]
    end: Option<String>,
    /// CDR trunk.
    #[arg(long)]
    trunk: Option<String>,
    /// CDR direction.
    #[arg(long)]
    direction: Option<String>,
    /// CDR answered flag (`true` or `false`).
    #[arg(long)]
    answered: Option<String>,
    /// CDR text matched against from, to and call sid.
    #[arg(long)]
    filter: Option<String>,
    /// Alert type code.
    #[arg(long)]
    alert_type: Option<String>,
    /// Alert target sid.
    #[arg(long)]
    target_sid: Option<String>,
}

impl QueryArgs {
    fn filters(&self) -> QueryFilters<'_> {
        QueryFilters {
            options_json: self.options_json.as_deref(),
            page: self.page.as_deref(),
            page_size: self.page_size.as_deref(),
            days: self.days.as_deref(),
            start: self.start.as_deref(),
            end: self.end.as_deref(),
            trunk: self.trunk.as_deref(),
            direction: self.direction.as_deref(),
            answered: self.answered.as_deref(),
            filter: self.filter.as_deref(),
            alert_type: self.alert_type.as_deref(),
            target_sid: self.target_sid.as_deref(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum QueryCommands {
    /// Call detail records (scope `sp` or `account`).
    Cdrs(QueryArgs),
    /// Alerts (scope `sp` or `account`).
    Alerts(QueryArgs),
    /// Call gauges (scope `sp`, `account` or `app`).
    CallCounts(QueryArgs),
}

pub(crate) struct CliOutput {
    stdout: String,
    stderr: String,
    exit_code: ExitCode,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.output.log_format);
    let mode = OutputMode::from_args(&cli.output);

    match run(&cli.command, mode) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init(),
    };
    if let Err(error) = result {
        let _ = writeln!(io::stderr(), "warning: tracing already initialized: {error}");
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn run(command: &Commands, mode: OutputMode) -> Result<CliOutput, CliError> {
    tracing::debug!(?command, json = mode.is_json(), "ctel.command");
    match command {
        Commands::Config { command } => match command {
            ConfigCommands::Show { source } => run_config_show(
                mode,
                source.config.as_deref(),
                source.overrides_json.as_deref(),
            ),
            ConfigCommands::Validate { source } => run_config_validate(
                mode,
                source.config.as_deref(),
                source.overrides_json.as_deref(),
            ),
            ConfigCommands::Schema => run_config_schema(mode),
        },
        Commands::AlertTypes => run_alert_types(mode),
        Commands::Write { command } => {
            let (kind, args) = match command {
                WriteCommands::Alert(args) => (WriteKind::Alert, args),
                WriteCommands::Cdr(args) => (WriteKind::Cdr, args),
                WriteCommands::CallCount { scope, args } => {
                    (WriteKind::CallCount((*scope).into()), args)
                },
                WriteCommands::SystemAlert(args) => (WriteKind::SystemAlert, args),
            };
            let payload = args.payload();
            run_write(
                mode,
                &WriteCommandInput {
                    config_path: args.source.config.as_deref(),
                    overrides_json: args.source.overrides_json.as_deref(),
                    kind,
                    payload: &payload,
                },
            )
        },
        Commands::Query { command } => {
            let (entity, args) = match command {
                QueryCommands::Cdrs(args) => (EntityKind::Cdr, args),
                QueryCommands::Alerts(args) => (EntityKind::Alert, args),
                QueryCommands::CallCounts(args) => (EntityKind::CallCount, args),
            };
            run_query(
                mode,
                &QueryCommandInput {
                    config_path: args.source.config.as_deref(),
                    overrides_json: args.source.overrides_json.as_deref(),
                    entity,
                    level: args.scope.into(),
                    scope_id: &args.id,
                    filters: args.filters(),
                },
            )
        },
    }
}

pub(crate) fn format_error_output(
    mode: OutputMode,
    error: &InfraError,
    exit_code: ExitCode,
) -> CliOutput {
    let payload = error_payload(error);

    let mut stderr = String::new();
    log_info(&mut stderr, "command failed", mode.quiet);

    let stdout = if mode.is_json() {
        let body = serde_json::json!({
            "status": "error",
            "error": payload,
        });

        // This is a CLI boundary, so JSON serialization errors are internal.
        format::to_json_line(&body).unwrap_or_else(|_| {
            "{\"status\":\"error\",\"error\":{\"code\":\"ERR_CORE_INTERNAL\",\"message\":\"internal error\",\"retriable\":false}}\n".to_string()
        })
    } else {
        format_error_text(&payload)
    };

    CliOutput {
        stdout,
        stderr,
        exit_code,
    }
}

pub(crate) fn infra_exit_code(error: &InfraError) -> ExitCode {
    ExitCode::from_infra(exit_code_for_error(error))
}

fn format_error_text(error: &ErrorPayload) -> String {
    let mut out = String::new();
    out.push_str("status: error\n");
    out.push_str("code: ");
    out.push_str(&error.code);
    out.push('\n');
    out.push_str("message: ");
    out.push_str(&error.message);
    out.push('\n');
    if error.retriable {
        out.push_str("retriable: true\n");
    }
    for (key, value) in &error.meta {
        out.push_str("meta.");
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

pub(crate) fn log_info(stderr: &mut String, message: &str, quiet: bool) {
    if quiet {
        return;
    }
    stderr.push_str("info: ");
    stderr.push_str(message);
    stderr.push('\n');
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;

    if !output.stderr.is_empty() {
        let mut stderr = io::stderr();
        stderr.write_all(output.stderr.as_bytes())?;
        stderr.flush()?;
    }

    Ok(())
}

pub(crate) fn collect_scoped_env(prefix: &str) -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix))
        .collect()
}
