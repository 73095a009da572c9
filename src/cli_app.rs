//! Top-level CLI definition and dispatch.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use volume_janitor::core::config::Config;
use volume_janitor::core::errors::JanitorError;
use volume_janitor::logger::activity::spawn_logger;
use volume_janitor::resource::calendar::{Calendar, FixedCalendar, SystemCalendar};
use volume_janitor::resource::directive::{DirectivePolicy, JanitorDirective, start_of_day_utc};
use volume_janitor::resource::model::Resource;
use volume_janitor::rules::engine::{EvaluationReport, RuleEngine};

/// Volume Janitor: decide which detached volumes are due for cleanup.
#[derive(Debug, Parser)]
#[command(
    name = "vjan",
    author,
    version,
    about = "Volume Janitor - cleanup eligibility for detached volumes",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the rule chain over a JSON array of resources.
    Evaluate(EvaluateArgs),
    /// Classify a janitor tag value.
    Directive(DirectiveArgs),
    /// View configuration state.
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
struct EvaluateArgs {
    /// JSON file holding an array of resource records.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// Write the (possibly marked) resources back out to this file.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Pin the evaluation clock (RFC3339) instead of using the system time.
    #[arg(long, value_name = "TIMESTAMP")]
    now: Option<String>,
    /// Skip the decision log for this run.
    #[arg(long)]
    no_log: bool,
}

#[derive(Debug, Clone, Args)]
struct DirectiveArgs {
    /// Raw tag value, e.g. `donotmark` or `2024-05-01`.
    value: String,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Operation partially succeeded.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<JanitorError> for CliError {
    fn from(err: JanitorError) -> Self {
        match err {
            JanitorError::InvalidConfig { .. }
            | JanitorError::MissingConfig { .. }
            | JanitorError::ConfigParse { .. } => Self::User(err.to_string()),
            JanitorError::Serialization { .. } => Self::Internal(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Evaluate(args) => run_evaluate(cli, args),
        Command::Directive(args) => run_directive(cli, args),
        Command::Config(args) => run_config(cli, args),
    }
}

fn run_evaluate(cli: &Cli, args: &EvaluateArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let mut resources = read_resources(&args.input)?;

    let calendar: Arc<dyn Calendar> = match &args.now {
        Some(raw) => Arc::new(FixedCalendar::new(parse_now(raw)?)),
        None => Arc::new(SystemCalendar),
    };

    let logger = if config.logging.enabled && !args.no_log {
        Some(spawn_logger(
            config.jsonl_config(),
            config.logging.channel_capacity,
        )?)
    } else {
        None
    };

    let engine = RuleEngine::from_config(
        &config,
        calendar,
        logger.as_ref().map(|(handle, _)| handle.clone()),
    )?;
    let report = engine.evaluate_all(&mut resources);

    if let Some((handle, join)) = logger {
        handle.shutdown();
        join.join()
            .map_err(|_| CliError::Internal("decision logger thread panicked".to_string()))?;
    }

    if let Some(output) = &args.output {
        write_resources(output, &resources)?;
    }

    match output_mode(cli) {
        OutputMode::Human => print_report_human(&report),
        OutputMode::Json => {
            let payload = json!({
                "command": "evaluate",
                "config_hash": config.stable_hash()?,
                "rules": engine.rule_names(),
                "evaluated": report.evaluated(),
                "marked": report.marked(),
                "failed": report.failed(),
                "duration_ms": u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
                "evaluations": report.evaluations,
                "failures": report.failures,
            });
            write_json_line(&payload)?;
        }
    }

    if report.failed() > 0 {
        return Err(CliError::Partial(format!(
            "{} of {} resources failed evaluation",
            report.failed(),
            report.failed() + report.evaluated()
        )));
    }
    Ok(())
}

fn read_resources(path: &Path) -> Result<Vec<Resource>, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CliError::User(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| CliError::User(format!("invalid resource list in {}: {e}", path.display())))
}

fn write_resources(path: &Path, resources: &[Resource]) -> Result<(), CliError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(resources)?;
    fs::write(path, body + "\n")?;
    Ok(())
}

fn parse_now(raw: &str) -> Result<DateTime<Utc>, CliError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CliError::User(format!("invalid --now timestamp {raw:?}: {e}")))
}

fn print_report_human(report: &EvaluationReport) {
    for evaluation in &report.evaluations {
        match (&evaluation.termination, evaluation.eligible) {
            (Some(mark), true) => println!(
                "{}  {} {}  {}",
                evaluation.resource_id,
                "MARK".yellow().bold(),
                format_time(mark.at),
                mark.reason
            ),
            (Some(mark), false) => println!(
                "{}  {} {}  {}",
                evaluation.resource_id,
                "held".cyan(),
                format_time(mark.at),
                mark.reason
            ),
            (None, _) => println!("{}  {}", evaluation.resource_id, "keep".green()),
        }
    }
    for failure in &report.failures {
        println!(
            "{}  {} {}",
            failure.resource_id,
            "FAIL".red().bold(),
            failure.message
        );
    }
    println!(
        "\n{} evaluated, {} marked, {} failed",
        report.evaluated(),
        report.marked(),
        report.failed()
    );
}

fn run_directive(cli: &Cli, args: &DirectiveArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let payload = directive_payload(&config.directive, &args.value);

    match output_mode(cli) {
        OutputMode::Human => {
            let label = payload["directive"].as_str().unwrap_or_default();
            match payload["termination_time"].as_str() {
                Some(at) => println!("{}: terminate at {at}", label.bold()),
                None => println!("{}", label.bold()),
            }
        }
        OutputMode::Json => write_json_line(&payload)?,
    }
    Ok(())
}

fn directive_payload(policy: &DirectivePolicy, value: &str) -> Value {
    let directive = JanitorDirective::parse(Some(value), &policy.opt_out_value);
    let termination_time = match &directive {
        JanitorDirective::OwnerDate { date, .. } => Some(format_time(start_of_day_utc(*date))),
        _ => None,
    };
    json!({
        "command": "directive",
        "tag_key": policy.tag_key,
        "value": value,
        "directive": directive.label(),
        "termination_time": termination_time,
    })
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;
            let hash = config.stable_hash()?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config).map_err(JanitorError::from)?;
                    println!("# config_hash = {hash}");
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config_hash": hash,
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("VJN_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
