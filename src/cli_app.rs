//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use loadgate::build::verdict::{BuildVerdict, Verdict};
use loadgate::client::replay::ReplaySession;
use loadgate::core::config::Config;
use loadgate::logger::activity::{ActivityLoggerConfig, spawn_activity_logger};
use loadgate::logger::console::{Channel, ConsoleLogger, LoadTestLogger};
use loadgate::runner::driver::{MonitorOptions, RunOutcome, RunReport, TestMonitor};
use loadgate::runner::listener::{ListenerOptions, LoadTestListener};
use loadgate::runner::signals::SignalHandler;

/// loadgate: turn a running load test into a build verdict.
#[derive(Debug, Parser)]
#[command(
    name = "loadgate",
    author,
    version,
    about = "Load test monitor and build verdict gate",
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
    /// Show debug lines (snapshots, threshold checks).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (failures only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Monitor a recorded session and report its verdict.
    Replay(ReplayArgs),
    /// Inspect configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Session recording (JSON).
    #[arg(value_name = "SESSION")]
    session: PathBuf,
    /// Abort the test as soon as the verdict is failing.
    #[arg(long)]
    abort_at_failure: bool,
    /// Delay between polls in milliseconds (default: no delay).
    #[arg(long, value_name = "N", conflicts_with = "paced")]
    poll_ms: Option<u64>,
    /// Sleep `monitor.poll_interval_ms` between polls, like a live run.
    #[arg(long)]
    paced: bool,
    /// Give up after this many polls (default: one per recorded tick).
    #[arg(long, value_name = "N")]
    max_ticks: Option<usize>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
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
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI. Verdict codes (10..=12) are
    /// returned by `run` on success, never through this error.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands. `Ok` carries the process exit code.
pub fn run(cli: &Cli) -> Result<i32, CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Replay(args) => run_replay(cli, args),
        Command::Config(args) => run_config(cli, args).map(|()| 0),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(0)
        }
    }
}

// ---------------------------------------------------------------------------
// Replay command
// ---------------------------------------------------------------------------

/// [`ConsoleLogger`] with colored failures and dimmed debug lines. In JSON
/// mode every line goes to stderr so stdout carries only the summary.
struct CliLogger {
    console: ConsoleLogger,
}

impl LoadTestLogger for CliLogger {
    fn message(&mut self, line: &str) {
        self.console.write(Channel::Message, line);
    }

    fn failure(&mut self, line: &str) {
        self.console
            .write(Channel::Failure, &line.red().to_string());
    }

    fn debug(&mut self, line: &str) {
        self.console
            .write(Channel::Debug, &line.dimmed().to_string());
    }
}

fn run_replay(cli: &Cli, args: &ReplayArgs) -> Result<i32, CliError> {
    let mode = output_mode(cli);
    let mut config =
        Config::load(cli.config.as_deref()).map_err(|e| CliError::User(e.to_string()))?;
    if args.abort_at_failure {
        config.monitor.abort_at_failure = true;
    }

    let session = ReplaySession::load(&args.session).map_err(|e| CliError::User(e.to_string()))?;
    let test_id = session.test_id();
    let max_ticks = args
        .max_ticks
        .unwrap_or_else(|| session.recording().ticks.len().max(1));

    let logger = CliLogger {
        console: ConsoleLogger::new(cli.verbose || config.monitor.log_replies)
            .quiet(cli.quiet)
            .messages_to_stderr(mode == OutputMode::Json),
    };
    let mut listener =
        LoadTestListener::new(ListenerOptions::from(&config), logger, BuildVerdict::new());

    let activity = if config.logging.enabled {
        let logger_config =
            ActivityLoggerConfig::new(config.logging.jsonl_config(), config.logging.queue_size);
        let (handle, join) =
            spawn_activity_logger(logger_config).map_err(|e| CliError::Runtime(e.to_string()))?;
        listener = listener.with_activity(handle.clone());
        Some((handle, join))
    } else {
        None
    };

    let signals = SignalHandler::new();
    let options = MonitorOptions {
        poll_interval: replay_poll_interval(args, &config),
        max_ticks: Some(max_ticks),
    };
    let (report, _logger) = TestMonitor::new(session, listener, options)
        .with_abort_flag(signals.abort_flag())
        .run(test_id);

    if let Some((handle, join)) = activity {
        let dropped = handle.dropped_events();
        handle.shutdown();
        if join.join().is_err() {
            eprintln!("[LG-CLI] activity logger thread panicked");
        }
        if dropped > 0 && cli.verbose {
            eprintln!("[LG-CLI] {dropped} activity events dropped");
        }
    }

    match mode {
        OutputMode::Human => print_report_human(cli, &report),
        OutputMode::Json => {
            let mut payload = serde_json::to_value(&report)?;
            if let Value::Object(map) = &mut payload {
                map.insert("command".to_string(), json!("replay"));
                map.insert("exit_code".to_string(), json!(report.verdict.exit_code()));
            }
            write_json_line(&payload)?;
        }
    }

    Ok(report.verdict.exit_code())
}

/// Recorded sessions replay without delay unless a cadence is asked for.
fn replay_poll_interval(args: &ReplayArgs, config: &Config) -> Duration {
    match args.poll_ms {
        Some(ms) => Duration::from_millis(ms),
        None if args.paced => MonitorOptions::from(&config.monitor).poll_interval,
        None => Duration::ZERO,
    }
}

fn print_report_human(cli: &Cli, report: &RunReport) {
    if cli.quiet {
        return;
    }
    let verdict = match report.verdict {
        Verdict::Success => report.verdict.display_name().green(),
        Verdict::Unstable => report.verdict.display_name().yellow(),
        Verdict::Failure | Verdict::Error => report.verdict.display_name().red(),
    };
    let outcome = match &report.outcome {
        RunOutcome::Succeeded => "completed".to_string(),
        RunOutcome::Failed { status } => format!("failed ({status})"),
        RunOutcome::Aborted { reason } => format!("aborted ({reason})"),
        RunOutcome::Errored { code, .. } => format!("errored ({code})"),
    };
    println!(
        "Test {}: {outcome} after {} polls, verdict {verdict}",
        report.test_id, report.ticks
    );
    if let Some(reason) = &report.reason {
        println!("  Reason: {reason}");
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match args.command.unwrap_or(ConfigCommand::Path) {
        ConfigCommand::Path => {
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
        ConfigCommand::Show => {
            let config = Config::load(cli.config.as_deref())
                .map_err(|e| CliError::Runtime(e.to_string()))?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        ConfigCommand::Validate => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config
                    .stable_hash()
                    .map_err(|e| CliError::Runtime(e.to_string()))?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.source_path.display());
                        println!("  Thresholds: {}", config.thresholds.len());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.source_path.to_string_lossy(),
                            "thresholds": config.thresholds.len(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("LOADGATE_OUTPUT_FORMAT").ok();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_invocations() {
        let cases = vec![
            vec!["loadgate", "replay", "session.json"],
            vec!["loadgate", "replay", "session.json", "--abort-at-failure"],
            vec!["loadgate", "replay", "session.json", "--poll-ms", "250"],
            vec!["loadgate", "--json", "replay", "s.json", "--max-ticks", "9"],
            vec!["loadgate", "config"],
            vec!["loadgate", "config", "path"],
            vec!["loadgate", "config", "show", "--config", "/tmp/lg.toml"],
            vec!["loadgate", "config", "validate"],
            vec!["loadgate", "-v", "replay", "s.json"],
        ];

        for case in cases {
            let parsed = Cli::try_parse_from(case.clone());
            assert!(parsed.is_ok(), "failed to parse case: {case:?}");
        }
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(Cli::try_parse_from(["loadgate", "replay"]).is_err());
        assert!(Cli::try_parse_from(["loadgate", "-v", "-q", "config"]).is_err());
        assert!(Cli::try_parse_from(["loadgate", "replay", "s.json", "--poll-ms", "soon"]).is_err());
    }

    fn replay_args(argv: &[&str]) -> ReplayArgs {
        match Cli::try_parse_from(argv).expect("parse").command {
            Command::Replay(args) => args,
            other => panic!("expected replay, got {other:?}"),
        }
    }

    #[test]
    fn replay_cadence_comes_from_flag_or_config() {
        let mut config = Config::default();
        config.monitor.poll_interval_ms = 250;

        let args = replay_args(&["loadgate", "replay", "s.json", "--paced"]);
        assert_eq!(replay_poll_interval(&args, &config), Duration::from_millis(250));

        let args = replay_args(&["loadgate", "replay", "s.json", "--poll-ms", "40"]);
        assert_eq!(replay_poll_interval(&args, &config), Duration::from_millis(40));

        let args = replay_args(&["loadgate", "replay", "s.json"]);
        assert_eq!(replay_poll_interval(&args, &config), Duration::ZERO);

        assert!(
            Cli::try_parse_from(["loadgate", "replay", "s.json", "--paced", "--poll-ms", "1"])
                .is_err()
        );
    }

    #[test]
    fn completions_support_bash_zsh_and_fish() {
        for shell in ["bash", "zsh", "fish"] {
            let parsed = Cli::try_parse_from(["loadgate", "completions", shell]);
            assert!(parsed.is_ok(), "failed shell parse for {shell}");
        }
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(
            resolve_output_mode(true, Some("human"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("json"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("human"), false),
            OutputMode::Human
        );
        assert_eq!(
            resolve_output_mode(false, Some("auto"), true),
            OutputMode::Human
        );
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }

    #[test]
    fn error_exit_codes_do_not_collide_with_verdicts() {
        let errors = [
            CliError::User(String::new()),
            CliError::Runtime(String::new()),
            CliError::Io(io::Error::other("x")),
        ];
        for error in errors {
            let code = error.exit_code();
            assert!(code > 0 && code < 10, "{code}");
        }
        for verdict in [Verdict::Unstable, Verdict::Failure, Verdict::Error] {
            assert!(verdict.exit_code() >= 10);
        }
    }
}
