//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use cert_review::core::config::Config;
use cert_review::core::errors::CrvError;
use cert_review::logger::jsonl::JsonlConfig;
use cert_review::logger::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
use cert_review::requests::RequestId;
use cert_review::service::{Decision, HttpRequestService, InMemoryRequestService, RequestService};
use cert_review::session::{AuthProvider, Role, StaticSession, TokenSession, ViewMode};
use cert_review::triage::preferences::{self, SessionOverrides};
use cert_review::triage::render::{self, ViewSnapshot};
use cert_review::triage::{
    ActionOutcome, ActionReport, LoadState, Tab, TriageModel, TriageMsg, TriageRuntime,
    TriageSettings,
};

/// Certificate request review: triage pending certificate signing requests.
#[derive(Debug, Parser)]
#[command(
    name = "crv",
    author,
    version,
    about = "Certificate request review",
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
    /// Echo diagnostics to stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Act as this role instead of reading it from the session token.
    #[arg(long, global = true, value_name = "admin|user")]
    role: Option<Role>,
    /// Use built-in sample data instead of the backend.
    #[arg(long, global = true)]
    demo: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show the requests visible to you, split into pending / not pending.
    List(ListArgs),
    /// Accept a pending request.
    Accept(AcceptArgs),
    /// Decline a pending request.
    Decline(DeclineArgs),
    /// Show or change whether you see requests by you or awaiting you.
    Mode(ModeArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, clap::Args, Default)]
struct ListArgs {
    /// Tab to show.
    #[arg(long, value_name = "pending|not-pending")]
    tab: Option<Tab>,
    /// List requests you submitted (this invocation only).
    #[arg(long, conflicts_with = "from_me")]
    by_me: bool,
    /// List requests awaiting your decision (this invocation only).
    #[arg(long, conflicts_with = "by_me")]
    from_me: bool,
}

impl ListArgs {
    fn view_mode(&self) -> Option<ViewMode> {
        match (self.by_me, self.from_me) {
            (true, _) => Some(ViewMode::ByMe),
            (_, true) => Some(ViewMode::FromMe),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
struct AcceptArgs {
    /// Request id.
    id: RequestId,
}

#[derive(Debug, Clone, clap::Args)]
struct DeclineArgs {
    /// Request id.
    id: RequestId,
    /// Reason shown to the requester.
    #[arg(long, value_name = "TEXT")]
    reason: Option<String>,
}

#[derive(Debug, Clone, clap::Args)]
struct ModeArgs {
    /// New mode to persist. Omit to print the current one.
    #[arg(value_name = "by-me|from-me")]
    mode: Option<ViewMode>,
}

#[derive(Debug, Clone, clap::Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration (token redacted).
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, clap::Args)]
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

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Library failure, printed with its CRV code.
    #[error(transparent)]
    Crv(#[from] CrvError),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::List(args) => run_list(cli, args),
        Command::Accept(args) => run_decision(cli, Decision::Accept, args.id, None),
        Command::Decline(args) => {
            run_decision(cli, Decision::Decline, args.id, args.reason.clone())
        }
        Command::Mode(args) => run_mode(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Session wiring
// ---------------------------------------------------------------------------

/// One triage session: config, runtime, and the activity logger thread.
struct Session {
    config: Config,
    runtime: TriageRuntime,
    logger: Option<(ActivityLoggerHandle, thread::JoinHandle<()>)>,
    wait: Duration,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let config = load_config(cli)?;
        let token = config.resolve_token()?;
        let service = build_service(cli, &config, token.clone());
        let auth = build_auth(cli, &config, token);

        let logger = match spawn_logger(JsonlConfig::at(&config.paths.activity_log)) {
            Ok(pair) => Some(pair),
            Err(e) => {
                diag(cli, &format!("activity log disabled: {e}"));
                None
            }
        };
        let mut runtime = TriageRuntime::new(auth, service);
        if let Some((handle, _)) = &logger {
            runtime = runtime.with_logger(handle.clone());
        }

        // Each call is bounded by curl's --max-time; a decision can be followed by a reload.
        let wait = Duration::from_secs(config.server.timeout_secs.saturating_mul(2) + 5);
        Ok(Self {
            config,
            runtime,
            logger,
            wait,
        })
    }

    fn settings(&self, cli: &Cli, tab: Option<Tab>, view_mode: Option<ViewMode>) -> TriageSettings {
        let outcome = preferences::load(&self.config.paths.preferences_file);
        if !outcome.is_ok() {
            diag(
                cli,
                &format!(
                    "ignoring unreadable preferences at {}",
                    self.config.paths.preferences_file.display()
                ),
            );
        }
        let persisted = outcome.into_prefs();
        let merged = preferences::merge(
            &persisted,
            &SessionOverrides {
                view_mode,
                start_tab: tab,
            },
        );
        TriageSettings {
            start_tab: merged.start_tab.unwrap_or(self.config.view.start_tab),
            refresh_after_action: self.config.view.refresh_after_action,
            view_mode_override: view_mode,
        }
    }

    /// Start the view and wait for the first load.
    fn start(&self, cli: &Cli, settings: TriageSettings) -> Result<TriageModel, CliError> {
        let mut model = self.runtime.start(settings)?;
        if let Some((handle, _)) = &self.logger {
            handle.send(ActivityEvent::SessionStarted {
                role: model.role.label().to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                config_hash: self.config.stable_hash()?,
            });
        }
        self.runtime.pump(&mut model, self.wait)?;
        diag(
            cli,
            &format!(
                "role={} list={} loaded={}",
                model.role,
                model.scope().map_or("-", |scope| scope.label()),
                model.all_requests.len()
            ),
        );
        Ok(model)
    }

    fn close(&self, model: &mut TriageModel, reason: &str) {
        self.runtime.shutdown(model, reason);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some((handle, join)) = self.logger.take() {
            handle.shutdown();
            let _ = join.join();
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    let config = Config::load(cli.config.as_deref())?;
    diag(
        cli,
        &format!("config: {}", config.paths.config_file.display()),
    );
    Ok(config)
}

fn build_service(cli: &Cli, config: &Config, token: Option<String>) -> Arc<dyn RequestService> {
    if cli.demo {
        let by_me = preferences::load(&config.paths.preferences_file)
            .into_prefs()
            .by_me_selected;
        diag(cli, "using built-in demo data; changes are not saved");
        return Arc::new(InMemoryRequestService::demo().with_by_me_selected(by_me));
    }
    Arc::new(HttpRequestService::new(config, token))
}

fn build_auth(cli: &Cli, config: &Config, token: Option<String>) -> Arc<dyn AuthProvider> {
    match cli.role.or(config.session.role) {
        Some(role) => Arc::new(StaticSession::new(role)),
        None if cli.demo => Arc::new(StaticSession::new(Role::Admin)),
        None => Arc::new(TokenSession::new(token)),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run_list(cli: &Cli, args: &ListArgs) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let settings = session.settings(cli, args.tab, args.view_mode());
    let mut model = session.start(cli, settings)?;

    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                print_view(&model);
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "list",
                "view": ViewSnapshot::of(&model),
            });
            write_json_line(&payload)?;
        }
    }

    let failure = match &model.load_state {
        LoadState::Failed { message, .. } => Some(message.clone()),
        _ => None,
    };
    session.close(&mut model, "list");
    match failure {
        Some(message) => Err(CliError::Runtime(format!("could not load requests: {message}"))),
        None => Ok(()),
    }
}

fn run_decision(
    cli: &Cli,
    decision: Decision,
    id: RequestId,
    reason: Option<String>,
) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let settings = session.settings(cli, None, None);
    let mut model = session.start(cli, settings)?;

    if !model.buckets.contains(id) {
        diag(
            cli,
            &format!(
                "request #{id} is not in the {} list; sending the {decision} anyway",
                model.scope().map_or("current", |scope| scope.label())
            ),
        );
    }
    session.runtime.dispatch(&mut model, TriageMsg::Select(id));
    let msg = match decision {
        Decision::Accept => TriageMsg::Accept,
        Decision::Decline => TriageMsg::Decline { reason },
    };
    session.runtime.dispatch(&mut model, msg);
    let reports = session.runtime.pump(&mut model, session.wait)?;
    session.close(&mut model, decision.label());

    let report = reports
        .into_iter()
        .find(|report| report.id == id)
        .ok_or_else(|| CliError::Runtime(format!("no outcome received for request #{id}")))?;
    emit_report(cli, &report, &model)
}

fn emit_report(cli: &Cli, report: &ActionReport, model: &TriageModel) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            if report.is_applied() && !cli.quiet {
                let verb = match report.decision {
                    Decision::Accept => "accepted",
                    Decision::Decline => "declined",
                };
                println!("{} {verb} request #{}", "✓".green(), report.id);
                println!("  {} pending request(s) remain", model.buckets.pending.len());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": report.decision.label(),
                "report": report,
                "pending_remaining": model.buckets.pending.len(),
            });
            write_json_line(&payload)?;
        }
    }

    match &report.outcome {
        ActionOutcome::Applied => Ok(()),
        ActionOutcome::Failed { message, .. } => Err(CliError::Runtime(format!(
            "could not {} request #{}: {message}",
            report.decision, report.id
        ))),
    }
}

fn run_mode(cli: &Cli, args: &ModeArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let service = build_service(cli, &config, None);

    let (mode, changed) = match args.mode {
        Some(mode) => {
            service.set_by_me_selected(mode.is_by_me())?;
            (mode, true)
        }
        None => (ViewMode::from_by_me(service.is_by_me_selected()?), false),
    };

    match output_mode(cli) {
        OutputMode::Human => {
            if cli.quiet {
                return Ok(());
            }
            if changed {
                println!("view mode set to {}", mode.label().bold());
                if !cli.demo {
                    println!("  saved to {}", config.paths.preferences_file.display());
                }
            } else {
                println!("{}", mode.label());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "mode",
                "view_mode": mode.label(),
                "changed": changed,
                "preferences_file": config.paths.preferences_file.to_string_lossy(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
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
            let mut config = Config::load(cli.config.as_deref())?;
            if config.server.token.is_some() {
                config.server.token = Some("<redacted>".to_string());
            }

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                if output_mode(cli) == OutputMode::Json {
                    let payload = json!({
                        "command": "config validate",
                        "valid": false,
                        "code": e.code(),
                        "error": e.to_string(),
                    });
                    write_json_line(&payload)?;
                }
                Err(CliError::User(format!("configuration is invalid: {e}")))
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_view(model: &TriageModel) {
    let text = render::render_view(model);
    for (index, line) in text.lines().enumerate() {
        if index == 0 {
            println!("{}", line.bold());
        } else if line.starts_with('>') {
            println!("{}", line.cyan().bold());
        } else if line.trim_start().starts_with("could not load") {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }
}

fn diag(cli: &Cli, message: &str) {
    if cli.verbose {
        eprintln!("{} {message}", "crv:".dimmed());
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("CRV_OUTPUT_FORMAT").ok();
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
