//! Handle Check CLI Application
//!
//! A command-line interface for checking username availability in bulk with
//! shared rate limiting and resumable progress. This CLI application is a thin
//! layer over the handle-check-lib library.

mod ui;

use anyhow::{anyhow, bail, Context};
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use handle_check_lib::{
    assemble_tasks, generate_variants, load_env_config, parse_duration_string, read_identifiers,
    CheckpointStore, ConfigManager, FileConfig, HandleCheckError, HttpChecker, Identifier,
    InteractiveSession, Runner, Settings, ShutdownController,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Input file used when none is configured
const DEFAULT_INPUT: &str = "usernames.txt";

/// Exit status of a run stopped by Ctrl-C or SIGTERM
const EXIT_INTERRUPTED: i32 = 130;

/// CLI arguments for handle-check
#[derive(Parser, Debug)]
#[command(name = "handle-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check username availability in bulk with rate limiting and resume")]
#[command(
    long_about = "Check username availability in bulk against a remote endpoint.\n\nWorkers share one rate limiter that backs off when the service pushes back. Progress is checkpointed, so an interrupted run resumes where it stopped."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Input file with usernames (one per line)
    #[arg(short = 'f', long = "input", value_name = "FILE", help_heading = "Input")]
    pub input: Option<String>,

    /// Expand each username with suffix variants before checking
    #[arg(long = "generate", help_heading = "Input")]
    pub generate: bool,

    /// Prefixes for --generate (comma-separated)
    #[arg(long = "prefix", value_name = "PREFIX", value_delimiter = ',', help_heading = "Input")]
    pub prefixes: Option<Vec<String>>,

    /// Suffixes for --generate (comma-separated)
    #[arg(long = "suffix", value_name = "SUFFIX", value_delimiter = ',', help_heading = "Input")]
    pub suffixes: Option<Vec<String>>,

    /// Shortest generated username to keep (default: 3)
    #[arg(long = "min-length", value_name = "N", help_heading = "Input")]
    pub min_length: Option<usize>,

    /// Longest generated username to keep (default: 30)
    #[arg(long = "max-length", value_name = "N", help_heading = "Input")]
    pub max_length: Option<usize>,

    /// Print the queue that would be checked and exit
    #[arg(long = "dry-run", help_heading = "Input")]
    pub dry_run: bool,

    /// Read usernames from stdin and check each as it is entered ('exit' quits)
    #[arg(
        short = 'i',
        long = "interactive",
        conflicts_with_all = ["dry_run", "generate"],
        help_heading = "Input"
    )]
    pub interactive: bool,

    /// Directory for result files (default: results)
    #[arg(short = 'o', long = "output", value_name = "DIR", help_heading = "Output")]
    pub output: Option<String>,

    /// Checkpoint file used for resuming (default: state.json)
    #[arg(long = "state", value_name = "FILE", help_heading = "Output")]
    pub state: Option<String>,

    /// Concurrent workers (default: 1, max: 100)
    #[arg(short = 'w', long = "workers", value_name = "N", help_heading = "Rate Limiting")]
    pub workers: Option<usize>,

    /// Delay between remote calls before any backoff, e.g. 3s or 500ms (default: 3s)
    #[arg(long = "base-delay", value_name = "DURATION", help_heading = "Rate Limiting")]
    pub base_delay: Option<String>,

    /// Attempts per username (default: 3)
    #[arg(long = "max-retries", value_name = "N", help_heading = "Rate Limiting")]
    pub max_retries: Option<u32>,

    /// Endpoint template containing {username}
    #[arg(long = "endpoint", value_name = "URL", help_heading = "Service")]
    pub endpoint: Option<String>,

    /// Per-request timeout (default: 10s)
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Service")]
    pub timeout: Option<String>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_tracing(args.verbose);

    match run(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Install the stderr log subscriber; stdout is reserved for results.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("handle_check=debug,handle_check_lib=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("handle_check=info,handle_check_lib=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if let Some(workers) = args.workers {
        if workers == 0 || workers > 100 {
            return Err("Workers must be between 1 and 100".to_string());
        }
    }

    if args.max_retries == Some(0) {
        return Err("--max-retries must be at least 1".to_string());
    }

    for (flag, value) in [("--base-delay", &args.base_delay), ("--timeout", &args.timeout)] {
        if let Some(value) = value {
            if parse_duration_string(value).is_none() {
                return Err(format!(
                    "Invalid {} '{}'. Use format like '500ms', '3s', '2m'",
                    flag, value
                ));
            }
        }
    }

    if let (Some(min), Some(max)) = (args.min_length, args.max_length) {
        if min > max {
            return Err("--min-length cannot exceed --max-length".to_string());
        }
    }

    Ok(())
}

async fn run(args: Args) -> anyhow::Result<i32> {
    let settings = build_settings(&args)?;

    if args.interactive {
        return run_interactive(&settings).await;
    }

    let input_path = settings
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT));
    let seeds = read_identifiers(&input_path)
        .with_context(|| format!("Cannot load usernames from {}", input_path.display()))?;
    if seeds.is_empty() {
        bail!("No usernames found in {}", input_path.display());
    }

    let identifiers: Vec<Identifier> = if args.generate {
        generate_variants(&seeds, &settings.generation)
    } else {
        seeds
    };

    if args.dry_run {
        let checkpoint = CheckpointStore::new(&settings.run.state_path).load();
        let queue = assemble_tasks(&identifiers, &checkpoint);
        ui::print_plan(&queue, identifiers.len());
        return Ok(0);
    }

    let checker = build_checker(&settings)?;
    let runner = Runner::new(settings.run.clone(), checker);
    ui::print_header(identifiers.len(), runner.plan(&identifiers).len(), &settings);

    let shutdown = ShutdownController::new();
    let listener = shutdown.listen_for_signals();

    let report = runner.run(&identifiers, shutdown.token()).await?;
    listener.abort();

    ui::print_summary(&report, &settings);

    Ok(if report.interrupted { EXIT_INTERRUPTED } else { 0 })
}

fn build_checker(settings: &Settings) -> anyhow::Result<Arc<HttpChecker>> {
    let endpoint = settings.endpoint.clone().ok_or_else(|| {
        anyhow!("No endpoint configured. Use --endpoint, HC_ENDPOINT or [checker] endpoint")
    })?;
    let checker =
        HttpChecker::new(endpoint, settings.timeout).context("Failed to set up checker")?;
    Ok(Arc::new(checker))
}

/// Check usernames typed on stdin until 'exit', end of input or Ctrl-C.
async fn run_interactive(settings: &Settings) -> anyhow::Result<i32> {
    let checker = build_checker(settings)?;

    let shutdown = ShutdownController::new();
    let listener = shutdown.listen_for_signals();
    let cancel = shutdown.token();
    let session = InteractiveSession::new(&settings.run, checker, cancel.clone());

    ui::print_interactive_banner();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        ui::print_prompt();
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read from stdin")?,
        };
        let Some(line) = line else { break };

        let username = line.trim();
        if username == "exit" {
            break;
        }
        if username.is_empty() {
            continue;
        }

        match session.check(username).await {
            Ok(outcome) => ui::print_verdict(&outcome),
            Err(HandleCheckError::Cancelled) => break,
            Err(e) => ui::print_check_error(username, &e),
        }
    }

    listener.abort();
    debug!(checked = session.completed(), "Interactive session closed");
    Ok(if cancel.is_cancelled() { EXIT_INTERRUPTED } else { 0 })
}

/// Resolve settings: defaults < config files < HC_* variables < CLI flags.
fn build_settings(args: &Args) -> anyhow::Result<Settings> {
    let env_config = load_env_config();
    let config_manager = ConfigManager::new();

    let explicit = args.config.clone().or_else(|| env_config.config.clone());
    let file_config: FileConfig = match explicit {
        Some(path) => config_manager
            .load_file(&path)
            .with_context(|| format!("Failed to load config file '{}'", path))?,
        None => config_manager
            .discover_and_load()
            .context("Failed to load discovered config files")?,
    };

    let mut settings = Settings::resolve(&file_config, &env_config);
    apply_cli_args(&mut settings, args);
    debug!(run = ?settings.run, endpoint = ?settings.endpoint, "Resolved settings");
    Ok(settings)
}

fn apply_cli_args(settings: &mut Settings, args: &Args) {
    let mut run = settings.run.clone();

    if let Some(workers) = args.workers {
        run = run.with_workers(workers);
    }
    if let Some(delay) = args.base_delay.as_deref().and_then(parse_duration_string) {
        run = run.with_base_delay(delay);
    }
    if let Some(retries) = args.max_retries {
        run = run.with_max_retries(retries);
    }
    if let Some(state) = &args.state {
        run = run.with_state_path(state);
    }
    if let Some(output) = &args.output {
        run = run.with_output_dir(output);
    }
    settings.run = run;

    if let Some(endpoint) = &args.endpoint {
        settings.endpoint = Some(endpoint.clone());
    }
    if let Some(timeout) = args.timeout.as_deref().and_then(parse_duration_string) {
        settings.timeout = timeout;
    }
    if let Some(input) = &args.input {
        settings.input = Some(PathBuf::from(input));
    }

    if let Some(prefixes) = &args.prefixes {
        settings.generation.prefixes = prefixes.clone();
    }
    if let Some(suffixes) = &args.suffixes {
        settings.generation.suffixes = suffixes.clone();
    }
    let min = args.min_length.unwrap_or(settings.generation.min_length);
    let max = args.max_length.unwrap_or(settings.generation.max_length);
    settings.generation = settings.generation.clone().with_length_range(min, max);
}
