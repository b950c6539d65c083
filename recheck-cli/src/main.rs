//! Recheck CLI - Command line interface for the review cycle engine
//!
//! Bounded review cycles over a change, driven by an external reviewer
//! command and persisted per-scope state.

mod commands;

use clap::{Parser, Subcommand};
use recheck_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{exit_codes, RunArgs, StartArgs, StatusArgs};

/// Recheck: bounded review cycles with persisted per-scope state
#[derive(Parser, Debug)]
#[command(name = "recheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Reviewer command to invoke (overrides config and env)
    #[arg(long, global = true, env = "RECHECK_REVIEWER_CMD")]
    reviewer_cmd: Option<String>,

    /// Maximum review rounds (overrides config and env)
    #[arg(long, global = true)]
    max_rounds: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Start a review cycle for a scope
    Start(StartArgs),

    /// Run one review round
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Show a scope's cycle state
    Status(StatusArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let code = match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            exit_codes::INTERNAL_FAILURE
        }
    };

    std::process::exit(code);
}

async fn execute(cli: Cli) -> anyhow::Result<i32> {
    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    // Load configuration with overrides
    let config = Config::load_with_overrides(cli.reviewer_cmd.clone(), cli.max_rounds)?;

    if cli.verbose {
        tracing::info!(
            reviewer_cmd = %config.reviewer.command,
            max_rounds = config.cycle.max_rounds,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("recheck {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Start(args)) => {
            args.execute(&config)?;
        }
        Some(Commands::Run(args)) => {
            return args.execute(&config).await;
        }
        Some(Commands::Status(args)) => {
            args.execute(&config)?;
        }
        Some(Commands::Config) => {
            println!("Recheck Configuration");
            println!("=====================");
            println!();
            println!("Reviewer:");
            println!("  command: {}", config.reviewer.command);
            println!(
                "  timeout: {}",
                config
                    .reviewer
                    .timeout
                    .map(|t| format!("{:?}", t))
                    .unwrap_or_else(|| "(none)".to_string())
            );
            println!();
            println!("Cycle:");
            println!("  max_rounds: {}", config.cycle.max_rounds);
            println!("  artifacts_dir: {}", config.cycle.artifacts_dir.display());
            println!("  docs_dir: {}", config.cycle.docs_dir.display());
            println!();
            if let Some(path) = Config::default_config_path() {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
        }
        None => {
            println!("Recheck - bounded review cycles over a change");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(exit_codes::CONVERGED)
}
