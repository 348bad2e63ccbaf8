//! Kolrag CLI
//!
//! Main entry point for the kolrag command-line tool.
//! Runs the Hebrew question answering pipeline over a local corpus.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, RanksCommand, RunCommand};
use kolrag_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Kolrag - retrieval-augmented question answering over Hebrew documents
#[derive(Parser, Debug)]
#[command(name = "kolrag")]
#[command(about = "Retrieval-augmented question answering over Hebrew documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "KOLRAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "KOLRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a file of queries and write a results file
    Run(RunCommand),

    /// Answer a single question
    Ask(AskCommand),

    /// Write the ranks file of a results file
    Ranks(RanksCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?.with_overrides(
        cli.workspace,
        cli.config,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(
        config.log_level.as_deref(),
        config.no_color,
        config.log_dir.as_deref(),
    )?;

    tracing::info!("Kolrag CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);

    config.ensure_kolrag_dir()?;

    let command_name = match &cli.command {
        Commands::Run(_) => "run",
        Commands::Ask(_) => "ask",
        Commands::Ranks(_) => "ranks",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Run(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Ranks(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
