use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(version, about = "Filesystem-signaled development pipeline orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold the .workflow directory
    Init,
    /// Clear signals and artifacts, keep configuration
    Reset {
        #[arg(long)]
        force: bool,
    },
    /// Print the current phase and signals once
    Status,
    /// Continuously render state, read-only
    Watch,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "cadence=debug" } else { "cadence=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Some(Commands::Init) => cmd::cmd_init(&project_dir)?,
        Some(Commands::Reset { force }) => cmd::cmd_reset(&project_dir, cli.yes, *force)?,
        Some(Commands::Status) => cmd::cmd_status(&project_dir)?,
        Some(Commands::Watch) => cmd::cmd_watch(&project_dir).await?,
        None => cmd::run_controller(&project_dir, cli.yes)?,
    }

    Ok(())
}
