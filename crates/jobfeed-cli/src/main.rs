use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobfeed_sync::{RunOutcome, SyncConfig, SyncPipeline};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "jobfeed-cli")]
#[command(about = "Reconcile job, result, exam and admit card feeds into the site data file")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch all configured feeds and update the store once.
    Run(RunArgs),
}

#[derive(Debug, Default, clap::Args)]
struct RunArgs {
    /// Workspace root; overrides JOBFEED_ROOT.
    #[arg(long)]
    root: Option<PathBuf>,
    /// Run configuration file; overrides JOBFEED_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the full run summary as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = SyncConfig::from_env();
    if let Some(root) = args.root {
        config.workspace_root = root;
    }
    if let Some(path) = args.config {
        config.config_file = path;
    }

    match SyncPipeline::new(config)?.run_once().await? {
        RunOutcome::Disabled => println!("Auto-run is disabled; nothing to do."),
        RunOutcome::Completed(summary) => {
            if args.json {
                let text = serde_json::to_string_pretty(&summary).context("serializing run summary")?;
                println!("{text}");
            } else {
                println!("{}", summary.headline());
            }
        }
    }
    Ok(())
}
