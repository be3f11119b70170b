mod commands;

use clap::{Parser, Subcommand};
use docean_cloud::DEFAULT_PREFIX;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docean")]
#[command(about = "Maintenance tooling for the DigitalOcean provider", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete resources left behind by acceptance tests
    Sweep {
        /// Only objects whose name starts with this prefix are deleted
        #[arg(short, long, default_value = DEFAULT_PREFIX)]
        prefix: String,
        /// Resource kinds to sweep (their dependencies are swept first)
        #[arg(short, long, value_name = "KIND")]
        only: Vec<String>,
    },
    /// Upgrade a state file to the current schema versions
    UpgradeState {
        /// Path of the state file
        file: PathBuf,
    },
    /// Check the configured API token
    Auth,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Sweep { prefix, only } => commands::sweep::handle(&prefix, &only).await,
        Commands::UpgradeState { file } => commands::state::handle(&file).await,
        Commands::Auth => commands::auth::handle().await,
    }
}
