use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{self, EnvFilter};

mod aggregate;
mod cli;
mod config;
mod data;
mod enrich;
mod filter;
mod pipeline;
mod plotting;
mod source;
mod storage;

use cli::commands::{ObjectsCommand, ShowCommand};
use cli::interactive::ExploreCommand;

#[derive(Parser)]
#[command(name = "ecom-explorer")]
#[command(about = "Explore outliers in a remote e-commerce dataset from the terminal")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the dataset once and print the table preview and the three charts
    Show(ShowCommand),
    /// Pick filters interactively and re-render without re-fetching
    Explore(ExploreCommand),
    /// List objects in the configured storage bucket
    Objects(ObjectsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let base_level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    // Keep HTTP and AWS SDK chatter out of the dashboard output
    let dependency_filter = "reqwest=error,hyper=error,hyper_util=error,h2=error,rustls=error,aws_config=error,aws_sdk_s3=error,aws_smithy_runtime=error,aws_credential_types=error,aws_sigv4=error";

    tracing_subscriber::fmt()
        .with_max_level(base_level)
        .with_env_filter(EnvFilter::new(format!(
            "ecom_explorer={},{}",
            if cli.verbose { "debug" } else { "info" },
            dependency_filter
        )))
        .init();

    info!("Starting ecom-explorer v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Show(cmd) => cmd.execute().await,
        Commands::Explore(cmd) => cmd.execute().await,
        Commands::Objects(cmd) => cmd.execute().await,
    }
}
