//! krr CLI
//!
//! Recommends CPU and memory requests/limits for Kubernetes workloads from
//! historical Prometheus data.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{config::ConfigCommands, recommend::RecommendArgs, workloads::WorkloadsArgs};
use tracing_subscriber::EnvFilter;

/// Kubernetes resource recommender
#[derive(Parser)]
#[command(name = "krr")]
#[command(author, version, long_about = None)]
#[command(about = "Kubernetes resource recommendations from Prometheus history")]
pub struct Cli {
    /// Prometheus endpoint URL (falls back to the config file, then http://localhost:9090)
    #[arg(long, env = "KRR_PROMETHEUS_URL")]
    pub prometheus_url: Option<String>,

    /// Basic auth username for Prometheus
    #[arg(long, env = "KRR_PROMETHEUS_USERNAME")]
    pub username: Option<String>,

    /// Basic auth password for Prometheus
    #[arg(long, env = "KRR_PROMETHEUS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute resource recommendations
    Recommend(RecommendArgs),

    /// List resolved workloads and their pods
    Workloads(WorkloadsArgs),

    /// Manage stored defaults
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let format = cli
        .format
        .unwrap_or_else(|| output::OutputFormat::from_config(config.default_format.as_deref()));

    let connection = client::ConnectionArgs {
        prometheus_url: cli.prometheus_url,
        username: cli.username,
        password: cli.password,
    };

    match cli.command {
        Commands::Recommend(args) => {
            commands::recommend::run(args, &connection, &config, format).await?;
        }
        Commands::Workloads(args) => {
            commands::workloads::run(args, &connection, &config, format).await?;
        }
        Commands::Config(command) => {
            commands::config::run(command, config, format)?;
        }
    }

    Ok(())
}
