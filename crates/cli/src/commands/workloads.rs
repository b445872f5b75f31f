//! `krr workloads`

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use krr_lib::{RecommenderConfig, ResourceRecommender, StructuredLogger};
use std::time::Duration;

use super::{lookback_days, parse_duration};
use crate::client::ConnectionArgs;
use crate::config::Config;
use crate::output::{print_json, print_table, print_warning, workload_rows, OutputFormat};

#[derive(Debug, Args)]
pub struct WorkloadsArgs {
    /// Namespace to list (all namespaces if empty)
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Days of ownership history to consider
    #[arg(long)]
    pub days: Option<u32>,

    /// Maximum width of the name column (0 disables truncation)
    #[arg(long, default_value_t = 32)]
    pub name_max_width: usize,

    /// Per-query timeout
    #[arg(long, value_parser = parse_duration, default_value = "5s")]
    pub timeout: Duration,
}

pub async fn run(
    args: WorkloadsArgs,
    connection: &ConnectionArgs,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let recommender_config = RecommenderConfig {
        namespace: args
            .namespace
            .clone()
            .or_else(|| config.default_namespace.clone())
            .unwrap_or_default(),
        lookback_days: lookback_days(args.days, config.lookback_days)?,
        query_timeout: args.timeout,
        ..Default::default()
    };

    let client = connection.connect(config, args.timeout)?;
    let recommender = ResourceRecommender::new(client, recommender_config)
        .context("Invalid settings")?
        .with_logger(StructuredLogger::new("krr-cli"));

    let workloads = recommender
        .resolve_workloads(Utc::now())
        .await
        .context("Failed to resolve workloads")?;

    match format {
        OutputFormat::Json => print_json(&workloads)?,
        OutputFormat::Table => {
            if workloads.is_empty() {
                print_warning("No workloads found");
                return Ok(());
            }
            let total = workloads.len();
            print_table(workload_rows(&workloads, args.name_max_width));
            println!("\nTotal: {} workloads", total);
        }
    }

    Ok(())
}
