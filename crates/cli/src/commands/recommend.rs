//! `krr recommend`

use anyhow::{Context, Result};
use clap::Args;
use krr_lib::{
    MemoryMetric, RecommendError, RecommendLoop, RecommenderConfig, ResourceRecommender,
    ScheduleConfig, StructuredLogger,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::{lookback_days, parse_duration};
use crate::client::ConnectionArgs;
use crate::config::Config;
use crate::output::{print_info, print_report, OutputFormat};

#[derive(Debug, Args)]
pub struct RecommendArgs {
    /// Namespace to analyze (all namespaces if empty)
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Days of history to analyze
    #[arg(long)]
    pub days: Option<u32>,

    /// Query resolution (e.g. 5m, 30m, 1h)
    #[arg(long, value_parser = parse_duration, default_value = "30m")]
    pub step: Duration,

    /// Minimum CPU in cores
    #[arg(long, default_value_t = 0.05)]
    pub min_cpu: f64,

    /// Minimum memory in MiB
    #[arg(long, default_value_t = 100)]
    pub min_memory: u64,

    /// Headroom added above the memory request for the limit
    #[arg(long, default_value_t = 0.15)]
    pub memory_buffer: f64,

    /// Quantile of CPU usage used for the request
    #[arg(long, default_value_t = 0.85)]
    pub cpu_request_percentile: f64,

    /// Quantile of CPU usage used for the limit
    #[arg(long, default_value_t = 0.99)]
    pub cpu_limit_percentile: f64,

    /// Memory metric: working-set or rss
    #[arg(long, default_value_t = MemoryMetric::Rss)]
    pub memory_metric: MemoryMetric,

    /// Workloads processed concurrently
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// Skip reading the currently configured requests and limits
    #[arg(long)]
    pub no_spec: bool,

    /// Maximum width of the name column (0 disables truncation)
    #[arg(long, default_value_t = 32)]
    pub name_max_width: usize,

    /// Re-run on this interval until interrupted (e.g. 30m)
    #[arg(long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Per-query timeout
    #[arg(long, value_parser = parse_duration, default_value = "5s")]
    pub timeout: Duration,
}

impl RecommendArgs {
    pub fn recommender_config(&self, config: &Config) -> Result<RecommenderConfig> {
        Ok(RecommenderConfig {
            namespace: self
                .namespace
                .clone()
                .or_else(|| config.default_namespace.clone())
                .unwrap_or_default(),
            lookback_days: lookback_days(self.days, config.lookback_days)?,
            step: self.step,
            min_cpu: self.min_cpu,
            min_memory_mib: self.min_memory,
            memory_buffer: self.memory_buffer,
            cpu_request_quantile: self.cpu_request_percentile,
            cpu_limit_quantile: self.cpu_limit_percentile,
            memory_metric: self.memory_metric,
            fetch_spec: !self.no_spec,
            max_concurrency: self.concurrency,
            query_timeout: self.timeout,
        })
    }
}

pub async fn run(
    args: RecommendArgs,
    connection: &ConnectionArgs,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let client = connection.connect(config, args.timeout)?;
    let recommender = ResourceRecommender::new(client, args.recommender_config(config)?)
        .context("Invalid recommendation settings")?
        .with_logger(StructuredLogger::new("krr-cli"));
    let show_spec = !args.no_spec;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let Some(interval) = args.interval else {
        return match recommender.run(&mut shutdown_rx).await {
            Ok(report) => print_report(&report, format, args.name_max_width, show_spec),
            Err(RecommendError::Cancelled) => {
                print_info("Interrupted");
                Ok(())
            }
            Err(e) => Err(e).context("Recommendation pass failed"),
        };
    };

    let schedule = ScheduleConfig {
        interval,
        ..Default::default()
    };
    let (recommend_loop, mut reports) = RecommendLoop::new(Arc::new(recommender), schedule);
    let handle = tokio::spawn(recommend_loop.run(shutdown_rx));

    while let Some(report) = reports.recv().await {
        print_report(&report, format, args.name_max_width, show_spec)?;
        if format == OutputFormat::Table {
            print_info(&format!(
                "Next run in {}, press Ctrl-C to stop",
                krr_lib::query::format_duration(interval)
            ));
        }
    }

    handle.await.context("Recommendation loop failed")?;
    Ok(())
}
