//! krr-daemon - Kubernetes resource recommender service
//!
//! Re-runs the recommendation engine on an interval and serves the latest
//! report alongside health and Prometheus self-metrics.

use anyhow::{Context, Result};
use krr_daemon::{api, config::DaemonConfig};
use krr_lib::{
    health::{components, HealthRegistry},
    PrometheusClient, RecommenderMetrics, RecommendLoop, ResourceRecommender, StructuredLogger,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DAEMON_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting krr-daemon");

    let config = DaemonConfig::load()?;
    info!(
        instance = %config.instance_name,
        namespace = %config.namespace,
        interval_secs = config.interval_secs,
        "Daemon configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::PROMETHEUS).await;
    health_registry.register(components::RECOMMENDER).await;

    let metrics = RecommenderMetrics::new();

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(DAEMON_VERSION, &config.prometheus_url);

    let client = PrometheusClient::new(config.prometheus_config())
        .context("Failed to create Prometheus client")?;
    let recommender = ResourceRecommender::new(Arc::new(client), config.recommender_config())
        .context("Invalid recommender configuration")?
        .with_logger(logger.clone());

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (recommend_loop, mut reports) =
        RecommendLoop::new(Arc::new(recommender), config.schedule_config());
    let loop_handle = tokio::spawn(recommend_loop.with_health(health_registry).run(shutdown_rx));

    let publisher_state = app_state.clone();
    let publisher = tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            publisher_state.publish(report).await;
        }
    });

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
        served = api_handle => {
            match served {
                Ok(Ok(())) => warn!("API server exited"),
                Ok(Err(e)) => warn!(error = %e, "API server failed"),
                Err(e) => warn!(error = %e, "API server task panicked"),
            }
            logger.log_shutdown("API server stopped");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = loop_handle.await {
        warn!(error = %e, "Recommendation loop task failed");
    }
    let _ = publisher.await;
    info!("Shutting down");

    Ok(())
}
