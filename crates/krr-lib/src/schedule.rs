//! Periodic recommendation loop
//!
//! Runs a pass immediately and then on every interval tick. Each report is
//! sent on a channel; failed passes are logged and retried at the next tick.

use crate::engine::ResourceRecommender;
use crate::error::RecommendError;
use crate::health::{components, HealthRegistry};
use crate::models::RecommendationReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the recommendation loop
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Time between pass starts (default: 1 hour)
    pub interval: Duration,
    /// Channel buffer size for produced reports
    pub buffer_size: usize,
    /// Consecutive backend failures before Prometheus is marked unhealthy
    pub unhealthy_after: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            buffer_size: 4,
            unhealthy_after: 3,
        }
    }
}

/// Re-runs the recommender until shutdown
pub struct RecommendLoop {
    recommender: Arc<ResourceRecommender>,
    config: ScheduleConfig,
    reports_tx: mpsc::Sender<RecommendationReport>,
    health: Option<HealthRegistry>,
}

impl RecommendLoop {
    pub fn new(
        recommender: Arc<ResourceRecommender>,
        config: ScheduleConfig,
    ) -> (Self, mpsc::Receiver<RecommendationReport>) {
        let (reports_tx, reports_rx) = mpsc::channel(config.buffer_size.max(1));

        let loop_instance = Self {
            recommender,
            config,
            reports_tx,
            health: None,
        };

        (loop_instance, reports_rx)
    }

    /// Report pass outcomes to a health registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Run until `shutdown` flips to true or every report receiver is gone
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting recommendation loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pass_count = 0u64;
        let mut backend_failures = 0u32;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    pass_count += 1;
                    debug!(pass = pass_count, "Recommendation tick");

                    match self.recommender.run(&mut shutdown).await {
                        Ok(report) => {
                            backend_failures = 0;
                            self.record_success(&report).await;
                            if self.reports_tx.send(report).await.is_err() {
                                info!("Report receiver dropped, stopping recommendation loop");
                                break;
                            }
                        }
                        Err(RecommendError::Cancelled) => {
                            info!("Shutting down recommendation loop");
                            break;
                        }
                        Err(e) => {
                            warn!(
                                error = %e,
                                pass = pass_count,
                                "Recommendation pass failed, retrying at next interval"
                            );
                            if e.is_backend_failure() {
                                backend_failures = backend_failures.saturating_add(1);
                            } else {
                                backend_failures = 0;
                            }
                            self.record_failure(&e, backend_failures).await;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutting down recommendation loop");
                        break;
                    }
                }
            }
        }
    }

    async fn record_success(&self, report: &RecommendationReport) {
        if let Some(health) = &self.health {
            health.set_healthy(components::PROMETHEUS).await;
            health.set_healthy(components::RECOMMENDER).await;
            health.record_success(report.generated_at.timestamp()).await;
        }
    }

    async fn record_failure(&self, error: &RecommendError, backend_failures: u32) {
        if let Some(health) = &self.health {
            if backend_failures >= self.config.unhealthy_after.max(1) {
                health
                    .set_unhealthy(
                        components::PROMETHEUS,
                        format!("{} consecutive failures: {}", backend_failures, error),
                    )
                    .await;
            } else if error.is_backend_failure() {
                health
                    .set_degraded(components::PROMETHEUS, error.to_string())
                    .await;
            }
            health
                .set_degraded(components::RECOMMENDER, format!("Last pass failed: {}", error))
                .await;
        }
    }
}
