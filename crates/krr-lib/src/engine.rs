//! Recommendation pass driver
//!
//! One pass resolves ownership, aggregates workloads, then fans out one task
//! per workload on a bounded `JoinSet`. Ownership and container discovery
//! failures abort the pass; usage and spec failures only leave fields unset.

use crate::aggregate::aggregate;
use crate::config::RecommenderConfig;
use crate::containers::ContainerDiscoverer;
use crate::error::{RecommendError, Result};
use crate::models::{Container, RecommendationReport, WorkloadInfo};
use crate::observability::{RecommenderMetrics, StructuredLogger};
use crate::ownership::OwnershipResolver;
use crate::prom::MetricQueryClient;
use crate::spec_reader::SpecResourceReader;
use crate::usage::UsageRecommender;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::debug;

/// Per-workload stages, cloned into every task
#[derive(Clone)]
struct WorkloadStages {
    discoverer: ContainerDiscoverer,
    usage: UsageRecommender,
    spec: Option<SpecResourceReader>,
}

impl WorkloadStages {
    async fn run(&self, mut workload: WorkloadInfo, at: DateTime<Utc>) -> Result<WorkloadInfo> {
        workload.containers = self
            .discoverer
            .discover(&workload, at)
            .await?
            .into_iter()
            .map(Container::new)
            .collect();

        let unset = self.usage.recommend(&mut workload, at).await;
        if let Some(spec) = &self.spec {
            spec.fill(&mut workload, at).await;
        }

        debug!(
            workload = %workload.key,
            containers = workload.containers.len(),
            unset,
            "Workload processed"
        );
        Ok(workload)
    }
}

/// Drives recommendation passes against one monitoring backend
pub struct ResourceRecommender {
    client: Arc<dyn MetricQueryClient>,
    config: Arc<RecommenderConfig>,
    logger: StructuredLogger,
    metrics: RecommenderMetrics,
}

impl ResourceRecommender {
    /// Fails with `InvalidConfig` before any query is issued.
    pub fn new(client: Arc<dyn MetricQueryClient>, config: RecommenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config: Arc::new(config),
            logger: StructuredLogger::new("krr"),
            metrics: RecommenderMetrics::new(),
        })
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Resolve and aggregate the workload universe, sorted by key.
    ///
    /// Containers are not discovered here.
    pub async fn resolve_workloads(&self, at: DateTime<Utc>) -> Result<Vec<WorkloadInfo>> {
        let resolver = OwnershipResolver::new(self.client.clone(), &self.config);
        let replica_parents = resolver.replica_parents(at).await?;
        let pod_owners = resolver.pod_owners(at).await?;

        let (workloads, outcome) = aggregate(&replica_parents, &pod_owners);
        for replicaset in &outcome.orphaned {
            self.logger.log_orphaned_replicaset(replicaset);
        }
        self.metrics.set_orphaned_replicasets(outcome.orphaned.len());
        debug!(
            workloads = workloads.len(),
            orphaned = outcome.orphaned.len(),
            bare_pods = outcome.bare_pods,
            "Aggregated workloads"
        );

        let mut workloads: Vec<WorkloadInfo> = workloads.into_values().collect();
        workloads.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(workloads)
    }

    /// Run one pass, aborting promptly when `shutdown` flips to true.
    ///
    /// A cancelled pass returns `Cancelled` and discards partial results.
    pub async fn run(&self, shutdown: &mut watch::Receiver<bool>) -> Result<RecommendationReport> {
        if *shutdown.borrow() {
            return Err(RecommendError::Cancelled);
        }

        let namespace = self.config.namespace.as_str();
        self.logger
            .log_pass_started(namespace, self.config.lookback_days);
        let start = Instant::now();

        let result = tokio::select! {
            result = self.run_pass(Utc::now()) => result,
            _ = wait_for_shutdown(shutdown) => Err(RecommendError::Cancelled),
        };

        let elapsed = start.elapsed();
        self.metrics.observe_pass_latency(elapsed.as_secs_f64());

        match &result {
            Ok(report) => {
                let summary = report.summary();
                self.metrics.record_pass_success(
                    summary.workloads,
                    summary.containers,
                    report.generated_at.timestamp(),
                );
                self.logger.log_pass_completed(
                    namespace,
                    summary.workloads,
                    summary.containers,
                    summary.containers_with_unset,
                    elapsed.as_millis(),
                );
            }
            Err(RecommendError::Cancelled) => {
                self.logger.log_pass_failed(namespace, "cancelled");
            }
            Err(e) => {
                self.metrics.inc_passes_failed();
                self.logger.log_pass_failed(namespace, &e.to_string());
            }
        }

        result
    }

    /// Run one pass to completion with a fixed evaluation time
    pub async fn run_pass(&self, at: DateTime<Utc>) -> Result<RecommendationReport> {
        let workloads = self.resolve_workloads(at).await?;

        let stages = WorkloadStages {
            discoverer: ContainerDiscoverer::new(self.client.clone(), &self.config),
            usage: UsageRecommender::new(
                self.client.clone(),
                self.config.clone(),
                self.logger.clone(),
            ),
            spec: self.config.fetch_spec.then(|| {
                SpecResourceReader::new(self.client.clone(), &self.config, self.logger.clone())
            }),
        };

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut join_set: JoinSet<Result<WorkloadInfo>> = JoinSet::new();

        for workload in workloads {
            let stages = stages.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| RecommendError::TaskFailed(e.to_string()))?;
                stages.run(workload, at).await
            });
        }

        let mut results = Vec::with_capacity(join_set.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(workload)) => {
                    self.logger.log_workload_recommended(&workload);
                    results.push(workload);
                }
                Ok(Err(e)) => {
                    join_set.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    join_set.abort_all();
                    return Err(RecommendError::TaskFailed(e.to_string()));
                }
            }
        }

        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(RecommendationReport {
            generated_at: at,
            namespace: self.config.namespace.clone(),
            workloads: results,
        })
    }
}

/// Resolves once the flag is set. A dropped sender never cancels.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
