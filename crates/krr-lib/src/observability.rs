//! Observability infrastructure for the recommender
//!
//! Provides:
//! - Prometheus self-metrics (pass latency, query latency, unset metrics)
//! - Structured event logging with tracing

use crate::models::{WorkloadInfo, WorkloadKey};
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Query latencies are bounded by the per-query timeout
const QUERY_LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

const PASS_LATENCY_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RecommenderMetricsInner> = OnceLock::new();

struct RecommenderMetricsInner {
    pass_latency_seconds: Histogram,
    query_latency_seconds: Histogram,
    passes_completed: IntCounter,
    passes_failed: IntCounter,
    query_errors: IntCounter,
    unset_metrics: IntCounter,
    workloads_recommended: IntGauge,
    containers_recommended: IntGauge,
    orphaned_replicasets: IntGauge,
    last_success_timestamp: IntGauge,
}

impl RecommenderMetricsInner {
    fn new() -> Self {
        Self {
            pass_latency_seconds: register_histogram!(
                "krr_pass_latency_seconds",
                "Wall-clock duration of a full recommendation pass",
                PASS_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register pass_latency_seconds"),

            query_latency_seconds: register_histogram!(
                "krr_query_latency_seconds",
                "Latency of individual monitoring backend queries",
                QUERY_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_latency_seconds"),

            passes_completed: register_int_counter!(
                "krr_passes_completed_total",
                "Recommendation passes that produced a report"
            )
            .expect("Failed to register passes_completed"),

            passes_failed: register_int_counter!(
                "krr_passes_failed_total",
                "Recommendation passes aborted by an error"
            )
            .expect("Failed to register passes_failed"),

            query_errors: register_int_counter!(
                "krr_query_errors_total",
                "Backend queries that returned an error"
            )
            .expect("Failed to register query_errors"),

            unset_metrics: register_int_counter!(
                "krr_unset_metrics_total",
                "Container metrics left unset for lack of data"
            )
            .expect("Failed to register unset_metrics"),

            workloads_recommended: register_int_gauge!(
                "krr_workloads_recommended",
                "Workloads in the latest report"
            )
            .expect("Failed to register workloads_recommended"),

            containers_recommended: register_int_gauge!(
                "krr_containers_recommended",
                "Containers in the latest report"
            )
            .expect("Failed to register containers_recommended"),

            orphaned_replicasets: register_int_gauge!(
                "krr_orphaned_replicasets",
                "ReplicaSets without a resolvable owner in the latest pass"
            )
            .expect("Failed to register orphaned_replicasets"),

            last_success_timestamp: register_int_gauge!(
                "krr_last_success_timestamp_seconds",
                "Unix time of the latest successful pass"
            )
            .expect("Failed to register last_success_timestamp"),
        }
    }
}

/// Lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct RecommenderMetrics {
    _private: (),
}

impl Default for RecommenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommenderMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RecommenderMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RecommenderMetricsInner {
        GLOBAL_METRICS.get_or_init(RecommenderMetricsInner::new)
    }

    pub fn observe_pass_latency(&self, duration_secs: f64) {
        self.inner().pass_latency_seconds.observe(duration_secs);
    }

    pub fn observe_query_latency(&self, duration_secs: f64) {
        self.inner().query_latency_seconds.observe(duration_secs);
    }

    /// Record a successful pass and the size of its report
    pub fn record_pass_success(&self, workloads: usize, containers: usize, timestamp: i64) {
        let inner = self.inner();
        inner.passes_completed.inc();
        inner.workloads_recommended.set(workloads as i64);
        inner.containers_recommended.set(containers as i64);
        inner.last_success_timestamp.set(timestamp);
    }

    pub fn inc_passes_failed(&self) {
        self.inner().passes_failed.inc();
    }

    pub fn inc_query_errors(&self) {
        self.inner().query_errors.inc();
    }

    pub fn inc_unset_metrics(&self) {
        self.inner().unset_metrics.inc();
    }

    pub fn set_orphaned_replicasets(&self, count: usize) {
        self.inner().orphaned_replicasets.set(count as i64);
    }
}

/// Structured logger for recommender events
///
/// Every record carries an `event` field and the `source` (cli or daemon
/// instance) that produced it.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    source: String,
}

impl StructuredLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn log_startup(&self, version: &str, endpoint: &str) {
        info!(
            event = "recommender_started",
            source = %self.source,
            version = %version,
            endpoint = %endpoint,
            "Resource recommender started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "recommender_shutdown",
            source = %self.source,
            reason = %reason,
            "Resource recommender shutting down"
        );
    }

    pub fn log_pass_started(&self, namespace: &str, lookback_days: u32) {
        info!(
            event = "pass_started",
            source = %self.source,
            namespace = %display_namespace(namespace),
            lookback_days = lookback_days,
            "Recommendation pass started"
        );
    }

    pub fn log_pass_completed(
        &self,
        namespace: &str,
        workloads: usize,
        containers: usize,
        containers_with_unset: usize,
        elapsed_ms: u128,
    ) {
        info!(
            event = "pass_completed",
            source = %self.source,
            namespace = %display_namespace(namespace),
            workloads = workloads,
            containers = containers,
            containers_with_unset = containers_with_unset,
            elapsed_ms = elapsed_ms,
            "Recommendation pass completed"
        );
    }

    pub fn log_pass_failed(&self, namespace: &str, error: &str) {
        warn!(
            event = "pass_failed",
            source = %self.source,
            namespace = %display_namespace(namespace),
            error = %error,
            "Recommendation pass failed"
        );
    }

    pub fn log_orphaned_replicaset(&self, replicaset: &WorkloadKey) {
        warn!(
            event = "orphaned_replicaset",
            source = %self.source,
            namespace = %replicaset.namespace,
            replicaset = %replicaset.name,
            "ReplicaSet has no resolvable owner, skipping"
        );
    }

    pub fn log_metric_unset(
        &self,
        namespace: &str,
        kind: &str,
        workload: &str,
        container: &str,
        metric: &str,
        reason: &str,
    ) {
        warn!(
            event = "metric_unset",
            source = %self.source,
            namespace = %namespace,
            kind = %kind,
            workload = %workload,
            container = %container,
            metric = %metric,
            reason = %reason,
            "No value for container metric, leaving unset"
        );
    }

    pub fn log_workload_recommended(&self, workload: &WorkloadInfo) {
        let containers: Vec<String> = workload.containers.iter().map(|c| c.to_string()).collect();
        debug!(
            event = "workload_recommended",
            source = %self.source,
            workload = %workload.key,
            pods = workload.pods.len(),
            containers = ?containers,
            "Workload recommended"
        );
    }
}

fn display_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        "<all>"
    } else {
        namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommender_metrics_creation() {
        let metrics = RecommenderMetrics::new();

        metrics.observe_pass_latency(1.5);
        metrics.observe_query_latency(0.02);
        metrics.record_pass_success(3, 5, 1_700_000_000);
        metrics.inc_passes_failed();
        metrics.inc_query_errors();
        metrics.inc_unset_metrics();
        metrics.set_orphaned_replicasets(2);

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.iter().any(|n| n == "krr_workloads_recommended"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("cli");
        assert_eq!(logger.source, "cli");
        assert_eq!(display_namespace(""), "<all>");
    }
}
