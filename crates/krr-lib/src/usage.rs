//! Usage-based request/limit recommendations
//!
//! CPU uses quantiles of the per-pod rate so short bursts do not drive the
//! values. Memory uses the observed peak plus a buffer, since exceeding a
//! memory limit kills the container.

use crate::config::RecommenderConfig;
use crate::error::Result;
use crate::models::{Container, CpuResource, MemoryResource, WorkloadInfo, WorkloadKey};
use crate::observability::{RecommenderMetrics, StructuredLogger};
use crate::prom::{max_finite_value, query_vector, MetricQueryClient};
use crate::query;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// CPU request or limit from an observed quantile
pub fn cpu_value(observed: f64, min_cpu: f64) -> f64 {
    observed.max(min_cpu)
}

/// Memory request from an observed peak
pub fn memory_request(peak: f64, min_memory: f64) -> f64 {
    peak.max(min_memory)
}

/// Memory limit: the request plus buffer, never below the floor
pub fn memory_limit(request: f64, buffer: f64, min_memory: f64) -> f64 {
    (request * (1.0 + buffer)).max(min_memory)
}

/// Fields left unset for one container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnsetFields {
    pub cpu_request: bool,
    pub cpu_limit: bool,
    pub memory: bool,
}

impl UnsetFields {
    pub fn count(&self) -> usize {
        usize::from(self.cpu_request) + usize::from(self.cpu_limit) + usize::from(self.memory)
    }
}

#[derive(Clone)]
pub struct UsageRecommender {
    client: Arc<dyn MetricQueryClient>,
    config: Arc<RecommenderConfig>,
    logger: StructuredLogger,
}

impl UsageRecommender {
    pub fn new(
        client: Arc<dyn MetricQueryClient>,
        config: Arc<RecommenderConfig>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            client,
            config,
            logger,
        }
    }

    /// Fill `request`/`limit` for every container of the workload.
    ///
    /// Returns the number of metrics that could not be computed.
    pub async fn recommend(&self, workload: &mut WorkloadInfo, at: DateTime<Utc>) -> usize {
        let selector = query::pod_selector(&workload.pods);
        let mut unset = 0;
        for container in workload.containers.iter_mut() {
            unset += self
                .recommend_container(&workload.key, &selector, container, at)
                .await
                .count();
        }
        unset
    }

    /// Compute one container. Each metric fails independently.
    pub async fn recommend_container(
        &self,
        key: &WorkloadKey,
        pod_selector: &str,
        container: &mut Container,
        at: DateTime<Utc>,
    ) -> UnsetFields {
        let cfg = &self.config;
        let ns = key.namespace.as_str();
        let name = container.name.clone();

        let cpu_request_ql = query::cpu_quantile(
            cfg.cpu_request_quantile,
            ns,
            pod_selector,
            &name,
            cfg.step,
            cfg.lookback_days,
        );
        let cpu_limit_ql = query::cpu_quantile(
            cfg.cpu_limit_quantile,
            ns,
            pod_selector,
            &name,
            cfg.step,
            cfg.lookback_days,
        );
        let memory_ql = query::memory_peak(
            cfg.memory_metric.series(),
            ns,
            pod_selector,
            &name,
            cfg.step,
            cfg.lookback_days,
        );

        let (cpu_request, cpu_limit, memory) = tokio::join!(
            self.observe(&cpu_request_ql, at),
            self.observe(&cpu_limit_ql, at),
            self.observe(&memory_ql, at),
        );

        let mut unset = UnsetFields::default();

        match cpu_request {
            Ok(v) => container.request.cpu = CpuResource(cpu_value(v, cfg.min_cpu)),
            Err(e) => {
                unset.cpu_request = true;
                self.report_unset(key, &name, "cpu_request", &e.to_string());
            }
        }

        match cpu_limit {
            Ok(v) => container.limit.cpu = CpuResource(cpu_value(v, cfg.min_cpu)),
            Err(e) => {
                unset.cpu_limit = true;
                self.report_unset(key, &name, "cpu_limit", &e.to_string());
            }
        }

        match memory {
            Ok(peak) => {
                let floor = cfg.min_memory_bytes();
                let request = memory_request(peak, floor);
                container.request.mem = MemoryResource(request);
                container.limit.mem =
                    MemoryResource(memory_limit(request, cfg.memory_buffer, floor));
            }
            Err(e) => {
                unset.memory = true;
                self.report_unset(key, &name, "memory", &e.to_string());
            }
        }

        unset
    }

    async fn observe(&self, ql: &str, at: DateTime<Utc>) -> Result<f64> {
        let samples = query_vector(self.client.as_ref(), ql, at, self.config.query_timeout).await?;
        max_finite_value(&samples, ql)
    }

    fn report_unset(&self, key: &WorkloadKey, container: &str, metric: &str, reason: &str) {
        RecommenderMetrics::new().inc_unset_metrics();
        self.logger.log_metric_unset(
            &key.namespace,
            &key.kind,
            &key.name,
            container,
            metric,
            reason,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::kinds;
    use crate::testing::{sample, Reply, ScriptedClient};
    use std::time::Duration;

    const MIB: f64 = 1024.0 * 1024.0;

    fn recommender(client: ScriptedClient, config: RecommenderConfig) -> UsageRecommender {
        UsageRecommender::new(Arc::new(client), Arc::new(config), StructuredLogger::new("test"))
    }

    fn workload(containers: &[&str]) -> WorkloadInfo {
        let mut w = WorkloadInfo::new(
            WorkloadKey::new("ns", kinds::DEPLOYMENT, "app"),
            vec!["app-1".to_string()],
        );
        w.containers = containers.iter().map(|c| Container::new(*c)).collect();
        w
    }

    #[test]
    fn test_floors_are_monotonic() {
        for observed in [0.0, 0.01, 0.05, 0.3, 4.0] {
            assert!(cpu_value(observed, 0.05) >= 0.05);
        }
        for peak in [0.0, 10.0 * MIB, 500.0 * MIB] {
            let floor = 100.0 * MIB;
            let request = memory_request(peak, floor);
            assert!(request >= floor);
            assert!(memory_limit(request, 0.15, floor) >= floor);
        }
    }

    #[test]
    fn test_buffer_law() {
        let floor = 100.0 * MIB;
        let request = memory_request(400.0 * MIB, floor);
        assert_eq!(memory_limit(request, 0.15, floor), request * 1.15);

        // floor dominates: limit follows the same max-based formula
        let request = memory_request(10.0 * MIB, floor);
        assert_eq!(request, floor);
        assert_eq!(memory_limit(request, 0.15, floor), (floor * 1.15).max(floor));
    }

    #[tokio::test]
    async fn test_cpu_request_above_floor() {
        let client = ScriptedClient::new()
            .on(&["quantile_over_time(0.85"], Reply::Vector(vec![sample(&[], 0.12)]))
            .on(&["quantile_over_time(0.99"], Reply::Vector(vec![sample(&[], 0.4)]))
            .on(&["max_over_time"], Reply::Vector(vec![sample(&[], 200.0 * MIB)]));
        let r = recommender(client, RecommenderConfig::default());

        let mut w = workload(&["app"]);
        let unset = r.recommend(&mut w, Utc::now()).await;

        let c = &w.containers[0];
        assert_eq!(unset, 0);
        assert_eq!(c.request.cpu, CpuResource(0.12));
        assert_eq!(c.request.cpu.to_string(), "120m");
        assert_eq!(c.limit.cpu, CpuResource(0.4));
        assert_eq!(c.request.mem, MemoryResource(200.0 * MIB));
        assert_eq!(c.limit.mem, MemoryResource(200.0 * MIB * 1.15));
    }

    #[tokio::test]
    async fn test_zero_memory_peak_uses_floor() {
        let client = ScriptedClient::new()
            .on(&["quantile_over_time"], Reply::Vector(vec![sample(&[], 0.0)]))
            .on(&["max_over_time"], Reply::Vector(vec![sample(&[], 0.0)]));
        let config = RecommenderConfig {
            memory_buffer: 0.5,
            ..Default::default()
        };
        let r = recommender(client, config);

        let mut w = workload(&["app"]);
        r.recommend(&mut w, Utc::now()).await;

        let c = &w.containers[0];
        assert_eq!(c.request.mem.bytes(), 104_857_600);
        assert_eq!(c.request.cpu, CpuResource(0.05));
        assert_eq!(c.limit.cpu, CpuResource(0.05));
    }

    #[tokio::test]
    async fn test_memory_failure_is_isolated() {
        let client = ScriptedClient::new()
            .on(&["max_over_time", "container=\"sidecar\""], Reply::Unavailable)
            .on(&["quantile_over_time"], Reply::Vector(vec![sample(&[], 0.2)]))
            .on(&["max_over_time"], Reply::Vector(vec![sample(&[], 300.0 * MIB)]));
        let r = recommender(client, RecommenderConfig::default());

        let mut w = workload(&["app", "sidecar"]);
        let unset = r.recommend(&mut w, Utc::now()).await;
        assert_eq!(unset, 1);

        let app = &w.containers[0];
        assert_eq!(app.request.mem, MemoryResource(300.0 * MIB));
        assert_eq!(app.request.cpu, CpuResource(0.2));

        let sidecar = &w.containers[1];
        assert_eq!(sidecar.request.cpu, CpuResource(0.2));
        assert_eq!(sidecar.limit.cpu, CpuResource(0.2));
        assert!(sidecar.request.mem.is_zero());
        assert!(sidecar.limit.mem.is_zero());
    }

    #[tokio::test]
    async fn test_no_samples_leaves_fields_unset() {
        let r = recommender(ScriptedClient::new(), RecommenderConfig::default());

        let mut w = workload(&["app"]);
        let unset = r.recommend(&mut w, Utc::now()).await;

        assert_eq!(unset, 3);
        assert!(w.containers[0].request.is_zero());
        assert!(w.containers[0].limit.is_zero());
    }

    #[tokio::test]
    async fn test_slow_queries_hit_configured_timeout() {
        let client = ScriptedClient::new()
            .on(&["quantile_over_time"], Reply::Vector(vec![sample(&[], 0.2)]))
            .with_delay(Duration::from_secs(30));
        let config = RecommenderConfig {
            query_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let r = recommender(client, config);

        let mut w = workload(&["app"]);
        let unset = tokio::time::timeout(Duration::from_secs(5), r.recommend(&mut w, Utc::now()))
            .await
            .expect("configured query timeout not applied");

        assert_eq!(unset, 3);
        assert!(w.containers[0].request.is_zero());
    }

    #[tokio::test]
    async fn test_max_across_pods_and_configured_metric() {
        let client = ScriptedClient::new()
            .on(
                &["quantile_over_time"],
                Reply::Vector(vec![sample(&[("pod", "a")], 0.1), sample(&[("pod", "b")], 0.3)]),
            )
            .on(
                &["container_memory_working_set_bytes"],
                Reply::Vector(vec![sample(&[], 150.0 * MIB)]),
            );
        let config = RecommenderConfig {
            memory_metric: crate::MemoryMetric::WorkingSet,
            cpu_limit_quantile: 0.95,
            ..Default::default()
        };
        let client = Arc::new(client);
        let r = UsageRecommender::new(
            client.clone(),
            Arc::new(config),
            StructuredLogger::new("test"),
        );

        let mut w = workload(&["app"]);
        r.recommend(&mut w, Utc::now()).await;

        assert_eq!(w.containers[0].request.cpu, CpuResource(0.3));
        assert_eq!(w.containers[0].request.mem, MemoryResource(150.0 * MIB));
        assert!(client.calls().iter().any(|q| q.starts_with("quantile_over_time(0.95")));
    }
}
