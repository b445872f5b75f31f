//! Currently configured requests and limits, for diff display

use crate::config::RecommenderConfig;
use crate::error::Result;
use crate::models::{
    Container, CpuResource, MemoryResource, Resource, WorkloadInfo, WorkloadKey,
    CPU_RESOURCE_TYPE, MEMORY_RESOURCE_TYPE,
};
use crate::observability::StructuredLogger;
use crate::prom::{query_vector, MetricQueryClient, Sample};
use crate::query;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct SpecResourceReader {
    client: Arc<dyn MetricQueryClient>,
    logger: StructuredLogger,
    query_timeout: Duration,
}

impl SpecResourceReader {
    pub fn new(
        client: Arc<dyn MetricQueryClient>,
        config: &RecommenderConfig,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            client,
            logger,
            query_timeout: config.query_timeout,
        }
    }

    /// Fill `spec_request`/`spec_limit` for every container. Failures leave
    /// the value unset.
    pub async fn fill(&self, workload: &mut WorkloadInfo, at: DateTime<Utc>) {
        let selector = query::pod_selector(&workload.pods);
        for container in workload.containers.iter_mut() {
            self.fill_container(&workload.key, &selector, container, at)
                .await;
        }
    }

    async fn fill_container(
        &self,
        key: &WorkloadKey,
        pod_selector: &str,
        container: &mut Container,
        at: DateTime<Utc>,
    ) {
        let (requests, limits) = tokio::join!(
            self.read(query::SPEC_REQUESTS_SERIES, key, pod_selector, &container.name, at),
            self.read(query::SPEC_LIMITS_SERIES, key, pod_selector, &container.name, at),
        );

        match requests {
            Ok(r) => container.spec_request = r,
            Err(e) => self.logger.log_metric_unset(
                &key.namespace,
                &key.kind,
                &key.name,
                &container.name,
                "spec_request",
                &e.to_string(),
            ),
        }
        match limits {
            Ok(r) => container.spec_limit = r,
            Err(e) => self.logger.log_metric_unset(
                &key.namespace,
                &key.kind,
                &key.name,
                &container.name,
                "spec_limit",
                &e.to_string(),
            ),
        }
    }

    async fn read(
        &self,
        series: &str,
        key: &WorkloadKey,
        pod_selector: &str,
        container: &str,
        at: DateTime<Utc>,
    ) -> Result<Resource> {
        let ql = query::spec_resource(series, &key.namespace, pod_selector, container);
        let samples = query_vector(self.client.as_ref(), &ql, at, self.query_timeout).await?;
        Ok(resource_from_samples(&samples))
    }
}

/// Pick cpu/memory values by the `resource` label, the largest across pods
pub fn resource_from_samples(samples: &[Sample]) -> Resource {
    let mut resource = Resource::default();
    for sample in samples.iter().filter(|s| s.value.is_finite()) {
        match sample.label("resource") {
            CPU_RESOURCE_TYPE => {
                resource.cpu = CpuResource(resource.cpu.cores().max(sample.value));
            }
            MEMORY_RESOURCE_TYPE => {
                resource.mem = MemoryResource(resource.mem.0.max(sample.value));
            }
            _ => {}
        }
    }
    resource
}
