//! Container discovery from historical presence data

use crate::config::RecommenderConfig;
use crate::error::Result;
use crate::models::WorkloadInfo;
use crate::prom::{query_vector, MetricQueryClient};
use crate::query;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct ContainerDiscoverer {
    client: Arc<dyn MetricQueryClient>,
    lookback_days: u32,
    query_timeout: Duration,
}

impl ContainerDiscoverer {
    pub fn new(client: Arc<dyn MetricQueryClient>, config: &RecommenderConfig) -> Self {
        Self {
            client,
            lookback_days: config.lookback_days,
            query_timeout: config.query_timeout,
        }
    }

    /// Distinct container names seen for the workload's pods, sorted.
    ///
    /// A workload without pods or without presence data yields an empty list.
    pub async fn discover(
        &self,
        workload: &WorkloadInfo,
        at: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        if workload.pods.is_empty() {
            return Ok(Vec::new());
        }

        let ql = query::container_info(
            &workload.key.namespace,
            &query::pod_selector(&workload.pods),
            self.lookback_days,
        );
        let samples = query_vector(self.client.as_ref(), &ql, at, self.query_timeout).await?;

        let names: BTreeSet<String> = samples
            .iter()
            .map(|s| s.label("container"))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        Ok(names.into_iter().collect())
    }
}
