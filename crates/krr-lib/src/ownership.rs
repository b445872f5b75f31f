//! Ownership resolution from kube-state-metrics series
//!
//! Builds two maps: ReplicaSet -> parent controller, and direct owner -> pods.
//! Both come from a single `last_over_time` query over the lookback window so
//! objects that were terminated during the window are still visible.

use crate::config::RecommenderConfig;
use crate::error::Result;
use crate::models::{kinds, WorkloadInfo, WorkloadKey};
use crate::prom::{query_vector, MetricQueryClient, Sample};
use crate::query;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// ReplicaSet key -> key of the controller owning it
pub type ReplicaParents = HashMap<WorkloadKey, WorkloadKey>;

/// Direct owner key -> workload with the pods it owns
pub type PodOwners = HashMap<WorkloadKey, WorkloadInfo>;

#[derive(Clone)]
pub struct OwnershipResolver {
    client: Arc<dyn MetricQueryClient>,
    namespace: String,
    lookback_days: u32,
    query_timeout: Duration,
}

impl OwnershipResolver {
    pub fn new(client: Arc<dyn MetricQueryClient>, config: &RecommenderConfig) -> Self {
        Self {
            client,
            namespace: config.namespace.clone(),
            lookback_days: config.lookback_days,
            query_timeout: config.query_timeout,
        }
    }

    pub async fn replica_parents(&self, at: DateTime<Utc>) -> Result<ReplicaParents> {
        let ql = query::replicaset_owner(&self.namespace, self.lookback_days);
        let samples = query_vector(self.client.as_ref(), &ql, at, self.query_timeout).await?;
        let parents = replica_parents_from_samples(&samples);
        debug!(
            namespace = %self.namespace,
            samples = samples.len(),
            replicasets = parents.len(),
            "Resolved ReplicaSet owners"
        );
        Ok(parents)
    }

    pub async fn pod_owners(&self, at: DateTime<Utc>) -> Result<PodOwners> {
        let ql = query::pod_owner(&self.namespace, self.lookback_days);
        let samples = query_vector(self.client.as_ref(), &ql, at, self.query_timeout).await?;
        let owners = pod_owners_from_samples(&samples);
        debug!(
            namespace = %self.namespace,
            samples = samples.len(),
            owners = owners.len(),
            "Resolved pod owners"
        );
        Ok(owners)
    }
}

/// Group `kube_replicaset_owner` samples into ReplicaSet -> parent.
///
/// ReplicaSets without a controller produce no entry.
pub fn replica_parents_from_samples(samples: &[Sample]) -> ReplicaParents {
    let mut parents = ReplicaParents::new();
    for sample in samples {
        let parent_kind = sample.label("owner_kind");
        if parent_kind.is_empty() || parent_kind == kinds::NONE {
            continue;
        }

        let namespace = sample.label("namespace");
        let replicaset =
            WorkloadKey::new(namespace, kinds::REPLICA_SET, sample.label("replicaset"));
        let parent = WorkloadKey::new(namespace, parent_kind, sample.label("owner_name"));
        parents.insert(replicaset, parent);
    }
    parents
}

/// Group `kube_pod_owner` samples by owner, unioning pod names.
pub fn pod_owners_from_samples(samples: &[Sample]) -> PodOwners {
    let mut owners = PodOwners::new();
    for sample in samples {
        let kind = sample.label("owner_kind");
        let mut name = sample.label("owner_name");
        if name.is_empty() && kind == kinds::REPLICA_SET {
            name = sample.label("replicaset");
        }

        let key = WorkloadKey::new(sample.label("namespace"), kind, name);
        let pod = sample.label("pod");
        let entry = owners
            .entry(key.clone())
            .or_insert_with(|| WorkloadInfo::new(key, Vec::new()));
        if !entry.pods.iter().any(|p| p == pod) {
            entry.pods.push(pod.to_string());
        }
    }
    owners
}
