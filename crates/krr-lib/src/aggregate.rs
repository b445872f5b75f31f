//! Collapse direct pod owners into logical workloads

use crate::models::{WorkloadInfo, WorkloadKey};
use crate::ownership::{PodOwners, ReplicaParents};
use std::collections::HashMap;
use tracing::debug;

/// Counts of entries removed during aggregation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationOutcome {
    /// ReplicaSets with no resolvable controller
    pub orphaned: Vec<WorkloadKey>,
    /// Owners of bare pods (Node or no owner)
    pub bare_pods: usize,
}

/// Merge pod owners into workloads keyed by their top-level controller.
///
/// ReplicaSets are replaced by their parent and their pods are appended to it.
/// Node-owned pods are dropped. Everything else is already a top-level
/// controller and is kept under its own key.
pub fn aggregate(
    replica_parents: &ReplicaParents,
    pod_owners: &PodOwners,
) -> (HashMap<WorkloadKey, WorkloadInfo>, AggregationOutcome) {
    let mut result: HashMap<WorkloadKey, WorkloadInfo> = HashMap::new();
    let mut outcome = AggregationOutcome::default();

    for owner in pod_owners.values() {
        let key = if owner.key.is_replica_set() {
            match replica_parents.get(&owner.key) {
                Some(parent) => parent.clone(),
                None => {
                    debug!(
                        replicaset = %owner.key,
                        pods = owner.pods.len(),
                        "Dropping ReplicaSet without owner"
                    );
                    outcome.orphaned.push(owner.key.clone());
                    continue;
                }
            }
        } else if owner.key.is_bare_pod_owner() {
            outcome.bare_pods += owner.pods.len();
            continue;
        } else {
            owner.key.clone()
        };

        result
            .entry(key.clone())
            .or_insert_with(|| WorkloadInfo::new(key, Vec::new()))
            .pods
            .extend(owner.pods.iter().cloned());
    }

    outcome.orphaned.sort();
    (result, outcome)
}
