//! Core data models for workload recommendations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner kinds reported by kube-state-metrics
pub mod kinds {
    pub const DAEMON_SET: &str = "DaemonSet";
    pub const JOB: &str = "Job";
    pub const REPLICA_SET: &str = "ReplicaSet";
    pub const NODE: &str = "Node";
    pub const DEPLOYMENT: &str = "Deployment";
    pub const STATEFUL_SET: &str = "StatefulSet";
    /// Placeholder kube-state-metrics uses when an object has no owner
    pub const NONE: &str = "<none>";
}

/// Values of the `resource` label on spec request/limit series
pub const CPU_RESOURCE_TYPE: &str = "cpu";
pub const MEMORY_RESOURCE_TYPE: &str = "memory";

/// Identity of a logical workload or an intermediate controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadKey {
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

impl WorkloadKey {
    pub fn new(
        namespace: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn is_replica_set(&self) -> bool {
        self.kind == kinds::REPLICA_SET
    }

    /// Pods owned by a node or by nothing at all are not recommendable
    pub fn is_bare_pod_owner(&self) -> bool {
        self.kind == kinds::NODE || self.kind == kinds::NONE
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// One recommendation unit: a workload, the pods backing it and its containers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadInfo {
    #[serde(flatten)]
    pub key: WorkloadKey,
    pub pods: Vec<String>,
    pub containers: Vec<Container>,
}

impl WorkloadInfo {
    pub fn new(key: WorkloadKey, pods: Vec<String>) -> Self {
        Self {
            key,
            pods,
            containers: Vec::new(),
        }
    }
}

impl fmt::Display for WorkloadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pods: {:?}", self.key, self.pods)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    /// Recommended values
    pub request: Resource,
    pub limit: Resource,
    /// Values currently configured on the pods, display only
    pub spec_request: Resource,
    pub spec_limit: Resource,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True when any of the four recommended fields has no data
    pub fn has_unset_recommendation(&self) -> bool {
        self.request.cpu.is_zero()
            || self.request.mem.is_zero()
            || self.limit.cpu.is_zero()
            || self.limit.mem.is_zero()
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name: {}, request: {}, limit: {}, spec request: {}, spec limit: {}",
            self.name, self.request, self.limit, self.spec_request, self.spec_limit
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub cpu: CpuResource,
    pub mem: MemoryResource,
}

impl Resource {
    pub fn is_zero(&self) -> bool {
        self.cpu.is_zero() && self.mem.is_zero()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu: {}, mem: {}", self.cpu, self.mem)
    }
}

/// CPU in cores. Zero means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CpuResource(pub f64);

impl CpuResource {
    pub fn cores(&self) -> f64 {
        self.0
    }

    pub fn millicores(&self) -> u64 {
        (self.0 * 1000.0).round() as u64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }
}

impl fmt::Display for CpuResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millicores = self.millicores();
        if millicores < 1000 {
            write!(f, "{}m", millicores)
        } else {
            write!(f, "{:.1}", self.0)
        }
    }
}

/// Memory in bytes. Zero means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryResource(pub f64);

impl MemoryResource {
    pub fn bytes(&self) -> u64 {
        self.0.max(0.0).round() as u64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }
}

impl fmt::Display for MemoryResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const KI: f64 = 1024.0;
        const MI: f64 = KI * 1024.0;
        const GI: f64 = MI * 1024.0;

        let bytes = self.bytes() as f64;
        if bytes >= GI {
            write!(f, "{:.2}Gi", bytes / GI)
        } else if bytes >= MI {
            write!(f, "{:.2}Mi", bytes / MI)
        } else if bytes >= KI {
            write!(f, "{:.2}Ki", bytes / KI)
        } else {
            write!(f, "{}B", bytes)
        }
    }
}

/// Result of one recommendation pass, sorted by workload key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub generated_at: DateTime<Utc>,
    /// Namespace filter the pass ran with, empty for all namespaces
    pub namespace: String,
    pub workloads: Vec<WorkloadInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub workloads: usize,
    pub containers: usize,
    pub containers_with_unset: usize,
}

impl RecommendationReport {
    pub fn summary(&self) -> ReportSummary {
        let containers = self.workloads.iter().flat_map(|w| w.containers.iter());
        let (total, unset) = containers.fold((0, 0), |(total, unset), c| {
            (total + 1, unset + usize::from(c.has_unset_recommendation()))
        });

        ReportSummary {
            workloads: self.workloads.len(),
            containers: total,
            containers_with_unset: unset,
        }
    }

    /// Reports restricted to one namespace, used by the daemon API filter
    pub fn filter_namespace(&self, namespace: &str) -> Self {
        Self {
            generated_at: self.generated_at,
            namespace: namespace.to_string(),
            workloads: self
                .workloads
                .iter()
                .filter(|w| w.key.namespace == namespace)
                .cloned()
                .collect(),
        }
    }
}
