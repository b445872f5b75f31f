//! Recommendation policy configuration

use crate::error::{RecommendError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default lookback window in days
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;

/// Default subquery resolution
pub const DEFAULT_STEP: Duration = Duration::from_secs(30 * 60);

/// Default per-query timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Memory gauge used as the basis for memory recommendations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryMetric {
    /// `container_memory_working_set_bytes`
    WorkingSet,
    /// `container_memory_rss`
    #[default]
    Rss,
}

impl MemoryMetric {
    pub fn series(&self) -> &'static str {
        match self {
            MemoryMetric::WorkingSet => "container_memory_working_set_bytes",
            MemoryMetric::Rss => "container_memory_rss",
        }
    }
}

impl fmt::Display for MemoryMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryMetric::WorkingSet => write!(f, "working-set"),
            MemoryMetric::Rss => write!(f, "rss"),
        }
    }
}

impl FromStr for MemoryMetric {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "working-set" | "working_set" | "workingset" => Ok(MemoryMetric::WorkingSet),
            "rss" => Ok(MemoryMetric::Rss),
            other => Err(RecommendError::InvalidConfig(format!(
                "unknown memory metric '{}', expected working-set or rss",
                other
            ))),
        }
    }
}

/// Immutable configuration for one recommender instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Namespace filter, empty for all namespaces
    pub namespace: String,
    /// Trailing data window in days
    pub lookback_days: u32,
    /// Resolution of the rate window and of the range subqueries
    #[serde(with = "duration_secs")]
    pub step: Duration,
    /// Minimum CPU in cores
    pub min_cpu: f64,
    /// Minimum memory in MiB
    pub min_memory_mib: u64,
    /// Headroom added above the memory request to derive the limit
    pub memory_buffer: f64,
    pub cpu_request_quantile: f64,
    pub cpu_limit_quantile: f64,
    pub memory_metric: MemoryMetric,
    /// Read currently configured requests/limits for diffing
    pub fetch_spec: bool,
    /// Maximum number of workloads processed concurrently
    pub max_concurrency: usize,
    #[serde(with = "duration_secs")]
    pub query_timeout: Duration,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            step: DEFAULT_STEP,
            min_cpu: 0.05,
            min_memory_mib: 100,
            memory_buffer: 0.15,
            cpu_request_quantile: 0.85,
            cpu_limit_quantile: 0.99,
            memory_metric: MemoryMetric::default(),
            fetch_spec: true,
            max_concurrency: 8,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl RecommenderConfig {
    /// Memory floor in bytes
    pub fn min_memory_bytes(&self) -> f64 {
        (self.min_memory_mib * 1024 * 1024) as f64
    }

    /// Reject policies that would produce meaningless queries or values
    pub fn validate(&self) -> Result<()> {
        for (name, q) in [
            ("cpu_request_quantile", self.cpu_request_quantile),
            ("cpu_limit_quantile", self.cpu_limit_quantile),
        ] {
            if !(0.0..=1.0).contains(&q) {
                return Err(RecommendError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, q
                )));
            }
        }

        // Zero is reserved for unset values
        if !self.min_cpu.is_finite() || self.min_cpu <= 0.0 {
            return Err(RecommendError::InvalidConfig(format!(
                "min_cpu must be positive, got {}",
                self.min_cpu
            )));
        }
        if self.min_memory_mib == 0 {
            return Err(RecommendError::InvalidConfig(
                "min_memory_mib must be at least 1".to_string(),
            ));
        }
        if !self.memory_buffer.is_finite() || self.memory_buffer < 0.0 {
            return Err(RecommendError::InvalidConfig(format!(
                "memory_buffer must be non-negative, got {}",
                self.memory_buffer
            )));
        }
        if self.lookback_days == 0 {
            return Err(RecommendError::InvalidConfig(
                "lookback_days must be at least 1".to_string(),
            ));
        }
        if self.step.as_secs() == 0 {
            return Err(RecommendError::InvalidConfig(
                "step must be at least one second".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(RecommendError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
