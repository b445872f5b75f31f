//! Daemon configuration

use anyhow::{Context, Result};
use krr_lib::config::{DEFAULT_LOOKBACK_DAYS, DEFAULT_QUERY_TIMEOUT, DEFAULT_STEP};
use krr_lib::{MemoryMetric, PrometheusConfig, RecommenderConfig, ScheduleConfig};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "KRR_CONFIG_FILE";

/// Daemon configuration, read from `KRR_*` variables and an optional file
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Name attached to every log record, usually the pod name
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for health/metrics/recommendations
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,
    #[serde(default)]
    pub prometheus_username: Option<String>,
    #[serde(default)]
    pub prometheus_password: Option<String>,

    /// Seconds between recommendation passes
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default)]
    pub namespace: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_step")]
    pub step_secs: u64,
    #[serde(default = "default_min_cpu")]
    pub min_cpu: f64,
    #[serde(default = "default_min_memory_mib")]
    pub min_memory_mib: u64,
    #[serde(default = "default_memory_buffer")]
    pub memory_buffer: f64,
    #[serde(default = "default_cpu_request_quantile")]
    pub cpu_request_quantile: f64,
    #[serde(default = "default_cpu_limit_quantile")]
    pub cpu_limit_quantile: f64,
    #[serde(default)]
    pub memory_metric: MemoryMetric,
    #[serde(default = "default_fetch_spec")]
    pub fetch_spec: bool,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

fn default_instance_name() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "krr-daemon".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_prometheus_url() -> String {
    PrometheusConfig::default().endpoint
}

fn default_interval() -> u64 {
    60 * 60
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

fn default_step() -> u64 {
    DEFAULT_STEP.as_secs()
}

fn default_min_cpu() -> f64 {
    RecommenderConfig::default().min_cpu
}

fn default_min_memory_mib() -> u64 {
    RecommenderConfig::default().min_memory_mib
}

fn default_memory_buffer() -> f64 {
    RecommenderConfig::default().memory_buffer
}

fn default_cpu_request_quantile() -> f64 {
    RecommenderConfig::default().cpu_request_quantile
}

fn default_cpu_limit_quantile() -> f64 {
    RecommenderConfig::default().cpu_limit_quantile
}

fn default_fetch_spec() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    RecommenderConfig::default().max_concurrency
}

fn default_query_timeout() -> u64 {
    DEFAULT_QUERY_TIMEOUT.as_secs()
}

impl DaemonConfig {
    /// Load configuration from environment and config file
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::from_sources(file.as_deref(), config::Environment::with_prefix("KRR"))
    }

    /// Build from an optional file, overridden by the environment source
    pub fn from_sources(file: Option<&str>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config = builder
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read daemon configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid daemon configuration")?;
        Ok(config)
    }

    pub fn recommender_config(&self) -> RecommenderConfig {
        RecommenderConfig {
            namespace: self.namespace.clone(),
            lookback_days: self.lookback_days,
            step: Duration::from_secs(self.step_secs),
            min_cpu: self.min_cpu,
            min_memory_mib: self.min_memory_mib,
            memory_buffer: self.memory_buffer,
            cpu_request_quantile: self.cpu_request_quantile,
            cpu_limit_quantile: self.cpu_limit_quantile,
            memory_metric: self.memory_metric,
            fetch_spec: self.fetch_spec,
            max_concurrency: self.max_concurrency,
            query_timeout: Duration::from_secs(self.query_timeout_secs),
        }
    }

    pub fn prometheus_config(&self) -> PrometheusConfig {
        PrometheusConfig {
            endpoint: self.prometheus_url.clone(),
            username: self.prometheus_username.clone(),
            password: self.prometheus_password.clone(),
            timeout: Duration::from_secs(self.query_timeout_secs),
        }
    }

    pub fn schedule_config(&self) -> ScheduleConfig {
        ScheduleConfig {
            interval: Duration::from_secs(self.interval_secs.max(1)),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix("KRR").source(Some(map))
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = DaemonConfig::from_sources(None, env(&[])).unwrap();

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.interval_secs, 3600);
        assert_eq!(config.prometheus_url, "http://localhost:9090");
        assert_eq!(config.recommender_config(), RecommenderConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = DaemonConfig::from_sources(
            None,
            env(&[
                ("KRR_API_PORT", "9000"),
                ("KRR_NAMESPACE", "payments"),
                ("KRR_MEMORY_METRIC", "working-set"),
                ("KRR_CPU_LIMIT_QUANTILE", "0.95"),
                ("KRR_FETCH_SPEC", "false"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_port, 9000);
        let recommender = config.recommender_config();
        assert_eq!(recommender.namespace, "payments");
        assert_eq!(recommender.memory_metric, MemoryMetric::WorkingSet);
        assert_eq!(recommender.cpu_limit_quantile, 0.95);
        assert!(!recommender.fetch_spec);
    }

    #[test]
    fn test_file_source_with_environment_precedence() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "prometheus_url = \"http://prometheus.monitoring:9090\"\nlookback_days = 14\napi_port = 7000"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config =
            DaemonConfig::from_sources(Some(&path), env(&[("KRR_API_PORT", "7100")])).unwrap();

        assert_eq!(config.prometheus_url, "http://prometheus.monitoring:9090");
        assert_eq!(config.lookback_days, 14);
        assert_eq!(config.api_port, 7100);
        assert_eq!(config.prometheus_config().endpoint, config.prometheus_url);
    }
}
