//! Prometheus connection settings resolved from flags, environment and config

use anyhow::{Context, Result};
use krr_lib::{MetricQueryClient, PrometheusClient, PrometheusConfig};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

/// Connection flags as given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub prometheus_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectionArgs {
    /// Flags (and their env vars) win over the user config, then the default endpoint
    pub fn resolve(&self, config: &Config, timeout: Duration) -> PrometheusConfig {
        let defaults = PrometheusConfig::default();
        PrometheusConfig {
            endpoint: self
                .prometheus_url
                .clone()
                .or_else(|| config.prometheus_url.clone())
                .unwrap_or(defaults.endpoint),
            username: self.username.clone().or_else(|| config.username.clone()),
            password: self.password.clone(),
            timeout,
        }
    }

    /// Create a query client for the resolved endpoint
    pub fn connect(
        &self,
        config: &Config,
        timeout: Duration,
    ) -> Result<Arc<dyn MetricQueryClient>> {
        let settings = self.resolve(config, timeout);
        let endpoint = settings.endpoint.clone();
        let client = PrometheusClient::new(settings)
            .with_context(|| format!("Failed to create Prometheus client for {}", endpoint))?;
        tracing::debug!(url = %client.query_url(), "Using Prometheus endpoint");
        Ok(Arc::new(client))
    }
}
