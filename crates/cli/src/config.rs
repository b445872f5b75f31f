//! Configuration management for the CLI

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User defaults persisted in `~/.config/krr/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Prometheus endpoint URL
    pub prometheus_url: Option<String>,
    /// Basic auth user for Prometheus
    pub username: Option<String>,
    /// Default namespace
    pub default_namespace: Option<String>,
    /// Default output format
    pub default_format: Option<String>,
    /// Default lookback window in days
    pub lookback_days: Option<u32>,
}

/// Keys accepted by `krr config set`
pub const KEYS: &[&str] = &["prometheus-url", "username", "namespace", "format", "days"];

impl Config {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Set one key, an empty value clears it
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = (!value.is_empty()).then(|| value.to_string());
        match key {
            "prometheus-url" => self.prometheus_url = value,
            "username" => self.username = value,
            "namespace" => self.default_namespace = value,
            "format" => {
                if let Some(format) = &value {
                    if !matches!(format.as_str(), "table" | "json") {
                        bail!("Invalid format '{}', expected table or json", format);
                    }
                }
                self.default_format = value;
            }
            "days" => {
                self.lookback_days = value
                    .map(|v| v.parse::<u32>().context("days must be a positive integer"))
                    .transpose()?;
            }
            other => bail!("Unknown key '{}', expected one of: {}", other, KEYS.join(", ")),
        }
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("krr").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("krr").join("config.json");

        let mut config = Config::default();
        config.set("prometheus-url", "http://prometheus:9090").unwrap();
        config.set("days", "14").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.prometheus_url.as_deref(), Some("http://prometheus:9090"));
        assert_eq!(loaded.lookback_days, Some(14));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("format", "yaml").is_err());
        assert!(config.set("days", "soon").is_err());
        assert!(config.set("colour", "red").is_err());

        config.set("namespace", "payments").unwrap();
        config.set("namespace", "").unwrap();
        assert!(config.default_namespace.is_none());
    }
}
