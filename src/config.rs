//! Configuration module
//!
//! Configuration types and TOML loading for the aggregation service.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default metric namespace (family-name prefix)
fn default_namespace() -> String {
    "dbpool".to_string()
}

/// Default polling period in seconds
fn default_poll_interval_secs() -> f64 {
    1.0
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// Aggregation engine configuration
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

/// Aggregation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregationConfig {
    /// Metric namespace; family names on the wire are
    /// `<namespace>_totals`, `<namespace>_pool`, `<namespace>_process`
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Period of the polling cycle in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl AggregationConfig {
    /// Polling period as a [`Duration`]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }
}

impl Config {
    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.aggregation.namespace.trim().is_empty() {
            return Err(anyhow::anyhow!("aggregation.namespace cannot be empty"));
        }
        if self
            .aggregation
            .namespace
            .chars()
            .any(|c| c.is_whitespace())
        {
            return Err(anyhow::anyhow!(
                "aggregation.namespace cannot contain whitespace"
            ));
        }
        if self.aggregation.poll_interval_secs <= 0.0 {
            return Err(anyhow::anyhow!(
                "aggregation.poll_interval_secs must be > 0"
            ));
        }
        Ok(())
    }
}

/// Load and validate configuration from a TOML file
pub fn load_config(config_path: &str) -> Result<Config> {
    let config_content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path))?;

    let config: Config = toml::from_str(&config_content)
        .with_context(|| format!("Failed to parse config file: {}", config_path))?;

    config.validate()?;
    Ok(config)
}
