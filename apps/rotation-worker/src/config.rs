use serde::Deserialize;
use thiserror::Error;

use crate::constants::{CONFIG_PATH, DEFAULT_CONFIG_PATH};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

fn default_host() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_handler_label_key() -> String {
    "handler".to_string()
}

fn default_max_concurrency() -> usize {
    16
}

fn default_pull_batch_size() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Listen address for the operational endpoints
    #[serde(default = "default_host")]
    pub host: String,
    pub gcp_project_id: String,
    pub pubsub_subscription: String,
    /// Secret label key whose value selects the rotation handler
    #[serde(default = "default_handler_label_key")]
    pub handler_label_key: String,
    /// Maximum number of notifications processed concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Maximum number of messages fetched per pull
    #[serde(default = "default_pull_batch_size")]
    pub pull_batch_size: u32,
}

impl WorkerConfig {
    /// Load configuration from the file named by `CONFIG_PATH`, falling back
    /// to the default path. Any failure here is fatal at startup.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let config = Self::from_path(&path)?;
        tracing::info!(path = %path, "loaded config");
        Ok(config)
    }

    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Fully qualified subscription resource name
    pub fn subscription_path(&self) -> String {
        format!(
            "projects/{}/subscriptions/{}",
            self.gcp_project_id, self.pubsub_subscription
        )
    }
}
