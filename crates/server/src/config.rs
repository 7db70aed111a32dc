use std::path::Path;

use anyhow::Context;
use flatfile_storage::StoreConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// Bunyan-style JSON lines.
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_format: LogFormat,
    /// Largest accepted request body, uploads included.
    pub max_upload_bytes: usize,
    pub store: StoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            log_format: LogFormat::Text,
            max_upload_bytes: 10 * 1024 * 1024,
            store: StoreConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Environment variables win over the config file.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(addr) = lookup("FLATFILE_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(bucket) = lookup("AWS_S3_BUCKET_NAME") {
            self.store.bucket = bucket;
        }
        if let Some(region) = lookup("AWS_DEFAULT_REGION").or_else(|| lookup("AWS_REGION")) {
            self.store.region = Some(region);
        }
        if let Some(endpoint) = lookup("AWS_ENDPOINT") {
            self.store.endpoint = Some(endpoint);
        }
    }
}
