//! Configuration for Coffer
//!
//! Example config file:
//! ```toml
//! [storage]
//! endpoint = "http://127.0.0.1:9000"
//! access_key = "minioadmin"
//! secret_key = "minioadmin"
//! address = "https://files.example.com"
//! bucket_name = "uploads"
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use crate::{Error, Result, DEFAULT_REGION, ENV_PREFIX};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CofferConfig {
    #[serde(default)]
    pub storage: StorageProperties,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CofferConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config {}: {}", path, e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Override values with environment variables found through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}_{}", ENV_PREFIX, name));

        if let Some(enabled) = var("ENABLED") {
            self.storage.enabled = enabled != "false";
        }
        if let Some(endpoint) = var("ENDPOINT") {
            self.storage.endpoint = Some(endpoint);
        }
        if let Some(access_key) = var("ACCESS_KEY") {
            self.storage.access_key = Some(access_key);
        }
        if let Some(secret_key) = var("SECRET_KEY") {
            self.storage.secret_key = Some(secret_key);
        }
        if let Some(address) = var("ADDRESS") {
            self.storage.address = address;
        }
        if let Some(bucket) = var("BUCKET_NAME") {
            self.storage.bucket_name = Some(bucket);
        }
        if let Some(region) = var("REGION") {
            self.storage.region = region;
        }
        if let Some(path_style) = var("PATH_STYLE") {
            match path_style.parse() {
                Ok(v) => self.storage.path_style = v,
                Err(_) => warn!(
                    "Ignoring invalid {}_PATH_STYLE value: {}",
                    ENV_PREFIX, path_style
                ),
            }
        }

        if let Some(level) = lookup("COFFER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("COFFER_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Connection settings of the object store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageProperties {
    /// Set to false to skip building the storage service
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Endpoint URL, e.g. `http://127.0.0.1:9000`
    pub endpoint: Option<String>,

    pub access_key: Option<String>,

    pub secret_key: Option<String>,

    /// Public-facing base URL substituted for the endpoint in returned URLs
    #[serde(default)]
    pub address: String,

    /// Bucket used by operations that are not given one
    pub bucket_name: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    /// Path style access (use path instead of virtual hosted style)
    #[serde(default = "default_true")]
    pub path_style: bool,
}

fn default_true() -> bool {
    true
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for StorageProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            access_key: None,
            secret_key: None,
            address: String::new(),
            bucket_name: None,
            region: default_region(),
            path_style: true,
        }
    }
}

impl StorageProperties {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(format!(
                "Endpoint not configured. Set {}_ENDPOINT",
                ENV_PREFIX
            )));
        }
        if self.access_key.is_none() {
            return Err(Error::Config(format!(
                "Access key not configured. Set {}_ACCESS_KEY",
                ENV_PREFIX
            )));
        }
        if self.secret_key.is_none() {
            return Err(Error::Config(format!(
                "Secret key not configured. Set {}_SECRET_KEY",
                ENV_PREFIX
            )));
        }
        Ok(())
    }

    /// Endpoint or empty string when unset
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or("")
    }

    /// Address substituted for the endpoint; falls back to the endpoint
    pub fn public_address(&self) -> &str {
        let address = self.address.trim();
        if address.is_empty() {
            self.endpoint()
        } else {
            address
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
