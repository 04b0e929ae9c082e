//! CLI command implementations

pub mod bucket;
pub mod config;
pub mod multipart;
pub mod object;
pub mod policy;
pub mod presign;

use crate::OutputFormat;
use anyhow::{Context, Result};
use coffer_client::{auto_configure, SharedClientProvider, StorageService};
use coffer_core::CofferConfig;
use serde::Serialize;
use tracing::debug;

/// Context passed to all commands
pub struct CommandContext {
    pub config: CofferConfig,
    pub output_format: OutputFormat,
    /// `--bucket` override
    pub bucket: Option<String>,
    pub quiet: bool,
}

impl CommandContext {
    /// Check if output should be JSON
    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Print info message if not quiet
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Storage service built from the loaded configuration
    pub fn service(&self) -> Result<StorageService> {
        debug!("Using endpoint {}", self.config.storage.endpoint());
        auto_configure(&self.config, SharedClientProvider::global())?
            .context("Object storage is disabled (storage.enabled = false)")
    }

    /// Bucket from the command, then `--bucket`, then the configured default
    pub fn bucket(&self, service: &StorageService, explicit: Option<&str>) -> Result<String> {
        if let Some(bucket) = explicit.or(self.bucket.as_deref()) {
            return Ok(bucket.to_string());
        }
        Ok(service
            .default_bucket()
            .context("No bucket given; pass --bucket or set COFFER_STORAGE_BUCKET_NAME")?
            .to_string())
    }

    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
