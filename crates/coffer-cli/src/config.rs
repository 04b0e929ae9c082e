//! Configuration loading for the CLI
//!
//! Config file location: ~/.coffer/config.toml, overridden by `--config`.
//! `COFFER_STORAGE_*` and `COFFER_LOG_*` environment variables take
//! precedence over file values.

use anyhow::{Context, Result};
use coffer_core::CofferConfig;
use std::path::PathBuf;

/// Get config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .context("Could not determine home directory")?
        .home_dir()
        .to_path_buf();

    Ok(home.join(".coffer"))
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration from file and environment
pub fn load(path: Option<&str>) -> Result<CofferConfig> {
    let mut config = match path {
        Some(path) => CofferConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => match config_path() {
            Ok(default) if default.exists() => {
                let path = default.to_string_lossy();
                CofferConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config from {}", path))?
            }
            _ => CofferConfig::default(),
        },
    };

    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}
