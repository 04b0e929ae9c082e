//! config commands - show the effective configuration

use super::CommandContext;
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (secret key masked)
    Show,
}

pub fn execute(ctx: &CommandContext, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let mut config = ctx.config.clone();
            if config.storage.secret_key.is_some() {
                config.storage.secret_key = Some("********".to_string());
            }
            if let Some(bucket) = &ctx.bucket {
                config.storage.bucket_name = Some(bucket.clone());
            }

            if ctx.is_json() {
                ctx.print_json(&config)?;
                return Ok(());
            }

            let storage = &config.storage;
            let unset = || "(not set)".dimmed().to_string();
            let show = |v: &Option<String>| v.clone().unwrap_or_else(unset);

            println!("{}", "[storage]".bold());
            println!("  enabled     = {}", storage.enabled);
            println!("  endpoint    = {}", show(&storage.endpoint));
            println!("  access_key  = {}", show(&storage.access_key));
            println!("  secret_key  = {}", show(&storage.secret_key));
            println!("  address     = {}", storage.public_address());
            println!("  bucket_name = {}", show(&storage.bucket_name));
            println!("  region      = {}", storage.region);
            println!("  path_style  = {}", storage.path_style);
            println!("{}", "[logging]".bold());
            println!("  level       = {}", config.logging.level);
            println!("  format      = {}", config.logging.format);
        }
    }

    Ok(())
}
