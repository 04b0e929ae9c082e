//! presign commands - presigned PUT URLs and browser POST form data

use super::CommandContext;
use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use clap::Subcommand;
use coffer_client::{PostFormOptions, PresignOptions};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Subcommand)]
pub enum PresignCommand {
    /// Presigned upload URL
    Put {
        key: String,

        /// Folder prefix, e.g. 2024/01/02
        #[arg(long)]
        path: Option<String>,

        /// Validity in seconds (default 5 minutes)
        #[arg(long)]
        expires: Option<u64>,
    },

    /// Form fields for a browser POST upload
    Post {
        file_name: String,

        #[arg(long)]
        path: Option<String>,

        /// Validity in seconds (default 10 minutes)
        #[arg(long)]
        expires: Option<i64>,
    },
}

pub async fn execute(ctx: &CommandContext, cmd: PresignCommand) -> Result<()> {
    let service = ctx.service()?;
    let bucket = ctx.bucket(&service, None)?;

    match cmd {
        PresignCommand::Put { key, path, expires } => {
            let mut opts = PresignOptions {
                path,
                ..Default::default()
            };
            if let Some(secs) = expires {
                opts.expiry = Duration::from_secs(secs);
            }

            let url = service.presigned_put_url(&bucket, &key, &opts).await?;
            if ctx.is_json() {
                ctx.print_json(&json!({ "url": url }))?;
            } else {
                println!("{}", url);
            }
        }

        PresignCommand::Post {
            file_name,
            path,
            expires,
        } => {
            let opts = PostFormOptions {
                path,
                expires_at: expires.map(post_expiry).transpose()?,
            };

            let fields: BTreeMap<String, String> = service
                .presigned_post_form_data(&bucket, &file_name, &opts)
                .await?
                .into_iter()
                .collect();

            if ctx.is_json() {
                ctx.print_json(&fields)?;
            } else {
                for (name, value) in &fields {
                    println!("{}={}", name, value);
                }
            }
        }
    }

    Ok(())
}

/// Expiration instant `secs` from now
fn post_expiry(secs: i64) -> Result<DateTime<Utc>> {
    if secs <= 0 {
        anyhow::bail!("--expires must be a positive number of seconds");
    }
    TimeDelta::try_seconds(secs)
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .with_context(|| format!("--expires {} is out of range", secs))
}
