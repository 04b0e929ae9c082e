//! bucket commands - exists, create, list, remove, policy

use super::CommandContext;
use crate::utils::format_optional_datetime;
use anyhow::{Context, Result};
use clap::Subcommand;
use coffer_core::types::PolicyType;
use colored::Colorize;
use serde_json::json;

#[derive(Subcommand)]
pub enum BucketCommand {
    /// Check whether a bucket exists
    Exists { bucket: Option<String> },

    /// Create a bucket (no-op if it exists)
    Create {
        bucket: Option<String>,

        /// Canned policy to apply (read-only, write-only, read-write)
        #[arg(long)]
        policy: Option<PolicyType>,
    },

    /// List buckets
    List,

    /// Remove an empty bucket (no-op if missing)
    Remove { bucket: Option<String> },

    /// Set a bucket policy: a canned type or @file.json
    Policy {
        policy: String,

        bucket: Option<String>,
    },
}

pub async fn execute(ctx: &CommandContext, cmd: BucketCommand) -> Result<()> {
    let service = ctx.service()?;

    match cmd {
        BucketCommand::Exists { bucket } => {
            let bucket = ctx.bucket(&service, bucket.as_deref())?;
            let exists = service.bucket_exists(&bucket).await?;

            if ctx.is_json() {
                ctx.print_json(&json!({ "bucket": bucket, "exists": exists }))?;
            } else if exists {
                println!("{}: {}", bucket.blue().bold(), "exists".green());
            } else {
                println!("{}: {}", bucket.blue().bold(), "not found".red());
            }
        }

        BucketCommand::Create { bucket, policy } => {
            let bucket = ctx.bucket(&service, bucket.as_deref())?;
            match policy {
                Some(policy) => service.create_bucket_with_policy(&bucket, policy).await?,
                None => service.create_bucket(&bucket).await?,
            };

            if ctx.is_json() {
                ctx.print_json(&json!({ "bucket": bucket, "created": true }))?;
            } else {
                ctx.info(&format!("{}: {}", "make_bucket".green(), bucket));
            }
        }

        BucketCommand::List => {
            let buckets = service.list_buckets().await?;

            if ctx.is_json() {
                ctx.print_json(&buckets)?;
            } else {
                for bucket in &buckets {
                    println!(
                        "{} {}",
                        format_optional_datetime(bucket.created_at.as_ref()),
                        bucket.name.blue().bold()
                    );
                }
                ctx.info(&format!("\nTotal: {} bucket(s)", buckets.len()));
            }
        }

        BucketCommand::Remove { bucket } => {
            let bucket = ctx.bucket(&service, bucket.as_deref())?;
            service.remove_bucket(&bucket).await?;

            if ctx.is_json() {
                ctx.print_json(&json!({ "bucket": bucket, "removed": true }))?;
            } else {
                ctx.info(&format!("{}: {}", "remove_bucket".red(), bucket));
            }
        }

        BucketCommand::Policy { policy, bucket } => {
            let bucket = ctx.bucket(&service, bucket.as_deref())?;

            match policy.strip_prefix('@') {
                Some(path) => {
                    let json = tokio::fs::read_to_string(path)
                        .await
                        .with_context(|| format!("Failed to read policy file {}", path))?;
                    service.set_bucket_policy_json(&bucket, &json).await?;
                }
                None => {
                    let policy: PolicyType = policy.parse()?;
                    service.set_bucket_policy(&bucket, policy).await?;
                }
            }

            if ctx.is_json() {
                ctx.print_json(&json!({ "bucket": bucket, "policy": "applied" }))?;
            } else {
                ctx.info(&format!("{}: {}", "put_bucket_policy".green(), bucket));
            }
        }
    }

    Ok(())
}
