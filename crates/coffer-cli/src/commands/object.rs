//! object commands - list, get, put, rm, url

use super::CommandContext;
use crate::utils::{format_optional_datetime, format_size};
use anyhow::{Context, Result};
use clap::Subcommand;
use coffer_client::{ListOptions, PutOptions, UrlOptions};
use coffer_core::types::GetOptions;
use colored::Colorize;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Subcommand)]
pub enum ObjectCommand {
    /// List objects
    List {
        /// Key prefix
        #[arg(long)]
        prefix: Option<String>,

        /// List all keys instead of grouping by "/"
        #[arg(short, long)]
        recursive: bool,

        /// Human-readable sizes
        #[arg(short = 'H', long)]
        human_readable: bool,
    },

    /// Download an object to a file or stdout
    Get {
        key: String,

        /// Destination file (stdout when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(long)]
        version_id: Option<String>,

        /// First byte to read
        #[arg(long)]
        offset: Option<u64>,

        /// Bytes to read from offset
        #[arg(long, requires = "offset")]
        length: Option<u64>,
    },

    /// Upload a local file
    Put {
        /// Local file
        file: PathBuf,

        /// Object key (defaults to the file name)
        key: Option<String>,

        #[arg(long)]
        content_type: Option<String>,
    },

    /// Remove one or more objects
    Rm {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Presigned download URL
    Url {
        key: String,

        /// Validity in seconds (default 7 days)
        #[arg(long)]
        expires: Option<u64>,

        /// Rewrite the endpoint to the public address
        #[arg(long)]
        public: bool,
    },
}

pub async fn execute(ctx: &CommandContext, cmd: ObjectCommand) -> Result<()> {
    let service = ctx.service()?;
    let bucket = ctx.bucket(&service, None)?;

    match cmd {
        ObjectCommand::List {
            prefix,
            recursive,
            human_readable,
        } => {
            let opts = ListOptions { prefix, recursive };
            let objects = service.list_objects(&bucket, &opts).await?;

            if ctx.is_json() {
                ctx.print_json(&objects)?;
                return Ok(());
            }

            let mut total_size = 0;
            for obj in &objects {
                if obj.is_dir {
                    println!("{:>19} {:>12}  {}", "", "PRE", obj.key.blue().bold());
                } else {
                    total_size += obj.size;
                    println!(
                        "{} {:>12}  {}",
                        format_optional_datetime(obj.last_modified.as_ref()),
                        format_size(obj.size, human_readable),
                        obj.key
                    );
                }
            }
            ctx.info(&format!(
                "\nTotal: {} entries, {}",
                objects.len(),
                format_size(total_size, human_readable)
            ));
        }

        ObjectCommand::Get {
            key,
            file,
            version_id,
            offset,
            length,
        } => {
            let opts = GetOptions {
                version_id,
                offset,
                length,
            };
            let data = service.get_object(&bucket, &key, &opts).await?;

            match file {
                Some(path) => {
                    tokio::fs::write(&path, &data)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    ctx.info(&format!(
                        "{}: {}/{} to {}",
                        "download".green(),
                        bucket,
                        key,
                        path.display()
                    ));
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&data)?;
                    stdout.flush()?;
                }
            }
        }

        ObjectCommand::Put {
            file,
            key,
            content_type,
        } => {
            let key = match key {
                Some(key) => key,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("Cannot derive an object key from the file path")?,
            };
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let resp = service
                .put_object(&bucket, &key, data, &PutOptions { content_type })
                .await?;

            if ctx.is_json() {
                ctx.print_json(&resp)?;
            } else {
                ctx.info(&format!(
                    "{}: {} to {}/{}",
                    "upload".green(),
                    file.display(),
                    resp.bucket,
                    resp.key
                ));
            }
        }

        ObjectCommand::Rm { keys } => {
            if keys.len() == 1 {
                service.remove_object(&bucket, &keys[0]).await?;
                if ctx.is_json() {
                    ctx.print_json(&json!({ "removed": keys, "failed": [] }))?;
                } else {
                    ctx.info(&format!("{}: {}/{}", "delete".red(), bucket, keys[0]));
                }
                return Ok(());
            }

            let failed = service.remove_objects(&bucket, &keys).await?;

            if ctx.is_json() {
                let removed: Vec<&String> = keys.iter().filter(|k| !failed.contains(k)).collect();
                ctx.print_json(&json!({ "removed": removed, "failed": failed }))?;
            } else {
                for key in keys.iter().filter(|k| !failed.contains(k)) {
                    ctx.info(&format!("{}: {}/{}", "delete".red(), bucket, key));
                }
                for key in &failed {
                    eprintln!("{}: {}/{}", "failed".red().bold(), bucket, key);
                }
            }

            if !failed.is_empty() {
                anyhow::bail!("{} object(s) could not be deleted", failed.len());
            }
        }

        ObjectCommand::Url {
            key,
            expires,
            public,
        } => {
            let mut opts = UrlOptions {
                replace_address: public,
                ..Default::default()
            };
            if let Some(secs) = expires {
                opts.expiry = Duration::from_secs(secs);
            }

            let url = service.object_url(&bucket, &key, &opts).await?;
            if ctx.is_json() {
                ctx.print_json(&json!({ "url": url }))?;
            } else {
                println!("{}", url);
            }
        }
    }

    Ok(())
}
