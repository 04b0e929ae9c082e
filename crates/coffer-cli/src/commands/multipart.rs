//! multipart commands - init, urls, parts, merge, abort

use super::CommandContext;
use anyhow::Result;
use clap::Subcommand;
use coffer_client::{InitOptions, MultipartOptions};
use colored::Colorize;
use serde_json::json;
use std::time::Duration;

#[derive(Subcommand)]
pub enum MultipartCommand {
    /// Initiate an upload and print its upload id
    Init {
        key: String,

        #[arg(long)]
        path: Option<String>,

        #[arg(long)]
        content_type: Option<String>,
    },

    /// Presigned part URLs for a new or existing upload
    Urls {
        key: String,

        /// Number of parts of a new upload
        #[arg(long, required_unless_present = "upload_id")]
        parts: Option<i32>,

        /// Existing upload to issue URLs for
        #[arg(long, requires = "part_numbers", conflicts_with = "parts")]
        upload_id: Option<String>,

        /// Part numbers to presign for an existing upload
        #[arg(long, value_delimiter = ',')]
        part_numbers: Vec<i32>,

        #[arg(long)]
        path: Option<String>,

        #[arg(long)]
        content_type: Option<String>,

        /// Validity of each URL in seconds (default 10 minutes)
        #[arg(long)]
        expires: Option<u64>,
    },

    /// List uploaded part numbers
    Parts {
        key: String,
        upload_id: String,

        #[arg(long)]
        max_parts: Option<i32>,
    },

    /// Complete an upload from its uploaded parts
    Merge {
        key: String,
        upload_id: String,

        #[arg(long)]
        max_parts: Option<i32>,
    },

    /// Abort an upload and discard its parts
    Abort { key: String, upload_id: String },
}

pub async fn execute(ctx: &CommandContext, cmd: MultipartCommand) -> Result<()> {
    let service = ctx.service()?;
    let bucket = ctx.bucket(&service, None)?;

    match cmd {
        MultipartCommand::Init {
            key,
            path,
            content_type,
        } => {
            let opts = InitOptions { path, content_type };
            let upload_id = service.init_multipart_upload(&bucket, &key, &opts).await?;

            if ctx.is_json() {
                ctx.print_json(&json!({ "uploadId": upload_id }))?;
            } else {
                println!("{}", upload_id);
            }
        }

        MultipartCommand::Urls {
            key,
            parts,
            upload_id,
            part_numbers,
            path,
            content_type,
            expires,
        } => {
            let mut opts = MultipartOptions {
                path,
                content_type,
                ..Default::default()
            };
            if let Some(secs) = expires {
                opts.expiry = Duration::from_secs(secs);
            }

            let info = match (upload_id, parts) {
                (Some(upload_id), _) => {
                    service
                        .presigned_multipart_urls_for_parts(
                            &upload_id,
                            &bucket,
                            &key,
                            &part_numbers,
                            &opts,
                        )
                        .await?
                }
                (None, Some(parts)) => {
                    service
                        .presigned_multipart_urls(&bucket, &key, parts, &opts)
                        .await?
                }
                (None, None) => anyhow::bail!("Either --parts or --upload-id is required"),
            };

            if ctx.is_json() {
                ctx.print_json(&info)?;
            } else {
                println!("{}: {}", "upload id".bold(), info.upload_id);
                println!("{}: {}", "object".bold(), info.object_name);
                println!("{}: {}", "expires".bold(), info.expires_at.to_rfc3339());
                for url in &info.upload_urls {
                    println!("{}", url);
                }
            }
        }

        MultipartCommand::Parts {
            key,
            upload_id,
            max_parts,
        } => {
            let parts = service
                .list_uploaded_parts(&bucket, &key, &upload_id, max_parts)
                .await?;

            if ctx.is_json() {
                ctx.print_json(&parts)?;
            } else {
                let list: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                println!("{}", list.join(","));
                ctx.info(&format!("\nTotal: {} part(s)", parts.len()));
            }
        }

        MultipartCommand::Merge {
            key,
            upload_id,
            max_parts,
        } => {
            let url = service
                .merge_multipart_upload(&bucket, &key, &upload_id, max_parts)
                .await?;

            if ctx.is_json() {
                ctx.print_json(&json!({ "url": url }))?;
            } else {
                println!("{}: {}", "merged".green(), url);
            }
        }

        MultipartCommand::Abort { key, upload_id } => {
            service
                .abort_multipart_upload(&bucket, &key, &upload_id)
                .await?;

            if ctx.is_json() {
                ctx.print_json(&json!({ "uploadId": upload_id, "aborted": true }))?;
            } else {
                ctx.info(&format!("{}: {}", "abort".red(), upload_id));
            }
        }
    }

    Ok(())
}
