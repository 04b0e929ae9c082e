//! policy commands - inspect canned bucket policies

use super::CommandContext;
use anyhow::Result;
use clap::Subcommand;
use coffer_core::types::PolicyType;
use colored::Colorize;

#[derive(Subcommand)]
pub enum PolicyCommand {
    /// Print canned policy documents
    Show {
        /// Policy type; all types when omitted
        policy: Option<PolicyType>,

        /// Bucket substituted into the document
        bucket: Option<String>,
    },
}

pub fn execute(ctx: &CommandContext, cmd: PolicyCommand) -> Result<()> {
    match cmd {
        PolicyCommand::Show { policy, bucket } => {
            let bucket = bucket
                .or_else(|| ctx.bucket.clone())
                .or_else(|| ctx.config.storage.bucket_name.clone())
                .unwrap_or_else(|| "my-bucket".to_string());

            let types = match policy {
                Some(policy) => vec![policy],
                None => PolicyType::ALL.to_vec(),
            };

            if ctx.is_json() {
                let docs = types
                    .iter()
                    .map(|t| t.document(&bucket).map(|doc| (t.to_string(), doc)))
                    .collect::<coffer_core::Result<std::collections::BTreeMap<_, _>>>()?;
                ctx.print_json(&docs)?;
                return Ok(());
            }

            for policy in types {
                println!(
                    "{} ({})",
                    policy.to_string().blue().bold(),
                    policy.description()
                );
                println!("{}\n", policy.render(&bucket));
            }
        }
    }

    Ok(())
}
