//! Coffer - object storage from the command line
//!
//! Every operation of the storage facade as a subcommand.

mod commands;
mod config;
mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use commands::CommandContext;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "coffer")]
#[command(author = "Coffer Team")]
#[command(version = coffer_core::VERSION)]
#[command(about = "Object storage service facade for S3-compatible stores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (default: ~/.coffer/config.toml)
    #[arg(short, long, global = true, env = "COFFER_CONFIG")]
    config: Option<String>,

    /// Bucket to operate on instead of the configured default
    #[arg(short, long, global = true)]
    bucket: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Bucket management
    #[command(subcommand)]
    Bucket(commands::bucket::BucketCommand),

    /// Object operations
    #[command(subcommand)]
    Object(commands::object::ObjectCommand),

    /// Presigned upload URLs and browser form data
    #[command(subcommand)]
    Presign(commands::presign::PresignCommand),

    /// Multipart upload orchestration
    #[command(subcommand)]
    Multipart(commands::multipart::MultipartCommand),

    /// Canned access policies
    #[command(subcommand)]
    Policy(commands::policy::PolicyCommand),

    /// Effective configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = config::load(cli.config.as_deref())?;

    // Initialize logging; logs go to stderr so command output stays clean
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }

    let ctx = CommandContext {
        config,
        output_format: cli.output,
        bucket: cli.bucket,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Bucket(cmd) => commands::bucket::execute(&ctx, cmd).await,
        Commands::Object(cmd) => commands::object::execute(&ctx, cmd).await,
        Commands::Presign(cmd) => commands::presign::execute(&ctx, cmd).await,
        Commands::Multipart(cmd) => commands::multipart::execute(&ctx, cmd).await,
        Commands::Policy(cmd) => commands::policy::execute(&ctx, cmd),
        Commands::Config(cmd) => commands::config::execute(&ctx, cmd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "coffer", "object", "list", "--bucket", "photos", "--output", "json", "-r",
        ])
        .unwrap();

        assert_eq!(cli.bucket.as_deref(), Some("photos"));
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Object(_)));
    }
}
