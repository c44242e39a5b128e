//! driveup CLI - Command-line interface for driveup
//!
//! Provides commands for:
//! - Authorizing with Google Drive
//! - Uploading files into Drive folders
//! - Inspecting configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use driveup_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{auth::AuthCommand, config::ConfigCommand, upload::UploadCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "driveup", version, about = "Upload files to Google Drive")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Upload a file to Google Drive
    Upload(UploadCommand),
    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let configured_level = Config::load_or_default(&config_path).logging.level;

    // Setup tracing
    let filter = match cli.verbose {
        0 => configured_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Auth(cmd) => cmd.execute(format, &config_path).await,
        Commands::Upload(cmd) => cmd.execute(format, &config_path).await,
        Commands::Config(cmd) => cmd.execute(format, &config_path).await,
    }
}
