//! kubefedctl CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};
use kubefed_common::telemetry::LogFormat;

/// kubefedctl - manage the member clusters of a federation
#[derive(Parser, Debug)]
#[command(name = "kubefedctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a cluster with the federation control plane
    Join(commands::join::JoinArgs),
    /// Remove a cluster from the federation control plane
    Unjoin(commands::unjoin::UnjoinArgs),
    /// Probe the health and zones of a joined cluster
    Health(commands::health::HealthArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Join(args) => commands::join::run(args).await,
            Commands::Unjoin(args) => commands::unjoin::run(args).await,
            Commands::Health(args) => commands::health::run(args).await,
        }
    }
}
