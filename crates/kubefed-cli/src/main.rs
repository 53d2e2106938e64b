//! kubefedctl
//!
//! Adds clusters to and removes clusters from a federation, and probes
//! the health of joined clusters.

use clap::Parser;
use tracing::error;

use kubefed_cli::{Cli, Error, Result};
use kubefed_common::telemetry::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format).map_err(|e| Error::command_failed(e.to_string()))?;

    cli.run().await.inspect_err(|e| error!(error = %e, "Command failed"))
}
