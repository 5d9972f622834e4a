//! ## reporter-cli
//! **Metrics reporter runner**
//!
//! Loads reporter configuration, enables every configured InfluxDB reporter
//! and pushes this process's metrics until interrupted.

use clap::Parser;
use reporter_telemetry::logging;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    commands::run_command(cli).await
}
