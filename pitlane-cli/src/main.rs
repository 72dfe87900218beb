//! ## pitlane-cli
//! **Operator front end**
//!
//! Records live UDP telemetry or a generated session into per-session CSV
//! folders. Ctrl-C and fatal source errors both end in `Recorder::stop()`,
//! so malformed driver folders are cleaned up before the process exits.

use anyhow::anyhow;
use clap::Parser;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    pitlane_telemetry::init_logging(cli.log_format).map_err(|e| anyhow!(e))?;
    commands::run_command(cli).await
}
