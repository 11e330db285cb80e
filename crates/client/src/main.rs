//! `racetimer` binary.
//!
//! ```bash
//! racetimer check events/crit
//! racetimer replay events/crit feed.txt --record-dir ./records
//! racetimer show crit --output json
//! ```

mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Check, Replay, Show};
use racetimer::ClientConfig;
use racetimer::logging::setup_logging;

/// Road race timing and results
#[derive(Parser)]
#[command(name = "racetimer")]
#[command(about = "Timing and results for road races", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Replay a timing script against an event
    Replay(Replay),

    /// Print the result stored in an event record
    Show(Show),

    /// Validate event content and list configuration issues
    Check(Check),
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = setup_logging(&ClientConfig::from_env())?;

    match cli.command {
        Command::Replay(cmd) => cmd.execute().await,
        Command::Show(cmd) => cmd.execute(),
        Command::Check(cmd) => cmd.execute(),
    }
}
