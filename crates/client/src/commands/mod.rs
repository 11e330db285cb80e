//! Subcommands; each owns its arguments and an `execute` entry point.

mod check;
mod replay;
mod show;

pub use check::Check;
pub use replay::Replay;
pub use show::Show;

use std::io::Write;

use anyhow::Result;
use race_core::Standings;

/// Result output format
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table
    #[default]
    Table,
    /// Standings as JSON
    Json,
}

pub fn print_standings(out: &mut impl Write, standings: &Standings, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => racetimer::report::write_standings(out, standings)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, standings)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
