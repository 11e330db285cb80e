//! Print a stored event record.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use race_core::RaceState;
use runtime::{FileRecordRepository, RecordFormat, RecordRepository, default_record_dir};

use super::{OutputFormat, print_standings};

/// Print the result stored in an event record
#[derive(Debug, Parser)]
pub struct Show {
    /// Record name
    #[arg(value_name = "NAME")]
    name: String,

    /// Record directory (defaults to the platform data directory)
    #[arg(short, long, value_name = "DIR")]
    record_dir: Option<PathBuf>,

    /// Record encoding: json or bincode
    #[arg(short, long, default_value = "json")]
    format: RecordFormat,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,
}

impl Show {
    pub fn execute(self) -> Result<()> {
        let dir = self.record_dir.unwrap_or_else(default_record_dir);
        let repository = FileRecordRepository::new(&dir, self.format)?;
        let record = repository
            .load(&self.name)?
            .with_context(|| format!("no record {:?} in {}", self.name, dir.display()))?;

        let mut state = RaceState::from_record(record);
        if state.is_read_only() {
            eprintln!("record was written by another format version; showing read-only");
        }
        state.recalculate();

        let stdout = std::io::stdout();
        print_standings(&mut stdout.lock(), &state.standings(), self.output)
    }
}
