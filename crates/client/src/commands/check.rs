//! Load event content without running it.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use race_content::ContentFactory;

/// Validate event content
#[derive(Debug, Parser)]
pub struct Check {
    /// Event directory holding event.toml and riders.ron
    #[arg(value_name = "EVENT_DIR")]
    event_dir: PathBuf,

    /// Fail when any issue was repaired
    #[arg(long)]
    strict: bool,
}

impl Check {
    pub fn execute(self) -> Result<()> {
        let (state, directory, report) = ContentFactory::new(&self.event_dir).build()?;

        println!(
            "{}: {} riders, {} directory entries",
            self.event_dir.display(),
            state.riders().len(),
            directory.len()
        );
        for issue in report.issues() {
            println!("  [{}] {issue}", issue.code());
        }

        if report.is_clean() {
            println!("no issues");
        } else if self.strict {
            bail!("{} configuration issue(s)", report.len());
        }
        Ok(())
    }
}
