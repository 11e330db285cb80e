//! Replay a timing script.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use race_content::ContentFactory;
use race_core::{Clock, FixedClock};
use racetimer::Script;
use runtime::{RecordFormat, Runtime, RuntimeConfig};
use tracing::info;

use super::{OutputFormat, print_standings};

/// Replay a timing script against an event
#[derive(Debug, Parser)]
pub struct Replay {
    /// Event directory holding event.toml and riders.ron
    #[arg(value_name = "EVENT_DIR")]
    event_dir: PathBuf,

    /// Script of passings and operator commands
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// Print only this category's result
    #[arg(short, long)]
    category: Option<String>,

    /// Save the event record here when the replay ends
    #[arg(short, long, value_name = "DIR")]
    record_dir: Option<PathBuf>,

    /// Record name
    #[arg(long)]
    record_name: Option<String>,

    /// Record encoding: json or bincode
    #[arg(long)]
    record_format: Option<RecordFormat>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,
}

impl Replay {
    pub async fn execute(self) -> Result<()> {
        let text = fs::read_to_string(&self.script)
            .with_context(|| format!("reading script {}", self.script.display()))?;
        let script = Script::parse(&text)?;

        let (state, directory, report) = ContentFactory::new(&self.event_dir).build()?;
        if !report.is_clean() {
            eprintln!("{} configuration issue(s) repaired; see `racetimer check`", report.len());
        }

        let mut config = RuntimeConfig::from_env();
        if let Some(dir) = self.record_dir {
            config = config.with_record_dir(dir).with_autosave(true);
        }
        if let Some(name) = self.record_name {
            config = config.with_record_name(name);
        }
        if let Some(format) = self.record_format {
            config = config.with_record_format(format);
        }

        let clock = Arc::new(FixedClock::default());
        let runtime = Runtime::builder()
            .config(config)
            .initial_state(state)
            .directory(directory)
            .clock(clock.clone() as Arc<dyn Clock>)
            .build()
            .await?;
        let handle = runtime.handle();

        info!(steps = script.len(), "replaying {}", self.script.display());
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let summary = racetimer::script::run(&handle, &clock, &script, &mut out).await?;

        handle.recalculate().await?;
        match &self.category {
            Some(code) => {
                let rows = handle.category_standings(code.as_str()).await?;
                match self.output {
                    OutputFormat::Table => racetimer::report::write_rows(&mut out, &rows)?,
                    OutputFormat::Json => {
                        serde_json::to_writer_pretty(&mut out, &rows)?;
                        writeln!(out)?;
                    }
                }
            }
            None => print_standings(&mut out, &handle.standings().await?, self.output)?,
        }
        drop(out);

        eprintln!(
            "{} passings ({} rejected), {} refused commands",
            summary.passings, summary.rejected, summary.refused
        );

        drop(handle);
        runtime.shutdown().await?;
        Ok(())
    }
}
