//! Replay scripts: a decoder feed interleaved with operator commands.
//!
//! One step per line; `#` starts a comment.
//!
//! ```text
//! clock 10:00:00
//! armstart
//! start 10:00:00
//! pass 10:21:13.4521 a1b2c3 C1
//! dnf 14
//! armfinish
//! places 1 7 3-4
//! show
//! ```
//!
//! Any line whose keyword is not listed below is sent as a rider command
//! (`add`, `del`, `dns`, `dnf`, `man`, `com`, ...).

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use race_core::{Bib, FixedClock, Passing, PassingOutcome, Tod};
use runtime::repository::RepositoryError;
use runtime::{RaceHandle, RuntimeError};
use tracing::{info, warn};

use crate::report;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Move the replay clock.
    Clock(Tod),
    ArmStart,
    ArmFinish,
    ArmLap,
    Reset,
    /// Start time; `None` clears it.
    Start(Option<Tod>),
    /// Finish time; `None` clears it.
    FinishTime(Option<Tod>),
    /// Finish the event at the replay clock.
    Finish,
    Pass(Passing),
    Places(String),
    Intermediate { code: String, places: String },
    Bunch { bib: Bib, text: String },
    Laps { bib: Bib, text: String },
    Clear(Bib),
    Swap(Bib, Bib),
    Recalc,
    Tick,
    Save,
    /// Print the standings, optionally for one category.
    Show(Option<String>),
    Rider { code: String, args: String },
}

/// A parsed script with the source line of every step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<(usize, Step)>,
}

impl Script {
    pub fn parse(text: &str) -> Result<Self> {
        let mut steps = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let step = parse_step(line).with_context(|| format!("line {}: {line:?}", idx + 1))?;
            steps.push((idx + 1, step));
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().map(|(_, step)| step)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn time(text: &str) -> Result<Tod> {
    Tod::parse(text).map_err(|err| anyhow!("{err}"))
}

fn optional_time(text: &str) -> Result<Option<Tod>> {
    if text == "-" { Ok(None) } else { time(text).map(Some) }
}

fn parse_step(line: &str) -> Result<Step> {
    let (keyword, rest) = line
        .split_once(char::is_whitespace)
        .map(|(k, r)| (k, r.trim()))
        .unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    let step = match (keyword.to_lowercase().as_str(), args.as_slice()) {
        ("clock", [at]) => Step::Clock(time(at)?),
        ("armstart", []) => Step::ArmStart,
        ("armfinish", []) => Step::ArmFinish,
        ("armlap", []) => Step::ArmLap,
        ("reset", []) => Step::Reset,
        ("start", [at]) => Step::Start(optional_time(at)?),
        ("finishtime", [at]) => Step::FinishTime(optional_time(at)?),
        ("finish", []) => Step::Finish,
        ("pass", [at, refid, extra @ ..]) if extra.len() <= 2 => {
            let mut passing = Passing::new(*refid, time(at)?);
            if let Some(channel) = extra.first() {
                passing = passing.with_channel(*channel);
            }
            if let Some(source) = extra.get(1) {
                passing = passing.with_source(*source);
            }
            Step::Pass(passing)
        }
        ("places", _) => Step::Places(rest.to_owned()),
        ("inter", [code, ..]) => Step::Intermediate {
            code: (*code).to_owned(),
            places: rest[code.len()..].trim().to_owned(),
        },
        ("bunch", [bib, ..]) => Step::Bunch {
            bib: Bib::new(*bib),
            text: rest[bib.len()..].trim().to_owned(),
        },
        ("laps", [bib, text]) => Step::Laps {
            bib: Bib::new(*bib),
            text: (*text).to_owned(),
        },
        ("clear", [bib]) => Step::Clear(Bib::new(*bib)),
        ("swap", [first, second]) => Step::Swap(Bib::new(*first), Bib::new(*second)),
        ("recalc", []) => Step::Recalc,
        ("tick", []) => Step::Tick,
        ("save", []) => Step::Save,
        ("show", []) => Step::Show(None),
        ("show", [category]) => Step::Show(Some((*category).to_owned())),
        (
            "clock" | "armstart" | "armfinish" | "armlap" | "reset" | "start" | "finishtime"
            | "finish" | "pass" | "inter" | "bunch" | "laps" | "clear" | "swap" | "recalc"
            | "tick" | "save" | "show",
            _,
        ) => bail!("wrong arguments for {keyword}"),
        (code, _) => Step::Rider {
            code: code.to_owned(),
            args: rest.to_owned(),
        },
    };
    Ok(step)
}

/// Counters for one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub passings: usize,
    pub rejected: usize,
    /// Operator commands refused by the event.
    pub refused: usize,
}

/// Feeds `script` to the runtime, moving `clock` with each passing.
///
/// Refused operator commands are reported and counted, not fatal; a failure
/// of the runtime itself ends the replay.
pub async fn run(
    handle: &RaceHandle,
    clock: &Arc<FixedClock>,
    script: &Script,
    out: &mut impl Write,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (line, step) in &script.steps {
        let result = apply(handle, clock, step, out, &mut summary).await;
        match result {
            Ok(()) => {}
            Err(RuntimeError::Command(err)) => {
                warn!(target: "racetimer::replay", line, code = err.error_code(), "{err}");
                writeln!(out, "line {line}: {err}")?;
                summary.refused += 1;
            }
            Err(err) => return Err(err).with_context(|| format!("line {line}")),
        }
    }

    info!(
        target: "racetimer::replay",
        passings = summary.passings,
        rejected = summary.rejected,
        refused = summary.refused,
        "replay complete"
    );
    Ok(summary)
}

async fn apply(
    handle: &RaceHandle,
    clock: &Arc<FixedClock>,
    step: &Step,
    out: &mut impl Write,
    summary: &mut ReplaySummary,
) -> runtime::Result<()> {
    match step {
        Step::Clock(at) => clock.set(*at),
        Step::ArmStart => {
            handle.arm_start().await?;
        }
        Step::ArmFinish => {
            handle.arm_finish().await?;
        }
        Step::ArmLap => {
            handle.arm_lap().await?;
        }
        Step::Reset => handle.reset().await?,
        Step::Start(at) => handle.set_start(*at).await?,
        Step::FinishTime(at) => handle.set_finish(*at).await?,
        Step::Finish => handle.finish().await?,
        Step::Pass(passing) => {
            clock.set(passing.timestamp);
            summary.passings += 1;
            if let PassingOutcome::Rejected(reason) = handle.submit_passing(passing.clone()).await? {
                summary.rejected += 1;
                info!(target: "racetimer::replay", refid = %passing.refid, %reason, "passing rejected");
            }
        }
        Step::Places(places) => {
            handle.set_places(places.as_str()).await?;
        }
        Step::Intermediate { code, places } => {
            handle.set_intermediate(code.as_str(), places.as_str()).await?;
        }
        Step::Bunch { bib, text } => {
            handle.edit_bunch(bib.clone(), text.as_str()).await?;
        }
        Step::Laps { bib, text } => handle.set_laps(bib.clone(), text.as_str()).await?,
        Step::Clear(bib) => handle.clear_place(bib.clone()).await?,
        Step::Swap(first, second) => handle.swap_places(first.clone(), second.clone()).await?,
        Step::Recalc => {
            handle.recalculate().await?;
        }
        Step::Tick => handle.tick().await?,
        Step::Save => handle.save().await?,
        Step::Show(category) => {
            handle.recalculate().await?;
            match category {
                Some(code) => {
                    let rows = handle.category_standings(code.as_str()).await?;
                    report::write_rows(out, &rows).map_err(RepositoryError::from)?;
                }
                None => report::write_standings(out, &handle.standings().await?).map_err(RepositoryError::from)?,
            }
        }
        Step::Rider { code, args } => {
            let outcome = handle.rider_command_text(code, args).await?;
            report::write_outcome(out, &outcome).map_err(RepositoryError::from)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_feed_and_operator_lines() {
        let script = Script::parse(
            "# warm-up\n\
             clock 10:00\n\
             armstart\n\
             start 10:00:00\n\
             pass 10:21:13.4521 a1b2c3 C1 rfid  # lead group\n\
             \n\
             dnf 14 15\n\
             inter sprint 3 1 2\n\
             places 1 7 3-4\n\
             finishtime -\n\
             show A\n",
        )
        .unwrap();

        assert_eq!(script.len(), 9);
        let steps: Vec<_> = script.steps().cloned().collect();
        assert_eq!(steps[1], Step::ArmStart);
        let Step::Pass(passing) = &steps[3] else {
            panic!("expected a passing, got {:?}", steps[3]);
        };
        assert_eq!(passing.refid, "a1b2c3");
        assert_eq!(passing.channel, "C1");
        assert_eq!(passing.source, "rfid");
        assert_eq!(
            steps[4],
            Step::Rider {
                code: "dnf".into(),
                args: "14 15".into()
            }
        );
        assert_eq!(
            steps[5],
            Step::Intermediate {
                code: "sprint".into(),
                places: "3 1 2".into()
            }
        );
        assert_eq!(steps[6], Step::Places("1 7 3-4".into()));
        assert_eq!(steps[7], Step::FinishTime(None));
        assert_eq!(steps[8], Step::Show(Some("A".into())));
    }

    #[test]
    fn errors_name_the_line() {
        let err = Script::parse("armstart\nswap 1\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));

        let err = Script::parse("pass noon chip1\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 1"));
    }

    #[test]
    fn empty_script_has_no_steps() {
        assert!(Script::parse("# nothing\n\n").unwrap().is_empty());
    }
}
