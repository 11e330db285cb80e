//! Passing validation, debounce and lap/finish classification.
//!
//! [`PassingProcessor`] is the only path by which a transponder or manual
//! passing reaches the rider registry. Rejections are values, logged at
//! `info` and otherwise dropped.
use std::fmt;

use tracing::{error, info, warn};

use crate::category::SPARE_CATEGORY;
use crate::clock::TimerState;
use crate::events::RaceEvent;
use crate::rider::{Bib, DnfCode, Rider, SeenConflict};
use crate::state::RaceState;
use crate::tod::Tod;

/// Refid prefix for passings keyed directly by bib.
pub const MANUAL_REFID_PREFIX: &str = "riderno:";
/// Channel recorded on operator-entered passings.
pub const MANUAL_CHANNEL: &str = "MAN";
/// Refid sent by decoders for a generic trigger.
const TRIGGER_REFID: &str = "255";

/// One timestamped detection at the timing line.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Passing {
    pub refid: String,
    pub timestamp: Tod,
    #[cfg_attr(feature = "serde", serde(default))]
    pub channel: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub source: String,
}

impl Passing {
    pub fn new(refid: impl Into<String>, timestamp: Tod) -> Self {
        Self {
            refid: refid.into(),
            timestamp,
            channel: String::new(),
            source: String::new(),
        }
    }

    /// Operator passing for `bib` at `now`.
    pub fn manual(bib: &Bib, now: Tod) -> Self {
        Self {
            refid: format!("{MANUAL_REFID_PREFIX}{bib}"),
            timestamp: now,
            channel: MANUAL_CHANNEL.to_owned(),
            source: String::new(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Empty or sentinel refids are start triggers, not rider passings.
    pub fn is_trigger(&self) -> bool {
        let refid = self.refid.trim();
        refid.is_empty() || refid == TRIGGER_REFID
    }
}

impl fmt::Display for Passing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}@{}/{}",
            self.refid,
            self.channel,
            self.timestamp.rawtime(2),
            self.source
        )
    }
}

/// Rider directory record for a resolved refid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DirectoryEntry {
    pub refid: String,
    pub bib: String,
    pub series: String,
    pub name: String,
    pub categories: Vec<String>,
}

impl DirectoryEntry {
    pub fn new(bib: impl Into<String>, series: impl Into<String>) -> Self {
        Self {
            bib: bib.into(),
            series: series.into(),
            ..Self::default()
        }
    }

    pub fn primary_category(&self) -> &str {
        self.categories.first().map(String::as_str).unwrap_or("")
    }

    /// Event rider built from this directory record.
    pub fn to_rider(&self) -> Rider {
        Rider::new(Bib::new(self.bib.as_str()))
            .with_name(self.name.clone())
            .with_categories(&self.categories)
    }
}

/// Lookup of transponder ids and bibs in the external rider database.
pub trait RiderDirectory {
    /// Resolves a transponder refid.
    fn resolve(&self, refid: &str) -> Option<DirectoryEntry>;

    /// Finds a rider by bib within a series.
    fn lookup(&self, bib: &str, series: &str) -> Option<DirectoryEntry>;
}

impl RiderDirectory for [DirectoryEntry] {
    fn resolve(&self, refid: &str) -> Option<DirectoryEntry> {
        self.iter()
            .find(|e| !e.refid.is_empty() && e.refid.eq_ignore_ascii_case(refid))
            .cloned()
    }

    fn lookup(&self, bib: &str, series: &str) -> Option<DirectoryEntry> {
        self.iter()
            .find(|e| e.bib.eq_ignore_ascii_case(bib) && e.series == series)
            .cloned()
    }
}

impl RiderDirectory for Vec<DirectoryEntry> {
    fn resolve(&self, refid: &str) -> Option<DirectoryEntry> {
        self.as_slice().resolve(refid)
    }

    fn lookup(&self, bib: &str, series: &str) -> Option<DirectoryEntry> {
        self.as_slice().lookup(bib, series)
    }
}

/// Why a passing was dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RejectReason {
    UnknownRider,
    WrongSeries { series: String },
    DisallowedSource,
    NonStarter,
    TimerNotRunning(TimerState),
    /// Before `start + offset + minlap`.
    Early { threshold: Tod },
    /// Within `minlap` of the previous accepted passing.
    ShortLap { threshold: Tod },
    /// Within `minlap` of a later accepted passing.
    Spurious { next: Tod },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRider => f.write_str("unknown rider"),
            Self::WrongSeries { series } => write!(f, "non-series rider ({series})"),
            Self::DisallowedSource => f.write_str("invalid passing source"),
            Self::NonStarter => f.write_str("non-starter"),
            Self::TimerNotRunning(state) => write!(f, "timer {state}"),
            Self::Early { threshold } => write!(f, "early passing < {}", threshold.rawtime(2)),
            Self::ShortLap { threshold } => write!(f, "short lap < {}", threshold.rawtime(2)),
            Self::Spurious { next } => write!(f, "spurious passing < {}", next.rawtime(2)),
        }
    }
}

/// Classification of a processed passing.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PassingOutcome {
    Rejected(RejectReason),
    StartTrigger,
    /// Stored on the lapping path; `on_lap` means the rider is with the leaders.
    LapAccepted { bib: Bib, laps: u32, on_lap: bool },
    /// Stored on the finish path; `rftime_set` is false for repeat crossings.
    FinishAccepted { bib: Bib, rftime_set: bool },
}

impl PassingOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::LapAccepted { .. } | Self::FinishAccepted { .. })
    }
}

/// Applies passings to a [`RaceState`].
pub struct PassingProcessor<'a> {
    state: &'a mut RaceState,
}

impl<'a> PassingProcessor<'a> {
    pub fn new(state: &'a mut RaceState) -> Self {
        Self { state }
    }

    pub fn process<D>(&mut self, directory: &D, passing: &Passing) -> PassingOutcome
    where
        D: RiderDirectory + ?Sized,
    {
        if passing.is_trigger() {
            self.start_trigger(passing);
            return PassingOutcome::StartTrigger;
        }

        let Some(entry) = self.resolve(directory, passing.refid.trim()) else {
            info!(target: "race::passing", %passing, "unknown rider");
            return PassingOutcome::Rejected(RejectReason::UnknownRider);
        };
        if entry.series != self.state.config.series {
            info!(target: "race::passing", bib = %entry.bib, series = %entry.series, "non-series rider");
            return PassingOutcome::Rejected(RejectReason::WrongSeries {
                series: entry.series,
            });
        }
        if !self.state.config.accepts_source(&passing.source) {
            info!(target: "race::passing", %passing, "invalid passing source");
            return PassingOutcome::Rejected(RejectReason::DisallowedSource);
        }

        let bib = Bib::new(entry.bib.as_str());
        if let Some(outcome) = self.register(&entry, &bib, passing) {
            return outcome;
        }

        match self.state.clock.state() {
            TimerState::Running | TimerState::ArmFinish => {}
            state => return PassingOutcome::Rejected(RejectReason::TimerNotRunning(state)),
        }

        if let Err(reason) = self.insert(&bib, passing) {
            info!(target: "race::passing", %bib, %passing, %reason, "passing ignored");
            return PassingOutcome::Rejected(reason);
        }
        self.state.dirty = true;

        let lap_finish = self.reaches_target(&bib);
        if lap_finish
            && self.state.config.event_type.is_lap_count_race()
            && self.state.clock.state() != TimerState::ArmFinish
            && let Some(state) = self.state.clock.arm_finish()
        {
            self.state.emit(RaceEvent::Timer(state));
        }

        if self.state.clock.state() == TimerState::ArmFinish || lap_finish {
            self.finish_path(&bib, passing, lap_finish)
        } else {
            self.lapping_path(&bib, passing)
        }
    }

    fn resolve<D>(&self, directory: &D, refid: &str) -> Option<DirectoryEntry>
    where
        D: RiderDirectory + ?Sized,
    {
        let Some(bib) = refid.strip_prefix(MANUAL_REFID_PREFIX) else {
            return directory.resolve(refid);
        };
        let series = &self.state.config.series;
        directory.lookup(bib, series).or_else(|| {
            let rider = self.state.riders.get(&Bib::new(bib))?;
            Some(DirectoryEntry {
                refid: refid.to_owned(),
                bib: rider.bib.to_string(),
                series: series.clone(),
                name: rider.name.clone(),
                categories: rider.categories.clone(),
            })
        })
    }

    /// Spare bike and club-mode registration; `Some` rejects the passing.
    fn register(&mut self, entry: &DirectoryEntry, bib: &Bib, passing: &Passing) -> Option<PassingOutcome> {
        let timer = self.state.clock.state();
        if self.state.config.allow_spares
            && entry.primary_category().eq_ignore_ascii_case(SPARE_CATEGORY)
            && matches!(timer, TimerState::Running | TimerState::ArmFinish)
            && self.state.riders.add(entry.to_rider())
        {
            warn!(target: "race::passing", %bib, "adding spare bike");
        }

        if !self.state.riders.contains(bib) {
            if self.state.config.club_mode
                && matches!(
                    timer,
                    TimerState::ArmStart | TimerState::Running | TimerState::ArmFinish
                )
            {
                self.state.riders.add(entry.to_rider());
                info!(target: "race::passing", %bib, %passing, "added new starter");
            } else {
                info!(target: "race::passing", %bib, %passing, "non-starter");
                return Some(PassingOutcome::Rejected(RejectReason::NonStarter));
            }
        }

        if self.state.riders.get(bib).is_some_and(|r| !r.in_race) {
            warn!(target: "race::passing", %bib, %passing, "withdrawn rider");
        } else {
            info!(target: "race::passing", %bib, %passing, "saw");
        }
        None
    }

    /// Early check and ordered, debounced insertion.
    fn insert(&mut self, bib: &Bib, passing: &Passing) -> Result<(), RejectReason> {
        let state = &mut *self.state;
        let min_lap = state.config.min_lap;
        let Some(rider) = state.riders.get_mut(bib) else {
            return Err(RejectReason::NonStarter);
        };
        let at = passing.timestamp;

        let threshold = match state.clock.start() {
            Some(start) => {
                start + state.categories.rider_offset(rider).unwrap_or(Tod::ZERO) + min_lap
            }
            None => Tod::ZERO,
        };
        if at <= threshold {
            return Err(RejectReason::Early { threshold });
        }

        rider
            .insert_passing(at, min_lap)
            .map(|_| ())
            .map_err(|conflict| match conflict {
                SeenConflict::TooSoonAfter(prev) => RejectReason::ShortLap {
                    threshold: prev + min_lap,
                },
                SeenConflict::TooSoonBefore(next) => RejectReason::Spurious { next },
            })
    }

    /// True when this passing completes the rider's target lap.
    fn reaches_target(&self, bib: &Bib) -> bool {
        let state = &*self.state;
        if !state.config.target_laps {
            return false;
        }
        let Some(rider) = state.riders.get(bib) else {
            return false;
        };
        let category = state.categories.result_category(rider.primary_category());
        state
            .categories
            .target_laps(&category)
            .or(state.config.total_laps)
            .is_some_and(|target| rider.laps + 1 >= target)
    }

    fn start_trigger(&mut self, passing: &Passing) {
        if self.state.clock.state() != TimerState::ArmStart {
            info!(target: "race::passing", %passing, "trigger");
            return;
        }
        info!(target: "race::passing", %passing, "start trigger");
        self.state.set_start(Some(passing.timestamp));
        self.state.reset_category_laps();
        if self.state.config.event_type.arms_lap_on_start() {
            self.state.arm_lap();
        }
    }

    fn finish_path(&mut self, bib: &Bib, passing: &Passing, lap_finish: bool) -> PassingOutcome {
        let at = passing.timestamp;
        if self.state.clock.finish().is_none() {
            if lap_finish {
                self.state.clock.arm_lap();
                self.lap_finished(at);
            }
            self.state.clock.set_finish(Some(at));
            self.state.emit(RaceEvent::FinishTime(Some(at)));
        }

        let state = &mut *self.state;
        let Some(rider) = state.riders.get_mut(bib) else {
            return PassingOutcome::Rejected(RejectReason::NonStarter);
        };
        if rider.rftime.is_some() {
            info!(target: "race::passing", %bib, %passing, "duplicate finish rider");
            return PassingOutcome::FinishAccepted {
                bib: bib.clone(),
                rftime_set: false,
            };
        }
        if rider.comment == Some(DnfCode::Wd) {
            return PassingOutcome::FinishAccepted {
                bib: bib.clone(),
                rftime_set: false,
            };
        }

        let mut rftime_set = false;
        if rider.place.is_none() {
            // retired riders keep the passing but never take a finish
            if rider.in_race {
                rider.rftime = Some(at);
                rftime_set = true;
            }
        } else {
            error!(target: "race::passing", %bib, %passing, "placed rider seen at finish");
            state.events.push_back(RaceEvent::PlacedRiderAtFinish { bib: bib.clone() });
        }

        if rider.in_race {
            rider.laps += 1;
            let laps = rider.laps;
            let category = state.categories.result_category(rider.primary_category());
            if state.categories.record_lap(&category, laps) {
                self.announce_category(&category, at);
            }
            if self.state.clock.lap_finish().is_none() {
                self.lap_finished(at);
            }
            self.announce_rider(bib, at, true);
        }
        PassingOutcome::FinishAccepted {
            bib: bib.clone(),
            rftime_set,
        }
    }

    fn lapping_path(&mut self, bib: &Bib, passing: &Passing) -> PassingOutcome {
        let at = passing.timestamp;
        let state = &mut *self.state;
        let target_mode = state.config.target_laps;
        let pushes = state.config.event_type.pushes_onto_current_lap();
        let min_lap = state.config.min_lap;
        let Some(rider) = state.riders.get_mut(bib) else {
            return PassingOutcome::Rejected(RejectReason::NonStarter);
        };
        if !(rider.in_race && (rider.place.is_some() || rider.cbunch.is_none())) {
            return PassingOutcome::LapAccepted {
                bib: bib.clone(),
                laps: rider.laps,
                on_lap: false,
            };
        }

        rider.laps += 1;
        let mut on_lap = false;
        let category = state.categories.result_category(rider.primary_category());
        let mut category_advanced = false;
        if target_mode {
            let leader_lap = state.categories.onlap(&category);
            if state.categories.record_lap(&category, rider.laps) {
                category_advanced = true;
            } else if rider.laps >= leader_lap {
                on_lap = true;
            }
        }

        let cur_lap = state.clock.cur_lap();
        let laps = i64::from(rider.laps);
        let mut lap_leader = false;
        match state.clock.lap_finish() {
            None => {
                if laps == i64::from(cur_lap) {
                    lap_leader = true;
                }
            }
            Some(lap_finish) => {
                if at < lap_finish {
                    on_lap = false;
                    info!(target: "race::passing", %bib, %passing, "passing on previous lap");
                } else if laps == i64::from(cur_lap) {
                    on_lap = true;
                } else if laps < i64::from(cur_lap) {
                    if pushes {
                        rider.laps = cur_lap.max(0) as u32;
                        on_lap = true;
                    }
                } else if at < lap_finish + min_lap {
                    if pushes {
                        rider.laps = cur_lap.max(0) as u32;
                        on_lap = true;
                    } else {
                        warn!(target: "race::passing", %bib, laps = rider.laps, cur_lap, "invalid laps");
                    }
                } else {
                    self.state.clock.arm_lap();
                    lap_leader = true;
                }
            }
        }
        if lap_leader {
            self.lap_finished(at);
            on_lap = true;
        }
        if category_advanced {
            self.announce_category(&category, at);
        }
        self.announce_rider(bib, at, false);

        let laps = self.state.riders.get(bib).map(|r| r.laps).unwrap_or_default();
        PassingOutcome::LapAccepted {
            bib: bib.clone(),
            laps,
            on_lap,
        }
    }

    fn lap_finished(&mut self, at: Tod) {
        let previous = self
            .state
            .clock
            .lap_finish()
            .or(self.state.clock.lap_start())
            .or(self.state.clock.start());
        self.state.clock.set_lap_finish(at);
        self.state.emit(RaceEvent::LapFinished {
            at,
            lap_time: previous.map(|p| at - p),
        });
        self.state.emit(RaceEvent::OnLap(self.state.clock.on_lap()));
    }

    fn announce_category(&mut self, category: &str, now: Tod) {
        let start = self.state.clock.start();
        let total = self.state.config.total_laps;
        if let Some(lap) = self.state.categories.lap_progress(category, start, now, total) {
            self.state.emit(RaceEvent::CategoryLap(lap));
        }
    }

    fn announce_rider(&mut self, bib: &Bib, at: Tod, finish: bool) {
        let Some(rider) = self.state.riders.get(bib) else {
            return;
        };
        let event = RaceEvent::RiderPassing {
            bib: bib.clone(),
            name: rider.name.clone(),
            category: rider.primary_category().to_owned(),
            elapsed: self.state.clock.start().map(|start| at - start),
            finish,
        };
        self.state.emit(event);
    }
}

impl RaceState {
    /// Validates and applies one passing.
    pub fn submit_passing<D>(&mut self, directory: &D, passing: &Passing) -> PassingOutcome
    where
        D: RiderDirectory + ?Sized,
    {
        PassingProcessor::new(self).process(directory, passing)
    }

    /// Operator passing for `bib` at `now` on the manual channel.
    pub fn submit_manual_passing<D>(&mut self, directory: &D, bib: &Bib, now: Tod) -> PassingOutcome
    where
        D: RiderDirectory + ?Sized,
    {
        self.submit_passing(directory, &Passing::manual(bib, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::config::RaceConfig;

    fn secs(s: f64) -> Tod {
        Tod::from_secs_f64(s)
    }

    fn entry(bib: &str, category: &str) -> DirectoryEntry {
        let mut entry = DirectoryEntry::new(bib, "");
        entry.refid = format!("chip{bib}");
        entry.categories = vec![category.to_owned()];
        entry
    }

    fn directory() -> Vec<DirectoryEntry> {
        vec![entry("1", "A"), entry("2", "A"), entry("3", "B")]
    }

    fn running(config: RaceConfig) -> RaceState {
        let mut state = RaceState::new(config);
        state
            .add_riders(&directory(), &[Bib::new("1"), Bib::new("2")])
            .unwrap();
        state.set_start(Some(Tod::ZERO));
        state
    }

    fn pass(state: &mut RaceState, bib: &str, at: f64) -> PassingOutcome {
        state.submit_passing(&directory(), &Passing::new(format!("chip{bib}"), secs(at)))
    }

    #[test]
    fn passings_closer_than_min_lap_are_debounced() {
        let mut state = running(RaceConfig::default());
        assert!(pass(&mut state, "1", 60.0).is_accepted());
        assert!(matches!(
            pass(&mut state, "1", 60.3),
            PassingOutcome::Rejected(RejectReason::ShortLap { .. })
        ));
        assert!(pass(&mut state, "1", 85.0).is_accepted());
        assert_eq!(state.rider(&Bib::new("1")).unwrap().seen(), &[secs(60.0), secs(85.0)]);
    }

    #[test]
    fn late_arriving_passing_is_merged_in_order() {
        let mut state = running(RaceConfig::default());
        for at in [200.0, 100.0, 300.0, 150.0] {
            assert!(pass(&mut state, "2", at).is_accepted(), "passing at {at}");
        }
        assert!(matches!(
            pass(&mut state, "2", 190.0),
            PassingOutcome::Rejected(RejectReason::Spurious { .. })
        ));
        let seen = state.rider(&Bib::new("2")).unwrap().seen().to_vec();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn category_offset_delays_first_valid_passing() {
        let mut state = RaceState::default();
        state.add_category(Category::new("A").with_start_offset(Some(Tod::from_seconds(5))));
        state.add_riders(&directory(), &[Bib::new("1")]).unwrap();
        state.set_start(Some(Tod::ZERO));
        assert_eq!(
            pass(&mut state, "1", 4.0),
            PassingOutcome::Rejected(RejectReason::Early {
                threshold: Tod::from_seconds(25)
            })
        );
        assert_eq!(
            pass(&mut state, "1", 30.0),
            PassingOutcome::LapAccepted {
                bib: Bib::new("1"),
                laps: 1,
                on_lap: false
            }
        );
    }

    #[test]
    fn unresolved_and_filtered_passings_are_rejected() {
        let config = RaceConfig::default().with_passing_sources(["loop1"]);
        let mut state = running(config);
        let directory = directory();
        let unknown = Passing::new("chip99", secs(60.0)).with_source("loop1");
        assert_eq!(
            state.submit_passing(&directory, &unknown),
            PassingOutcome::Rejected(RejectReason::UnknownRider)
        );
        let wrong_source = Passing::new("chip1", secs(60.0)).with_source("loop2");
        assert_eq!(
            state.submit_passing(&directory, &wrong_source),
            PassingOutcome::Rejected(RejectReason::DisallowedSource)
        );
        let not_entered = Passing::new("chip3", secs(60.0)).with_source("loop1");
        assert_eq!(
            state.submit_passing(&directory, &not_entered),
            PassingOutcome::Rejected(RejectReason::NonStarter)
        );

        let mut other = DirectoryEntry::new("7", "t");
        other.refid = "chip7".into();
        let outcome = state.submit_passing(&vec![other], &Passing::new("chip7", secs(60.0)));
        assert!(matches!(
            outcome,
            PassingOutcome::Rejected(RejectReason::WrongSeries { .. })
        ));
    }

    #[test]
    fn passings_before_start_are_refused() {
        let mut state = RaceState::default();
        state.add_riders(&directory(), &[Bib::new("1")]).unwrap();
        assert_eq!(
            pass(&mut state, "1", 60.0),
            PassingOutcome::Rejected(RejectReason::TimerNotRunning(TimerState::Idle))
        );
    }

    #[test]
    fn trigger_starts_an_armed_event() {
        let mut state = RaceState::default();
        state.arm_start().unwrap();
        let outcome = state.submit_passing(&directory(), &Passing::new("", secs(36000.0)));
        assert_eq!(outcome, PassingOutcome::StartTrigger);
        assert_eq!(state.clock().start(), Some(secs(36000.0)));
        assert_eq!(state.timer(), TimerState::Running);

        // a second trigger once running is only logged
        state.submit_passing(&directory(), &Passing::new("255", secs(36010.0)));
        assert_eq!(state.clock().start(), Some(secs(36000.0)));
    }

    #[test]
    fn club_mode_registers_unknown_starters() {
        let mut state = running(RaceConfig::default().with_club_mode(true));
        assert!(pass(&mut state, "3", 60.0).is_accepted());
        let rider = state.rider(&Bib::new("3")).unwrap();
        assert_eq!(rider.categories, vec!["B".to_owned()]);
    }

    #[test]
    fn first_finisher_fixes_the_race_finish() {
        let mut state = running(RaceConfig::default());
        state.arm_finish().unwrap();
        assert_eq!(
            pass(&mut state, "1", 100.0),
            PassingOutcome::FinishAccepted {
                bib: Bib::new("1"),
                rftime_set: true
            }
        );
        assert!(pass(&mut state, "2", 100.5).is_accepted());
        assert_eq!(
            pass(&mut state, "1", 200.0),
            PassingOutcome::FinishAccepted {
                bib: Bib::new("1"),
                rftime_set: false
            }
        );
        assert_eq!(state.clock().finish(), Some(secs(100.0)));
        let rider = state.rider(&Bib::new("2")).unwrap();
        assert_eq!((rider.rftime, rider.laps), (Some(secs(100.5)), 1));
    }

    #[test]
    fn placed_rider_seen_at_finish_is_flagged() {
        let mut state = running(RaceConfig::default());
        state.set_places("1").unwrap();
        state.recalculate();
        state.arm_finish().unwrap();
        state.drain_events();
        assert_eq!(
            pass(&mut state, "1", 100.0),
            PassingOutcome::FinishAccepted {
                bib: Bib::new("1"),
                rftime_set: false
            }
        );
        assert!(state.drain_events().contains(&RaceEvent::PlacedRiderAtFinish {
            bib: Bib::new("1")
        }));
        assert!(state.rider(&Bib::new("1")).unwrap().rftime.is_none());
    }

    #[test]
    fn target_lap_finishes_rider() {
        let config = RaceConfig::default()
            .with_target_laps(true)
            .with_total_laps(Some(2));
        let mut state = running(config);
        assert!(matches!(
            pass(&mut state, "1", 60.0),
            PassingOutcome::LapAccepted { laps: 1, .. }
        ));
        assert_eq!(
            pass(&mut state, "1", 120.0),
            PassingOutcome::FinishAccepted {
                bib: Bib::new("1"),
                rftime_set: true
            }
        );
        assert_eq!(state.clock().finish(), Some(secs(120.0)));
        assert_eq!(state.rider(&Bib::new("1")).unwrap().laps, 2);
    }

    #[test]
    fn manual_passing_uses_bib() {
        let mut state = running(RaceConfig::default());
        let empty: Vec<DirectoryEntry> = Vec::new();
        let outcome = state.submit_manual_passing(&empty, &Bib::new("2"), secs(45.0));
        assert!(outcome.is_accepted());
        assert_eq!(state.rider(&Bib::new("2")).unwrap().laps, 1);
    }
}
