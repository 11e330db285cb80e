//! The [`RaceState`] aggregate and its lifecycle commands.
//!
//! All mutation goes through `&mut RaceState`, which makes the single-writer
//! rule structural. Outbound notifications are queued and drained by the
//! caller; the state holds no reference to its environment.
use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::category::{Category, CategoryStartModel};
use crate::clock::{EventClock, TimerState};
use crate::config::RaceConfig;
use crate::contest::{Contest, ContestScores, Intermediate, RESERVED_SOURCES, Tally};
use crate::error::CommandError;
use crate::events::RaceEvent;
use crate::places::PlaceList;
use crate::registry::RiderRegistry;
use crate::results::RaceStatus;
use crate::rider::{Bib, Rider};
use crate::tod::Tod;

#[derive(Clone, Debug)]
pub struct RaceState {
    pub(crate) config: RaceConfig,
    pub(crate) clock: EventClock,
    pub(crate) categories: CategoryStartModel,
    pub(crate) riders: RiderRegistry,
    pub(crate) places: PlaceList,
    pub(crate) intermediates: Vec<Intermediate>,
    pub(crate) contests: Vec<Contest>,
    pub(crate) tallies: Vec<Tally>,
    pub(crate) scores: ContestScores,
    pub(crate) status: RaceStatus,
    pub(crate) winner_bunch: Option<Tod>,
    pub(crate) max_finish: Option<Tod>,
    pub(crate) comments: Vec<String>,
    pub(crate) dirty: bool,
    pub(crate) read_only: bool,
    pub(crate) events: VecDeque<RaceEvent>,
}

impl RaceState {
    pub fn new(config: RaceConfig) -> Self {
        let clock = EventClock::new(config.total_laps);
        Self {
            config,
            clock,
            categories: CategoryStartModel::new(),
            riders: RiderRegistry::new(),
            places: PlaceList::new(),
            intermediates: Vec::new(),
            contests: Vec::new(),
            tallies: Vec::new(),
            scores: ContestScores::default(),
            status: RaceStatus::Prerace,
            winner_bunch: None,
            max_finish: None,
            comments: Vec::new(),
            dirty: false,
            read_only: false,
            events: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn clock(&self) -> &EventClock {
        &self.clock
    }

    pub fn categories(&self) -> &CategoryStartModel {
        &self.categories
    }

    pub fn riders(&self) -> &RiderRegistry {
        &self.riders
    }

    pub fn rider(&self, bib: &Bib) -> Option<&Rider> {
        self.riders.get(bib)
    }

    pub fn places(&self) -> &PlaceList {
        &self.places
    }

    pub fn intermediates(&self) -> &[Intermediate] {
        &self.intermediates
    }

    pub fn intermediate(&self, code: &str) -> Option<&Intermediate> {
        self.intermediates.iter().find(|i| i.code == code)
    }

    pub fn contests(&self) -> &[Contest] {
        &self.contests
    }

    pub fn tallies(&self) -> &[Tally] {
        &self.tallies
    }

    pub fn scores(&self) -> &ContestScores {
        &self.scores
    }

    pub fn status(&self) -> RaceStatus {
        self.status
    }

    pub fn timer(&self) -> TimerState {
        self.clock.state()
    }

    pub fn winner_bunch(&self) -> Option<Tod> {
        self.winner_bunch
    }

    pub fn max_finish(&self) -> Option<Tod> {
        self.max_finish
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// True when a mutation happened since the last recalculation.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Takes every queued outbound event.
    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        self.events.drain(..).collect()
    }

    pub(crate) fn emit(&mut self, event: RaceEvent) {
        self.events.push_back(event);
    }

    // ===== configuration =====

    pub fn add_category(&mut self, category: Category) -> bool {
        let code = category.code.clone();
        let added = self.categories.add(category);
        if !added {
            warn!(target: "race::config", category = %code, "category ignored");
        }
        added
    }

    /// Adds an intermediate; duplicate and reserved codes are ignored.
    pub fn add_intermediate(&mut self, intermediate: Intermediate) -> bool {
        let code = intermediate.code.clone();
        if code.is_empty()
            || RESERVED_SOURCES.contains(&code.as_str())
            || self.categories.finish_source(&code).is_some()
        {
            warn!(target: "race::config", intermediate = %code, "reserved intermediate code ignored");
            return false;
        }
        if self.intermediate(&code).is_some() {
            warn!(target: "race::config", intermediate = %code, "duplicate intermediate ignored");
            return false;
        }
        self.intermediates.push(intermediate);
        self.dirty = true;
        true
    }

    pub fn add_tally(&mut self, tally: Tally) -> bool {
        if self.tallies.iter().any(|t| t.code == tally.code) {
            warn!(target: "race::config", tally = %tally.code, "duplicate tally ignored");
            return false;
        }
        self.tallies.push(tally);
        true
    }

    /// Adds a contest; points without a tally recover with an empty tally.
    pub fn add_contest(&mut self, contest: Contest) -> bool {
        if contest.code.is_empty() || self.contests.iter().any(|c| c.code == contest.code) {
            warn!(target: "race::config", contest = %contest.code, "duplicate contest ignored");
            return false;
        }
        contest.check();
        if !self.tallies.iter().any(|t| t.code == contest.tally) {
            if !contest.tally.is_empty() {
                info!(target: "race::config", tally = %contest.tally, "tally created for contest");
            }
            self.tallies.push(Tally::new(&contest.tally));
        }
        self.contests.push(contest);
        self.dirty = true;
        true
    }

    pub fn set_total_laps(&mut self, total_laps: Option<u32>) {
        let total = total_laps.filter(|l| *l > 0);
        self.config.total_laps = total;
        self.clock.set_total_laps(total);
    }

    pub fn add_comment(&mut self, comment: impl Into<String>) {
        let comment = comment.into();
        if !comment.trim().is_empty() {
            info!(target: "race::command", %comment, "commissaire comment");
            self.comments.push(comment);
        }
    }

    // ===== timer lifecycle =====

    /// Toggles idle and armstart.
    pub fn arm_start(&mut self) -> Result<TimerState, CommandError> {
        let state = self.clock.arm_start().ok_or(CommandError::TimerState {
            expected: "idle or armstart",
            state: self.clock.state(),
        })?;
        if state == TimerState::ArmStart {
            self.reset_category_laps();
        }
        self.emit(RaceEvent::Timer(state));
        Ok(state)
    }

    /// Toggles armfinish while the race is running.
    pub fn arm_finish(&mut self) -> Result<TimerState, CommandError> {
        let state = self.clock.arm_finish().ok_or(CommandError::TimerState {
            expected: "running",
            state: self.clock.state(),
        })?;
        info!(target: "race::clock", %state, "arm finish");
        self.emit(RaceEvent::Timer(state));
        self.emit(RaceEvent::OnLap(self.clock.on_lap()));
        Ok(state)
    }

    /// Arms the next lap boundary by hand.
    pub fn arm_lap(&mut self) -> bool {
        let armed = self.clock.arm_lap();
        if armed {
            debug!(target: "race::clock", cur_lap = self.clock.cur_lap(), "arm lap");
            self.emit(RaceEvent::OnLap(self.clock.on_lap()));
        }
        armed
    }

    /// Sets or clears the start time. Repeating a start is harmless.
    pub fn set_start(&mut self, start: Option<Tod>) {
        let before = self.clock.state();
        self.clock.set_start(start);
        self.emit(RaceEvent::StartTime(start));
        if self.clock.state() != before {
            self.emit(RaceEvent::Timer(self.clock.state()));
        }
        self.dirty = true;
    }

    pub fn set_finish(&mut self, finish: Option<Tod>) {
        let before = self.clock.state();
        self.clock.set_finish(finish);
        self.emit(RaceEvent::FinishTime(finish));
        if self.clock.state() != before {
            self.emit(RaceEvent::Timer(self.clock.state()));
        }
        self.dirty = true;
    }

    /// Finishes the event, forcing the finish time to `now` if unset.
    pub fn finish(&mut self, now: Tod) -> Result<(), CommandError> {
        if !matches!(
            self.clock.state(),
            TimerState::Running | TimerState::ArmFinish
        ) {
            return Err(CommandError::TimerState {
                expected: "running or armfinish",
                state: self.clock.state(),
            });
        }
        self.clock.set_finished(now);
        self.emit(RaceEvent::FinishTime(self.clock.finish()));
        self.emit(RaceEvent::Timer(TimerState::Finished));
        self.dirty = true;
        Ok(())
    }

    /// Returns to idle. The roster survives, derived results do not.
    pub fn reset(&mut self) {
        info!(target: "race::clock", "reset event to idle");
        self.clock.reset();
        self.reset_places();
        self.places = PlaceList::new();
        for rider in self.riders.iter_mut() {
            rider.reset_timing();
        }
        self.reset_category_laps();
        self.status = RaceStatus::Prerace;
        self.emit(RaceEvent::Reset);
        self.emit(RaceEvent::Timer(TimerState::Idle));
        self.dirty = true;
    }

    pub(crate) fn reset_places(&mut self) {
        self.winner_bunch = None;
        self.max_finish = None;
        self.scores = ContestScores::for_tallies(self.tallies.iter().map(|t| t.code.as_str()));
        for rider in self.riders.iter_mut() {
            rider.place = None;
            rider.cbunch = None;
        }
    }

    pub(crate) fn reset_category_laps(&mut self) {
        if self.categories.reset_onlap() {
            // no category has started at the instant of a reset
            let now = self.clock.start().unwrap_or(Tod::ZERO);
            self.announce_category_laps(now);
        }
    }

    pub(crate) fn announce_category_laps(&mut self, now: Tod) {
        let progress =
            self.categories
                .all_progress(self.clock.start(), now, self.config.total_laps);
        for lap in progress {
            self.emit(RaceEvent::CategoryLap(lap));
        }
    }

    /// Category lap progress honoring each category's scheduled start.
    pub fn category_laps(&self, now: Tod) -> Vec<crate::category::CategoryLap> {
        self.categories
            .all_progress(self.clock.start(), now, self.config.total_laps)
    }

    /// Whether `code` has started at `now`.
    pub fn category_started(&self, code: &str, now: Tod) -> bool {
        self.categories.started(code, self.clock.start(), now)
    }

    /// Elapsed-time line for the scoreboard, refreshed on every tick.
    pub fn elapsed_message(&self, now: Tod) -> Option<String> {
        let start = self.clock.start()?;
        if self.clock.state() == TimerState::Finished {
            return None;
        }
        let elapsed = now - start;
        let mut parts = Vec::new();
        if let Some(finish) = self.clock.finish() {
            let winner = (finish - start).truncate(0);
            parts.push(winner.rawtime(0));
            parts.push(format!("+{}", (elapsed - winner).rawtime(0)));
            if let Some(limit) = self
                .config
                .time_limit
                .as_deref()
                .and_then(|text| crate::results::decode_limit(text, Some(winner)))
            {
                parts.push("Limit:".to_owned());
                parts.push(format!("+{}", (limit - winner).rawtime(0)));
            }
        } else {
            parts.push(elapsed.rawtime(0));
            if let Some(lap_finish) = self.clock.lap_finish() {
                if let Some(lap_start) = self.clock.lap_start() {
                    parts.push("Lap:".to_owned());
                    parts.push((lap_finish - lap_start).rawtime(0));
                }
                let down = now - lap_finish;
                if down < Tod::from_seconds(MAX_LAP_DOWN_SECONDS) {
                    parts.push(format!("+{}", down.rawtime(0)));
                }
            }
        }
        Some(parts.join(" "))
    }

    /// Queues the elapsed line; recalculation on tick is the caller's job.
    pub fn tick(&mut self, now: Tod) {
        let message = self.elapsed_message(now).unwrap_or_default();
        self.emit(RaceEvent::Elapsed(message));
    }
}

/// Lap down times beyond this are not shown.
const MAX_LAP_DOWN_SECONDS: i64 = 3600;

impl Default for RaceState {
    fn default() -> Self {
        Self::new(RaceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_roster_and_clears_timing() {
        let mut state = RaceState::default();
        state.riders.add(Rider::new(Bib::new("1")));
        state.arm_start().unwrap();
        state.set_start(Some(Tod::ZERO));
        if let Some(rider) = state.riders.get_mut(&Bib::new("1")) {
            rider.insert_passing(Tod::from_seconds(60), Tod::from_seconds(20)).unwrap();
            rider.laps = 1;
        }
        state.reset();
        let rider = state.rider(&Bib::new("1")).unwrap();
        assert!(rider.seen().is_empty());
        assert_eq!(rider.laps, 0);
        assert_eq!(state.timer(), TimerState::Idle);
        assert!(state.drain_events().contains(&RaceEvent::Reset));
    }

    #[test]
    fn contest_without_tally_gets_empty_tally() {
        let mut state = RaceState::default();
        assert!(state.add_contest(Contest::new("sprint1", "fin").with_points(vec![3, 2])));
        assert!(!state.add_contest(Contest::new("sprint1", "fin")));
        assert!(state.tallies().iter().any(|t| t.code.is_empty()));
    }

    #[test]
    fn reserved_intermediate_codes_are_refused() {
        let mut state = RaceState::default();
        assert!(!state.add_intermediate(Intermediate::new("fin")));
        assert!(state.add_intermediate(Intermediate::new("s1")));
        assert!(!state.add_intermediate(Intermediate::new("S1")));
    }

    #[test]
    fn finish_requires_running_timer() {
        let mut state = RaceState::default();
        let err = state.finish(Tod::from_seconds(10)).unwrap_err();
        assert_eq!(err.error_code(), "TIMER_STATE");
        state.set_start(Some(Tod::ZERO));
        state.finish(Tod::from_seconds(10)).unwrap();
        assert_eq!(state.clock().finish(), Some(Tod::from_seconds(10)));
    }

    #[test]
    fn elapsed_message_shows_lap_and_down_time() {
        let mut state = RaceState::default();
        state.set_start(Some(Tod::ZERO));
        state.clock.arm_lap();
        state.clock.set_lap_finish(Tod::from_seconds(300));
        let message = state.elapsed_message(Tod::from_seconds(330)).unwrap();
        assert_eq!(message, "5:30 Lap: 5:00 +30");
    }
}
