//! Event timer state machine and lap boundaries.
use tracing::{debug, info, warn};

use crate::tod::Tod;

/// Phase of the event timer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TimerState {
    #[default]
    Idle,
    ArmStart,
    Running,
    ArmFinish,
    Finished,
}

impl TimerState {
    /// Passings are only processed while the race is under way.
    pub const fn accepts_passings(self) -> bool {
        matches!(self, Self::Running | Self::ArmFinish)
    }
}

/// Start, finish and lap boundary timestamps with the timer phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventClock {
    state: TimerState,
    start: Option<Tod>,
    finish: Option<Tod>,
    lap_start: Option<Tod>,
    lap_finish: Option<Tod>,
    /// Lap currently armed; `-1` before the first arm.
    cur_lap: i32,
    /// Lap the leaders are on; `None` once the final lap is done.
    on_lap: Option<u32>,
    total_laps: Option<u32>,
    lap_times: Vec<Tod>,
}

impl Default for EventClock {
    fn default() -> Self {
        Self::new(None)
    }
}

impl EventClock {
    pub fn new(total_laps: Option<u32>) -> Self {
        Self {
            state: TimerState::Idle,
            start: None,
            finish: None,
            lap_start: None,
            lap_finish: None,
            cur_lap: -1,
            on_lap: Some(1),
            total_laps,
            lap_times: Vec::new(),
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn start(&self) -> Option<Tod> {
        self.start
    }

    pub fn finish(&self) -> Option<Tod> {
        self.finish
    }

    pub fn lap_start(&self) -> Option<Tod> {
        self.lap_start
    }

    pub fn lap_finish(&self) -> Option<Tod> {
        self.lap_finish
    }

    pub fn cur_lap(&self) -> i32 {
        self.cur_lap
    }

    pub fn on_lap(&self) -> Option<u32> {
        self.on_lap
    }

    pub fn total_laps(&self) -> Option<u32> {
        self.total_laps
    }

    pub fn lap_times(&self) -> &[Tod] {
        &self.lap_times
    }

    pub fn set_total_laps(&mut self, total_laps: Option<u32>) {
        self.total_laps = total_laps.filter(|l| *l > 0);
    }

    /// Toggles between idle and armstart; returns the new state if changed.
    pub fn arm_start(&mut self) -> Option<TimerState> {
        match self.state {
            TimerState::Idle => self.state = TimerState::ArmStart,
            TimerState::ArmStart => self.state = TimerState::Idle,
            _ => return None,
        }
        Some(self.state)
    }

    /// Sets or clears the start time.
    ///
    /// The first start resets the lap counters. Any start with no finish
    /// puts the timer in the running phase.
    pub fn set_start(&mut self, start: Option<Tod>) {
        let was_idle = self.start.is_none();
        self.start = start;
        if start.is_some() {
            if was_idle {
                self.lap_start = None;
                self.lap_finish = None;
                self.cur_lap = -1;
                self.on_lap = Some(1);
            }
            if self.finish.is_none() {
                self.state = TimerState::Running;
            }
        }
    }

    /// Sets or clears the finish time, forcing a zero start if none is set.
    pub fn set_finish(&mut self, finish: Option<Tod>) {
        self.finish = finish;
        match finish {
            None => {
                if self.start.is_some() {
                    self.state = TimerState::Running;
                }
            }
            Some(_) => {
                if self.start.is_none() {
                    self.set_start(Some(Tod::ZERO));
                }
            }
        }
    }

    /// Arms the next lap boundary; returns `true` when a lap was armed.
    pub fn arm_lap(&mut self) -> bool {
        if self.cur_lap < 0 {
            self.cur_lap = 0;
        }
        if matches!(self.state, TimerState::Idle | TimerState::ArmStart) {
            return false;
        }
        if self.cur_lap <= 0 || self.lap_finish.is_some() {
            self.cur_lap += 1;
            if let Some(total) = self.total_laps
                && self.cur_lap > total as i32
            {
                info!(target: "race::clock", total, "too many laps");
                self.cur_lap = total as i32;
            }
            if let Some(on_lap) = self.on_lap
                && on_lap as i32 != self.cur_lap
            {
                debug!(target: "race::clock", cur_lap = self.cur_lap, on_lap, "lap counter mismatch");
                if self.cur_lap == 1 {
                    self.cur_lap = on_lap as i32;
                } else {
                    self.on_lap = u32::try_from(self.cur_lap).ok();
                }
            }
        }
        if !matches!(self.state, TimerState::ArmFinish | TimerState::Finished) {
            if self.lap_finish.is_some() {
                self.lap_start = self.lap_finish;
            } else if self.lap_start.is_none() {
                self.lap_start = self.start;
            }
            self.lap_finish = None;
        }
        true
    }

    /// Records the leader completing the armed lap at `at`.
    pub fn set_lap_finish(&mut self, at: Tod) {
        self.lap_times.push(at);
        self.lap_finish = Some(at);
        self.on_lap = match (self.on_lap, self.total_laps) {
            (Some(on_lap), Some(total)) if on_lap == total => None,
            (Some(on_lap), _) => Some(on_lap + 1),
            (None, _) => None,
        };
    }

    /// Toggles armfinish; returns the new state if changed.
    ///
    /// Without a total lap count the lap count is unbound, so the next lap
    /// is always armed. An unset count and a count of zero are the same
    /// thing here.
    pub fn arm_finish(&mut self) -> Option<TimerState> {
        match self.state {
            TimerState::Running | TimerState::Finished => {
                if (self.finish.is_none() && self.cur_lap != 0) || self.total_laps.is_none() {
                    self.arm_lap();
                }
                self.state = TimerState::ArmFinish;
            }
            TimerState::ArmFinish => self.state = TimerState::Running,
            _ => return None,
        }
        Some(self.state)
    }

    /// Marks the event finished, forcing the finish time to `now` if unset.
    pub fn set_finished(&mut self, now: Tod) {
        self.state = TimerState::Finished;
        if self.finish.is_none() {
            self.set_finish(Some(now));
            warn!(target: "race::clock", finish = %now.rawtime(4), "finish time forced");
        }
    }

    /// Returns to idle, clearing every timestamp and lap counter.
    pub fn reset(&mut self) {
        self.set_finish(None);
        self.set_start(None);
        self.state = TimerState::Idle;
        self.lap_start = None;
        self.lap_finish = None;
        self.cur_lap = -1;
        self.on_lap = Some(1);
        self.lap_times.clear();
    }

    /// Whole seconds since the start while the event is under way.
    pub fn elapsed(&self, now: Tod) -> Option<Tod> {
        match (self.start, self.state) {
            (Some(start), state) if state != TimerState::Finished => {
                Some((now - start).truncate(0))
            }
            _ => None,
        }
    }

    /// Restores persisted lap bookkeeping without side effects.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        &mut self,
        start: Option<Tod>,
        finish: Option<Tod>,
        lap_start: Option<Tod>,
        lap_finish: Option<Tod>,
        cur_lap: i32,
        on_lap: Option<u32>,
        lap_times: Vec<Tod>,
    ) {
        self.start = start;
        self.finish = finish;
        self.state = match (start, finish) {
            (None, _) => TimerState::Idle,
            (Some(_), None) => TimerState::Running,
            (Some(_), Some(_)) => TimerState::Finished,
        };
        self.lap_start = lap_start;
        self.lap_finish = lap_finish;
        self.cur_lap = cur_lap;
        self.on_lap = on_lap;
        self.lap_times = lap_times;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: i64) -> Tod {
        Tod::from_seconds(s)
    }

    #[test]
    fn arm_start_toggles_only_from_idle() {
        let mut clock = EventClock::new(None);
        assert_eq!(clock.arm_start(), Some(TimerState::ArmStart));
        assert_eq!(clock.arm_start(), Some(TimerState::Idle));
        clock.set_start(Some(secs(10)));
        assert_eq!(clock.arm_start(), None);
        assert_eq!(clock.state(), TimerState::Running);
    }

    #[test]
    fn arm_finish_arms_a_lap_when_laps_are_unbound() {
        for total in [None, Some(0)] {
            let mut clock = EventClock::new(None);
            clock.set_total_laps(total);
            clock.set_start(Some(secs(0)));
            clock.cur_lap = 0;
            assert_eq!(clock.arm_finish(), Some(TimerState::ArmFinish));
            assert_eq!(clock.cur_lap(), 1, "total {total:?}");
        }

        let mut bounded = EventClock::new(Some(5));
        bounded.set_start(Some(secs(0)));
        bounded.cur_lap = 0;
        bounded.arm_finish();
        assert_eq!(bounded.cur_lap(), 0);
    }

    #[test]
    fn first_start_resets_lap_counters() {
        let mut clock = EventClock::new(Some(5));
        clock.arm_start();
        clock.set_start(Some(secs(0)));
        assert_eq!((clock.cur_lap(), clock.on_lap()), (-1, Some(1)));
        assert!(clock.arm_lap());
        assert_eq!(clock.cur_lap(), 1);
        assert_eq!(clock.lap_start(), Some(secs(0)));
        clock.set_lap_finish(secs(300));
        assert_eq!(clock.on_lap(), Some(2));
        assert!(clock.arm_lap());
        assert_eq!(clock.cur_lap(), 2);
        assert_eq!(clock.lap_start(), Some(secs(300)));
        assert_eq!(clock.lap_finish(), None);
    }

    #[test]
    fn set_start_is_idempotent() {
        let mut clock = EventClock::new(None);
        clock.set_start(Some(secs(5)));
        clock.arm_lap();
        clock.set_start(Some(secs(5)));
        assert_eq!(clock.cur_lap(), 1);
        assert_eq!(clock.state(), TimerState::Running);
    }

    #[test]
    fn finish_without_start_forces_zero_start() {
        let mut clock = EventClock::new(None);
        clock.set_finish(Some(secs(3600)));
        assert_eq!(clock.start(), Some(Tod::ZERO));
        assert_eq!(clock.finish(), Some(secs(3600)));
    }

    #[test]
    fn arm_finish_arms_lap_and_toggles_back() {
        let mut clock = EventClock::new(None);
        clock.set_start(Some(secs(0)));
        assert_eq!(clock.arm_finish(), Some(TimerState::ArmFinish));
        assert_eq!(clock.cur_lap(), 1);
        assert_eq!(clock.arm_finish(), Some(TimerState::Running));
    }

    #[test]
    fn lap_counter_stops_at_total() {
        let mut clock = EventClock::new(Some(2));
        clock.set_start(Some(secs(0)));
        clock.arm_lap();
        clock.set_lap_finish(secs(100));
        clock.arm_lap();
        clock.set_lap_finish(secs(200));
        assert_eq!(clock.on_lap(), None);
        clock.arm_lap();
        assert_eq!(clock.cur_lap(), 2);
    }

    #[test]
    fn forced_finish_and_reset() {
        let mut clock = EventClock::new(None);
        clock.set_start(Some(secs(0)));
        clock.arm_finish();
        clock.set_finished(secs(4000));
        assert_eq!(clock.state(), TimerState::Finished);
        assert_eq!(clock.finish(), Some(secs(4000)));
        assert_eq!(clock.elapsed(secs(4100)), None);

        clock.reset();
        assert_eq!(clock.state(), TimerState::Idle);
        assert_eq!((clock.start(), clock.finish()), (None, None));
        assert!(clock.lap_times().is_empty());
    }
}
