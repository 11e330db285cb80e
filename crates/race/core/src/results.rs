//! Result calculation: places, bunch times and race status.
//!
//! [`ResultCalculator::run`] is idempotent. It has no fallible step; every
//! malformed input (unknown rider in places, undecodable time limit, bad
//! contest source) is logged and skipped, leaving the rest of the state as is.
use tracing::{debug, warn};

use crate::clock::TimerState;
use crate::config::{EventType, RaceConfig};
use crate::contest::ContestEngine;
use crate::events::RaceEvent;
use crate::rider::{Bib, DnfCode, Rider, UNPLACED_RANK};
use crate::state::RaceState;
use crate::tod::Tod;

/// Overall status of the result.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RaceStatus {
    /// Timer idle.
    #[default]
    Prerace,
    /// Under way with no passings recorded yet.
    Running,
    /// Enough riders placed to publish.
    Provisional,
    /// Live, unofficial ranking.
    Virtual,
    /// All riders handled or the event is finished.
    Final,
}

/// Decodes a time limit into a bunch time.
///
/// `+MM:SS` is a down time on `winner`, `N%` a percentage of `winner` added
/// as down time, and a plain time below `winner` is also a down time. Any
/// other plain time is an absolute bunch time.
pub fn decode_limit(text: &str, winner: Option<Tod>) -> Option<Tod> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut down = text.contains('+');
    let body = text.replace('+', "");

    let limit = if body.contains('%') {
        down = true;
        winner.and_then(|winner| {
            let fraction = 0.01 * body.replace('%', "").trim().parse::<f64>().ok()?;
            Some(Tod::from_seconds(
                (fraction * winner.as_seconds() as f64) as i64,
            ))
        })
    } else {
        let limit = Tod::parse(&body).ok();
        if let (Some(limit), Some(winner)) = (limit, winner)
            && limit < winner
        {
            down = true;
        }
        limit
    };

    let decoded = match limit {
        Some(limit) if down => winner.map(|winner| (winner + limit).truncate(0)),
        Some(limit) => Some(limit.truncate(0)),
        None => None,
    };
    if decoded.is_none() {
        warn!(target: "race::recalc", limit = text, "unable to decode time limit");
    }
    decoded
}

/// Ordering rank of a rider's place or status code.
fn place_rank(rider: &Rider) -> u32 {
    if rider.in_race
        && let Some(place) = rider.place
    {
        return place;
    }
    match rider.comment {
        // time limit marks are derived from this very ordering
        Some(DnfCode::Otl) if rider.in_race => UNPLACED_RANK,
        Some(code) => code.rank(),
        None => UNPLACED_RANK,
    }
}

/// Sorts riders, assigns places and bunch times, and derives the status.
pub struct ResultCalculator<'a> {
    state: &'a mut RaceState,
}

impl<'a> ResultCalculator<'a> {
    pub fn new(state: &'a mut RaceState) -> Self {
        Self { state }
    }

    pub fn run(&mut self) -> RaceStatus {
        debug!(target: "race::recalc", "recalculate");
        self.state.reset_places();
        self.assign_finish();
        self.assign_contests();
        self.rough_sort();
        let first_time = self.compute_bunches();
        if !self.state.config.event_type.is_lap_count_race() {
            self.bunch_sort();
        }
        let status = self.compute_status(first_time);
        debug!(target: "race::recalc", %status, "event status");
        status
    }

    /// Copies finish places onto riders; dead heats share a rank.
    fn assign_finish(&mut self) {
        let state = &mut *self.state;
        let mut listed: Vec<Bib> = Vec::new();
        let mut slot = 0u32;
        for group in state.places.groups() {
            let rank = slot + 1;
            for bib in group {
                if bib.is_placeholder() {
                    slot += 1;
                    continue;
                }
                if listed.contains(bib) {
                    warn!(target: "race::recalc", %bib, "duplicate rider in finish places");
                    continue;
                }
                listed.push(bib.clone());
                if !state.riders.contains(bib) {
                    warn!(target: "race::recalc", %bib, "unregistered rider in finish places added");
                    state.riders.add(Rider::new(bib.clone()));
                }
                let Some(rider) = state.riders.get_mut(bib) else {
                    continue;
                };
                if rider.in_race {
                    slot += 1;
                    rider.place = Some(rank);
                } else {
                    warn!(target: "race::recalc", %bib, "retired rider in finish places");
                }
            }
        }
    }

    fn assign_contests(&mut self) {
        let state = &mut *self.state;
        let engine = ContestEngine::new(
            &state.riders,
            &state.categories,
            &state.places,
            &state.intermediates,
            &state.tallies,
        );
        engine.assign_all(&state.contests, &mut state.scores);
    }

    /// Orders riders before bunch times are known.
    fn rough_sort(&mut self) {
        let cross = self.state.config.event_type == EventType::Cross;
        self.state.riders.sort_by_cached_key(|rider| {
            let last = rider.last_passing();
            let (laps, finish, last) = if rider.in_race {
                let finish = if cross { last } else { rider.rftime };
                (rider.laps, finish.unwrap_or(Tod::MAX), last.unwrap_or(Tod::MAX))
            } else {
                (0, Tod::MAX, Tod::MAX)
            };
            let (number, text) = rider.bib.sort_key();
            (
                !rider.in_race,
                place_rank(rider),
                std::cmp::Reverse(laps),
                finish,
                last,
                number,
                text.to_owned(),
            )
        });
    }

    /// Forward pass assigning bunch times; returns the first finisher's time.
    fn compute_bunches(&mut self) -> Option<Tod> {
        let state = &mut *self.state;
        let Some(start) = state.clock.start() else {
            return None;
        };
        let cross = state.config.event_type == EventType::Cross;
        let gap = state.config.gap_threshold;

        let mut max_finish = Tod::ZERO;
        let mut race_finish = None;
        let mut first: Option<Tod> = None;
        let mut last_elapsed: Option<Tod> = None;
        let mut last_laps: Option<u32> = None;
        let mut bunch: Option<Tod> = None;

        for rider in state.riders.iter_mut() {
            if !(rider.in_race || rider.comment == Some(DnfCode::Otl)) {
                continue;
            }
            if cross && last_laps != Some(rider.laps) {
                last_elapsed = None;
                bunch = None;
                last_laps = Some(rider.laps);
            }
            if let Some(manual) = rider.mbunch {
                bunch = Some(manual);
                rider.cbunch = bunch;
                first.get_or_insert(manual);
                last_elapsed = Some(manual);
            } else if let Some(rftime) = rider.rftime {
                if rftime > max_finish {
                    max_finish = rftime;
                }
                let elapsed = rftime - start;
                if first.is_none() {
                    race_finish = Some(rftime);
                    let time = elapsed.truncate(0);
                    first = Some(time);
                    bunch = Some(time);
                } else {
                    let same_time = last_elapsed.is_some_and(|last| {
                        elapsed < last || (elapsed - last) < gap
                    });
                    if !same_time {
                        bunch = Some(elapsed.truncate(0));
                    }
                }
                rider.cbunch = bunch;
                last_elapsed = Some(elapsed);
            } else {
                rider.cbunch = if rider.place.is_some() { bunch } else { None };
                if rider.seen().len() > 1
                    && let Some(last) = rider.last_passing()
                    && last > max_finish
                {
                    max_finish = last;
                }
            }
        }

        state.max_finish = Some(max_finish);
        if let Some(finish) = race_finish
            && state.clock.finish() != Some(finish)
        {
            state.clock.set_finish(Some(finish));
            state.emit(RaceEvent::FinishTime(Some(finish)));
        }
        first
    }

    /// Orders riders by bunch time once it is known.
    fn bunch_sort(&mut self) {
        self.state.riders.sort_by_cached_key(|rider| {
            let (laps, bunch) = if rider.in_race {
                (rider.laps, rider.bunch().unwrap_or(Tod::MAX))
            } else {
                (0, Tod::MAX)
            };
            (
                !rider.in_race,
                place_rank(rider),
                std::cmp::Reverse(laps),
                bunch,
            )
        });
    }

    fn compute_status(&mut self, first_time: Option<Tod>) -> RaceStatus {
        let state = &mut *self.state;
        if state.clock.state() == TimerState::Idle {
            return RaceStatus::Prerace;
        }

        let limit = match (first_time, state.config.time_limit.as_deref()) {
            (Some(first), Some(text)) => decode_limit(text, Some(first)),
            _ => None,
        };
        if let (Some(limit), Some(first)) = (limit, first_time) {
            debug!(
                target: "race::recalc",
                limit = %limit.rawtime(0),
                down = %(limit - first).rawtime(0),
                "time limit"
            );
        }

        let total = state.riders.len();
        let mut placed = 0;
        let mut handled = 0;
        let mut winner = None;
        let mut any_passing = false;
        for rider in state.riders.iter_mut() {
            if !rider.in_race {
                handled += 1;
                continue;
            }
            any_passing |= !rider.seen().is_empty();
            let bunch = rider.bunch();
            if winner.is_none() {
                winner = bunch;
            }
            if rider.place.is_some() {
                placed += 1;
                handled += 1;
            } else if let Some(limit) = limit {
                if bunch.is_some_and(|b| b > limit) {
                    rider.comment = Some(DnfCode::Otl);
                    handled += 1;
                } else if rider.comment == Some(DnfCode::Otl) {
                    rider.comment = None;
                }
            }
        }
        if let Some(bunch) = winner {
            state.winner_bunch = Some(bunch);
        }

        if state.clock.state() == TimerState::Finished || handled == total {
            RaceStatus::Final
        } else if placed >= RaceConfig::PROVISIONAL_PLACES
            || (placed > 0 && total < RaceConfig::SMALL_FIELD)
        {
            RaceStatus::Provisional
        } else if any_passing || state.clock.state() == TimerState::ArmStart {
            RaceStatus::Virtual
        } else {
            RaceStatus::Running
        }
    }
}

impl RaceState {
    /// Recomputes places, bunch times, contests and status.
    pub fn recalculate(&mut self) -> RaceStatus {
        let status = ResultCalculator::new(self).run();
        if status != self.status {
            self.emit(RaceEvent::Status(status));
        }
        self.status = status;
        self.dirty = false;
        self.emit(RaceEvent::ResultsUpdated { status });
        status
    }

    /// Effective bunch time for `bib`.
    pub fn bunch_time(&self, bib: &Bib) -> Option<Tod> {
        self.riders.get(bib).and_then(Rider::bunch)
    }

    /// Net elapsed time for `bib`: bunch time less the rider's start offset.
    pub fn elapsed_time(&self, bib: &Bib) -> Option<Tod> {
        let rider = self.riders.get(bib)?;
        let bunch = rider.bunch()?;
        let offset = self.categories.rider_offset(rider).unwrap_or(Tod::ZERO);
        Some(bunch - offset)
    }
}
