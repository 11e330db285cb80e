//! Persisted shape of an event.
//!
//! Only inputs are stored: passings, operator edits and configuration.
//! Places, computed bunch times and contest scores are rebuilt by
//! [`RaceState::recalculate`] after loading.
use tracing::{error, info};

use crate::category::Category;
use crate::config::RaceConfig;
use crate::contest::{Contest, Intermediate, Tally};
use crate::places::PlaceList;
use crate::rider::{Bib, DnfCode, Rider};
use crate::state::RaceState;
use crate::tod::Tod;

/// Identifier written into every record. A record carrying another id
/// is loaded read-only.
pub const RECORD_ID: &str = "race-record-1";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RiderRecord {
    pub bib: Bib,
    pub name: String,
    pub categories: Vec<String>,
    pub comment: Option<DnfCode>,
    pub in_race: bool,
    pub laps: u32,
    pub seed: u32,
    pub rftime: Option<Tod>,
    pub mbunch: Option<Tod>,
    pub start_offset: Option<Tod>,
    pub bonus: Option<Tod>,
    pub penalty: Option<Tod>,
    /// Raw passings, ascending.
    pub seen: Vec<Tod>,
}

impl From<&Rider> for RiderRecord {
    fn from(rider: &Rider) -> Self {
        Self {
            bib: rider.bib.clone(),
            name: rider.name.clone(),
            categories: rider.categories.clone(),
            comment: rider.comment,
            in_race: rider.in_race,
            laps: rider.laps,
            seed: rider.seed,
            rftime: rider.rftime,
            mbunch: rider.mbunch,
            start_offset: rider.start_offset,
            bonus: rider.bonus,
            penalty: rider.penalty,
            seen: rider.seen().to_vec(),
        }
    }
}

impl From<RiderRecord> for Rider {
    fn from(record: RiderRecord) -> Self {
        let mut rider = Rider::new(record.bib).with_categories(&record.categories);
        rider.name = record.name;
        rider.comment = record.comment;
        rider.in_race = record.in_race;
        rider.laps = record.laps;
        rider.seed = record.seed;
        rider.rftime = record.rftime;
        rider.mbunch = record.mbunch;
        rider.start_offset = record.start_offset;
        rider.bonus = record.bonus;
        rider.penalty = record.penalty;
        rider.set_seen(record.seen);
        rider
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EventRecord {
    pub id: String,
    pub config: RaceConfig,
    pub start: Option<Tod>,
    pub finish: Option<Tod>,
    pub lap_start: Option<Tod>,
    pub lap_finish: Option<Tod>,
    pub cur_lap: i32,
    pub on_lap: Option<u32>,
    pub lap_times: Vec<Tod>,
    pub places: PlaceList,
    pub categories: Vec<Category>,
    pub intermediates: Vec<Intermediate>,
    pub contests: Vec<Contest>,
    pub tallies: Vec<Tally>,
    pub comments: Vec<String>,
    pub riders: Vec<RiderRecord>,
}

impl Default for EventRecord {
    fn default() -> Self {
        Self {
            id: RECORD_ID.to_owned(),
            config: RaceConfig::default(),
            start: None,
            finish: None,
            lap_start: None,
            lap_finish: None,
            cur_lap: -1,
            on_lap: Some(1),
            lap_times: Vec::new(),
            places: PlaceList::new(),
            categories: Vec::new(),
            intermediates: Vec::new(),
            contests: Vec::new(),
            tallies: Vec::new(),
            comments: Vec::new(),
            riders: Vec::new(),
        }
    }
}

impl EventRecord {
    pub fn is_current(&self) -> bool {
        self.id == RECORD_ID
    }
}

impl RaceState {
    /// Snapshot of everything needed to rebuild this event.
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            id: RECORD_ID.to_owned(),
            config: self.config.clone(),
            start: self.clock.start(),
            finish: self.clock.finish(),
            lap_start: self.clock.lap_start(),
            lap_finish: self.clock.lap_finish(),
            cur_lap: self.clock.cur_lap(),
            on_lap: self.clock.on_lap(),
            lap_times: self.clock.lap_times().to_vec(),
            places: self.places.clone(),
            categories: self.categories.categories().to_vec(),
            intermediates: self.intermediates.clone(),
            contests: self.contests.clone(),
            tallies: self.tallies.clone(),
            comments: self.comments.clone(),
            riders: self.riders.iter().map(RiderRecord::from).collect(),
        }
    }

    /// Rebuilds an event from a record and recalculates it.
    ///
    /// Definitions go through the same checks as live configuration, so a
    /// record with duplicate codes loads with the duplicates dropped.
    pub fn from_record(record: EventRecord) -> Self {
        let read_only = !record.is_current();
        if read_only {
            error!(
                target: "race::record",
                expected = RECORD_ID,
                found = %record.id,
                "record id mismatch, event is read only"
            );
        }

        let mut state = RaceState::new(record.config);
        for category in record.categories {
            state.add_category(category);
        }
        for tally in record.tallies {
            state.add_tally(tally);
        }
        for intermediate in record.intermediates {
            state.add_intermediate(intermediate);
        }
        for contest in record.contests {
            state.add_contest(contest);
        }
        for rider in record.riders {
            let rider = Rider::from(rider);
            let bib = rider.bib.clone();
            if !state.riders.add(rider) {
                error!(target: "race::record", %bib, "duplicate rider in record dropped");
            }
        }
        state.places = record.places;
        state.comments = record.comments;
        state.clock.restore(
            record.start,
            record.finish,
            record.lap_start,
            record.lap_finish,
            record.cur_lap,
            record.on_lap,
            record.lap_times,
        );
        state.categories.reset_onlap();
        for rider in state.riders.iter() {
            let category = state.categories.result_category(rider.primary_category());
            state.categories.record_lap(&category, rider.laps);
        }

        state.recalculate();
        state.events.clear();
        state.read_only = read_only;
        info!(
            target: "race::record",
            riders = state.riders.len(),
            status = %state.status,
            "event loaded"
        );
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passing::{DirectoryEntry, Passing};

    fn directory() -> Vec<DirectoryEntry> {
        ["1", "2"]
            .iter()
            .map(|bib| {
                let mut entry = DirectoryEntry::new(*bib, "");
                entry.refid = format!("t{bib}");
                entry.categories = vec!["A".into()];
                entry
            })
            .collect()
    }

    fn raced() -> RaceState {
        let directory = directory();
        let mut state = RaceState::default();
        state.add_category(Category::new("A"));
        state.add_intermediate(Intermediate::new("s1"));
        state.add_riders(&directory, &[Bib::new("1"), Bib::new("2")]).unwrap();
        state.set_start(Some(Tod::ZERO));
        state.submit_passing(&directory, &Passing::new("t1", Tod::from_units(600_123)));
        state.submit_passing(&directory, &Passing::new("t2", Tod::from_units(600_456)));
        state.set_intermediate_places("s1", "2 1").unwrap();
        state.edit_bunch(&Bib::new("2"), "1:00").unwrap();
        state.recalculate();
        state
    }

    #[test]
    fn record_restores_inputs_and_results() {
        let state = raced();
        let record = state.to_record();
        let loaded = RaceState::from_record(record.clone());
        assert!(!loaded.is_read_only());
        assert_eq!(loaded.to_record(), record);
        for bib in ["1", "2"] {
            let bib = Bib::new(bib);
            let (a, b) = (state.rider(&bib).unwrap(), loaded.rider(&bib).unwrap());
            assert_eq!(a.seen(), b.seen());
            assert_eq!(a.mbunch, b.mbunch);
            assert_eq!(state.bunch_time(&bib), loaded.bunch_time(&bib));
        }
        assert_eq!(loaded.status(), state.status());
    }

    #[test]
    fn foreign_record_loads_read_only() {
        let mut record = raced().to_record();
        record.id = "other".into();
        let mut loaded = RaceState::from_record(record);
        assert!(loaded.is_read_only());
        assert_eq!(
            loaded.set_places("1").unwrap_err(),
            crate::error::CommandError::ReadOnly
        );
    }
}
