//! Read-only result tables built from the last recalculation.
use std::cmp::Reverse;

use crate::contest::Countback;
use crate::results::RaceStatus;
use crate::rider::{Bib, DnfCode, Rider};
use crate::state::RaceState;
use crate::tod::Tod;

/// One line of the result.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StandingRow {
    pub rank: Option<u32>,
    pub code: Option<DnfCode>,
    pub bib: Bib,
    pub name: String,
    pub categories: Vec<String>,
    pub laps: u32,
    pub bunch: Option<Tod>,
    /// Bunch time behind the winner.
    pub down: Option<Tod>,
    /// Stage bonus plus contest bonuses.
    pub bonus: Option<Tod>,
    pub penalty: Option<Tod>,
}

impl StandingRow {
    /// Rank as printed: `3.` for a place, the status code otherwise.
    pub fn rank_text(&self) -> String {
        match (self.rank, self.code) {
            (Some(rank), _) => format!("{rank}."),
            (None, Some(code)) => code.to_string(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TallyRow {
    pub rank: u32,
    pub bib: Bib,
    pub name: String,
    pub points: i64,
    pub countback: Countback,
}

/// Points table for one tally, best first.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TallyTable {
    pub code: String,
    pub description: String,
    pub rows: Vec<TallyRow>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Standings {
    pub status: RaceStatus,
    pub rows: Vec<StandingRow>,
    pub tallies: Vec<TallyTable>,
}

impl RaceState {
    fn standing_row(&self, rider: &Rider) -> StandingRow {
        let bunch = rider.bunch();
        let down = match (bunch, self.winner_bunch) {
            (Some(bunch), Some(winner)) if bunch > winner => Some(bunch - winner),
            _ => None,
        };
        let bonus = match (rider.bonus, self.scores.bonus(&rider.bib)) {
            (Some(stage), Some(contest)) => Some(stage + contest),
            (stage, contest) => stage.or(contest),
        };
        StandingRow {
            rank: rider.place.filter(|_| rider.in_race),
            code: rider.comment,
            bib: rider.bib.clone(),
            name: rider.name.clone(),
            categories: rider.categories.clone(),
            laps: rider.laps,
            bunch,
            down,
            bonus,
            penalty: rider.penalty,
        }
    }

    /// Result rows in current order with every tally table.
    pub fn standings(&self) -> Standings {
        Standings {
            status: self.status,
            rows: self.riders.iter().map(|r| self.standing_row(r)).collect(),
            tallies: self
                .tallies
                .iter()
                .map(|t| self.tally_table(&t.code))
                .collect(),
        }
    }

    /// Rows for one category, ranked within it.
    ///
    /// A virtual standing for a category that has not started yet is empty.
    pub fn category_standings(&self, code: &str, now: Tod) -> Vec<StandingRow> {
        let category = self.categories.result_category(code);
        if self.status == RaceStatus::Virtual && !self.category_started(&category, now) {
            return Vec::new();
        }
        let mut rank = 0;
        let mut last_place = None;
        let mut shared = 0;
        self.riders
            .iter()
            .filter(|r| self.categories.result_category(r.primary_category()) == category)
            .map(|rider| {
                let mut row = self.standing_row(rider);
                if row.rank.is_some() {
                    // dead heats keep a shared rank within the category
                    if row.rank == last_place {
                        shared += 1;
                    } else {
                        rank += shared + 1;
                        shared = 0;
                    }
                    last_place = row.rank;
                    row.rank = Some(rank);
                }
                row
            })
            .collect()
    }

    /// Points table for `code`, sorted by points then countback.
    pub fn tally_table(&self, code: &str) -> TallyTable {
        let tally = self.tallies.iter().find(|t| t.code == code);
        let keep_dnf = tally.is_some_and(|t| t.keep_dnf);
        let mut entries: Vec<_> = self
            .scores
            .tally(code)
            .into_iter()
            .flatten()
            .filter_map(|(bib, entry)| {
                let rider = self.riders.get(bib)?;
                (rider.in_race || keep_dnf).then_some((rider, entry))
            })
            .collect();
        entries.sort_by_key(|(rider, entry)| {
            let (number, text) = rider.bib.sort_key();
            (
                Reverse(entry.points),
                Reverse(entry.countback.clone()),
                number,
                text.to_owned(),
            )
        });

        let mut rows: Vec<TallyRow> = Vec::with_capacity(entries.len());
        for (idx, (rider, entry)) in entries.into_iter().enumerate() {
            let rank = match rows.last() {
                Some(prev) if prev.points == entry.points && prev.countback == entry.countback => {
                    prev.rank
                }
                _ => idx as u32 + 1,
            };
            rows.push(TallyRow {
                rank,
                bib: rider.bib.clone(),
                name: rider.name.clone(),
                points: entry.points,
                countback: entry.countback.clone(),
            });
        }
        TallyTable {
            code: code.to_owned(),
            description: tally.map(|t| t.description.clone()).unwrap_or_default(),
            rows,
        }
    }
}
