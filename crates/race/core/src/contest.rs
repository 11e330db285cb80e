//! Intermediates, contests, tallies and the points/bonus engine.
//!
//! A contest draws a place list from its source and awards points to a tally
//! and time bonuses to riders. Positional awards follow the flattened rider
//! slot, so dead-heated riders each receive the value for their own slot.
use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::category::CategoryStartModel;
use crate::places::PlaceList;
use crate::registry::RiderRegistry;
use crate::rider::Bib;
use crate::tod::Tod;

/// Contest sources reserved by the engine.
pub const RESERVED_SOURCES: [&str; 3] = ["fin", "reg", "start"];

/// Mid-race checkpoint with its own place list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Intermediate {
    pub code: String,
    pub description: String,
    pub abbreviation: String,
    pub places: PlaceList,
    pub visible: bool,
}

impl Intermediate {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self {
            code: code.as_ref().trim().to_lowercase(),
            visible: true,
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Named points accumulator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Tally {
    pub code: String,
    pub description: String,
    /// Riders out of the race still appear in this tally.
    pub keep_dnf: bool,
}

impl Tally {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self {
            code: code.as_ref().trim().to_lowercase(),
            ..Self::default()
        }
    }

    /// Sprint and criterium tallies only count finish-line winners.
    fn counts_finish_winner(&self) -> bool {
        matches!(self.code.as_str(), "sprint" | "crit")
    }

    fn is_climb(&self) -> bool {
        self.code == "climb"
    }
}

/// Points and bonus competition over one source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Contest {
    pub code: String,
    pub description: String,
    /// Reserved source keyword, `<cat>fin`, or an intermediate code.
    pub source: String,
    pub tally: String,
    pub bonuses: Vec<Tod>,
    pub points: Vec<i64>,
    /// Every rider in the source receives the first bonus/points value.
    pub all_source: bool,
    /// Countback slot for climb categories.
    pub category: u32,
}

impl Contest {
    pub fn new(code: impl AsRef<str>, source: impl AsRef<str>) -> Self {
        Self {
            code: code.as_ref().trim().to_lowercase(),
            source: source.as_ref().trim().to_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_tally(mut self, tally: impl AsRef<str>) -> Self {
        self.tally = tally.as_ref().trim().to_lowercase();
        self
    }

    pub fn with_points(mut self, points: Vec<i64>) -> Self {
        self.points = points;
        self
    }

    pub fn with_bonuses(mut self, bonuses: Vec<Tod>) -> Self {
        self.bonuses = bonuses;
        self
    }

    pub fn with_all_source(mut self, all_source: bool) -> Self {
        self.all_source = all_source;
        self
    }

    /// Flat award for all-source contests.
    fn flat_award(&self) -> (i64, Option<Tod>) {
        (
            self.points.first().copied().unwrap_or(0),
            self.bonuses.first().copied().filter(|b| *b != Tod::ZERO),
        )
    }

    /// Logs configuration quirks; returns `false` when nothing is wrong.
    pub fn check(&self) -> bool {
        let mut quirk = false;
        if self.all_source && (self.points.len() > 1 || self.bonuses.len() > 1) {
            warn!(
                target: "race::contest",
                contest = %self.code,
                "all-source contest uses only the first points and bonus value"
            );
            quirk = true;
        }
        if !self.points.is_empty() && self.tally.is_empty() {
            warn!(target: "race::contest", contest = %self.code, "points configured without a tally");
            quirk = true;
        }
        quirk
    }
}

/// Where a contest takes its place list from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContestSource {
    Finish,
    Registered,
    Starters,
    CategoryFinish(String),
    Intermediate(String),
}

/// Rank achievement counts, compared slot by slot with more being better.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Countback(Vec<u32>);

impl Countback {
    pub fn increment(&mut self, slot: usize) {
        if self.0.len() <= slot {
            self.0.resize(slot + 1, 0);
        }
        self.0[slot] += 1;
    }

    pub fn get(&self, slot: usize) -> u32 {
        self.0.get(slot).copied().unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl Ord for Countback {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|slot| self.get(slot).cmp(&other.get(slot)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Countback {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Points and countback for one rider in one tally.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TallyEntry {
    pub points: i64,
    pub countback: Countback,
}

/// Accumulated points per tally and time bonuses per rider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContestScores {
    tallies: HashMap<String, HashMap<Bib, TallyEntry>>,
    bonuses: HashMap<Bib, Tod>,
}

impl ContestScores {
    /// Empty accumulators for the given tallies.
    pub fn for_tallies<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            tallies: codes
                .into_iter()
                .map(|code| (code.to_owned(), HashMap::new()))
                .collect(),
            bonuses: HashMap::new(),
        }
    }

    pub fn points(&self, tally: &str, bib: &Bib) -> i64 {
        self.entry(tally, bib).map(|e| e.points).unwrap_or(0)
    }

    pub fn entry(&self, tally: &str, bib: &Bib) -> Option<&TallyEntry> {
        self.tallies.get(tally)?.get(bib)
    }

    pub fn tally(&self, tally: &str) -> Option<&HashMap<Bib, TallyEntry>> {
        self.tallies.get(tally)
    }

    pub fn bonus(&self, bib: &Bib) -> Option<Tod> {
        self.bonuses.get(bib).copied()
    }

    fn add_bonus(&mut self, bib: &Bib, bonus: Tod) {
        let total = self.bonuses.entry(bib.clone()).or_insert(Tod::ZERO);
        *total = *total + bonus;
    }

    fn tally_entry(&mut self, tally: &str, bib: &Bib) -> Option<&mut TallyEntry> {
        Some(self.tallies.get_mut(tally)?.entry(bib.clone()).or_default())
    }
}

/// Resolves contest sources and applies awards.
pub struct ContestEngine<'a> {
    riders: &'a RiderRegistry,
    categories: &'a CategoryStartModel,
    finish: &'a PlaceList,
    intermediates: &'a [Intermediate],
    tallies: &'a [Tally],
}

impl<'a> ContestEngine<'a> {
    pub fn new(
        riders: &'a RiderRegistry,
        categories: &'a CategoryStartModel,
        finish: &'a PlaceList,
        intermediates: &'a [Intermediate],
        tallies: &'a [Tally],
    ) -> Self {
        Self {
            riders,
            categories,
            finish,
            intermediates,
            tallies,
        }
    }

    pub fn source(&self, source: &str) -> Option<ContestSource> {
        match source {
            "fin" => Some(ContestSource::Finish),
            "reg" => Some(ContestSource::Registered),
            "start" => Some(ContestSource::Starters),
            other => {
                if let Some(code) = self.categories.finish_source(other) {
                    Some(ContestSource::CategoryFinish(code.to_owned()))
                } else if self.intermediates.iter().any(|i| i.code == other) {
                    Some(ContestSource::Intermediate(other.to_owned()))
                } else {
                    None
                }
            }
        }
    }

    /// Place list for a source, category subsets keeping dead-heat groups.
    pub fn places(&self, source: &ContestSource) -> PlaceList {
        match source {
            ContestSource::Finish => self.finish.clone(),
            ContestSource::Registered => PlaceList::from(self.riders.startlist()),
            ContestSource::Starters => PlaceList::from(self.riders.starters()),
            ContestSource::CategoryFinish(code) => self.finish.filtered(|bib| {
                self.riders
                    .get(bib)
                    .is_some_and(|r| self.categories.result_category(r.primary_category()) == *code)
            }),
            ContestSource::Intermediate(code) => self
                .intermediates
                .iter()
                .find(|i| &i.code == code)
                .map(|i| i.places.clone())
                .unwrap_or_default(),
        }
    }

    /// Applies every contest in order.
    pub fn assign_all(&self, contests: &[Contest], scores: &mut ContestScores) {
        for contest in contests {
            self.assign(contest, scores);
        }
    }

    /// Walks the contest's source and accumulates its awards.
    pub fn assign(&self, contest: &Contest, scores: &mut ContestScores) {
        let Some(source) = self.source(&contest.source) else {
            info!(
                target: "race::contest",
                contest = %contest.code,
                source = %contest.source,
                "invalid contest source"
            );
            return;
        };
        let tally = self.tallies.iter().find(|t| t.code == contest.tally);
        let winner_only = match &source {
            ContestSource::Finish => tally.is_some_and(Tally::counts_finish_winner),
            ContestSource::CategoryFinish(_) => true,
            _ => false,
        };
        let climb = tally.is_some_and(Tally::is_climb);
        let (flat_points, flat_bonus) = contest.flat_award();

        let places = self.places(&source);
        let mut listed: Vec<&Bib> = Vec::new();
        let mut slot = 0usize;
        for group in places.groups() {
            let rank = slot + 1;
            for bib in group {
                if bib.is_placeholder() {
                    slot += 1;
                    continue;
                }
                if listed.contains(&bib) {
                    warn!(target: "race::contest", contest = %contest.code, %bib, "duplicate rider in places");
                    continue;
                }
                listed.push(bib);
                if !self.riders.contains(bib) {
                    error!(target: "race::contest", contest = %contest.code, %bib, "invalid rider ignored in places");
                    continue;
                }
                slot += 1;

                if contest.all_source {
                    if let Some(bonus) = flat_bonus {
                        scores.add_bonus(bib, bonus);
                    }
                    if flat_points != 0
                        && let Some(entry) = scores.tally_entry(&contest.tally, bib)
                    {
                        entry.points += flat_points;
                    }
                    continue;
                }

                if let Some(bonus) = contest.bonuses.get(slot - 1) {
                    scores.add_bonus(bib, *bonus);
                }
                if let Some(entry) = scores.tally_entry(&contest.tally, bib) {
                    if let Some(points) = contest.points.get(slot - 1) {
                        entry.points += points;
                    }
                    if winner_only {
                        if rank == 1 {
                            entry.countback.increment(0);
                        }
                    } else if climb {
                        if rank == 1 {
                            entry.countback.increment(contest.category as usize);
                        }
                    } else {
                        entry.countback.increment(rank);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::rider::{DnfCode, Rider};

    fn riders(bibs: &[(&str, &str)]) -> RiderRegistry {
        let mut reg = RiderRegistry::new();
        for (bib, cat) in bibs {
            reg.add(Rider::new(Bib::new(*bib)).with_categories([*cat]));
        }
        reg
    }

    fn bib(text: &str) -> Bib {
        Bib::new(text)
    }

    #[test]
    fn dead_heat_members_get_their_flattened_slot() {
        let reg = riders(&[("1", "A"), ("2", "A"), ("3", "A"), ("4", "A")]);
        let cats = CategoryStartModel::new();
        let finish = PlaceList::parse("1 2 3-4");
        let tallies = [Tally::new("points")];
        let engine = ContestEngine::new(&reg, &cats, &finish, &[], &tallies);
        let contest = Contest::new("finish", "fin")
            .with_tally("points")
            .with_points(vec![5, 3, 2, 1]);
        let mut scores = ContestScores::for_tallies(["points"]);
        engine.assign(&contest, &mut scores);

        let awarded: Vec<_> = ["1", "2", "3", "4"]
            .iter()
            .map(|b| scores.points("points", &bib(b)))
            .collect();
        assert_eq!(awarded, vec![5, 3, 2, 1]);
        // countback follows the shared rank
        let third = scores.entry("points", &bib("3")).unwrap();
        let fourth = scores.entry("points", &bib("4")).unwrap();
        assert_eq!(third.countback.get(3), 1);
        assert_eq!(fourth.countback.get(3), 1);
    }

    #[test]
    fn placeholders_hold_their_award_slot() {
        let reg = riders(&[("1", "A"), ("4", "A")]);
        let cats = CategoryStartModel::new();
        let finish = PlaceList::parse("1 x x 4");
        let tallies = [Tally::new("points")];
        let engine = ContestEngine::new(&reg, &cats, &finish, &[], &tallies);
        let contest = Contest::new("finish", "fin")
            .with_tally("points")
            .with_points(vec![5, 3, 2, 1]);
        let mut scores = ContestScores::for_tallies(["points"]);
        engine.assign(&contest, &mut scores);

        assert_eq!(scores.points("points", &bib("1")), 5);
        assert_eq!(scores.points("points", &bib("4")), 1);
    }

    #[test]
    fn all_source_contest_uses_first_value_only() {
        let reg = riders(&[("1", ""), ("2", ""), ("3", "")]);
        let cats = CategoryStartModel::new();
        let finish = PlaceList::new();
        let tallies = [Tally::new("combative")];
        let engine = ContestEngine::new(&reg, &cats, &finish, &[], &tallies);
        let contest = Contest::new("reg", "reg")
            .with_tally("combative")
            .with_points(vec![2, 9])
            .with_bonuses(vec![Tod::from_seconds(3), Tod::from_seconds(9)])
            .with_all_source(true);
        assert!(contest.check());
        let mut scores = ContestScores::for_tallies(["combative"]);
        engine.assign(&contest, &mut scores);
        for b in ["1", "2", "3"] {
            assert_eq!(scores.points("combative", &bib(b)), 2);
            assert_eq!(scores.bonus(&bib(b)), Some(Tod::from_seconds(3)));
            assert!(scores.entry("combative", &bib(b)).unwrap().countback.as_slice().is_empty());
        }
    }

    #[test]
    fn starters_source_skips_dns() {
        let mut reg = riders(&[("1", ""), ("2", "")]);
        if let Some(r) = reg.get_mut(&bib("2")) {
            r.retire(DnfCode::Dns);
        }
        let cats = CategoryStartModel::new();
        let finish = PlaceList::new();
        let engine = ContestEngine::new(&reg, &cats, &finish, &[], &[]);
        let places = engine.places(&ContestSource::Starters);
        assert_eq!(places.to_string(), "1");
    }

    #[test]
    fn category_finish_counts_winner_only() {
        let reg = riders(&[("1", "A"), ("2", "B"), ("3", "A"), ("4", "B")]);
        let mut cats = CategoryStartModel::new();
        cats.add(Category::new("A"));
        cats.add(Category::new("B"));
        let finish = PlaceList::parse("1 2 3 4");
        let tallies = [Tally::new("bcat")];
        let engine = ContestEngine::new(&reg, &cats, &finish, &[], &tallies);
        let contest = Contest::new("bfinish", "bfin")
            .with_tally("bcat")
            .with_points(vec![10, 6]);
        let mut scores = ContestScores::for_tallies(["bcat"]);
        engine.assign(&contest, &mut scores);
        assert_eq!(scores.points("bcat", &bib("2")), 10);
        assert_eq!(scores.points("bcat", &bib("4")), 6);
        assert_eq!(scores.points("bcat", &bib("1")), 0);
        assert_eq!(scores.entry("bcat", &bib("2")).unwrap().countback.get(0), 1);
        assert_eq!(scores.entry("bcat", &bib("4")).unwrap().countback.get(0), 0);
    }

    #[test]
    fn climb_countback_records_category_wins() {
        let reg = riders(&[("1", ""), ("2", "")]);
        let cats = CategoryStartModel::new();
        let finish = PlaceList::new();
        let mut kom = Intermediate::new("kom1");
        kom.places = PlaceList::parse("2 1");
        let inters = [kom];
        let tallies = [Tally::new("climb")];
        let engine = ContestEngine::new(&reg, &cats, &finish, &inters, &tallies);
        let mut contest = Contest::new("kom1", "kom1")
            .with_tally("climb")
            .with_points(vec![8, 5]);
        contest.category = 2;
        let mut scores = ContestScores::for_tallies(["climb"]);
        engine.assign(&contest, &mut scores);
        assert_eq!(scores.entry("climb", &bib("2")).unwrap().countback.get(2), 1);
        assert!(scores.entry("climb", &bib("1")).unwrap().countback.as_slice().is_empty());
    }

    #[test]
    fn countback_compares_best_ranks_first() {
        let mut a = Countback::default();
        a.increment(1);
        let mut b = Countback::default();
        b.increment(2);
        b.increment(2);
        assert!(a > b);
        assert_eq!(Countback::default().cmp(&Countback(vec![0, 0])), Ordering::Equal);
    }
}
