//! Riders and their timing columns.
use std::fmt;

use crate::places::PLACEHOLDER;
use crate::tod::Tod;

/// Competitor race number, the primary rider key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Bib(String);

impl Bib {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER
    }

    /// Orders numeric bibs numerically ahead of anything else.
    pub fn sort_key(&self) -> (u64, &str) {
        (self.0.parse().unwrap_or(u64::MAX), &self.0)
    }
}

impl fmt::Display for Bib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Bib {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Did-not-finish family of rider statuses.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DnfCode {
    /// Outside time limit.
    Otl,
    /// Withdrawn; the rider keeps the in-race flag.
    Wd,
    Dnf,
    Dns,
    /// Disqualified.
    Dsq,
}

impl DnfCode {
    /// Result ordering rank; any numeric place sorts ahead of every code.
    pub const fn rank(self) -> u32 {
        match self {
            Self::Otl => 8800,
            Self::Dnf => 9000,
            Self::Wd => 9200,
            Self::Dns => 9500,
            Self::Dsq => 10000,
        }
    }

    /// Codes that take the rider out of lap and finish accounting.
    pub const fn removes_from_race(self) -> bool {
        !matches!(self, Self::Wd)
    }
}

/// Ordering rank for riders with no place and no code.
pub const UNPLACED_RANK: u32 = 8500;

/// One registered competitor.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rider {
    pub bib: Bib,
    pub name: String,
    /// Uppercased category codes, primary first.
    pub categories: Vec<String>,
    pub comment: Option<DnfCode>,
    pub in_race: bool,
    /// Finish rank assigned by the result calculator.
    pub place: Option<u32>,
    pub laps: u32,
    pub seed: u32,
    /// Raw finish-line crossing, full precision.
    pub rftime: Option<Tod>,
    /// Computed bunch time.
    pub cbunch: Option<Tod>,
    /// Operator bunch time; wins over `cbunch`.
    pub mbunch: Option<Tod>,
    /// Personal start offset, overrides the category offset.
    pub start_offset: Option<Tod>,
    pub bonus: Option<Tod>,
    pub penalty: Option<Tod>,
    seen: Vec<Tod>,
}

/// Why a timestamp could not be merged into a rider's passing history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeenConflict {
    /// Within the debounce window after an earlier passing.
    TooSoonAfter(Tod),
    /// Within the debounce window before a later passing.
    TooSoonBefore(Tod),
}

impl Rider {
    pub fn new(bib: Bib) -> Self {
        Self {
            bib,
            name: String::new(),
            categories: Vec::new(),
            comment: None,
            in_race: true,
            place: None,
            laps: 0,
            seed: 0,
            rftime: None,
            cbunch: None,
            mbunch: None,
            start_offset: None,
            bonus: None,
            penalty: None,
            seen: Vec::new(),
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.categories = categories
            .into_iter()
            .map(|c| c.as_ref().trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn primary_category(&self) -> &str {
        self.categories.first().map(String::as_str).unwrap_or("")
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }

    /// Raw passings, ascending.
    pub fn seen(&self) -> &[Tod] {
        &self.seen
    }

    pub fn last_passing(&self) -> Option<Tod> {
        self.seen.last().copied()
    }

    /// Effective bunch time: manual override, else computed.
    pub fn bunch(&self) -> Option<Tod> {
        self.mbunch.or(self.cbunch)
    }

    /// Merges a passing into the ordered history.
    ///
    /// The passing is kept only when it is at least `min_lap` clear of both
    /// neighbours; a conflicting passing is never inserted.
    pub fn insert_passing(&mut self, at: Tod, min_lap: Tod) -> Result<usize, SeenConflict> {
        let idx = self.seen.partition_point(|t| *t <= at);
        if idx > 0 {
            let prev = self.seen[idx - 1];
            if at.units() <= prev.units() + min_lap.units() {
                return Err(SeenConflict::TooSoonAfter(prev));
            }
        }
        if let Some(next) = self.seen.get(idx).copied()
            && next.units() - at.units() <= min_lap.units()
        {
            return Err(SeenConflict::TooSoonBefore(next));
        }
        self.seen.insert(idx, at);
        Ok(idx)
    }

    /// Replaces the passing history, restoring ascending order.
    pub fn set_seen(&mut self, mut seen: Vec<Tod>) {
        seen.sort_unstable();
        seen.dedup();
        self.seen = seen;
    }

    pub fn clear_seen(&mut self) {
        self.seen.clear();
    }

    /// Clears per-run results while keeping registration details.
    pub fn reset_timing(&mut self) {
        self.comment = None;
        self.in_race = true;
        self.place = None;
        self.laps = 0;
        self.rftime = None;
        self.cbunch = None;
        self.mbunch = None;
        self.seen.clear();
    }

    /// Marks the rider out with `code`; withdrawn riders stay in the race.
    pub fn retire(&mut self, code: DnfCode) {
        if code.removes_from_race() {
            self.in_race = false;
        }
        self.comment = Some(code);
    }

    /// Returns the rider to the race, recounting laps from history.
    pub fn reinstate(&mut self) {
        self.in_race = true;
        self.comment = None;
        self.laps = self.seen.len() as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Tod {
        Tod::from_secs_f64(s)
    }

    #[test]
    fn seen_list_stays_ascending_for_any_arrival_order() {
        let mut rider = Rider::new(Bib::new("7"));
        for t in [300.0, 100.0, 250.0, 50.0, 175.0] {
            rider.insert_passing(secs(t), secs(20.0)).unwrap();
        }
        let seen: Vec<_> = rider.seen().iter().map(|t| t.as_seconds()).collect();
        assert_eq!(seen, vec![50, 100, 175, 250, 300]);
    }

    #[test]
    fn debounce_rejects_close_neighbours_without_inserting() {
        let mut rider = Rider::new(Bib::new("7"));
        let min_lap = secs(20.0);
        rider.insert_passing(secs(100.0), min_lap).unwrap();
        assert_eq!(
            rider.insert_passing(secs(100.3), min_lap),
            Err(SeenConflict::TooSoonAfter(secs(100.0)))
        );
        assert_eq!(
            rider.insert_passing(secs(95.0), min_lap),
            Err(SeenConflict::TooSoonBefore(secs(100.0)))
        );
        assert_eq!(rider.insert_passing(secs(125.0), min_lap), Ok(1));
        assert_eq!(rider.seen().len(), 2);
    }

    #[test]
    fn dnf_and_return_keep_rider_visible() {
        let mut rider = Rider::new(Bib::new("3"));
        rider.set_seen(vec![secs(40.0), secs(80.0)]);
        rider.laps = 1;
        rider.retire(DnfCode::Dnf);
        assert!(!rider.in_race);
        assert_eq!(rider.comment.map(|c| c.to_string()).as_deref(), Some("dnf"));

        rider.reinstate();
        assert!(rider.in_race);
        assert_eq!(rider.comment, None);
        assert_eq!(rider.laps, 2);
    }

    #[test]
    fn withdrawn_rider_stays_in_race() {
        let mut rider = Rider::new(Bib::new("3"));
        rider.retire(DnfCode::Wd);
        assert!(rider.in_race);
        assert_eq!(rider.comment, Some(DnfCode::Wd));
    }

    #[test]
    fn numeric_bibs_sort_numerically() {
        let mut bibs = vec![Bib::new("10"), Bib::new("9"), Bib::new("a1")];
        bibs.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        assert_eq!(bibs, vec![Bib::new("9"), Bib::new("10"), Bib::new("a1")]);
    }
}
