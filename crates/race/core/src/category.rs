//! Per-category start offsets, target laps and lap progress.
use std::collections::HashMap;

use tracing::debug;

use crate::rider::Rider;
use crate::tod::Tod;

/// Category codes that name rider directory classes, never result categories.
pub const RESERVED_CATEGORIES: [&str; 3] = ["CAT", "SPARE", "TEAM"];

/// Category used to mark spare bikes in the rider directory.
pub const SPARE_CATEGORY: &str = "SPARE";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Category {
    pub code: String,
    pub start_offset: Option<Tod>,
    pub target_laps: Option<u32>,
}

impl Category {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self {
            code: code.as_ref().trim().to_uppercase(),
            start_offset: None,
            target_laps: None,
        }
    }

    pub fn with_start_offset(mut self, offset: Option<Tod>) -> Self {
        self.start_offset = offset;
        self
    }

    pub fn with_target_laps(mut self, laps: Option<u32>) -> Self {
        self.target_laps = laps.filter(|l| *l > 0);
        self
    }
}

/// Lap progress notification for one category.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategoryLap {
    pub category: String,
    /// Lap the leaders are on.
    pub onlap: u32,
    pub target: u32,
    pub to_go: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryStartModel {
    categories: Vec<Category>,
    onlap: HashMap<String, u32>,
}

impl CategoryStartModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category; reserved and duplicate codes are refused.
    pub fn add(&mut self, category: Category) -> bool {
        if category.code.is_empty()
            || RESERVED_CATEGORIES.contains(&category.code.as_str())
            || self.get(&category.code).is_some()
        {
            return false;
        }
        self.categories.push(category);
        true
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.code.as_str())
    }

    pub fn get(&self, code: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
    }

    /// Result category for a rider category, empty when not configured.
    pub fn result_category(&self, rider_category: &str) -> String {
        self.get(rider_category)
            .map(|c| c.code.clone())
            .unwrap_or_default()
    }

    pub fn start_offset(&self, code: &str) -> Option<Tod> {
        self.get(code).and_then(|c| c.start_offset)
    }

    /// Personal offset if set, otherwise the primary category's offset.
    pub fn rider_offset(&self, rider: &Rider) -> Option<Tod> {
        rider
            .start_offset
            .or_else(|| self.start_offset(rider.primary_category()))
    }

    pub fn target_laps(&self, code: &str) -> Option<u32> {
        self.get(code).and_then(|c| c.target_laps)
    }

    pub fn has_targets(&self) -> bool {
        self.categories.iter().any(|c| c.target_laps.is_some())
    }

    /// Whether wall-clock `now` has passed the category's scheduled start.
    pub fn started(&self, code: &str, start: Option<Tod>, now: Tod) -> bool {
        let Some(start) = start else {
            return false;
        };
        let scheduled = start + self.start_offset(code).unwrap_or(Tod::ZERO);
        let started = scheduled < now;
        if !started {
            debug!(
                target: "race::category",
                category = code,
                now = %now.rawtime(1),
                scheduled = %scheduled.rawtime(1),
                "category not yet started"
            );
        }
        started
    }

    pub fn onlap(&self, code: &str) -> u32 {
        self.onlap.get(code).copied().unwrap_or(0)
    }

    /// Zeroes the leader lap trackers; true when any category has a target.
    pub fn reset_onlap(&mut self) -> bool {
        self.onlap.clear();
        for category in &self.categories {
            self.onlap.insert(category.code.clone(), 0);
        }
        self.has_targets()
    }

    /// Records a rider completing `laps` in `code`; true when the leader lap advanced.
    pub fn record_lap(&mut self, code: &str, laps: u32) -> bool {
        if code.is_empty() {
            return false;
        }
        let entry = self.onlap.entry(code.to_owned()).or_insert(0);
        if laps > *entry {
            *entry = laps;
            true
        } else {
            false
        }
    }

    /// Lap progress for one category while it still has laps to go.
    pub fn lap_progress(
        &self,
        code: &str,
        start: Option<Tod>,
        now: Tod,
        total_laps: Option<u32>,
    ) -> Option<CategoryLap> {
        let count = *self.onlap.get(code)?;
        let target = self.target_laps(code).or(total_laps)?;
        if count >= target {
            return None;
        }
        let onlap = if self.started(code, start, now) {
            count + 1
        } else {
            count
        };
        Some(CategoryLap {
            category: code.to_owned(),
            onlap,
            target,
            to_go: i64::from(target) - i64::from(onlap),
        })
    }

    /// Progress for every configured category with laps to go.
    pub fn all_progress(
        &self,
        start: Option<Tod>,
        now: Tod,
        total_laps: Option<u32>,
    ) -> Vec<CategoryLap> {
        self.codes()
            .filter_map(|code| self.lap_progress(code, start, now, total_laps))
            .collect()
    }

    /// Category named by a `<cat>fin` contest source.
    pub fn finish_source(&self, source: &str) -> Option<&str> {
        let prefix = source.strip_suffix("fin")?;
        self.get(prefix).map(|c| c.code.as_str())
    }

    /// Sources reserved by categories, lowercase.
    pub fn reserved_sources(&self) -> Vec<String> {
        self.codes()
            .map(|code| format!("{}fin", code.to_lowercase()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rider::Bib;

    fn model() -> CategoryStartModel {
        let mut model = CategoryStartModel::new();
        assert!(model.add(Category::new("a").with_target_laps(Some(5))));
        assert!(model.add(
            Category::new("B")
                .with_start_offset(Some(Tod::from_seconds(120)))
                .with_target_laps(Some(3))
        ));
        model
    }

    #[test]
    fn reserved_and_duplicate_codes_are_refused() {
        let mut model = model();
        assert!(!model.add(Category::new("spare")));
        assert!(!model.add(Category::new("A")));
        assert_eq!(model.codes().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn personal_offset_overrides_category() {
        let model = model();
        let mut rider = Rider::new(Bib::new("1")).with_categories(["b"]);
        assert_eq!(model.rider_offset(&rider), Some(Tod::from_seconds(120)));
        rider.start_offset = Some(Tod::from_seconds(30));
        assert_eq!(model.rider_offset(&rider), Some(Tod::from_seconds(30)));
        let unlisted = Rider::new(Bib::new("2")).with_categories(["Z"]);
        assert_eq!(model.rider_offset(&unlisted), None);
        assert_eq!(model.result_category("z"), "");
    }

    #[test]
    fn started_compares_scheduled_start_with_now() {
        let model = model();
        let start = Some(Tod::from_seconds(1000));
        assert!(model.started("A", start, Tod::from_seconds(1001)));
        assert!(!model.started("B", start, Tod::from_seconds(1100)));
        assert!(model.started("B", start, Tod::from_seconds(1121)));
        assert!(!model.started("A", None, Tod::from_seconds(5000)));
    }

    #[test]
    fn lap_progress_counts_down_to_target() {
        let mut model = model();
        assert!(model.reset_onlap());
        assert!(model.record_lap("A", 2));
        assert!(!model.record_lap("A", 1));
        let start = Some(Tod::ZERO);
        let progress = model
            .lap_progress("A", start, Tod::from_seconds(60), None)
            .unwrap();
        assert_eq!((progress.onlap, progress.target, progress.to_go), (3, 5, 2));
        model.record_lap("A", 5);
        assert!(model.lap_progress("A", start, Tod::from_seconds(60), None).is_none());
    }

    #[test]
    fn category_finish_sources_resolve() {
        let model = model();
        assert_eq!(model.finish_source("afin"), Some("A"));
        assert_eq!(model.finish_source("cfin"), None);
        assert_eq!(model.reserved_sources(), vec!["afin", "bfin"]);
    }
}
