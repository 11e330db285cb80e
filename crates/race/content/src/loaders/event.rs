//! Event setup loader.
//!
//! TOML layout:
//!
//! ```toml
//! startlist = "1 2 3 4"
//!
//! [event]
//! type = "criterium"
//! min_lap = "20.0"
//! gap_threshold = 1.12
//! total_laps = 12
//! time_limit = "+10:00"
//!
//! [[category]]
//! code = "B"
//! start_offset = "2:00"
//!
//! [[intermediate]]
//! code = "s1"
//! description = "Sprint lap 5"
//!
//! [[tally]]
//! code = "sprint"
//!
//! [[contest]]
//! code = "s1"
//! source = "s1"
//! tally = "sprint"
//! points = "5 3 2 1"
//! bonuses = "3 2 1"
//! ```

use std::path::Path;

use race_core::{
    Bib, Category, Contest, EventType, Intermediate, PlaceList, RESERVED_SOURCES, RaceConfig,
    RaceState, RiderDirectory, Tally, Tod,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::issues::{ConfigIssue, LoadReport};
use crate::loaders::{LoadResult, read_file};

/// A time written either as text (`"1:30"`, `"+10:00"`) or as seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Seconds(f64),
    Text(String),
}

impl TimeValue {
    fn text(&self) -> String {
        match self {
            Self::Seconds(seconds) => seconds.to_string(),
            Self::Text(text) => text.clone(),
        }
    }

    fn resolve(&self, field: &str, report: &mut LoadReport) -> Option<Tod> {
        let text = self.text();
        match Tod::parse_opt(&text) {
            Ok(tod) => tod,
            Err(_) => {
                report.push(ConfigIssue::InvalidTime {
                    field: field.to_owned(),
                    value: text,
                });
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSpec {
    #[serde(rename = "type")]
    pub event_type: String,
    pub series: String,
    pub min_lap: Option<TimeValue>,
    pub gap_threshold: Option<TimeValue>,
    pub total_laps: Option<u32>,
    pub target_laps: bool,
    pub time_limit: Option<String>,
    pub passing_sources: Vec<String>,
    pub club_mode: bool,
    pub allow_spares: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySpec {
    pub code: String,
    pub start_offset: Option<TimeValue>,
    pub target_laps: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntermediateSpec {
    pub code: String,
    pub description: String,
    pub abbreviation: String,
    pub places: String,
    pub visible: bool,
}

impl Default for IntermediateSpec {
    fn default() -> Self {
        Self {
            code: String::new(),
            description: String::new(),
            abbreviation: String::new(),
            places: String::new(),
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TallySpec {
    pub code: String,
    pub description: String,
    pub keep_dnf: bool,
}

/// Contest definition; points and bonuses are whitespace-separated lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContestSpec {
    pub code: String,
    pub description: String,
    pub source: String,
    pub tally: String,
    pub points: String,
    pub bonuses: String,
    pub all_source: bool,
    pub category: u32,
}

/// Raw event file as written by the operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFile {
    pub event: EventSpec,
    pub startlist: String,
    #[serde(rename = "category")]
    pub categories: Vec<CategorySpec>,
    #[serde(rename = "intermediate")]
    pub intermediates: Vec<IntermediateSpec>,
    #[serde(rename = "tally")]
    pub tallies: Vec<TallySpec>,
    #[serde(rename = "contest")]
    pub contests: Vec<ContestSpec>,
}

/// Event definitions resolved into engine types.
#[derive(Debug, Clone, Default)]
pub struct EventSetup {
    pub config: RaceConfig,
    pub categories: Vec<Category>,
    pub intermediates: Vec<Intermediate>,
    pub tallies: Vec<Tally>,
    pub contests: Vec<Contest>,
    pub startlist: Vec<Bib>,
}

impl EventSetup {
    /// Builds a fresh event. Definitions the engine refuses are reported.
    pub fn into_state<D>(self, directory: &D) -> (RaceState, LoadReport)
    where
        D: RiderDirectory + ?Sized,
    {
        let mut report = LoadReport::new();
        let mut state = RaceState::new(self.config);

        for category in self.categories {
            let code = category.code.clone();
            if !state.add_category(category) {
                report.push(ConfigIssue::RejectedCategory(code));
            }
        }
        for tally in self.tallies {
            let code = tally.code.clone();
            if !state.add_tally(tally) {
                report.push(ConfigIssue::DuplicateTally(code));
            }
        }
        for intermediate in self.intermediates {
            let code = intermediate.code.clone();
            if !state.add_intermediate(intermediate) {
                report.push(ConfigIssue::RejectedIntermediate(code));
            }
        }
        for contest in self.contests {
            let code = contest.code.clone();
            if !state.add_contest(contest) {
                report.push(ConfigIssue::DuplicateContest(code));
            }
        }

        let mut unique: Vec<Bib> = Vec::with_capacity(self.startlist.len());
        for bib in self.startlist {
            if unique.contains(&bib) {
                report.push(ConfigIssue::DuplicateRider(bib.to_string()));
            } else {
                unique.push(bib);
            }
        }
        match state.add_riders(directory, &unique) {
            Ok(added) => debug!(target: "content::event", riders = added.len(), "startlist loaded"),
            Err(err) => error!(target: "content::event", %err, "startlist not loaded"),
        }
        (state, report)
    }
}

/// Loader for event setup from TOML files.
pub struct EventConfigLoader;

impl EventConfigLoader {
    /// Load and resolve an event file.
    ///
    /// Returns an error only when the file cannot be read or parsed.
    pub fn load(path: &Path) -> LoadResult<(EventSetup, LoadReport)> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<(EventSetup, LoadReport)> {
        let file: EventFile = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse event TOML: {}", e))?;
        Ok(Self::resolve(file))
    }

    /// Resolves raw definitions, recovering each mistake with a default.
    pub fn resolve(file: EventFile) -> (EventSetup, LoadReport) {
        let mut report = LoadReport::new();
        let config = resolve_config(&file.event, &mut report);

        let categories: Vec<Category> = file
            .categories
            .iter()
            .map(|spec| {
                let offset = spec
                    .start_offset
                    .as_ref()
                    .and_then(|v| v.resolve(&format!("category {} start_offset", spec.code), &mut report));
                Category::new(&spec.code)
                    .with_start_offset(offset)
                    .with_target_laps(spec.target_laps)
            })
            .collect();

        let intermediates: Vec<Intermediate> = file
            .intermediates
            .iter()
            .map(|spec| {
                let mut intermediate =
                    Intermediate::new(&spec.code).with_description(spec.description.clone());
                intermediate.abbreviation = spec.abbreviation.clone();
                intermediate.places = PlaceList::parse(&spec.places);
                intermediate.visible = spec.visible;
                intermediate
            })
            .collect();

        let tallies = file
            .tallies
            .iter()
            .map(|spec| {
                let mut tally = Tally::new(&spec.code);
                tally.description = spec.description.clone();
                tally.keep_dnf = spec.keep_dnf;
                tally
            })
            .collect();

        let contests = file
            .contests
            .iter()
            .map(|spec| resolve_contest(spec, &categories, &intermediates, &mut report))
            .collect();

        let startlist = file
            .startlist
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(Bib::new)
            .collect();

        let setup = EventSetup {
            config,
            categories,
            intermediates,
            tallies,
            contests,
            startlist,
        };
        (setup, report)
    }
}

fn resolve_config(spec: &EventSpec, report: &mut LoadReport) -> RaceConfig {
    let event_type = if spec.event_type.trim().is_empty() {
        EventType::default()
    } else {
        spec.event_type.trim().parse::<EventType>().unwrap_or_else(|_| {
            report.push(ConfigIssue::UnknownEventType(spec.event_type.clone()));
            EventType::default()
        })
    };

    let mut config = RaceConfig::default()
        .with_event_type(event_type)
        .with_series(spec.series.trim())
        .with_total_laps(spec.total_laps)
        .with_target_laps(spec.target_laps)
        .with_passing_sources(&spec.passing_sources)
        .with_club_mode(spec.club_mode)
        .with_allow_spares(spec.allow_spares);
    if let Some(min_lap) = spec
        .min_lap
        .as_ref()
        .and_then(|v| v.resolve("min_lap", report))
    {
        config = config.with_min_lap(min_lap);
    }
    if let Some(gap) = spec
        .gap_threshold
        .as_ref()
        .and_then(|v| v.resolve("gap_threshold", report))
    {
        config = config.with_gap_threshold(gap);
    }
    if let Some(limit) = spec.time_limit.as_deref().filter(|l| !l.trim().is_empty()) {
        config = config.with_time_limit(limit.trim());
    }
    config
}

fn resolve_contest(
    spec: &ContestSpec,
    categories: &[Category],
    intermediates: &[Intermediate],
    report: &mut LoadReport,
) -> Contest {
    let code = spec.code.trim().to_lowercase();
    let points = spec
        .points
        .split_whitespace()
        .map(|value| {
            value.parse::<i64>().unwrap_or_else(|_| {
                report.push(ConfigIssue::InvalidPoints {
                    contest: code.clone(),
                    value: value.to_owned(),
                });
                0
            })
        })
        .collect::<Vec<_>>();
    let bonuses = spec
        .bonuses
        .split_whitespace()
        .map(|value| {
            Tod::parse(value).unwrap_or_else(|_| {
                report.push(ConfigIssue::InvalidBonus {
                    contest: code.clone(),
                    value: value.to_owned(),
                });
                Tod::ZERO
            })
        })
        .collect::<Vec<_>>();

    let contest = Contest::new(&code, &spec.source)
        .with_tally(&spec.tally)
        .with_points(points)
        .with_bonuses(bonuses)
        .with_all_source(spec.all_source);
    let contest = Contest {
        description: spec.description.clone(),
        category: spec.category,
        ..contest
    };

    if !contest.points.is_empty() && contest.tally.is_empty() {
        report.push(ConfigIssue::PointsWithoutTally(code.clone()));
    }
    let source = contest.source.as_str();
    let known = RESERVED_SOURCES.contains(&source)
        || intermediates.iter().any(|i| i.code == source)
        || categories
            .iter()
            .any(|c| format!("{}fin", c.code.to_lowercase()) == source);
    if !known {
        report.push(ConfigIssue::UnknownSource {
            contest: code,
            source_code: contest.source.clone(),
        });
    }
    contest
}

#[cfg(test)]
mod tests {
    use super::*;
    use race_core::DirectoryEntry;
    use std::io::Write;

    const EVENT: &str = r#"
startlist = "1 2 3 2"

[event]
type = "criterium"
min_lap = 30
gap_threshold = "1.5"
total_laps = 12
time_limit = "+10:00"
passing_sources = ["Loop1"]

[[category]]
code = "A"
target_laps = 12

[[category]]
code = "B"
start_offset = "2:00"
target_laps = 8

[[intermediate]]
code = "s1"
description = "Sprint lap 5"

[[tally]]
code = "sprint"

[[contest]]
code = "s1"
source = "s1"
tally = "sprint"
points = "5 3 2 1"
bonuses = "3 2 1"

[[contest]]
code = "bfin"
source = "bfin"
tally = "cat"
points = "1"
"#;

    #[test]
    fn event_file_resolves_into_engine_types() {
        let (setup, report) = EventConfigLoader::parse(EVENT).unwrap();
        assert!(report.is_clean(), "{:?}", report.issues());
        assert_eq!(setup.config.event_type, EventType::Criterium);
        assert_eq!(setup.config.min_lap, Tod::from_seconds(30));
        assert_eq!(setup.config.gap_threshold, Tod::from_units(15_000));
        assert_eq!(setup.config.total_laps, Some(12));
        assert_eq!(setup.config.time_limit.as_deref(), Some("+10:00"));
        assert_eq!(setup.categories[1].start_offset, Some(Tod::from_seconds(120)));
        assert_eq!(setup.contests[0].bonuses[0], Tod::from_seconds(3));
        assert_eq!(setup.startlist.len(), 4);
    }

    #[test]
    fn mistakes_are_recovered_and_reported() {
        let text = r#"
[event]
type = "velodrome"
min_lap = "soon"

[[contest]]
code = "x1"
source = "nowhere"
points = "5 three"
bonuses = "2 later"
"#;
        let (setup, report) = EventConfigLoader::parse(text).unwrap();
        assert_eq!(setup.config.event_type, EventType::Road);
        assert_eq!(setup.config.min_lap, RaceConfig::DEFAULT_MIN_LAP);
        assert_eq!(setup.contests[0].points, vec![5, 0]);
        assert_eq!(setup.contests[0].bonuses, vec![Tod::from_seconds(2), Tod::ZERO]);
        for code in [
            "UNKNOWN_EVENT_TYPE",
            "INVALID_TIME",
            "INVALID_POINTS",
            "INVALID_BONUS",
            "POINTS_WITHOUT_TALLY",
            "UNKNOWN_SOURCE",
        ] {
            assert!(report.has(code), "missing {code}");
        }
    }

    #[test]
    fn oversized_times_fall_back_to_defaults() {
        let text = r#"
[event]
min_lap = 9e18
gap_threshold = "9000000000000000h00:00"
"#;
        let (setup, report) = EventConfigLoader::parse(text).unwrap();
        assert_eq!(setup.config.min_lap, RaceConfig::DEFAULT_MIN_LAP);
        assert_eq!(setup.config.gap_threshold, RaceConfig::DEFAULT_GAP_THRESHOLD);
        assert_eq!(report.len(), 2);
        assert!(report.has("INVALID_TIME"));
    }

    #[test]
    fn syntax_errors_abort_the_load() {
        assert!(EventConfigLoader::parse("[event\ntype = ").is_err());
    }

    #[test]
    fn setup_builds_state_and_reports_refusals() {
        let (mut setup, _) = EventConfigLoader::parse(EVENT).unwrap();
        setup.intermediates.push(Intermediate::new("fin"));
        setup.tallies.push(Tally::new("sprint"));
        let mut entry = DirectoryEntry::new("1", "");
        entry.name = "First Rider".into();
        entry.categories = vec!["A".into()];

        let (state, report) = setup.into_state(&vec![entry]);
        assert!(report.has("DUPLICATE_RIDER"));
        assert!(report.has("REJECTED_INTERMEDIATE"));
        assert!(report.has("DUPLICATE_TALLY"));
        assert_eq!(state.riders().len(), 3);
        assert_eq!(state.rider(&Bib::new("1")).unwrap().name, "First Rider");
        assert_eq!(state.contests().len(), 2);
        assert!(state.tallies().iter().any(|t| t.code == "cat"));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EVENT.as_bytes()).unwrap();
        let (setup, _) = EventConfigLoader::load(file.path()).unwrap();
        assert_eq!(setup.intermediates[0].code, "s1");
        assert!(EventConfigLoader::load(Path::new("/nonexistent/event.toml")).is_err());
    }
}
