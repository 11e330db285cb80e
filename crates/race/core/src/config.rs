use crate::tod::Tod;

/// Kind of event being timed.
///
/// The kind changes lap arming on the start trigger and how the result
/// calculator orders riders.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EventType {
    #[default]
    Road,
    Circuit,
    Criterium,
    Handicap,
    Cross,
    Irtt,
    Trtt,
}

impl EventType {
    /// Laps are armed as soon as the start trigger arrives.
    pub const fn arms_lap_on_start(self) -> bool {
        matches!(self, Self::Criterium | Self::Circuit | Self::Cross)
    }

    /// Lap counts decide the order, bunch times do not re-sort it.
    pub const fn is_lap_count_race(self) -> bool {
        matches!(self, Self::Cross)
    }

    /// Riders arriving before a lap boundary exists join the current lap.
    pub const fn pushes_onto_current_lap(self) -> bool {
        matches!(self, Self::Criterium)
    }
}

/// Resolved event configuration consumed by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RaceConfig {
    pub event_type: EventType,
    /// Minimum time between two accepted passings for one rider.
    pub min_lap: Tod,
    /// Elapsed-time gap that starts a new bunch.
    pub gap_threshold: Tod,
    /// Event lap count, `None` when laps are not counted.
    pub total_laps: Option<u32>,
    /// Finish riders automatically once they complete their target lap.
    pub target_laps: bool,
    /// Time limit text: `+MM:SS` down time, `N%` of winner time, or absolute.
    pub time_limit: Option<String>,
    /// Lowercased passing sources that are accepted; empty accepts all.
    pub passing_sources: Vec<String>,
    /// Register unknown riders on their first passing.
    pub club_mode: bool,
    /// Register riders from the `SPARE` category as spare bikes.
    pub allow_spares: bool,
    /// Rider number series this event scores.
    pub series: String,
}

impl RaceConfig {
    pub const DEFAULT_MIN_LAP: Tod = Tod::from_seconds(20);
    pub const DEFAULT_GAP_THRESHOLD: Tod = Tod::from_units(11_200);

    /// Provisional results need at least this many riders placed.
    pub const PROVISIONAL_PLACES: usize = 10;
    /// Small fields become provisional with any placing below this size.
    pub const SMALL_FIELD: usize = 16;

    pub fn new() -> Self {
        Self {
            event_type: EventType::default(),
            min_lap: Self::DEFAULT_MIN_LAP,
            gap_threshold: Self::DEFAULT_GAP_THRESHOLD,
            total_laps: None,
            target_laps: false,
            time_limit: None,
            passing_sources: Vec::new(),
            club_mode: false,
            allow_spares: false,
            series: String::new(),
        }
    }

    pub fn with_event_type(mut self, event_type: EventType) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn with_min_lap(mut self, min_lap: Tod) -> Self {
        self.min_lap = min_lap;
        self
    }

    pub fn with_gap_threshold(mut self, gap_threshold: Tod) -> Self {
        self.gap_threshold = gap_threshold;
        self
    }

    pub fn with_total_laps(mut self, total_laps: Option<u32>) -> Self {
        self.total_laps = total_laps.filter(|laps| *laps > 0);
        self
    }

    pub fn with_target_laps(mut self, target_laps: bool) -> Self {
        self.target_laps = target_laps;
        self
    }

    pub fn with_time_limit(mut self, limit: impl Into<String>) -> Self {
        let limit = limit.into();
        self.time_limit = (!limit.trim().is_empty()).then_some(limit);
        self
    }

    pub fn with_passing_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.passing_sources = sources
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn with_club_mode(mut self, club_mode: bool) -> Self {
        self.club_mode = club_mode;
        self
    }

    pub fn with_allow_spares(mut self, allow_spares: bool) -> Self {
        self.allow_spares = allow_spares;
        self
    }

    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = series.into();
        self
    }

    /// True when `source` passes the configured allow-list.
    pub fn accepts_source(&self, source: &str) -> bool {
        self.passing_sources.is_empty()
            || self
                .passing_sources
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(source))
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bunch_racing_conventions() {
        let config = RaceConfig::default();
        assert_eq!(config.min_lap.rawtime(1), "20.0");
        assert_eq!(config.gap_threshold.rawtime(2), "1.12");
        assert!(config.accepts_source("anything"));
    }

    #[test]
    fn source_allow_list_is_case_insensitive() {
        let config = RaceConfig::new().with_passing_sources(["C1", " c2 ", ""]);
        assert_eq!(config.passing_sources, vec!["c1", "c2"]);
        assert!(config.accepts_source("C2"));
        assert!(!config.accepts_source("c3"));
    }

    #[test]
    fn event_type_parses_from_config_text() {
        assert_eq!("Criterium".parse::<EventType>().unwrap(), EventType::Criterium);
        assert_eq!(EventType::Cross.to_string(), "cross");
        assert!(EventType::Cross.arms_lap_on_start());
        assert!(!EventType::Road.arms_lap_on_start());
    }
}
