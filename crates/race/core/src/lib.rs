//! Deterministic timing and scoring for mass-start road events.
//!
//! `race-core` turns raw transponder passings into laps, finish crossings,
//! bunch times, contest points and a race status. It performs no I/O and
//! never sleeps: the caller owns time (through [`Clock`]), feeds passings and
//! operator commands into [`RaceState`], calls [`RaceState::recalculate`]
//! and drains the queued [`RaceEvent`]s.
pub mod category;
pub mod clock;
pub mod commands;
pub mod config;
pub mod contest;
pub mod error;
pub mod events;
pub mod passing;
pub mod places;
pub mod record;
pub mod registry;
pub mod results;
pub mod rider;
pub mod standings;
pub mod state;
pub mod tod;

pub use category::{Category, CategoryLap, CategoryStartModel, RESERVED_CATEGORIES, SPARE_CATEGORY};
pub use clock::{EventClock, TimerState};
pub use commands::{CommandOutcome, RiderCommand, RiderSummary};
pub use config::{EventType, RaceConfig};
pub use contest::{
    Contest, ContestEngine, ContestScores, ContestSource, Countback, Intermediate,
    RESERVED_SOURCES, Tally, TallyEntry,
};
pub use error::{CommandError, ErrorSeverity};
pub use events::RaceEvent;
pub use passing::{
    DirectoryEntry, MANUAL_CHANNEL, MANUAL_REFID_PREFIX, Passing, PassingOutcome,
    PassingProcessor, RejectReason, RiderDirectory,
};
pub use places::{PLACEHOLDER, PlaceList};
pub use record::{EventRecord, RECORD_ID, RiderRecord};
pub use registry::RiderRegistry;
pub use results::{RaceStatus, ResultCalculator, decode_limit};
pub use rider::{Bib, DnfCode, Rider, SeenConflict, UNPLACED_RANK};
pub use standings::{StandingRow, Standings, TallyRow, TallyTable};
pub use state::RaceState;
pub use tod::{Clock, FixedClock, SystemClock, Tod, TodParseError, UNITS_PER_SECOND};
