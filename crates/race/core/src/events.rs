//! Outbound notifications.
//!
//! [`RaceState`](crate::RaceState) never calls out to its environment. It
//! queues these events and the caller drains them after each operation.
use crate::category::CategoryLap;
use crate::clock::TimerState;
use crate::results::RaceStatus;
use crate::rider::Bib;
use crate::tod::Tod;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RaceEvent {
    Timer(TimerState),
    StartTime(Option<Tod>),
    FinishTime(Option<Tod>),
    /// Lap the leaders are on changed.
    OnLap(Option<u32>),
    /// The leader completed a lap at `at`; `lap_time` is the lap duration.
    LapFinished { at: Tod, lap_time: Option<Tod> },
    CategoryLap(CategoryLap),
    /// Rider crossing announced to the scoreboard.
    RiderPassing {
        bib: Bib,
        name: String,
        category: String,
        /// Elapsed race time at the crossing.
        elapsed: Option<Tod>,
        finish: bool,
    },
    /// A rider already holding a place was seen again on the finish line.
    PlacedRiderAtFinish { bib: Bib },
    /// Results were recomputed; readers should refresh.
    ResultsUpdated { status: RaceStatus },
    Status(RaceStatus),
    /// Running elapsed-time line for the scoreboard.
    Elapsed(String),
    Reset,
}

impl RaceEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timer(_) => "timer",
            Self::StartTime(_) => "start",
            Self::FinishTime(_) => "finish",
            Self::OnLap(_) => "onlap",
            Self::LapFinished { .. } => "lapfinish",
            Self::CategoryLap(_) => "catlap",
            Self::RiderPassing { .. } => "passing",
            Self::PlacedRiderAtFinish { .. } => "placedfinish",
            Self::ResultsUpdated { .. } => "results",
            Self::Status(_) => "status",
            Self::Elapsed(_) => "elapsed",
            Self::Reset => "reset",
        }
    }
}
