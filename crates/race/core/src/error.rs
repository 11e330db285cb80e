//! Operator command errors.
//!
//! Rejected passings are not errors: they come back as
//! [`RejectReason`](crate::passing::RejectReason) values and are only logged.
//! Commands, by contrast, are validated before anything is mutated and report
//! a [`CommandError`] so the operator can correct the input.

use crate::clock::TimerState;
use crate::rider::Bib;
use crate::tod::TodParseError;

/// Severity of an error, used to pick a recovery strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// The same command may succeed later, e.g. once the timer is running.
    Recoverable,
    /// Invalid input; retrying unchanged will fail again.
    Validation,
    /// State inconsistency that indicates a bug.
    Internal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }

    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }
}

/// Operator command rejected before any state was changed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("rider {0} appears more than once in places")]
    DuplicatePlace(Bib),

    #[error("rider {0} is not a starter")]
    NonStarter(Bib),

    #[error("rider {0} is not in the race")]
    NotInRace(Bib),

    #[error("unknown rider {0}")]
    UnknownRider(Bib),

    #[error("rider {0} already registered")]
    DuplicateRider(Bib),

    #[error("rider {0} is not placed")]
    NotPlaced(Bib),

    #[error("unknown intermediate {0:?}")]
    UnknownIntermediate(String),

    #[error("invalid time {text:?}: {reason}")]
    InvalidTime { text: String, reason: String },

    #[error("invalid lap count {0:?}")]
    InvalidLaps(String),

    #[error("unknown rider command {0:?}")]
    UnknownCommand(String),

    #[error("command needs {expected} but timer is {state}")]
    TimerState {
        expected: &'static str,
        state: TimerState,
    },

    #[error("event is read only")]
    ReadOnly,
}

impl CommandError {
    pub fn invalid_time(text: &str, err: TodParseError) -> Self {
        Self::InvalidTime {
            text: text.to_owned(),
            reason: err.to_string(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TimerState { .. } | Self::ReadOnly => ErrorSeverity::Recoverable,
            _ => ErrorSeverity::Validation,
        }
    }

    /// Short identifier, stable for logs and tests.
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicatePlace(_) => "DUPLICATE_PLACE",
            Self::NonStarter(_) => "NON_STARTER",
            Self::NotInRace(_) => "NOT_IN_RACE",
            Self::UnknownRider(_) => "UNKNOWN_RIDER",
            Self::DuplicateRider(_) => "DUPLICATE_RIDER",
            Self::NotPlaced(_) => "NOT_PLACED",
            Self::UnknownIntermediate(_) => "UNKNOWN_INTERMEDIATE",
            Self::InvalidTime { .. } => "INVALID_TIME",
            Self::InvalidLaps(_) => "INVALID_LAPS",
            Self::UnknownCommand(_) => "UNKNOWN_COMMAND",
            Self::TimerState { .. } => "TIMER_STATE",
            Self::ReadOnly => "READ_ONLY",
        }
    }
}
