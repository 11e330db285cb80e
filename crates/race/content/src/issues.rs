//! Recoverable configuration problems.
use tracing::warn;

/// A configuration mistake that was repaired with a default.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigIssue {
    #[error("unknown event type {0:?}, using road")]
    UnknownEventType(String),

    #[error("invalid time {value:?} for {field}, using default")]
    InvalidTime { field: String, value: String },

    #[error("category {0:?} is reserved or duplicated")]
    RejectedCategory(String),

    #[error("intermediate {0:?} is reserved or duplicated")]
    RejectedIntermediate(String),

    #[error("duplicate tally {0:?}")]
    DuplicateTally(String),

    #[error("duplicate contest {0:?}")]
    DuplicateContest(String),

    #[error("contest {contest:?} has invalid points value {value:?}, using 0")]
    InvalidPoints { contest: String, value: String },

    #[error("contest {contest:?} has invalid bonus value {value:?}, using 0")]
    InvalidBonus { contest: String, value: String },

    #[error("contest {0:?} awards points without a tally")]
    PointsWithoutTally(String),

    #[error("contest {contest:?} has unknown source {source_code:?}")]
    UnknownSource { contest: String, source_code: String },

    #[error("duplicate rider {0:?} in startlist")]
    DuplicateRider(String),

    #[error("duplicate transponder {0:?} in rider directory")]
    DuplicateRefid(String),
}

impl ConfigIssue {
    /// Short identifier, stable for logs and tests.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownEventType(_) => "UNKNOWN_EVENT_TYPE",
            Self::InvalidTime { .. } => "INVALID_TIME",
            Self::RejectedCategory(_) => "REJECTED_CATEGORY",
            Self::RejectedIntermediate(_) => "REJECTED_INTERMEDIATE",
            Self::DuplicateTally(_) => "DUPLICATE_TALLY",
            Self::DuplicateContest(_) => "DUPLICATE_CONTEST",
            Self::InvalidPoints { .. } => "INVALID_POINTS",
            Self::InvalidBonus { .. } => "INVALID_BONUS",
            Self::PointsWithoutTally(_) => "POINTS_WITHOUT_TALLY",
            Self::UnknownSource { .. } => "UNKNOWN_SOURCE",
            Self::DuplicateRider(_) => "DUPLICATE_RIDER",
            Self::DuplicateRefid(_) => "DUPLICATE_REFID",
        }
    }
}

/// Issues collected while loading; each is logged as it is recorded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    issues: Vec<ConfigIssue>,
}

impl LoadReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: ConfigIssue) {
        warn!(target: "content::load", code = issue.code(), "{issue}");
        self.issues.push(issue);
    }

    pub fn extend(&mut self, other: LoadReport) {
        self.issues.extend(other.issues);
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ConfigIssue] {
        &self.issues
    }

    /// Whether an issue with `code` was recorded.
    pub fn has(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code() == code)
    }
}
