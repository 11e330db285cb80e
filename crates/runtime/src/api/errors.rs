//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, repositories and rejected
//! operator commands so clients can bubble them up with consistent context.

use race_core::{CommandError, ErrorSeverity};
use thiserror::Error;
use tokio::sync::oneshot;

pub use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("race worker command channel closed")]
    CommandChannelClosed,

    #[error("race worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("race worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("no record repository configured")]
    NoRepository,

    #[error("event is read only; refusing to save {0:?}")]
    ReadOnly(String),
}

impl RuntimeError {
    /// Severity used by clients to decide between retrying and reporting.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Command(err) => err.severity(),
            Self::ReadOnly(_) | Self::NoRepository => ErrorSeverity::Validation,
            _ => ErrorSeverity::Internal,
        }
    }
}
