//! Repository layer for event records.
//!
//! Repositories hold the mutable event (clock, places, riders) between runs.
//! Static setup (event file, rider directory) is loaded by `race-content`.

mod error;
mod file;
mod memory;
mod traits;

pub use error::{RepositoryError, Result};
pub use file::{FileRecordRepository, RecordFormat};
pub use memory::InMemoryRecordRepository;
pub use traits::RecordRepository;
