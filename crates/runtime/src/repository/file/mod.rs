//! File-based repository implementations.

mod record;

pub use record::{FileRecordRepository, RecordFormat};
