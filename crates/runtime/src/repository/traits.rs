//! Repository contract for saving and loading event records.

use race_core::EventRecord;

use super::error::Result;

/// Persistence for [`EventRecord`]s keyed by event name.
///
/// A record is the whole event (configuration, clock, places and riders), so
/// `save` replaces whatever was stored under the same name.
pub trait RecordRepository: Send + Sync {
    /// Save a record under `name`
    fn save(&self, name: &str, record: &EventRecord) -> Result<()>;

    /// Load the record stored under `name`
    fn load(&self, name: &str) -> Result<Option<EventRecord>>;

    /// Check if a record exists
    fn exists(&self, name: &str) -> bool;

    /// Delete a record
    fn delete(&self, name: &str) -> Result<()>;

    /// List stored record names, sorted
    fn list_names(&self) -> Result<Vec<String>> {
        Ok(vec![])
    }
}

/// Rejects names that would escape the repository directory.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(super::RepositoryError::InvalidName(name.to_owned()))
    }
}
