//! In-memory RecordRepository implementation for tests and local runs.

use std::collections::HashMap;
use std::sync::RwLock;

use race_core::EventRecord;

use crate::repository::{RecordRepository, RepositoryError, Result};

/// In-memory implementation of RecordRepository.
#[derive(Default)]
pub struct InMemoryRecordRepository {
    records: RwLock<HashMap<String, EventRecord>>,
}

impl InMemoryRecordRepository {
    /// Create a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with an initial record.
    pub fn with_record(name: impl Into<String>, record: EventRecord) -> Self {
        let mut records = HashMap::new();
        records.insert(name.into(), record);
        Self {
            records: RwLock::new(records),
        }
    }
}

impl RecordRepository for InMemoryRecordRepository {
    fn save(&self, name: &str, record: &EventRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        records.insert(name.to_owned(), record.clone());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<EventRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(records.get(name).cloned())
    }

    fn exists(&self, name: &str) -> bool {
        self.records
            .read()
            .map(|records| records.contains_key(name))
            .unwrap_or(false)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        records.remove(name);
        Ok(())
    }

    fn list_names(&self) -> Result<Vec<String>> {
        let records = self
            .records
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let mut names: Vec<String> = records.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }
}
