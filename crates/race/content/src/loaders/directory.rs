//! Rider directory loader.
//!
//! RON layout:
//!
//! ```ron
//! (
//!     riders: [
//!         (refid: "a1b2c3", bib: "1", name: "First Rider", categories: ["A"]),
//!         (refid: "d4e5f6", bib: "2", series: "t", name: "Team Rider"),
//!     ],
//! )
//! ```

use std::collections::HashMap;
use std::path::Path;

use race_core::{DirectoryEntry, RiderDirectory};
use serde::{Deserialize, Serialize};

use crate::issues::{ConfigIssue, LoadReport};
use crate::loaders::{LoadResult, read_file};

/// Directory file structure for RON files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryFile {
    pub riders: Vec<DirectoryEntry>,
}

/// In-memory rider directory indexed by transponder id.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: Vec<DirectoryEntry>,
    by_refid: HashMap<String, usize>,
}

impl StaticDirectory {
    /// Indexes `entries`; a repeated transponder keeps its first rider.
    pub fn new(entries: Vec<DirectoryEntry>) -> (Self, LoadReport) {
        let mut report = LoadReport::new();
        let mut by_refid = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let refid = entry.refid.trim().to_lowercase();
            if refid.is_empty() {
                continue;
            }
            if by_refid.contains_key(&refid) {
                report.push(ConfigIssue::DuplicateRefid(refid));
            } else {
                by_refid.insert(refid, idx);
            }
        }
        (Self { entries, by_refid }, report)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }
}

impl RiderDirectory for StaticDirectory {
    fn resolve(&self, refid: &str) -> Option<DirectoryEntry> {
        let idx = self.by_refid.get(&refid.trim().to_lowercase())?;
        self.entries.get(*idx).cloned()
    }

    fn lookup(&self, bib: &str, series: &str) -> Option<DirectoryEntry> {
        self.entries.as_slice().lookup(bib, series)
    }
}

/// Loader for the rider directory from RON files.
pub struct RiderDirectoryLoader;

impl RiderDirectoryLoader {
    pub fn load(path: &Path) -> LoadResult<(StaticDirectory, LoadReport)> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<(StaticDirectory, LoadReport)> {
        let file: DirectoryFile = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse rider directory RON: {}", e))?;
        Ok(StaticDirectory::new(file.riders))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIDERS: &str = r#"(
        riders: [
            (refid: "A1B2", bib: "1", name: "First Rider", categories: ["A"]),
            (refid: "c3d4", bib: "2", series: "t", name: "Team Rider"),
            (refid: "a1b2", bib: "3", name: "Borrowed Chip"),
            (bib: "4", name: "No Chip"),
        ],
    )"#;

    #[test]
    fn refids_resolve_case_insensitively() {
        let (directory, report) = RiderDirectoryLoader::parse(RIDERS).unwrap();
        assert_eq!(directory.len(), 4);
        assert_eq!(directory.resolve("a1b2").unwrap().bib, "1");
        assert_eq!(directory.resolve(" C3D4 ").unwrap().series, "t");
        assert!(directory.resolve("").is_none());
        assert!(report.has("DUPLICATE_REFID"));
    }

    #[test]
    fn lookup_honours_series() {
        let (directory, _) = RiderDirectoryLoader::parse(RIDERS).unwrap();
        assert!(directory.lookup("2", "").is_none());
        assert_eq!(directory.lookup("2", "t").unwrap().name, "Team Rider");
        assert_eq!(directory.lookup("4", "").unwrap().name, "No Chip");
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(RiderDirectoryLoader::parse("(riders: [(bib: 1)])").is_err());
    }
}
