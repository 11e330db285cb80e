//! Content factory for building an event from a data directory.

use std::path::{Path, PathBuf};

use race_core::RaceState;
use tracing::info;

use crate::issues::LoadReport;
use crate::loaders::{EventConfigLoader, EventSetup, LoadResult, RiderDirectoryLoader, StaticDirectory};

/// Loads event content from a data directory.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── event.toml
/// └── riders.ron
/// ```
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    pub const EVENT_FILE: &'static str = "event.toml";
    pub const DIRECTORY_FILE: &'static str = "riders.ron";

    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load the event setup from `event.toml`.
    pub fn load_event(&self) -> LoadResult<(EventSetup, LoadReport)> {
        EventConfigLoader::load(&self.data_dir.join(Self::EVENT_FILE))
    }

    /// Load the rider directory from `riders.ron`; a missing file is an
    /// empty directory.
    pub fn load_directory(&self) -> LoadResult<(StaticDirectory, LoadReport)> {
        let path = self.data_dir.join(Self::DIRECTORY_FILE);
        if !path.exists() {
            info!(target: "content::load", path = %path.display(), "no rider directory");
            return Ok(StaticDirectory::new(Vec::new()));
        }
        RiderDirectoryLoader::load(&path)
    }

    /// Loads both files and builds a fresh event.
    pub fn build(&self) -> LoadResult<(RaceState, StaticDirectory, LoadReport)> {
        let (directory, mut report) = self.load_directory()?;
        let (setup, event_report) = self.load_event()?;
        report.extend(event_report);
        let (state, state_report) = setup.into_state(&directory);
        report.extend(state_report);
        info!(
            target: "content::load",
            riders = state.riders().len(),
            issues = report.len(),
            "event content loaded"
        );
        Ok((state, directory, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use race_core::Bib;

    #[test]
    fn build_combines_directory_and_event() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(ContentFactory::EVENT_FILE),
            "startlist = \"1 2\"\n[event]\ntype = \"road\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(ContentFactory::DIRECTORY_FILE),
            "(riders: [(refid: \"chip1\", bib: \"1\", name: \"First Rider\")])",
        )
        .unwrap();

        let (state, directory, report) = ContentFactory::new(dir.path()).build().unwrap();
        assert!(report.is_clean());
        assert_eq!(directory.len(), 1);
        assert_eq!(state.rider(&Bib::new("1")).unwrap().name, "First Rider");
        assert!(state.rider(&Bib::new("2")).is_some());
    }

    #[test]
    fn missing_event_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ContentFactory::new(dir.path()).build().is_err());
    }
}
