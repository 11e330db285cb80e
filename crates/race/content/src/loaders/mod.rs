//! Loaders for event setup and rider directory files.

pub mod directory;
pub mod event;
pub mod factory;

pub use directory::{RiderDirectoryLoader, StaticDirectory};
pub use event::{
    CategorySpec, ContestSpec, EventConfigLoader, EventFile, EventSetup, EventSpec,
    IntermediateSpec, TallySpec, TimeValue,
};
pub use factory::ContentFactory;

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}
