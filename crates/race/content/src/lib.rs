//! Data-driven event setup and rider directory loaders.
//!
//! This crate turns operator data files into `race-core` values:
//! - Event configuration, categories, intermediates, contests, tallies and
//!   the startlist (TOML)
//! - The rider directory used to resolve transponder ids (RON)
//!
//! Configuration mistakes never abort a load. Each one is recovered with a
//! safe default and recorded as a [`ConfigIssue`] in a [`LoadReport`]; only
//! unreadable files and syntax errors fail.

pub mod issues;

#[cfg(feature = "loaders")]
pub mod loaders;

pub use issues::{ConfigIssue, LoadReport};

#[cfg(feature = "loaders")]
pub use loaders::{
    CategorySpec, ContentFactory, ContestSpec, EventConfigLoader, EventFile, EventSetup,
    EventSpec, IntermediateSpec, RiderDirectoryLoader, StaticDirectory, TallySpec, TimeValue,
};
