//! Command-line front end for the race runtime.
//!
//! Loads an event from a content directory, replays a timing script against
//! it and prints the result.

pub mod config;
pub mod logging;
pub mod report;
pub mod script;

pub use config::ClientConfig;
pub use script::{ReplaySummary, Script, Step};
