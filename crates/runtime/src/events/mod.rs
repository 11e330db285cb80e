//! Topic-based event bus for runtime events.
//!
//! Race notifications are published to one of three topics so a scoreboard
//! can follow announcements without waking on every elapsed-time tick.

mod bus;

pub use bus::{Event, EventBus, Topic};
