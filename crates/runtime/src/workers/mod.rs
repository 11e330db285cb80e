//! Worker tasks that back the runtime orchestration.
//!
//! The race worker owns the event and executes every command in order; the
//! ticker drives elapsed-time updates.

mod race;
mod recalc;
mod ticker;

pub use race::{Command, Persistence, RaceWorker, RiderEdit, SharedDirectory};
pub use recalc::{RecalcQueue, RecalcRequest};
pub use ticker::Ticker;
