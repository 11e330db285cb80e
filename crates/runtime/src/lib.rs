//! Runtime orchestration for live race timing.
//!
//! This crate wires the deterministic `race-core` engine into an async
//! service: a single worker task owns the event, a cloneable [`RaceHandle`]
//! feeds it passings and operator commands, and race notifications fan out
//! on a topic-based [`EventBus`].
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator, builder and configuration
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] provides the topic-based event bus
//! - [`repository`] persists event records
//! - `workers` keeps background tasks internal to the crate
pub mod api;
pub mod events;
pub mod repository;
pub mod runtime;

mod workers;

pub use api::{RaceHandle, Result, RuntimeError};
pub use events::{Event, EventBus, Topic};
pub use repository::{
    FileRecordRepository, InMemoryRecordRepository, RecordFormat, RecordRepository,
    RepositoryError,
};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig, default_record_dir};
pub use workers::{RecalcQueue, RecalcRequest, RiderEdit};
