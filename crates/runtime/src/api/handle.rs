//! Cloneable façade for issuing commands to the runtime.
//!
//! [`RaceHandle`] hides channel plumbing and offers async helpers for feeding
//! passings, operating the timer and reading results, plus streaming events
//! from specific topics.
use std::collections::HashMap;

use race_core::{
    Bib, CommandOutcome, EventRecord, Passing, PassingOutcome, RaceState, RaceStatus,
    RiderCommand, Standings, StandingRow, TimerState, Tod,
};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::errors::{Result, RuntimeError};
use crate::events::{Event, EventBus, Topic};
use crate::workers::{Command, RiderEdit};

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RaceHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
}

impl RaceHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    // ===== timing input =====

    /// Feed one decoder passing.
    pub async fn submit_passing(&self, passing: Passing) -> Result<PassingOutcome> {
        self.request(|reply| Command::SubmitPassing { passing, reply })
            .await
    }

    /// Operator passing for `bib`, stamped with the runtime clock.
    pub async fn submit_manual_passing(&self, bib: Bib) -> Result<PassingOutcome> {
        self.request(|reply| Command::SubmitManualPassing { bib, reply })
            .await
    }

    // ===== timer =====

    pub async fn arm_start(&self) -> Result<TimerState> {
        self.request(|reply| Command::ArmStart { reply }).await?
    }

    pub async fn arm_finish(&self) -> Result<TimerState> {
        self.request(|reply| Command::ArmFinish { reply }).await?
    }

    /// Arm the next lap; `false` when there was nothing to arm.
    pub async fn arm_lap(&self) -> Result<bool> {
        self.request(|reply| Command::ArmLap { reply }).await?
    }

    pub async fn reset(&self) -> Result<()> {
        self.request(|reply| Command::Reset { reply }).await?
    }

    pub async fn set_start(&self, start: Option<Tod>) -> Result<()> {
        self.request(|reply| Command::SetStart { start, reply })
            .await?
    }

    pub async fn set_finish(&self, finish: Option<Tod>) -> Result<()> {
        self.request(|reply| Command::SetFinish { finish, reply })
            .await?
    }

    /// Finish the event at the current time.
    pub async fn finish(&self) -> Result<()> {
        self.request(|reply| Command::Finish { reply }).await?
    }

    // ===== operator commands =====

    pub async fn rider_command(&self, command: RiderCommand) -> Result<CommandOutcome> {
        self.request(|reply| Command::Rider { command, reply })
            .await?
    }

    /// Parse and apply a rider command such as `dnf 12 14`.
    pub async fn rider_command_text(&self, code: &str, args: &str) -> Result<CommandOutcome> {
        let command = RiderCommand::parse(code, args)?;
        self.rider_command(command).await
    }

    /// Replace the finish places; returns the normalised place string.
    pub async fn set_places(&self, places: impl Into<String>) -> Result<String> {
        let places = places.into();
        self.request(|reply| Command::SetPlaces { places, reply })
            .await?
    }

    pub async fn set_intermediate(
        &self,
        code: impl Into<String>,
        places: impl Into<String>,
    ) -> Result<String> {
        let code = code.into();
        let places = places.into();
        self.request(|reply| Command::SetIntermediate {
            code,
            places,
            reply,
        })
        .await?
    }

    pub async fn edit_bunch(&self, bib: Bib, text: impl Into<String>) -> Result<Option<Tod>> {
        let text = text.into();
        self.request(|reply| Command::EditBunch { bib, text, reply })
            .await?
    }

    /// Apply a single-rider correction.
    pub async fn edit_rider(&self, edit: RiderEdit) -> Result<()> {
        self.request(|reply| Command::Edit { edit, reply }).await?
    }

    pub async fn set_laps(&self, bib: Bib, text: impl Into<String>) -> Result<()> {
        self.edit_rider(RiderEdit::Laps {
            bib,
            text: text.into(),
        })
        .await
    }

    pub async fn clear_place(&self, bib: Bib) -> Result<()> {
        self.edit_rider(RiderEdit::ClearPlace(bib)).await
    }

    pub async fn swap_places(&self, first: Bib, second: Bib) -> Result<()> {
        self.edit_rider(RiderEdit::SwapPlaces(first, second)).await
    }

    // ===== results =====

    /// Recalculate now instead of waiting for the queued request.
    pub async fn recalculate(&self) -> Result<RaceStatus> {
        self.request(|reply| Command::Recalculate { reply }).await
    }

    pub async fn standings(&self) -> Result<Standings> {
        self.request(|reply| Command::Standings { reply }).await
    }

    pub async fn category_standings(&self, code: impl Into<String>) -> Result<Vec<StandingRow>> {
        let code = code.into();
        self.request(|reply| Command::CategoryStandings { code, reply })
            .await
    }

    pub async fn status(&self) -> Result<RaceStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Query a clone of the event (read-only snapshot)
    pub async fn query_state(&self) -> Result<RaceState> {
        self.request(|reply| Command::QueryState { reply }).await
    }

    /// Persistable record of the event as it stands.
    pub async fn snapshot(&self) -> Result<EventRecord> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn save(&self) -> Result<()> {
        self.request(|reply| Command::Save { reply }).await?
    }

    /// Refresh the elapsed-time line without waiting for the ticker.
    pub async fn tick(&self) -> Result<()> {
        self.request(|reply| Command::Tick { reply: Some(reply) })
            .await
    }

    pub(crate) async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await?
    }

    // ===== events =====

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Timing` - Timer, lap and elapsed updates, rejected passings
    /// - `Topic::Results` - Recalculated results and status changes
    /// - `Topic::Announce` - Rider crossings
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Subscribe to multiple topics at once
    pub fn subscribe_multiple(&self, topics: &[Topic]) -> HashMap<Topic, broadcast::Receiver<Event>> {
        self.event_bus.subscribe_multiple(topics)
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}
