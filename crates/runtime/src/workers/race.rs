//! Race worker that owns the authoritative [`race_core::RaceState`].
//!
//! Receives commands from [`RaceHandle`](crate::RaceHandle), applies them to
//! the event, schedules recalculation and publishes queued race events to
//! the EventBus.

use std::sync::Arc;

use race_core::{
    Bib, Clock, CommandError, CommandOutcome, EventRecord, Passing, PassingOutcome, RaceState, RaceStatus,
    RiderCommand, RiderDirectory, Standings, StandingRow, TimerState, Tod,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::recalc::RecalcQueue;
use crate::api::{Result, RuntimeError};
use crate::events::{Event, EventBus};
use crate::repository::RecordRepository;

/// Rider directory shared with the worker task.
pub type SharedDirectory = Arc<dyn RiderDirectory + Send + Sync>;

/// Single-rider corrections applied by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiderEdit {
    /// Lap count, or `?` to recount from passings.
    Laps { bib: Bib, text: String },
    StartOffset { bib: Bib, text: String },
    BonusPenalty {
        bib: Bib,
        bonus: Option<Tod>,
        penalty: Option<Tod>,
    },
    ClearPlace(Bib),
    SwapPlaces(Bib, Bib),
}

/// Commands that can be sent to the race worker
pub enum Command {
    SubmitPassing {
        passing: Passing,
        reply: oneshot::Sender<PassingOutcome>,
    },
    SubmitManualPassing {
        bib: Bib,
        reply: oneshot::Sender<PassingOutcome>,
    },
    ArmStart {
        reply: oneshot::Sender<Result<TimerState>>,
    },
    ArmFinish {
        reply: oneshot::Sender<Result<TimerState>>,
    },
    ArmLap {
        reply: oneshot::Sender<Result<bool>>,
    },
    Reset {
        reply: oneshot::Sender<Result<()>>,
    },
    SetStart {
        start: Option<Tod>,
        reply: oneshot::Sender<Result<()>>,
    },
    SetFinish {
        finish: Option<Tod>,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Finish the event now.
    Finish {
        reply: oneshot::Sender<Result<()>>,
    },
    Rider {
        command: RiderCommand,
        reply: oneshot::Sender<Result<CommandOutcome>>,
    },
    SetPlaces {
        places: String,
        reply: oneshot::Sender<Result<String>>,
    },
    SetIntermediate {
        code: String,
        places: String,
        reply: oneshot::Sender<Result<String>>,
    },
    EditBunch {
        bib: Bib,
        text: String,
        reply: oneshot::Sender<Result<Option<Tod>>>,
    },
    Edit {
        edit: RiderEdit,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Recalculate immediately, bypassing the queue.
    Recalculate {
        reply: oneshot::Sender<RaceStatus>,
    },
    Standings {
        reply: oneshot::Sender<Standings>,
    },
    CategoryStandings {
        code: String,
        reply: oneshot::Sender<Vec<StandingRow>>,
    },
    Status {
        reply: oneshot::Sender<RaceStatus>,
    },
    /// Query a clone of the event (read-only).
    QueryState {
        reply: oneshot::Sender<RaceState>,
    },
    Snapshot {
        reply: oneshot::Sender<EventRecord>,
    },
    Save {
        reply: oneshot::Sender<Result<()>>,
    },
    /// Elapsed-time refresh; the ticker sends these without a reply.
    Tick {
        reply: Option<oneshot::Sender<()>>,
    },
    /// Stop after a final recalculation and autosave.
    Shutdown {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Where and whether the worker writes the event record.
pub struct Persistence {
    pub repository: Arc<dyn RecordRepository>,
    pub name: String,
    pub autosave: bool,
}

/// Background task that processes race commands.
pub struct RaceWorker {
    state: RaceState,
    directory: SharedDirectory,
    clock: Arc<dyn Clock>,
    command_rx: mpsc::Receiver<Command>,
    event_bus: EventBus,
    recalc: RecalcQueue,
    persistence: Option<Persistence>,
}

impl RaceWorker {
    pub fn new(
        state: RaceState,
        directory: SharedDirectory,
        clock: Arc<dyn Clock>,
        command_rx: mpsc::Receiver<Command>,
        event_bus: EventBus,
        persistence: Option<Persistence>,
    ) -> Self {
        info!(
            target: "runtime::worker",
            riders = state.riders().len(),
            timer = %state.timer(),
            read_only = state.is_read_only(),
            "race worker initialized"
        );
        Self {
            state,
            directory,
            clock,
            command_rx,
            event_bus,
            recalc: RecalcQueue::new(),
            persistence,
        }
    }

    /// Main worker loop.
    ///
    /// Commands always take priority. A pending recalculation runs when the
    /// command queue is empty, or earlier when a read needs fresh results.
    pub async fn run(mut self) {
        // Publish anything queued while the event was being built.
        self.publish_events();

        let shutdown_reply = loop {
            tokio::select! {
                biased;
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => break Some(reply),
                    Some(cmd) => self.handle_command(cmd),
                    None => break None,
                },
                _ = std::future::ready(()), if self.recalc.is_pending() => {
                    self.run_pending_recalc();
                }
            }
        };

        let result = self.finish();
        if let Some(reply) = shutdown_reply {
            if reply.send(result).is_err() {
                debug!(target: "runtime::worker", "Shutdown reply channel closed");
            }
        } else if let Err(err) = result {
            error!(target: "runtime::worker", error = %err, "final save failed");
        }
        info!(target: "runtime::worker", "race worker stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SubmitPassing { passing, reply } => {
                let outcome = self.submit_passing(passing);
                send(reply, outcome, "SubmitPassing");
            }
            Command::SubmitManualPassing { bib, reply } => {
                let passing = Passing::manual(&bib, self.clock.now());
                let outcome = self.submit_passing(passing);
                send(reply, outcome, "SubmitManualPassing");
            }
            Command::ArmStart { reply } => {
                let result = self
                    .writable()
                    .and_then(|()| self.state.arm_start().map_err(RuntimeError::from));
                self.after_mutation("arm start");
                send(reply, result, "ArmStart");
            }
            Command::ArmFinish { reply } => {
                let result = self
                    .writable()
                    .and_then(|()| self.state.arm_finish().map_err(RuntimeError::from));
                self.after_mutation("arm finish");
                send(reply, result, "ArmFinish");
            }
            Command::ArmLap { reply } => {
                let result = self.writable().map(|()| self.state.arm_lap());
                self.after_mutation("arm lap");
                send(reply, result, "ArmLap");
            }
            Command::Reset { reply } => {
                let result = self.writable().map(|()| self.state.reset());
                self.after_mutation("reset");
                send(reply, result, "Reset");
            }
            Command::SetStart { start, reply } => {
                let result = self.writable().map(|()| self.state.set_start(start));
                self.after_mutation("start time");
                send(reply, result, "SetStart");
            }
            Command::SetFinish { finish, reply } => {
                let result = self.writable().map(|()| self.state.set_finish(finish));
                self.after_mutation("finish time");
                send(reply, result, "SetFinish");
            }
            Command::Finish { reply } => {
                let now = self.clock.now();
                let result = self
                    .writable()
                    .and_then(|()| self.state.finish(now).map_err(RuntimeError::from));
                self.after_mutation("finish");
                send(reply, result, "Finish");
            }
            Command::Rider { command, reply } => {
                let now = self.clock.now();
                let result = self
                    .state
                    .apply_command(&*self.directory, command, now)
                    .map_err(RuntimeError::from);
                if let Ok(CommandOutcome::Passings(outcomes)) = &result {
                    for outcome in outcomes {
                        if let PassingOutcome::Rejected(reason) = outcome {
                            debug!(target: "runtime::worker", %reason, "manual passing rejected");
                        }
                    }
                }
                self.after_mutation("rider command");
                send(reply, result, "Rider");
            }
            Command::SetPlaces { places, reply } => {
                let result = self.state.set_places(&places).map_err(RuntimeError::from);
                self.after_mutation("finish places");
                send(reply, result, "SetPlaces");
            }
            Command::SetIntermediate {
                code,
                places,
                reply,
            } => {
                let result = self
                    .state
                    .set_intermediate_places(&code, &places)
                    .map_err(RuntimeError::from);
                self.after_mutation("intermediate places");
                send(reply, result, "SetIntermediate");
            }
            Command::EditBunch { bib, text, reply } => {
                let result = self.state.edit_bunch(&bib, &text).map_err(RuntimeError::from);
                self.after_mutation("bunch edit");
                send(reply, result, "EditBunch");
            }
            Command::Edit { edit, reply } => {
                let result = self.apply_edit(edit).map_err(RuntimeError::from);
                self.after_mutation("rider edit");
                send(reply, result, "Edit");
            }
            Command::Recalculate { reply } => {
                self.recalc.clear();
                let status = self.state.recalculate();
                self.publish_events();
                send(reply, status, "Recalculate");
            }
            Command::Standings { reply } => {
                self.run_pending_recalc();
                send(reply, self.state.standings(), "Standings");
            }
            Command::CategoryStandings { code, reply } => {
                self.run_pending_recalc();
                let rows = self.state.category_standings(&code, self.clock.now());
                send(reply, rows, "CategoryStandings");
            }
            Command::Status { reply } => {
                self.run_pending_recalc();
                send(reply, self.state.status(), "Status");
            }
            Command::QueryState { reply } => {
                self.run_pending_recalc();
                send(reply, self.state.clone(), "QueryState");
            }
            Command::Snapshot { reply } => {
                self.run_pending_recalc();
                send(reply, self.state.to_record(), "Snapshot");
            }
            Command::Save { reply } => {
                self.run_pending_recalc();
                let result = self.save();
                send(reply, result, "Save");
            }
            Command::Tick { reply } => {
                self.state.tick(self.clock.now());
                self.after_mutation("tick");
                if let Some(reply) = reply {
                    send(reply, (), "Tick");
                }
            }
            Command::Shutdown { .. } => unreachable!("shutdown is handled by the run loop"),
        }
    }

    fn apply_edit(&mut self, edit: RiderEdit) -> std::result::Result<(), CommandError> {
        match edit {
            RiderEdit::Laps { bib, text } => self.state.set_laps(&bib, &text).map(|_| ()),
            RiderEdit::StartOffset { bib, text } => {
                self.state.set_start_offset(&bib, &text).map(|_| ())
            }
            RiderEdit::BonusPenalty {
                bib,
                bonus,
                penalty,
            } => self.state.set_bonus_penalty(&bib, bonus, penalty),
            RiderEdit::ClearPlace(bib) => self.state.clear_place(&bib),
            RiderEdit::SwapPlaces(first, second) => self.state.swap_places(&first, &second),
        }
    }

    fn writable(&self) -> Result<()> {
        if self.state.is_read_only() {
            Err(CommandError::ReadOnly.into())
        } else {
            Ok(())
        }
    }

    fn submit_passing(&mut self, passing: Passing) -> PassingOutcome {
        let outcome = self.state.submit_passing(&*self.directory, &passing);
        if let PassingOutcome::Rejected(reason) = &outcome {
            self.event_bus.publish(Event::PassingRejected {
                passing,
                reason: reason.clone(),
            });
        }
        self.after_mutation("passing");
        outcome
    }

    /// Queues a recalculation if the command changed anything and publishes
    /// the events it produced.
    fn after_mutation(&mut self, reason: &'static str) {
        if self.state.is_dirty() {
            self.recalc.request(reason);
        }
        self.publish_events();
    }

    fn run_pending_recalc(&mut self) {
        if let Some(request) = self.recalc.take() {
            let status = self.state.recalculate();
            debug!(
                target: "runtime::worker",
                reason = request.reason,
                %status,
                coalesced = self.recalc.coalesced(),
                "recalculated"
            );
            self.publish_events();
        }
    }

    fn publish_events(&mut self) {
        self.event_bus.publish_race(self.state.drain_events());
    }

    fn save(&mut self) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Err(RuntimeError::NoRepository);
        };
        if self.state.is_read_only() {
            error!(
                target: "runtime::worker",
                name = %persistence.name,
                "refusing to save read only event"
            );
            return Err(RuntimeError::ReadOnly(persistence.name.clone()));
        }
        persistence
            .repository
            .save(&persistence.name, &self.state.to_record())?;
        info!(target: "runtime::worker", name = %persistence.name, "event saved");
        self.event_bus.publish(Event::RecordSaved {
            name: persistence.name.clone(),
        });
        Ok(())
    }

    /// Runs any pending recalculation, then autosaves when configured.
    fn finish(&mut self) -> Result<()> {
        self.run_pending_recalc();
        let autosave = self
            .persistence
            .as_ref()
            .is_some_and(|p| p.autosave && !self.state.is_read_only());
        if autosave { self.save() } else { Ok(()) }
    }
}

fn send<T>(reply: oneshot::Sender<T>, value: T, command: &'static str) {
    if reply.send(value).is_err() {
        debug!(target: "runtime::worker", command, "reply channel closed (caller dropped)");
    }
}
