//! Periodic tick source for elapsed-time updates.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::race::Command;

/// Sends [`Command::Tick`] at a fixed interval.
///
/// Holds only a weak sender so it never keeps the race worker alive; it
/// stops once every handle is gone.
pub struct Ticker {
    command_tx: mpsc::WeakSender<Command>,
    period: Duration,
}

impl Ticker {
    pub fn new(command_tx: &mpsc::Sender<Command>, period: Duration) -> Self {
        Self {
            command_tx: command_tx.downgrade(),
            period,
        }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let Some(tx) = self.command_tx.upgrade() else {
                break;
            };
            if tx.send(Command::Tick { reply: None }).await.is_err() {
                break;
            }
        }
        debug!(target: "runtime::ticker", "ticker stopped");
    }
}
