//! Topic-based event bus implementation.

use std::sync::Arc;

use race_core::{Passing, RaceEvent, RejectReason};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Timer, lap and elapsed-time changes
    Timing,
    /// Recalculated results and race status
    Results,
    /// Rider crossings for the scoreboard and announcer
    Announce,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Timing, Topic::Results, Topic::Announce];

    const fn index(self) -> usize {
        match self {
            Topic::Timing => 0,
            Topic::Results => 1,
            Topic::Announce => 2,
        }
    }
}

/// Event wrapper published on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Notification queued by the race engine.
    Race(RaceEvent),
    /// A passing that did not count.
    PassingRejected {
        passing: Passing,
        reason: RejectReason,
    },
    /// The event record was written to its repository.
    RecordSaved { name: String },
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Race(event) => race_topic(event),
            Event::PassingRejected { .. } => Topic::Timing,
            Event::RecordSaved { .. } => Topic::Results,
        }
    }
}

fn race_topic(event: &RaceEvent) -> Topic {
    match event {
        RaceEvent::RiderPassing { .. } | RaceEvent::PlacedRiderAtFinish { .. } => Topic::Announce,
        RaceEvent::ResultsUpdated { .. } | RaceEvent::Status(_) => Topic::Results,
        RaceEvent::Timer(_)
        | RaceEvent::StartTime(_)
        | RaceEvent::FinishTime(_)
        | RaceEvent::OnLap(_)
        | RaceEvent::LapFinished { .. }
        | RaceEvent::CategoryLap(_)
        | RaceEvent::Elapsed(_)
        | RaceEvent::Reset => Topic::Timing,
    }
}

/// Topic-based event bus
///
/// Consumers subscribe to the topics they care about. Publishing is
/// best-effort: a topic with no subscribers drops the event.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<[broadcast::Sender<Event>; 3]>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channels: Arc::new(Topic::ALL.map(|_| broadcast::channel(capacity).0)),
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.channels[topic.index()].send(event).is_err() {
            tracing::trace!(target: "runtime::events", ?topic, "no subscribers");
        }
    }

    /// Publishes every queued race event in order.
    pub fn publish_race(&self, events: impl IntoIterator<Item = RaceEvent>) {
        for event in events {
            self.publish(Event::Race(event));
        }
    }

    /// Subscribe to a specific topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.channels[topic.index()].subscribe()
    }

    /// Subscribe to multiple topics
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> std::collections::HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

const DEFAULT_CAPACITY: usize = 256;

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use race_core::{Bib, RaceStatus, TimerState};

    #[test]
    fn events_route_by_kind() {
        assert_eq!(Event::Race(RaceEvent::Timer(TimerState::Running)).topic(), Topic::Timing);
        assert_eq!(
            Event::Race(RaceEvent::Status(RaceStatus::Provisional)).topic(),
            Topic::Results
        );
        assert_eq!(
            Event::Race(RaceEvent::PlacedRiderAtFinish { bib: Bib::new("7") }).topic(),
            Topic::Announce
        );
    }

    #[tokio::test]
    async fn subscribers_only_see_their_topic() {
        let bus = EventBus::new();
        let mut results = bus.subscribe(Topic::Results);
        bus.publish(Event::Race(RaceEvent::Reset));
        bus.publish(Event::RecordSaved { name: "race".into() });
        assert_eq!(
            results.recv().await.unwrap(),
            Event::RecordSaved { name: "race".into() }
        );
        assert!(results.try_recv().is_err());
    }
}
