//! Buffers bridge events until the UI runtime can receive them.

use std::collections::VecDeque;

use assist_protocol::EventEnvelope;
use tracing::{debug, warn};

pub struct EventOutbox {
    queue: VecDeque<EventEnvelope>,
    limit: usize,
    ready: bool,
}

impl EventOutbox {
    pub fn new(limit: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            limit: (limit as usize).max(1),
            ready: false,
        }
    }

    /// Queues an event. While the UI is not ready the queue is bounded and
    /// the oldest event is dropped on overflow.
    pub fn push(&mut self, envelope: EventEnvelope) {
        if !self.ready {
            while self.queue.len() >= self.limit {
                if let Some(dropped) = self.queue.pop_front() {
                    warn!(
                        event = dropped.event.name(),
                        owner = dropped.event.owner_id(),
                        limit = self.limit,
                        "Dropping buffered bridge event"
                    );
                }
            }
        }
        self.queue.push_back(envelope);
    }

    pub fn set_ready(&mut self, ready: bool) {
        if self.ready != ready {
            debug!(ready, buffered = self.queue.len(), "UI bridge readiness changed");
        }
        self.ready = ready;
    }

    /// Events deliverable now. Empty while the UI is not ready.
    pub fn drain(&mut self) -> Vec<EventEnvelope> {
        if !self.ready {
            return Vec::new();
        }
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assist_protocol::BridgeEvent;
    use chrono::Utc;

    fn hidden(owner: &str) -> EventEnvelope {
        EventEnvelope::new(
            BridgeEvent::Hidden {
                owner_id: owner.to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn holds_events_until_ready() {
        let mut outbox = EventOutbox::new(8);
        outbox.push(hidden("a"));
        assert!(outbox.drain().is_empty());
        assert_eq!(outbox.len(), 1);

        outbox.set_ready(true);
        let drained = outbox.drain();
        assert_eq!(drained.len(), 1);
        assert!(outbox.is_empty());
    }

    #[test]
    fn drops_oldest_when_full() {
        let mut outbox = EventOutbox::new(2);
        for owner in ["a", "b", "c"] {
            outbox.push(hidden(owner));
        }
        outbox.set_ready(true);

        let owners: Vec<_> = outbox
            .drain()
            .into_iter()
            .map(|e| e.event.owner_id().to_string())
            .collect();
        assert_eq!(owners, vec!["b", "c"]);
    }

    #[test]
    fn zero_limit_still_keeps_latest() {
        let mut outbox = EventOutbox::new(0);
        outbox.push(hidden("a"));
        outbox.push(hidden("b"));
        assert_eq!(outbox.len(), 1);
    }
}
