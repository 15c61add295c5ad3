use std::collections::VecDeque;
use std::time::Duration;

use alertstream_event::DecodedEvent;
use tokio::time::Instant;

/// Entries kept regardless of the window.
pub const DEFAULT_DEDUP_CAPACITY: usize = 256;

/// What makes two identity events the same event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKey {
    /// The device's own event sequence number.
    Serial(String),
    /// Fallback when no serial number is present.
    Identity { employee_no: String, name: String },
}

impl EventKey {
    /// Key for a target event.
    pub fn of(event: &DecodedEvent) -> Self {
        match &event.serial_no {
            Some(serial) => EventKey::Serial(serial.clone()),
            None => EventKey::Identity {
                employee_no: event.identity_id.clone().unwrap_or_default(),
                name: event.identity_name.clone().unwrap_or_default(),
            },
        }
    }
}

/// Bounded set of recently forwarded events.
///
/// Best effort only: an event is suppressed when the same key was seen
/// within `window`, and at most `capacity` keys are remembered. A zero
/// window disables suppression.
#[derive(Debug, Clone)]
pub struct RecentEvents {
    window: Duration,
    capacity: usize,
    entries: VecDeque<(EventKey, Instant)>,
}

impl RecentEvents {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Record `key` as seen at `now`. Returns false if it is a repeat.
    pub fn observe(&mut self, key: EventKey, now: Instant) -> bool {
        if self.window.is_zero() {
            return true;
        }

        while let Some((_, seen)) = self.entries.front() {
            if now.saturating_duration_since(*seen) < self.window {
                break;
            }
            self.entries.pop_front();
        }

        if self.entries.iter().any(|(seen, _)| *seen == key) {
            return false;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((key, now));
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
