//! Events queued for the next commit.

use batchio_common::event::Event;
use std::time::SystemTime;
use tracing::{trace, warn};

/// Ordered, duplicate-free list of events to fire after a commit.
///
/// The list is reused across cycles. Capacity is reserved once from the
/// number of attached objects so the steady state does not allocate.
#[derive(Debug, Default)]
pub struct PendingEventList {
    events: Vec<Event>,
    budget: usize,
}

impl PendingEventList {
    /// Empty list without a reserved budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty list with room for `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            budget: capacity,
        }
    }

    /// Drop queued events and reserve room for `capacity` events.
    pub fn reset(&mut self, capacity: usize) {
        self.events.clear();
        self.events.reserve(capacity);
        self.budget = capacity;
    }

    /// Queue `event` unless it is already queued.
    ///
    /// Returns `true` if the event was added.
    pub fn push(&mut self, event: &Event) -> bool {
        if self.contains(event) {
            return false;
        }
        if self.events.len() == self.budget {
            warn!(
                event = event.name(),
                budget = self.budget,
                "pending event budget exceeded, growing list"
            );
            self.budget += 1;
        }
        self.events.push(event.clone());
        true
    }

    /// Whether `event` is queued.
    pub fn contains(&self, event: &Event) -> bool {
        self.events.iter().any(|queued| queued.id() == event.id())
    }

    /// Number of queued events.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Reserved capacity.
    #[inline]
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Queued events in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Discard queued events without firing them.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Fire every queued event in order, then clear the list.
    pub fn release(&mut self, timestamp: SystemTime) {
        if self.events.is_empty() {
            return;
        }
        trace!(count = self.events.len(), "releasing pending events");
        for event in self.events.drain(..) {
            event.fire(timestamp);
        }
    }
}
