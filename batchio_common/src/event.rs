//! Change notification events.
//!
//! An `Event` is owned by the handler or status object that raises it.
//! Cloning yields another handle to the same event (same [`EventId`]),
//! which is how pending event lists hold on to events between staging and
//! commit without borrowing from their owners.

use core::fmt;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::trace;

use crate::data::Direction;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    /// Raw identifier.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Data passed to event listeners.
#[derive(Debug, Clone, Copy)]
pub struct EventNotice {
    /// Event name
    pub name: &'static str,
    /// Event direction
    pub direction: Direction,
    /// Time stamp of the commit that raised the event
    pub timestamp: SystemTime,
}

type Listener = Box<dyn Fn(&EventNotice) + Send + Sync>;

struct EventInner {
    id: EventId,
    name: &'static str,
    direction: Direction,
    fired: AtomicU64,
    listeners: RwLock<Vec<Listener>>,
}

/// A named notification raised after a state block commit.
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    /// Create a new event with a fresh identity.
    pub fn new(name: &'static str, direction: Direction) -> Self {
        Self {
            inner: Arc::new(EventInner {
                id: EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed)),
                name,
                direction,
                fired: AtomicU64::new(0),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Event identity. Clones share it.
    #[inline]
    pub fn id(&self) -> EventId {
        self.inner.id
    }

    /// Event name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Event direction.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    /// Number of times the event has fired.
    pub fn fire_count(&self) -> u64 {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Register a listener.
    ///
    /// Listeners run synchronously on the thread that commits the state
    /// block. They must not subscribe to the same event from inside the
    /// callback.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&EventNotice) + Send + Sync + 'static,
    {
        self.inner.listeners.write().push(Box::new(listener));
    }

    /// Fire the event.
    ///
    /// Only state block commits should call this; everything else enqueues
    /// events into a pending event list.
    pub fn fire(&self, timestamp: SystemTime) {
        self.inner.fired.fetch_add(1, Ordering::AcqRel);
        let notice = EventNotice {
            name: self.inner.name,
            direction: self.inner.direction,
            timestamp,
        };
        trace!(event = notice.name, id = self.inner.id.0, "firing event");
        for listener in self.inner.listeners.read().iter() {
            listener(&notice);
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Event {}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.inner.id.0)
            .field("name", &self.inner.name)
            .field("direction", &self.inner.direction)
            .field("fired", &self.fire_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn clones_share_identity() {
        let event = Event::new("changed", Direction::Input);
        let clone = event.clone();
        assert_eq!(event, clone);
        assert_eq!(event.id(), clone.id());

        let other = Event::new("changed", Direction::Input);
        assert_ne!(event, other);
    }

    #[test]
    fn fire_notifies_listeners() {
        let event = Event::new("written", Direction::Output);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        event.subscribe(move |notice| {
            assert_eq!(notice.name, "written");
            assert_eq!(notice.direction, Direction::Output);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        event.fire(SystemTime::now());
        event.clone().fire(SystemTime::now());

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(event.fire_count(), 2);
    }
}
