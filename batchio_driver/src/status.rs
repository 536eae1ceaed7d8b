//! Common read and write status of a transaction.
//!
//! Every transaction keeps one [`CommonStatus`] per side. It records the
//! time and error of the last cycle, shared by all points of the batch,
//! and raises the side's "ok" and "error" events on transitions.

use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use batchio_common::data::{Direction, Value};
use batchio_common::error::IoError;
use batchio_common::event::Event;
use batchio_common::model::{Attribute, TaskRole, attributes, events};
use batchio_state::{DataArray, DataBlock, PendingEventList, ReadHandle, SlotHandle, WriteSentinel};
use bitflags::bitflags;
use tracing::warn;

bitflags! {
    /// Parts of the common status that changed in an update.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommonChanges: u8 {
        /// The time stamp advanced.
        const TIMESTAMP = 1 << 0;
        /// The error differs from the previously committed one.
        const ERROR = 1 << 1;
    }
}

/// Record stored in the status slot of a data block.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    /// Time of the last cycle. `UNIX_EPOCH` until the first cycle.
    pub timestamp: SystemTime,
    /// Error of the last cycle.
    pub error: Option<IoError>,
}

/// Transaction-wide status of one side.
pub struct CommonStatus {
    role: TaskRole,
    time_attribute: Attribute,
    error_attribute: Attribute,
    ok_event: Event,
    error_event: Event,
    initial_error: Option<IoError>,
    slot: OnceLock<SlotHandle<StatusRecord>>,
}

impl CommonStatus {
    /// Status of the read side.
    ///
    /// Starts out as `NoData`, so the first successful read raises
    /// `readOk`.
    pub fn read_side() -> Self {
        Self {
            role: TaskRole::Read,
            time_attribute: attributes::READ_TIME,
            error_attribute: attributes::READ_ERROR,
            ok_event: Event::new(events::READ_OK, Direction::Input),
            error_event: Event::new(events::READ_ERROR, Direction::Input),
            initial_error: Some(IoError::NoData),
            slot: OnceLock::new(),
        }
    }

    /// Status of the write side.
    ///
    /// Starts out without an error: never having written is not a failure.
    pub fn write_side() -> Self {
        Self {
            role: TaskRole::Write,
            time_attribute: attributes::WRITE_TIME,
            error_attribute: attributes::WRITE_ERROR,
            ok_event: Event::new(events::WRITE_OK, Direction::Output),
            error_event: Event::new(events::WRITE_ERROR, Direction::Output),
            initial_error: None,
            slot: OnceLock::new(),
        }
    }

    /// Side this status belongs to.
    #[inline]
    pub fn role(&self) -> TaskRole {
        self.role
    }

    /// Event raised when the side recovers from an error.
    #[inline]
    pub fn ok_event(&self) -> &Event {
        &self.ok_event
    }

    /// Event raised when the side starts failing or fails differently.
    #[inline]
    pub fn error_event(&self) -> &Event {
        &self.error_event
    }

    /// Look up an attribute by name.
    pub fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        [self.time_attribute, self.error_attribute]
            .into_iter()
            .find(|attribute| attribute.name() == name)
    }

    /// Look up an event by name.
    pub fn resolve_event(&self, name: &str) -> Option<&Event> {
        [&self.ok_event, &self.error_event]
            .into_iter()
            .find(|event| event.name() == name)
    }

    /// Visit every attribute.
    pub fn for_each_attribute(
        &self,
        f: &mut dyn FnMut(&Attribute) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        f(&self.time_attribute)?;
        f(&self.error_attribute)
    }

    /// Visit every event.
    pub fn for_each_event(&self, f: &mut dyn FnMut(&Event) -> ControlFlow<()>) -> ControlFlow<()> {
        f(&self.ok_event)?;
        f(&self.error_event)
    }

    /// Register the status slot and its event budget.
    ///
    /// # Panics
    ///
    /// Panics if the status was already attached.
    pub fn attach(&self, array: &mut DataArray, event_budget: &mut usize) {
        let handle = array.add(StatusRecord {
            timestamp: UNIX_EPOCH,
            error: self.initial_error,
        });
        if self.slot.set(handle).is_err() {
            panic!("internal error: {} status attached twice", self.role);
        }
        // Either the ok or the error event, never both.
        *event_budget += 1;
    }

    /// Slot of the status record, once attached.
    #[inline]
    pub fn slot(&self) -> Option<SlotHandle<StatusRecord>> {
        self.slot.get().copied()
    }

    /// Read accessor for one of the status attributes.
    ///
    /// Returns `None` for foreign attributes and before [`attach`](Self::attach).
    pub fn make_read_handle(&self, block: &Arc<DataBlock>, attribute: &Attribute) -> Option<ReadHandle> {
        let slot = self.slot()?;
        let block = Arc::clone(block);
        if attribute.name() == self.time_attribute.name() {
            Some(ReadHandle::new(self.time_attribute, block, slot, |record: &StatusRecord| {
                Value::Timestamp(record.timestamp)
            }))
        } else if attribute.name() == self.error_attribute.name() {
            Some(ReadHandle::new(self.error_attribute, block, slot, |record: &StatusRecord| {
                Value::Error(record.error)
            }))
        } else {
            None
        }
    }

    /// Record the outcome of a cycle and enqueue the transition event.
    ///
    /// A time stamp older than the committed one is clamped so the status
    /// time never goes backwards.
    ///
    /// # Panics
    ///
    /// Panics if the status was never attached.
    pub fn update(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: SystemTime,
        error: Option<IoError>,
        events: &mut PendingEventList,
    ) -> CommonChanges {
        let Some(slot) = self.slot() else {
            panic!("internal error: {} status updated before it was attached", self.role);
        };
        let record = sentinel.get_mut(slot);
        let mut changes = CommonChanges::empty();

        let timestamp = if timestamp < record.timestamp {
            warn!(
                role = %self.role,
                "cycle time stamp is older than the last committed one, clamping"
            );
            record.timestamp
        } else {
            timestamp
        };
        if timestamp != record.timestamp {
            changes |= CommonChanges::TIMESTAMP;
        }
        record.timestamp = timestamp;

        if error != record.error {
            changes |= CommonChanges::ERROR;
            if error.is_some() {
                events.push(&self.error_event);
            } else {
                events.push(&self.ok_event);
            }
            record.error = error;
        }

        changes
    }
}

impl core::fmt::Debug for CommonStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommonStatus")
            .field("role", &self.role)
            .field("attached", &self.slot.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn attached(status: &CommonStatus) -> Arc<DataBlock> {
        let mut array = DataArray::new();
        let mut budget = 0;
        status.attach(&mut array, &mut budget);
        assert_eq!(budget, 1);
        let block = Arc::new(DataBlock::new("status"));
        block.create(array);
        block
    }

    fn cycle(
        status: &CommonStatus,
        block: &DataBlock,
        at: SystemTime,
        error: Option<IoError>,
    ) -> (CommonChanges, Vec<&'static str>) {
        let mut events = PendingEventList::with_capacity(1);
        let mut sentinel = block.open();
        let changes = status.update(&mut sentinel, at, error, &mut events);
        let names = events.iter().map(Event::name).collect();
        sentinel.commit(at, &mut events);
        (changes, names)
    }

    #[test]
    fn read_side_transitions() {
        let status = CommonStatus::read_side();
        let block = attached(&status);
        let t0 = SystemTime::now();
        let t = |s| t0 + Duration::from_secs(s);

        // NoData -> ok
        let (changes, names) = cycle(&status, &block, t(1), None);
        assert_eq!(names, ["readOk"]);
        assert!(changes.contains(CommonChanges::ERROR | CommonChanges::TIMESTAMP));

        // ok -> ok
        let (changes, names) = cycle(&status, &block, t(2), None);
        assert!(names.is_empty());
        assert_eq!(changes, CommonChanges::TIMESTAMP);

        // ok -> error
        let (_, names) = cycle(&status, &block, t(3), Some(IoError::device(5)));
        assert_eq!(names, ["readError"]);

        // same error again
        let (changes, names) = cycle(&status, &block, t(4), Some(IoError::device(5)));
        assert!(names.is_empty());
        assert!(!changes.contains(CommonChanges::ERROR));

        // different error
        let (_, names) = cycle(&status, &block, t(5), Some(IoError::NoData));
        assert_eq!(names, ["readError"]);

        // error -> ok
        let (_, names) = cycle(&status, &block, t(6), None);
        assert_eq!(names, ["readOk"]);
    }

    #[test]
    fn write_side_starts_without_error() {
        let status = CommonStatus::write_side();
        let block = attached(&status);
        let (_, names) = cycle(&status, &block, SystemTime::now(), None);
        assert!(names.is_empty());
    }

    #[test]
    fn timestamp_never_goes_backwards() {
        let status = CommonStatus::read_side();
        let block = attached(&status);
        let later = SystemTime::now();
        let earlier = later - Duration::from_secs(10);
        let slot = status.slot().unwrap();

        cycle(&status, &block, later, None);
        let (changes, _) = cycle(&status, &block, earlier, None);
        assert!(!changes.contains(CommonChanges::TIMESTAMP));
        assert_eq!(block.read(slot, |r| r.timestamp), Some(later));
    }

    #[test]
    fn handles_resolve_by_name() {
        let status = CommonStatus::read_side();
        let block = attached(&status);
        assert!(status.resolve_attribute("readTime").is_some());
        assert!(status.resolve_attribute("writeTime").is_none());
        assert_eq!(status.resolve_event("readError").map(Event::name), Some("readError"));

        let handle = status.make_read_handle(&block, &attributes::READ_ERROR).unwrap();
        assert_eq!(handle.read(), Ok(Value::Error(Some(IoError::NoData))));
        assert!(status.make_read_handle(&block, &attributes::WRITE_TIME).is_none());
    }

    #[test]
    #[should_panic(expected = "attached twice")]
    fn attach_twice_panics() {
        let status = CommonStatus::write_side();
        let mut array = DataArray::new();
        let mut budget = 0;
        status.attach(&mut array, &mut budget);
        status.attach(&mut array, &mut budget);
    }
}
