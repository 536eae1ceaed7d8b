//! Versioned data blocks.
//!
//! A `DataBlock` publishes immutable [`Snapshot`]s. Readers clone the
//! current `Arc<Snapshot>` and never block on a writer for longer than that
//! pointer copy. The single writer stages a private copy through a
//! [`WriteSentinel`] and swaps it in on commit, so every slot a reader sees
//! comes from the same committed version.
//!
//! The snapshot retired by a commit is kept as a spare. The next writer
//! reuses its allocations if no reader still holds it, which makes the
//! steady state a double buffer.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::layout::{DataArray, SlotHandle, SlotRecord};
use crate::sentinel::WriteSentinel;
use crate::version::VersionCounter;

/// One committed version of a data block.
pub struct Snapshot {
    version: u64,
    timestamp: SystemTime,
    records: Vec<Box<dyn SlotRecord>>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            version: 0,
            timestamp: UNIX_EPOCH,
            records: Vec::new(),
        }
    }

    /// Version this snapshot was committed as. Always even.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Time stamp passed to the commit that published this snapshot.
    #[inline]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot has no slots (block not created yet).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record in the given slot.
    ///
    /// Returns `None` if the slot does not exist in this snapshot or holds a
    /// different record type.
    pub fn get<R: 'static>(&self, handle: SlotHandle<R>) -> Option<&R> {
        let record: &dyn SlotRecord = &**self.records.get(handle.index())?;
        record.as_any().downcast_ref()
    }

    pub(crate) fn get_mut<R: 'static>(&mut self, handle: SlotHandle<R>) -> Option<&mut R> {
        let record: &mut dyn SlotRecord = &mut **self.records.get_mut(handle.index())?;
        record.as_any_mut().downcast_mut()
    }

    pub(crate) fn set_stamp(&mut self, version: u64, timestamp: SystemTime) {
        self.version = version;
        self.timestamp = timestamp;
    }

    /// Overwrite with `other`, reusing record allocations where the layout
    /// matches.
    fn copy_from(&mut self, other: &Snapshot) {
        self.version = other.version;
        self.timestamp = other.timestamp;
        if self.records.len() != other.records.len() {
            self.records = clone_records(&other.records);
            return;
        }
        for (target, source) in self.records.iter_mut().zip(&other.records) {
            let source: &dyn SlotRecord = &**source;
            if !source.copy_into(&mut **target) {
                *target = source.clone_record();
            }
        }
    }
}

impl Clone for Snapshot {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            timestamp: self.timestamp,
            records: clone_records(&self.records),
        }
    }
}

fn clone_records(records: &[Box<dyn SlotRecord>]) -> Vec<Box<dyn SlotRecord>> {
    records
        .iter()
        .map(|record| {
            let record: &dyn SlotRecord = &**record;
            record.clone_record()
        })
        .collect()
}

impl core::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Snapshot")
            .field("version", &self.version)
            .field("timestamp", &self.timestamp)
            .field("slots", &self.records.len())
            .finish()
    }
}

/// A versioned state block with a single writer and any number of readers.
pub struct DataBlock {
    name: String,
    version: VersionCounter,
    current: RwLock<Arc<Snapshot>>,
    spare: Mutex<Option<Arc<Snapshot>>>,
    created: AtomicBool,
}

impl DataBlock {
    /// Create a block with no slots.
    ///
    /// The layout is supplied later by [`DataBlock::create`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: VersionCounter::new(),
            current: RwLock::new(Arc::new(Snapshot::empty())),
            spare: Mutex::new(None),
            created: AtomicBool::new(false),
        }
    }

    /// Block name, used in log output.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fix the layout and publish the initial records as version 0.
    ///
    /// # Panics
    ///
    /// Panics if the block was already created. The layout is final.
    pub fn create(&self, array: DataArray) {
        if self.created.swap(true, Ordering::AcqRel) {
            panic!("internal error: data block '{}' created twice", self.name);
        }
        let slots = array.len();
        *self.current.write() = Arc::new(Snapshot {
            version: self.version.load(),
            timestamp: UNIX_EPOCH,
            records: array.into_records(),
        });
        debug!(block = %self.name, slots, "data block created");
    }

    /// Whether [`DataBlock::create`] has run.
    #[inline]
    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }

    /// The last committed snapshot.
    #[inline]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Current version. Odd while a write sentinel is open.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load()
    }

    /// Whether a commit happened since `last_seen` was observed.
    pub fn has_changed(&self, last_seen: u64) -> bool {
        let current = self.version.load();
        VersionCounter::is_stable(current) && current != last_seen
    }

    /// Read one record from the last committed snapshot.
    pub fn read<R: 'static, O>(&self, handle: SlotHandle<R>, f: impl FnOnce(&R) -> O) -> Option<O> {
        let snapshot = self.current.read();
        snapshot.get(handle).map(f)
    }

    /// Open the write sentinel.
    ///
    /// # Panics
    ///
    /// Panics if a sentinel is already open on this block. Callers must
    /// serialize writers.
    pub fn open(&self) -> WriteSentinel<'_> {
        let Some(writing) = self.version.try_begin_write() else {
            panic!(
                "internal error: write sentinel opened on data block '{}' while another is open",
                self.name
            );
        };

        let current = self.snapshot();
        let recycled = self
            .spare
            .lock()
            .take()
            .and_then(|spare| Arc::try_unwrap(spare).ok());
        let staged = match recycled {
            Some(mut snapshot) => {
                snapshot.copy_from(&current);
                snapshot
            }
            None => (*current).clone(),
        };

        WriteSentinel::new(self, staged, writing + 1)
    }

    pub(crate) fn publish(&self, snapshot: Snapshot) {
        let retired = {
            let mut current = self.current.write();
            std::mem::replace(&mut *current, Arc::new(snapshot))
        };
        self.version.end_write();
        *self.spare.lock() = Some(retired);
    }

    pub(crate) fn abandon(&self) {
        self.version.abort_write();
    }
}

impl core::fmt::Debug for DataBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DataBlock")
            .field("name", &self.name)
            .field("version", &self.version.load())
            .field("created", &self.is_created())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::PendingEventList;

    fn block_with_two_slots() -> (DataBlock, SlotHandle<u32>, SlotHandle<String>) {
        let mut array = DataArray::new();
        let a = array.add(1u32);
        let b = array.add(String::from("one"));
        let block = DataBlock::new("test");
        block.create(array);
        (block, a, b)
    }

    #[test]
    fn initial_records_are_visible() {
        let (block, a, b) = block_with_two_slots();
        let snapshot = block.snapshot();
        assert_eq!(snapshot.get(a), Some(&1));
        assert_eq!(snapshot.get(b).map(String::as_str), Some("one"));
        assert_eq!(snapshot.version(), 0);
    }

    #[test]
    fn commit_publishes_next_even_version() {
        let (block, a, _) = block_with_two_slots();
        let mut events = PendingEventList::new();

        let mut sentinel = block.open();
        assert_eq!(block.version(), 1);
        *sentinel.get_mut(a) = 5;
        sentinel.commit(SystemTime::now(), &mut events);

        assert_eq!(block.version(), 2);
        assert_eq!(block.snapshot().version(), 2);
        assert_eq!(block.read(a, |v| *v), Some(5));
        assert!(block.has_changed(0));
        assert!(!block.has_changed(2));
    }

    #[test]
    fn spare_snapshot_is_recycled_when_unshared() {
        let (block, a, _) = block_with_two_slots();
        let mut events = PendingEventList::new();

        for value in 2..6u32 {
            let mut sentinel = block.open();
            *sentinel.get_mut(a) = value;
            sentinel.commit(SystemTime::now(), &mut events);
        }
        assert_eq!(block.read(a, |v| *v), Some(5));
        assert_eq!(block.version(), 8);
    }

    #[test]
    fn readers_holding_old_snapshot_keep_old_values() {
        let (block, a, b) = block_with_two_slots();
        let mut events = PendingEventList::new();
        let before = block.snapshot();

        let mut sentinel = block.open();
        *sentinel.get_mut(a) = 9;
        sentinel.get_mut(b).push_str("-changed");
        sentinel.commit(SystemTime::now(), &mut events);

        assert_eq!(before.get(a), Some(&1));
        assert_eq!(before.get(b).map(String::as_str), Some("one"));
        let after = block.snapshot();
        assert_eq!(after.get(a), Some(&9));
        assert_eq!(after.get(b).map(String::as_str), Some("one-changed"));
    }

    #[test]
    #[should_panic(expected = "created twice")]
    fn create_twice_panics() {
        let block = DataBlock::new("twice");
        block.create(DataArray::new());
        block.create(DataArray::new());
    }

    #[test]
    #[should_panic(expected = "while another is open")]
    fn second_sentinel_panics() {
        let (block, _, _) = block_with_two_slots();
        let _first = block.open();
        let _second = block.open();
    }

    #[test]
    fn missing_slot_reads_as_none() {
        let block = DataBlock::new("empty");
        let mut array = DataArray::new();
        let foreign = array.add(0u8);
        assert_eq!(block.read(foreign, |v| *v), None);
    }
}
