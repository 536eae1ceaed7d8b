//! Scoped write transactions on a data block.
//!
//! A [`WriteSentinel`] owns a private copy of the block's records. Changes
//! made through it are invisible until [`WriteSentinel::commit`], which
//! publishes the copy as the next version and then fires the queued
//! events. Dropping a sentinel without committing discards the copy: the
//! block keeps its previous version and no event fires.
//!
//! The pending event list belongs to the caller. An abandoned sentinel
//! never sees it, so events queued during the aborted cycle stay queued
//! until the caller clears the list.

use std::time::SystemTime;
use tracing::{trace, warn};

use crate::block::{DataBlock, Snapshot};
use crate::layout::SlotHandle;
use crate::pending::PendingEventList;

/// Exclusive staging handle for one data block.
#[must_use = "dropping a write sentinel without committing discards all staged changes"]
pub struct WriteSentinel<'a> {
    block: &'a DataBlock,
    staged: Option<Snapshot>,
    version: u64,
}

impl<'a> WriteSentinel<'a> {
    pub(crate) fn new(block: &'a DataBlock, staged: Snapshot, version: u64) -> Self {
        Self {
            block,
            staged: Some(staged),
            version,
        }
    }

    /// The block this sentinel writes to.
    #[inline]
    pub fn block(&self) -> &'a DataBlock {
        self.block
    }

    /// Staged record. Before it is modified this is the committed value.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not part of this block's layout.
    pub fn get<R: 'static>(&self, handle: SlotHandle<R>) -> &R {
        match self.staged.as_ref().and_then(|staged| staged.get(handle)) {
            Some(record) => record,
            None => self.missing_slot(handle.index()),
        }
    }

    /// Mutable access to a staged record.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not part of this block's layout.
    pub fn get_mut<R: 'static>(&mut self, handle: SlotHandle<R>) -> &mut R {
        let block = self.block;
        match self.staged.as_mut().and_then(|staged| staged.get_mut(handle)) {
            Some(record) => record,
            None => panic!(
                "internal error: slot {} is not part of data block '{}'",
                handle.index(),
                block.name()
            ),
        }
    }

    /// Publish the staged records, then fire and clear `events`.
    ///
    /// Events fire in list order after the new version is visible to
    /// readers, so a listener that reads the block sees the values the
    /// event refers to.
    pub fn commit(mut self, timestamp: SystemTime, events: &mut PendingEventList) {
        let Some(mut staged) = self.staged.take() else {
            return;
        };
        staged.set_stamp(self.version, timestamp);
        self.block.publish(staged);
        trace!(
            block = self.block.name(),
            version = self.version,
            events = events.len(),
            "committed"
        );
        events.release(timestamp);
    }

    fn missing_slot(&self, index: usize) -> ! {
        panic!(
            "internal error: slot {index} is not part of data block '{}'",
            self.block.name()
        )
    }
}

impl Drop for WriteSentinel<'_> {
    fn drop(&mut self) {
        if self.staged.take().is_some() {
            self.block.abandon();
            warn!(
                block = self.block.name(),
                "write sentinel dropped without commit, staged changes discarded"
            );
        }
    }
}
