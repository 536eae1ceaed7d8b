//! Attribute accessors.
//!
//! A [`ReadHandle`] is bound to one slot of a data block and projects the
//! committed record into a [`Value`]. Every call samples the last committed
//! snapshot, so a reader never sees a record that is being staged.
//!
//! A [`WriteHandle`] wraps the owner's write path for writable attributes.
//! The owner decides what a write means; for outputs it queues a pending
//! value for the next write cycle.

use core::fmt;
use std::sync::Arc;

use batchio_common::data::Value;
use batchio_common::model::Attribute;

use crate::block::{DataBlock, Snapshot};
use crate::error::AccessError;
use crate::layout::SlotHandle;

type Projection = dyn Fn(&Snapshot) -> Option<Value> + Send + Sync;
type Writer = dyn Fn(Value) -> Result<(), AccessError> + Send + Sync;

/// Read accessor for one attribute.
#[derive(Clone)]
pub struct ReadHandle {
    attribute: Attribute,
    block: Arc<DataBlock>,
    project: Arc<Projection>,
}

impl ReadHandle {
    /// Bind `attribute` to `slot` of `block`.
    ///
    /// `project` extracts the attribute from the slot record.
    pub fn new<R, F>(attribute: Attribute, block: Arc<DataBlock>, slot: SlotHandle<R>, project: F) -> Self
    where
        R: 'static,
        F: Fn(&R) -> Value + Send + Sync + 'static,
    {
        Self {
            attribute,
            block,
            project: Arc::new(move |snapshot: &Snapshot| snapshot.get(slot).map(&project)),
        }
    }

    /// Attribute this handle reads.
    #[inline]
    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    /// Block the attribute lives in.
    #[inline]
    pub fn block(&self) -> &Arc<DataBlock> {
        &self.block
    }

    /// Current committed value.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::NotRealized`] if the block has not been
    /// created yet.
    pub fn read(&self) -> Result<Value, AccessError> {
        self.read_from(&self.block.snapshot())
    }

    /// Value as of `snapshot`.
    ///
    /// Reading several handles of one block from the same snapshot yields
    /// values of a single committed version.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::NotRealized`] if the snapshot has no record
    /// for this attribute.
    pub fn read_from(&self, snapshot: &Snapshot) -> Result<Value, AccessError> {
        (self.project)(snapshot).ok_or(AccessError::NotRealized)
    }
}

impl fmt::Debug for ReadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadHandle")
            .field("attribute", &self.attribute.name())
            .field("block", &self.block.name())
            .finish()
    }
}

/// Write accessor for one writable attribute.
#[derive(Clone)]
pub struct WriteHandle {
    attribute: Attribute,
    write: Arc<Writer>,
}

impl WriteHandle {
    /// Wrap the owner's write path.
    pub fn new<F>(attribute: Attribute, write: F) -> Self
    where
        F: Fn(Value) -> Result<(), AccessError> + Send + Sync + 'static,
    {
        Self {
            attribute,
            write: Arc::new(write),
        }
    }

    /// Attribute this handle writes.
    #[inline]
    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    /// Submit a value.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::TypeMismatch`] if `value` does not have the
    /// attribute's type.
    pub fn write(&self, value: impl Into<Value>) -> Result<(), AccessError> {
        (self.write)(value.into())
    }
}

impl fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteHandle")
            .field("attribute", &self.attribute.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DataArray;
    use crate::pending::PendingEventList;
    use batchio_common::data::DataType;
    use batchio_common::model::{Access, attributes};
    use parking_lot::Mutex;
    use std::time::SystemTime;

    #[derive(Clone, Default)]
    struct Record {
        value: i32,
        changes: u32,
    }

    #[test]
    fn read_handle_follows_commits() {
        let mut array = DataArray::new();
        let slot = array.add(Record::default());
        let block = Arc::new(DataBlock::new("handles"));
        let attribute = attributes::value(DataType::Int32, Access::ReadOnly);
        let handle = ReadHandle::new(attribute, Arc::clone(&block), slot, |r: &Record| {
            Value::Int32(r.value)
        });

        assert_eq!(handle.read(), Err(AccessError::NotRealized));

        block.create(array);
        assert_eq!(handle.read(), Ok(Value::Int32(0)));

        let mut sentinel = block.open();
        let record = sentinel.get_mut(slot);
        record.value = 7;
        record.changes += 1;
        assert_eq!(handle.read(), Ok(Value::Int32(0)));
        sentinel.commit(SystemTime::now(), &mut PendingEventList::new());

        assert_eq!(handle.read(), Ok(Value::Int32(7)));
        assert_eq!(handle.attribute().name(), "value");
    }

    #[test]
    fn write_handle_forwards_to_owner() {
        let pending = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&pending);
        let handle = WriteHandle::new(
            attributes::value(DataType::Bool, Access::ReadWrite),
            move |value| match value {
                Value::Bool(flag) => {
                    *sink.lock() = Some(flag);
                    Ok(())
                }
                other => Err(AccessError::TypeMismatch {
                    expected: DataType::Bool,
                    actual: other.data_type(),
                }),
            },
        );

        assert_eq!(handle.write(true), Ok(()));
        assert_eq!(*pending.lock(), Some(true));
        assert!(matches!(
            handle.write(3u8),
            Err(AccessError::TypeMismatch { actual: Some(DataType::Uint8), .. })
        ));
    }
}
