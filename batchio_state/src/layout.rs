//! Slot layout of a data block.
//!
//! A [`DataArray`] collects one record per attached object while a
//! transaction is being realized. Each registration returns a typed
//! [`SlotHandle`] that stays valid for the lifetime of the block created
//! from the array. Slots are append-only; once the array is turned into a
//! block the layout is fixed.

use core::fmt;
use core::marker::PhantomData;
use std::any::Any;

/// A record stored in a data block slot.
///
/// Implemented for every `Clone + Send + Sync + 'static` type. Records are
/// type-erased inside the block and recovered through [`SlotHandle`].
pub trait SlotRecord: Any + Send + Sync {
    /// Clone into a new boxed record.
    fn clone_record(&self) -> Box<dyn SlotRecord>;

    /// Overwrite `target` with a copy of `self`, reusing its allocations.
    ///
    /// Returns `false` if `target` holds a different record type.
    fn copy_into(&self, target: &mut dyn SlotRecord) -> bool;

    /// Upcast for downcasting by reference.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for downcasting by mutable reference.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Clone + Send + Sync> SlotRecord for T {
    fn clone_record(&self) -> Box<dyn SlotRecord> {
        Box::new(self.clone())
    }

    fn copy_into(&self, target: &mut dyn SlotRecord) -> bool {
        match target.as_any_mut().downcast_mut::<T>() {
            Some(target) => {
                target.clone_from(self);
                true
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Typed reference to one slot of a data block.
pub struct SlotHandle<R> {
    index: usize,
    _marker: PhantomData<fn() -> R>,
}

impl<R> SlotHandle<R> {
    /// Position of the slot in the layout.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<R> Clone for SlotHandle<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for SlotHandle<R> {}

impl<R> PartialEq for SlotHandle<R> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<R> Eq for SlotHandle<R> {}

impl<R> fmt::Debug for SlotHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotHandle({})", self.index)
    }
}

/// Layout builder for a data block.
#[derive(Default)]
pub struct DataArray {
    records: Vec<Box<dyn SlotRecord>>,
}

impl DataArray {
    /// Create an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot holding `initial` and return its handle.
    pub fn add<R: SlotRecord + Clone>(&mut self, initial: R) -> SlotHandle<R> {
        self.records.push(Box::new(initial));
        SlotHandle {
            index: self.records.len() - 1,
            _marker: PhantomData,
        }
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no slot has been added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn into_records(self) -> Vec<Box<dyn SlotRecord>> {
        self.records
    }
}

impl fmt::Debug for DataArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataArray")
            .field("slots", &self.records.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_follow_registration_order() {
        let mut array = DataArray::new();
        let a = array.add(1u32);
        let b = array.add(String::from("x"));
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn copy_into_checks_record_type() {
        let source: Box<dyn SlotRecord> = Box::new(String::from("new"));
        let mut same: Box<dyn SlotRecord> = Box::new(String::from("old"));
        let mut other: Box<dyn SlotRecord> = Box::new(7u8);

        assert!(source.copy_into(same.as_mut()));
        assert_eq!(same.as_any().downcast_ref::<String>().unwrap(), "new");
        assert!(!source.copy_into(other.as_mut()));
    }
}
