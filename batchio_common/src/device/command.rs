//! Read and write command types.
//!
//! A read command lists the device items a transaction reads in one cycle.
//! The payload mirrors that list: entry `i` of the payload holds the encoded
//! bytes for entry `i` of the command, or nothing if the device could not
//! supply that item.

use crate::data::DataType;

/// One item requested by a read command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadEntry {
    /// Device item address
    pub address: u32,
    /// Expected scalar type
    pub data_type: DataType,
}

/// Read command template built once per transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadCommand {
    entries: Vec<ReadEntry>,
}

impl ReadCommand {
    /// Create an empty command with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Append an entry and return its index in the payload.
    pub fn push(&mut self, entry: ReadEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Requested entries, in payload order.
    #[inline]
    pub fn entries(&self) -> &[ReadEntry] {
        &self.entries
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the command requests nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Data returned by a successful read command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadPayload {
    fields: Vec<Option<Vec<u8>>>,
}

impl ReadPayload {
    /// Create an empty payload with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Append the encoded bytes of the next field, `None` if unavailable.
    pub fn push(&mut self, field: Option<Vec<u8>>) {
        self.fields.push(field);
    }

    /// Encoded bytes of the field at `index`.
    ///
    /// Returns `None` if the index is out of range or the device did not
    /// supply the field.
    #[inline]
    pub fn field(&self, index: usize) -> Option<&[u8]> {
        self.fields.get(index)?.as_deref()
    }

    /// Number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the payload has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<Option<Vec<u8>>> for ReadPayload {
    fn from_iter<I: IntoIterator<Item = Option<Vec<u8>>>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// One value written by a write command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEntry {
    /// Device item address
    pub address: u32,
    /// Scalar type of the encoded value
    pub data_type: DataType,
    /// Encoded value
    pub data: Vec<u8>,
}

/// Write command assembled from the pending outputs of one write cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteCommand {
    entries: Vec<WriteEntry>,
}

impl WriteCommand {
    /// Create an empty command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an encoded value.
    pub fn push(&mut self, entry: WriteEntry) {
        self.entries.push(entry);
    }

    /// Entries in the order they were added.
    #[inline]
    pub fn entries(&self) -> &[WriteEntry] {
        &self.entries
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no value was added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries, keeping the allocation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
