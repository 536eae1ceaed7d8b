//! Introspection model: attributes, tasks and well-known names.
//!
//! Attributes are identified by name within their owning point or
//! transaction. The constants here are the only attribute and event names
//! the runtime resolves.

use core::fmt;

use crate::data::DataType;

// ─── Attribute ──────────────────────────────────────────────────────

/// Access mode of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Readable only.
    ReadOnly,
    /// Readable and writable.
    ReadWrite,
}

/// Type of the value an attribute yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// A scalar of the given data type.
    Scalar(DataType),
    /// A [`Quality`](crate::data::Quality).
    Quality,
    /// A wall-clock time stamp.
    Timestamp,
    /// An optional [`IoError`](crate::error::IoError).
    Error,
}

/// A named, typed field exposed for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attribute {
    name: &'static str,
    attribute_type: AttributeType,
    access: Access,
}

impl Attribute {
    /// Create an attribute descriptor.
    pub const fn new(name: &'static str, attribute_type: AttributeType, access: Access) -> Self {
        Self {
            name,
            attribute_type,
            access,
        }
    }

    /// Attribute name.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Type of the attribute value.
    #[inline]
    pub const fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    /// Access mode.
    #[inline]
    pub const fn access(&self) -> Access {
        self.access
    }

    /// Whether a write handle can be created for this attribute.
    #[inline]
    pub const fn is_writable(&self) -> bool {
        matches!(self.access, Access::ReadWrite)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Well-known attributes.
pub mod attributes {
    use super::{Access, Attribute, AttributeType};
    use crate::data::DataType;

    /// Name of the value attribute of inputs and outputs.
    pub const VALUE: &str = "value";

    /// Value attribute for a point of the given type.
    pub const fn value(data_type: DataType, access: Access) -> Attribute {
        Attribute::new(VALUE, AttributeType::Scalar(data_type), access)
    }

    /// Quality of an input value.
    pub const QUALITY: Attribute = Attribute::new("quality", AttributeType::Quality, Access::ReadOnly);
    /// Last time an input was updated.
    pub const UPDATE_TIME: Attribute =
        Attribute::new("updateTime", AttributeType::Timestamp, Access::ReadOnly);
    /// Last time an input value or quality changed.
    pub const CHANGE_TIME: Attribute =
        Attribute::new("changeTime", AttributeType::Timestamp, Access::ReadOnly);
    /// Error of an input.
    pub const ERROR: Attribute = Attribute::new("error", AttributeType::Error, Access::ReadOnly);

    /// Last read cycle of a transaction.
    pub const READ_TIME: Attribute =
        Attribute::new("readTime", AttributeType::Timestamp, Access::ReadOnly);
    /// Error of the last read cycle.
    pub const READ_ERROR: Attribute =
        Attribute::new("readError", AttributeType::Error, Access::ReadOnly);
    /// Last write cycle of a transaction or last write of an output.
    pub const WRITE_TIME: Attribute =
        Attribute::new("writeTime", AttributeType::Timestamp, Access::ReadOnly);
    /// Error of the last write.
    pub const WRITE_ERROR: Attribute =
        Attribute::new("writeError", AttributeType::Error, Access::ReadOnly);
}

/// Well-known event names.
pub mod events {
    /// Input value changed.
    pub const VALUE_CHANGED: &str = "valueChanged";
    /// Input quality changed.
    pub const QUALITY_CHANGED: &str = "qualityChanged";
    /// Input value or quality changed.
    pub const CHANGED: &str = "changed";

    /// Output value was written successfully.
    pub const WRITTEN: &str = "written";
    /// Writing an output value failed.
    pub const WRITE_ERROR: &str = "writeError";

    /// Read cycles recovered from an error.
    pub const READ_OK: &str = "readOk";
    /// Read cycles started failing, or failed with a different error.
    pub const READ_ERROR: &str = "readError";
    /// Write cycles recovered from an error.
    pub const WRITE_OK: &str = "writeOk";
}

// ─── Tasks ──────────────────────────────────────────────────────────

/// Schedulable operations of an I/O transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskRole {
    /// Read all attached inputs.
    Read,
    /// Write all pending outputs.
    Write,
}

impl TaskRole {
    /// Task name as exposed for introspection.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for TaskRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_attribute_carries_type_and_access() {
        let attr = attributes::value(DataType::Int16, Access::ReadWrite);
        assert_eq!(attr.name(), "value");
        assert_eq!(attr.attribute_type(), AttributeType::Scalar(DataType::Int16));
        assert!(attr.is_writable());
        assert!(!attributes::QUALITY.is_writable());
    }

    #[test]
    fn task_names() {
        assert_eq!(TaskRole::Read.to_string(), "read");
        assert_eq!(TaskRole::Write.name(), "write");
    }
}
