//! Prelude module for common re-exports.
//!
//! ```rust
//! use batchio_common::prelude::*;
//! ```

// ─── Data ───────────────────────────────────────────────────────────
pub use crate::data::{DataType, Direction, Quality, Value};
pub use crate::error::IoError;

// ─── Model ──────────────────────────────────────────────────────────
pub use crate::event::{Event, EventId, EventNotice};
pub use crate::model::{Access, Attribute, AttributeType, TaskRole};

// ─── Device ─────────────────────────────────────────────────────────
pub use crate::device::command::{ReadCommand, ReadEntry, ReadPayload, WriteCommand, WriteEntry};
pub use crate::device::driver::{Device, DeviceError, DeviceFactory};

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::io::config::IoConfig;
