//! Typed value handlers.
//!
//! A data point delegates everything that depends on its scalar type to a
//! handler selected once from its data type keyword. The transaction only
//! sees the object-safe [`InputHandler`] and [`OutputHandler`] traits, so
//! points of different types share one batched command.
//!
//! Handlers never fire events. They enqueue them into the pending event
//! list of the cycle, which releases them after the state block commit.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::SystemTime;

use batchio_common::data::{DataType, Value};
use batchio_common::device::command::{ReadPayload, WriteCommand};
use batchio_common::error::IoError;
use batchio_common::event::Event;
use batchio_common::model::Attribute;
use batchio_state::{AccessError, DataArray, DataBlock, PendingEventList, ReadHandle, WriteHandle, WriteSentinel};

use crate::status::CommonChanges;

pub mod input;
pub mod output;

pub use input::{InputState, TypedInputHandler};
pub use output::{OutputState, TypedOutputHandler};

/// Outcome of a read cycle as seen by the inputs.
///
/// An error is authoritative: inputs ignore the payload entirely.
pub type PayloadOrError<'a> = Result<&'a ReadPayload, IoError>;

/// Type-specific behaviour of an input.
pub trait InputHandler: Send + Sync {
    /// Scalar type of the value.
    fn data_type(&self) -> DataType;

    /// Look up an attribute by name.
    fn resolve_attribute(&self, name: &str) -> Option<Attribute>;

    /// Look up an event by name.
    fn resolve_event(&self, name: &str) -> Option<&Event>;

    /// Visit every attribute.
    fn for_each_attribute(&self, f: &mut dyn FnMut(&Attribute) -> ControlFlow<()>) -> ControlFlow<()>;

    /// Visit every event.
    fn for_each_event(&self, f: &mut dyn FnMut(&Event) -> ControlFlow<()>) -> ControlFlow<()>;

    /// Read accessor bound to `block`, or `None` for foreign attributes and
    /// before the read state is attached.
    fn make_read_handle(&self, block: &Arc<DataBlock>, attribute: &Attribute) -> Option<ReadHandle>;

    /// Register the read state slot and add the maximum number of events
    /// one update can enqueue to `event_budget`.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    fn attach_read_state(&self, array: &mut DataArray, event_budget: &mut usize);

    /// Position of this input's field in the read payload.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    fn set_read_index(&self, index: usize);

    /// Apply a read outcome inside the open write sentinel.
    fn update_read_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: SystemTime,
        outcome: PayloadOrError<'_>,
        common: CommonChanges,
        events: &mut PendingEventList,
    );
}

/// Type-specific behaviour of an output.
pub trait OutputHandler: Send + Sync {
    /// Scalar type of the value.
    fn data_type(&self) -> DataType;

    /// Look up an attribute by name.
    fn resolve_attribute(&self, name: &str) -> Option<Attribute>;

    /// Look up an event by name.
    fn resolve_event(&self, name: &str) -> Option<&Event>;

    /// Visit every attribute.
    fn for_each_attribute(&self, f: &mut dyn FnMut(&Attribute) -> ControlFlow<()>) -> ControlFlow<()>;

    /// Visit every event.
    fn for_each_event(&self, f: &mut dyn FnMut(&Event) -> ControlFlow<()>) -> ControlFlow<()>;

    /// Read accessor bound to `block`, or `None` for foreign attributes and
    /// before the write state is attached.
    fn make_read_handle(&self, block: &Arc<DataBlock>, attribute: &Attribute) -> Option<ReadHandle>;

    /// Write accessor, or `None` for foreign or read-only attributes.
    fn make_write_handle(&self, attribute: &Attribute) -> Option<WriteHandle>;

    /// Queue a value for the next write cycle, replacing any queued value.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::TypeMismatch`] if `value` has another type.
    fn submit(&self, value: Value) -> Result<(), AccessError>;

    /// Whether a value is queued.
    fn has_pending(&self) -> bool;

    /// Register the write state slot and add the maximum number of events
    /// one update can enqueue to `event_budget`.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    fn attach_write_state(&self, array: &mut DataArray, event_budget: &mut usize);

    /// Move the queued value into `command`.
    ///
    /// Returns `true` if a value was queued. The output must then be
    /// notified through [`update_write_state`](Self::update_write_state)
    /// in the same cycle. Returns `false` and leaves `command` untouched
    /// otherwise.
    fn add_to_write_command(&self, address: u32, command: &mut WriteCommand) -> bool;

    /// Record the outcome of the write this output took part in.
    fn update_write_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: SystemTime,
        error: Option<IoError>,
        events: &mut PendingEventList,
    );
}

/// Create the input handler for a data type keyword.
pub fn make_input_handler(data_type: DataType) -> Box<dyn InputHandler> {
    match data_type {
        DataType::Bool => Box::new(TypedInputHandler::<bool>::new()),
        DataType::Uint8 => Box::new(TypedInputHandler::<u8>::new()),
        DataType::Uint16 => Box::new(TypedInputHandler::<u16>::new()),
        DataType::Uint32 => Box::new(TypedInputHandler::<u32>::new()),
        DataType::Uint64 => Box::new(TypedInputHandler::<u64>::new()),
        DataType::Int8 => Box::new(TypedInputHandler::<i8>::new()),
        DataType::Int16 => Box::new(TypedInputHandler::<i16>::new()),
        DataType::Int32 => Box::new(TypedInputHandler::<i32>::new()),
        DataType::Int64 => Box::new(TypedInputHandler::<i64>::new()),
        DataType::Float32 => Box::new(TypedInputHandler::<f32>::new()),
        DataType::Float64 => Box::new(TypedInputHandler::<f64>::new()),
        DataType::String => Box::new(TypedInputHandler::<String>::new()),
    }
}

/// Create the output handler for a data type keyword.
pub fn make_output_handler(data_type: DataType) -> Box<dyn OutputHandler> {
    match data_type {
        DataType::Bool => Box::new(TypedOutputHandler::<bool>::new()),
        DataType::Uint8 => Box::new(TypedOutputHandler::<u8>::new()),
        DataType::Uint16 => Box::new(TypedOutputHandler::<u16>::new()),
        DataType::Uint32 => Box::new(TypedOutputHandler::<u32>::new()),
        DataType::Uint64 => Box::new(TypedOutputHandler::<u64>::new()),
        DataType::Int8 => Box::new(TypedOutputHandler::<i8>::new()),
        DataType::Int16 => Box::new(TypedOutputHandler::<i16>::new()),
        DataType::Int32 => Box::new(TypedOutputHandler::<i32>::new()),
        DataType::Int64 => Box::new(TypedOutputHandler::<i64>::new()),
        DataType::Float32 => Box::new(TypedOutputHandler::<f32>::new()),
        DataType::Float64 => Box::new(TypedOutputHandler::<f64>::new()),
        DataType::String => Box::new(TypedOutputHandler::<String>::new()),
    }
}
