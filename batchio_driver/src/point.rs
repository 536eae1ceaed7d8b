//! Data points.
//!
//! [`Input`] and [`Output`] are the user-visible nodes of the I/O graph.
//! Each owns a typed value handler chosen from its data type keyword and
//! forwards attribute, event and state calls to it. A point is bound to
//! exactly one transaction; the binding is made while cross references are
//! resolved and never changes afterwards.

use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use batchio_common::data::{DataType, Value};
use batchio_common::device::command::WriteCommand;
use batchio_common::error::IoError;
use batchio_common::event::Event;
use batchio_common::model::{Attribute, attributes};
use batchio_state::{AccessError, DataArray, DataBlock, PendingEventList, ReadHandle, WriteHandle, WriteSentinel};
use thiserror::Error;

use crate::handler::{
    InputHandler, OutputHandler, PayloadOrError, make_input_handler, make_output_handler,
};
use crate::status::{CommonChanges, CommonStatus};

/// Errors attaching a data point to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    /// The point and the transaction belong to different I/O components.
    #[error(
        "data point '{point}' of I/O component '{point_component}' cannot be attached to transaction '{transaction}' of I/O component '{transaction_component}'"
    )]
    ForeignComponent {
        /// Point name
        point: String,
        /// Component of the point
        point_component: String,
        /// Transaction name
        transaction: String,
        /// Component of the transaction
        transaction_component: String,
    },

    /// The point is already attached to a transaction.
    #[error("data point '{point}' is already attached to transaction '{transaction}'")]
    AlreadyAttached {
        /// Point name
        point: String,
        /// Transaction the point is attached to
        transaction: String,
    },
}

/// What a point knows about its transaction once bound.
#[derive(Clone)]
pub(crate) struct TransactionLink {
    pub(crate) name: String,
    pub(crate) block: Arc<DataBlock>,
    pub(crate) status: Arc<CommonStatus>,
}

fn bind(
    slot: &OnceLock<TransactionLink>,
    point: &str,
    link: TransactionLink,
) -> Result<(), AttachError> {
    if let Some(existing) = slot.get() {
        return Err(AttachError::AlreadyAttached {
            point: point.to_string(),
            transaction: existing.name.clone(),
        });
    }
    slot.set(link).map_err(|_| AttachError::AlreadyAttached {
        point: point.to_string(),
        transaction: slot.get().map(|l| l.name.clone()).unwrap_or_default(),
    })
}

// ─── Input ──────────────────────────────────────────────────────────

/// A data point read from the device.
pub struct Input {
    name: String,
    component: String,
    address: u32,
    handler: Box<dyn InputHandler>,
    transaction: OnceLock<TransactionLink>,
}

impl Input {
    /// Create an input with the handler for `data_type`.
    pub fn new(name: impl Into<String>, component: impl Into<String>, data_type: DataType, address: u32) -> Self {
        Self {
            name: name.into(),
            component: component.into(),
            address,
            handler: make_input_handler(data_type),
            transaction: OnceLock::new(),
        }
    }

    /// Point name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// I/O component the point belongs to.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Device item address.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Scalar type of the value.
    pub fn data_type(&self) -> DataType {
        self.handler.data_type()
    }

    /// Name of the transaction this input is attached to.
    pub fn transaction_name(&self) -> Option<&str> {
        self.transaction.get().map(|link| link.name.as_str())
    }

    /// Look up one of this input's attributes, or one inherited from the
    /// read side of its transaction.
    ///
    /// The result does not depend on whether the input is attached yet.
    pub fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        self.handler.resolve_attribute(name).or_else(|| {
            [attributes::READ_TIME, attributes::READ_ERROR]
                .into_iter()
                .find(|attribute| attribute.name() == name)
        })
    }

    /// Look up an event by name.
    pub fn resolve_event(&self, name: &str) -> Option<&Event> {
        self.handler.resolve_event(name)
    }

    /// Visit every attribute, own ones first.
    ///
    /// # Panics
    ///
    /// Panics if called before cross references are resolved.
    pub fn for_each_attribute(&self, f: &mut dyn FnMut(&Attribute) -> ControlFlow<()>) -> ControlFlow<()> {
        let link = self.link("for_each_attribute");
        self.handler.for_each_attribute(f)?;
        link.status.for_each_attribute(f)
    }

    /// Visit every event.
    ///
    /// # Panics
    ///
    /// Panics if called before cross references are resolved.
    pub fn for_each_event(&self, f: &mut dyn FnMut(&Event) -> ControlFlow<()>) -> ControlFlow<()> {
        self.link("for_each_event");
        self.handler.for_each_event(f)
    }

    /// Read accessor for an attribute.
    ///
    /// Returns `None` for unknown attributes and before the input is
    /// attached and realized.
    pub fn make_read_handle(&self, attribute: &Attribute) -> Option<ReadHandle> {
        let link = self.transaction.get()?;
        self.handler
            .make_read_handle(&link.block, attribute)
            .or_else(|| link.status.make_read_handle(&link.block, attribute))
    }

    /// Read accessor for an attribute given by name.
    pub fn read_handle(&self, name: &str) -> Option<ReadHandle> {
        self.make_read_handle(&self.resolve_attribute(name)?)
    }

    /// Current committed value.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::NotRealized`] before the transaction is
    /// realized.
    pub fn value(&self) -> Result<Value, AccessError> {
        self.read_handle(attributes::VALUE)
            .ok_or(AccessError::NotRealized)?
            .read()
    }

    fn link(&self, operation: &str) -> &TransactionLink {
        match self.transaction.get() {
            Some(link) => link,
            None => panic!(
                "internal error: Input::{operation}() called on '{}' before cross references have been resolved",
                self.name
            ),
        }
    }

    pub(crate) fn bind(&self, link: TransactionLink) -> Result<(), AttachError> {
        bind(&self.transaction, &self.name, link)
    }

    pub(crate) fn attach_input(&self, array: &mut DataArray, event_budget: &mut usize) {
        self.handler.attach_read_state(array, event_budget);
    }

    pub(crate) fn set_read_index(&self, index: usize) {
        self.handler.set_read_index(index);
    }

    pub(crate) fn update_read_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: SystemTime,
        outcome: PayloadOrError<'_>,
        common: CommonChanges,
        events: &mut PendingEventList,
    ) {
        self.handler
            .update_read_state(sentinel, timestamp, outcome, common, events);
    }
}

impl core::fmt::Debug for Input {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Input")
            .field("name", &self.name)
            .field("component", &self.component)
            .field("data_type", &self.data_type())
            .field("address", &self.address)
            .field("transaction", &self.transaction_name())
            .finish()
    }
}

// ─── Output ─────────────────────────────────────────────────────────

/// A data point written to the device.
pub struct Output {
    name: String,
    component: String,
    address: u32,
    handler: Box<dyn OutputHandler>,
    transaction: OnceLock<TransactionLink>,
}

impl Output {
    /// Create an output with the handler for `data_type`.
    pub fn new(name: impl Into<String>, component: impl Into<String>, data_type: DataType, address: u32) -> Self {
        Self {
            name: name.into(),
            component: component.into(),
            address,
            handler: make_output_handler(data_type),
            transaction: OnceLock::new(),
        }
    }

    /// Point name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// I/O component the point belongs to.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Device item address.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Scalar type of the value.
    pub fn data_type(&self) -> DataType {
        self.handler.data_type()
    }

    /// Name of the transaction this output is attached to.
    pub fn transaction_name(&self) -> Option<&str> {
        self.transaction.get().map(|link| link.name.as_str())
    }

    /// Look up one of this output's attributes.
    pub fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        self.handler.resolve_attribute(name)
    }

    /// Look up an event by name.
    pub fn resolve_event(&self, name: &str) -> Option<&Event> {
        self.handler.resolve_event(name)
    }

    /// Visit every attribute.
    ///
    /// # Panics
    ///
    /// Panics if called before cross references are resolved.
    pub fn for_each_attribute(&self, f: &mut dyn FnMut(&Attribute) -> ControlFlow<()>) -> ControlFlow<()> {
        self.link("for_each_attribute");
        self.handler.for_each_attribute(f)
    }

    /// Visit every event.
    ///
    /// # Panics
    ///
    /// Panics if called before cross references are resolved.
    pub fn for_each_event(&self, f: &mut dyn FnMut(&Event) -> ControlFlow<()>) -> ControlFlow<()> {
        self.link("for_each_event");
        self.handler.for_each_event(f)
    }

    /// Read accessor for an attribute.
    ///
    /// Returns `None` for unknown attributes and before the output is
    /// attached and realized.
    pub fn make_read_handle(&self, attribute: &Attribute) -> Option<ReadHandle> {
        let link = self.transaction.get()?;
        self.handler.make_read_handle(&link.block, attribute)
    }

    /// Read accessor for an attribute given by name.
    pub fn read_handle(&self, name: &str) -> Option<ReadHandle> {
        self.make_read_handle(&self.resolve_attribute(name)?)
    }

    /// Write accessor for a writable attribute.
    ///
    /// Returns `None` for unknown and read-only attributes.
    pub fn make_write_handle(&self, attribute: &Attribute) -> Option<WriteHandle> {
        self.handler.make_write_handle(attribute)
    }

    /// Queue a value for the next write cycle.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::TypeMismatch`] if `value` has another type.
    pub fn write(&self, value: impl Into<Value>) -> Result<(), AccessError> {
        self.handler.submit(value.into())
    }

    /// Whether a value is queued for the next write cycle.
    pub fn has_pending(&self) -> bool {
        self.handler.has_pending()
    }

    fn link(&self, operation: &str) -> &TransactionLink {
        match self.transaction.get() {
            Some(link) => link,
            None => panic!(
                "internal error: Output::{operation}() called on '{}' before cross references have been resolved",
                self.name
            ),
        }
    }

    pub(crate) fn bind(&self, link: TransactionLink) -> Result<(), AttachError> {
        bind(&self.transaction, &self.name, link)
    }

    pub(crate) fn attach_output(&self, array: &mut DataArray, event_budget: &mut usize) {
        self.handler.attach_write_state(array, event_budget);
    }

    pub(crate) fn add_to_write_command(&self, command: &mut WriteCommand) -> bool {
        self.handler.add_to_write_command(self.address, command)
    }

    pub(crate) fn update_write_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: SystemTime,
        error: Option<IoError>,
        events: &mut PendingEventList,
    ) {
        self.handler
            .update_write_state(sentinel, timestamp, error, events);
    }
}

impl core::fmt::Debug for Output {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Output")
            .field("name", &self.name)
            .field("component", &self.component)
            .field("data_type", &self.data_type())
            .field("address", &self.address)
            .field("transaction", &self.transaction_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(name: &str) -> TransactionLink {
        TransactionLink {
            name: name.to_string(),
            block: Arc::new(DataBlock::new(name)),
            status: Arc::new(CommonStatus::read_side()),
        }
    }

    #[test]
    fn second_binding_is_rejected() {
        let input = Input::new("door", "plc", DataType::Bool, 0);
        input.bind(link("fast")).unwrap();
        assert_eq!(
            input.bind(link("slow")),
            Err(AttachError::AlreadyAttached {
                point: "door".into(),
                transaction: "fast".into(),
            })
        );
        assert_eq!(input.transaction_name(), Some("fast"));
    }

    #[test]
    fn handles_are_absent_before_binding() {
        let output = Output::new("setpoint", "plc", DataType::Int32, 4);
        assert!(output.read_handle("value").is_none());
        // Writing does not need the transaction.
        assert!(output.make_write_handle(&output.resolve_attribute("value").unwrap()).is_some());
        output.write(3i32).unwrap();
        assert!(output.has_pending());
    }

    #[test]
    fn input_inherits_read_status_attributes() {
        let input = Input::new("door", "plc", DataType::Bool, 0);
        let before = input.resolve_attribute("readError");
        assert!(before.is_some());
        assert!(input.read_handle("readError").is_none());
        input.bind(link("fast")).unwrap();
        assert_eq!(input.resolve_attribute("readError"), before);
        assert!(input.resolve_attribute("writeError").is_none());

        let mut names = Vec::new();
        let _ = input.for_each_attribute(&mut |a| {
            names.push(a.name());
            ControlFlow::Continue(())
        });
        assert_eq!(names.last(), Some(&"readError"));
    }

    #[test]
    #[should_panic(expected = "before cross references have been resolved")]
    fn introspection_before_binding_panics() {
        let input = Input::new("door", "plc", DataType::Bool, 0);
        let _ = input.for_each_event(&mut |_| ControlFlow::Continue(()));
    }
}
