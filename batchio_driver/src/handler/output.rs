//! Output handler for one scalar type.

use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use batchio_common::data::{DataType, Direction, Value};
use batchio_common::device::command::{WriteCommand, WriteEntry};
use batchio_common::error::IoError;
use batchio_common::event::Event;
use batchio_common::model::{Access, Attribute, attributes, events};
use batchio_state::{
    AccessError, DataArray, DataBlock, PendingEventList, ReadHandle, SlotHandle, WriteHandle, WriteSentinel,
};
use parking_lot::Mutex;
use tracing::warn;

use super::OutputHandler;
use crate::scalar::ScalarType;

/// Write state record of an output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputState<T> {
    /// Last value the device accepted.
    pub value: T,
    /// Time of the last write this output took part in.
    pub write_time: SystemTime,
    /// Error of that write. `None` if it succeeded or never happened.
    pub write_error: Option<IoError>,
}

impl<T: Default> Default for OutputState<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            write_time: UNIX_EPOCH,
            write_error: None,
        }
    }
}

/// Output handler parameterized by its scalar type.
pub struct TypedOutputHandler<T: ScalarType> {
    value_attribute: Attribute,
    written: Event,
    write_error: Event,
    pending: Arc<Mutex<Option<T>>>,
    in_flight: Mutex<Option<Result<T, IoError>>>,
    slot: OnceLock<SlotHandle<OutputState<T>>>,
}

impl<T: ScalarType> TypedOutputHandler<T> {
    /// Create a handler with no state attached and nothing queued.
    pub fn new() -> Self {
        Self {
            value_attribute: attributes::value(T::DATA_TYPE, Access::ReadWrite),
            written: Event::new(events::WRITTEN, Direction::Output),
            write_error: Event::new(events::WRITE_ERROR, Direction::Output),
            pending: Arc::new(Mutex::new(None)),
            in_flight: Mutex::new(None),
            slot: OnceLock::new(),
        }
    }

    /// Slot of the write state, once attached.
    pub fn slot(&self) -> Option<SlotHandle<OutputState<T>>> {
        self.slot.get().copied()
    }

    fn attributes(&self) -> [Attribute; 3] {
        [self.value_attribute, attributes::WRITE_TIME, attributes::WRITE_ERROR]
    }

    fn events(&self) -> [&Event; 2] {
        [&self.written, &self.write_error]
    }
}

impl<T: ScalarType> Default for TypedOutputHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn queue<T: ScalarType>(pending: &Mutex<Option<T>>, value: Value) -> Result<(), AccessError> {
    let actual = value.data_type();
    let value = T::from_value(value).ok_or(AccessError::TypeMismatch {
        expected: T::DATA_TYPE,
        actual,
    })?;
    *pending.lock() = Some(value);
    Ok(())
}

impl<T: ScalarType> OutputHandler for TypedOutputHandler<T> {
    fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes().into_iter().find(|attribute| attribute.name() == name)
    }

    fn resolve_event(&self, name: &str) -> Option<&Event> {
        self.events().into_iter().find(|event| event.name() == name)
    }

    fn for_each_attribute(&self, f: &mut dyn FnMut(&Attribute) -> ControlFlow<()>) -> ControlFlow<()> {
        for attribute in &self.attributes() {
            f(attribute)?;
        }
        ControlFlow::Continue(())
    }

    fn for_each_event(&self, f: &mut dyn FnMut(&Event) -> ControlFlow<()>) -> ControlFlow<()> {
        for event in self.events() {
            f(event)?;
        }
        ControlFlow::Continue(())
    }

    fn make_read_handle(&self, block: &Arc<DataBlock>, attribute: &Attribute) -> Option<ReadHandle> {
        let slot = self.slot()?;
        let attribute = self.resolve_attribute(attribute.name())?;
        let block = Arc::clone(block);
        let handle = match attribute.name() {
            attributes::VALUE => ReadHandle::new(attribute, block, slot, |state: &OutputState<T>| {
                state.value.clone().into_value()
            }),
            "writeTime" => ReadHandle::new(attribute, block, slot, |state: &OutputState<T>| {
                Value::Timestamp(state.write_time)
            }),
            "writeError" => ReadHandle::new(attribute, block, slot, |state: &OutputState<T>| {
                Value::Error(state.write_error)
            }),
            _ => return None,
        };
        Some(handle)
    }

    fn make_write_handle(&self, attribute: &Attribute) -> Option<WriteHandle> {
        let attribute = self.resolve_attribute(attribute.name())?;
        if !attribute.is_writable() {
            return None;
        }
        let pending = Arc::clone(&self.pending);
        Some(WriteHandle::new(attribute, move |value| queue(&pending, value)))
    }

    fn submit(&self, value: Value) -> Result<(), AccessError> {
        queue(&self.pending, value)
    }

    fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    fn attach_write_state(&self, array: &mut DataArray, event_budget: &mut usize) {
        let handle = array.add(OutputState::<T>::default());
        if self.slot.set(handle).is_err() {
            panic!("internal error: output write state attached twice");
        }
        // Either written or writeError.
        *event_budget += 1;
    }

    fn add_to_write_command(&self, address: u32, command: &mut WriteCommand) -> bool {
        let Some(value) = self.pending.lock().take() else {
            return false;
        };
        let in_flight = match value.encode() {
            Ok(data) => {
                command.push(WriteEntry {
                    address,
                    data_type: T::DATA_TYPE,
                    data,
                });
                Ok(value)
            }
            Err(error) => {
                warn!(address, data_type = %T::DATA_TYPE, "output value could not be encoded");
                Err(error)
            }
        };
        *self.in_flight.lock() = Some(in_flight);
        true
    }

    fn update_write_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: SystemTime,
        error: Option<IoError>,
        events: &mut PendingEventList,
    ) {
        let Some(slot) = self.slot() else {
            panic!("internal error: output updated before its write state was attached");
        };
        let Some(in_flight) = self.in_flight.lock().take() else {
            panic!("internal error: output notified without a value in flight");
        };

        let outcome = match (in_flight, error) {
            (Err(encode_error), _) => Err(encode_error),
            (Ok(_), Some(device_error)) => Err(device_error),
            (Ok(value), None) => Ok(value),
        };

        let state = sentinel.get_mut(slot);
        state.write_time = timestamp;
        match outcome {
            Ok(value) => {
                state.value = value;
                state.write_error = None;
                events.push(&self.written);
            }
            Err(error) => {
                state.write_error = Some(error);
                events.push(&self.write_error);
            }
        }
    }
}
