//! Input handler for one scalar type.

use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use batchio_common::data::{DataType, Direction, Quality, Value};
use batchio_common::device::command::ReadPayload;
use batchio_common::error::IoError;
use batchio_common::event::Event;
use batchio_common::model::{Access, Attribute, attributes, events};
use batchio_state::{DataArray, DataBlock, PendingEventList, ReadHandle, SlotHandle, WriteSentinel};

use super::{InputHandler, PayloadOrError};
use crate::scalar::ScalarType;
use crate::status::CommonChanges;

/// Read state record of an input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputState<T> {
    /// Last successfully read value. Kept while the input is in error.
    pub value: T,
    /// `Good` exactly when `error` is `None`.
    pub quality: Quality,
    /// Time of the last read cycle.
    pub update_time: SystemTime,
    /// Time the value or quality last changed.
    pub change_time: SystemTime,
    /// Error of the last read cycle.
    pub error: Option<IoError>,
}

impl<T: Default> Default for InputState<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            quality: Quality::Bad,
            update_time: UNIX_EPOCH,
            change_time: UNIX_EPOCH,
            error: Some(IoError::NoData),
        }
    }
}

/// Input handler parameterized by its scalar type.
pub struct TypedInputHandler<T: ScalarType> {
    value_attribute: Attribute,
    value_changed: Event,
    quality_changed: Event,
    changed: Event,
    slot: OnceLock<SlotHandle<InputState<T>>>,
    read_index: OnceLock<usize>,
}

impl<T: ScalarType> TypedInputHandler<T> {
    /// Create a handler with no state attached.
    pub fn new() -> Self {
        Self {
            value_attribute: attributes::value(T::DATA_TYPE, Access::ReadOnly),
            value_changed: Event::new(events::VALUE_CHANGED, Direction::Input),
            quality_changed: Event::new(events::QUALITY_CHANGED, Direction::Input),
            changed: Event::new(events::CHANGED, Direction::Input),
            slot: OnceLock::new(),
            read_index: OnceLock::new(),
        }
    }

    /// Slot of the read state, once attached.
    pub fn slot(&self) -> Option<SlotHandle<InputState<T>>> {
        self.slot.get().copied()
    }

    fn attributes(&self) -> [Attribute; 5] {
        [
            self.value_attribute,
            attributes::QUALITY,
            attributes::UPDATE_TIME,
            attributes::CHANGE_TIME,
            attributes::ERROR,
        ]
    }

    fn events(&self) -> [&Event; 3] {
        [&self.value_changed, &self.quality_changed, &self.changed]
    }

    fn decode(&self, payload: &ReadPayload) -> Result<T, IoError> {
        let Some(&index) = self.read_index.get() else {
            panic!("internal error: input updated from a payload before the read command was prepared");
        };
        payload.field(index).ok_or(IoError::Decode).and_then(T::decode)
    }
}

impl<T: ScalarType> Default for TypedInputHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ScalarType> InputHandler for TypedInputHandler<T> {
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
            attributes::VALUE => ReadHandle::new(attribute, block, slot, |state: &InputState<T>| {
                state.value.clone().into_value()
            }),
            "quality" => ReadHandle::new(attribute, block, slot, |state: &InputState<T>| {
                Value::Quality(state.quality)
            }),
            "updateTime" => ReadHandle::new(attribute, block, slot, |state: &InputState<T>| {
                Value::Timestamp(state.update_time)
            }),
            "changeTime" => ReadHandle::new(attribute, block, slot, |state: &InputState<T>| {
                Value::Timestamp(state.change_time)
            }),
            "error" => ReadHandle::new(attribute, block, slot, |state: &InputState<T>| {
                Value::Error(state.error)
            }),
            _ => return None,
        };
        Some(handle)
    }

    fn attach_read_state(&self, array: &mut DataArray, event_budget: &mut usize) {
        let handle = array.add(InputState::<T>::default());
        if self.slot.set(handle).is_err() {
            panic!("internal error: input read state attached twice");
        }
        *event_budget += self.events().len();
    }

    fn set_read_index(&self, index: usize) {
        if self.read_index.set(index).is_err() {
            panic!("internal error: input read index assigned twice");
        }
    }

    fn update_read_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: SystemTime,
        outcome: PayloadOrError<'_>,
        common: CommonChanges,
        events: &mut PendingEventList,
    ) {
        let Some(slot) = self.slot() else {
            panic!("internal error: input updated before its read state was attached");
        };

        let decoded = outcome.and_then(|payload| self.decode(payload));
        let state = sentinel.get_mut(slot);
        state.update_time = timestamp;

        // Same error as last cycle and the common error did not move: only
        // the update time differs.
        if let Err(error) = &decoded {
            if !common.contains(CommonChanges::ERROR) && state.error == Some(*error) {
                return;
            }
        }

        let (value_changed, error) = match decoded {
            Ok(value) => {
                let changed = !value.same_as(&state.value);
                if changed {
                    state.value = value;
                }
                (changed, None)
            }
            Err(error) => (false, Some(error)),
        };
        let quality = Quality::from_error(&error);
        let quality_changed = quality != state.quality;
        state.quality = quality;
        state.error = error;

        if value_changed || quality_changed {
            state.change_time = timestamp;
        }
        if value_changed {
            events.push(&self.value_changed);
        }
        if quality_changed {
            events.push(&self.quality_changed);
        }
        if value_changed || quality_changed {
            events.push(&self.changed);
        }
    }
}
