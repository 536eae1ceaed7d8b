//! Batched I/O transactions.
//!
//! An [`IoTransaction`] groups inputs and outputs of one I/O component into
//! a single read command and a single write command per cycle. It owns one
//! data block per side, the common read and write status, and the scratch
//! buffers each cycle works with.
//!
//! # Lifecycle
//!
//! ```text
//! Configuring ──realize()──► Realized ──prepare()──► Prepared
//!   add_input()                write()                 read()
//!   add_output()               invalidate_data()       write()
//! ```
//!
//! Configuration steps take `&mut self`. Cycles take `&self`: a read cycle
//! and a write cycle may run at the same time on different threads because
//! they touch different blocks and buffers. Two cycles of the same side must
//! not overlap.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::SystemTime;

use batchio_common::device::command::{ReadCommand, ReadEntry, WriteCommand};
use batchio_common::device::driver::Device;
use batchio_common::error::IoError;
use batchio_common::event::Event;
use batchio_common::model::{Attribute, TaskRole};
use batchio_state::{DataArray, DataBlock, PendingEventList, ReadHandle};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, trace};

use crate::handler::PayloadOrError;
use crate::point::{AttachError, Input, Output, TransactionLink};
use crate::status::CommonStatus;

/// Lifecycle phase of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Points can be attached.
    Configuring,
    /// Layouts are fixed and blocks exist.
    Realized,
    /// The read command is built; all tasks can run.
    Prepared,
}

// ─── Scratch Buffers ────────────────────────────────────────────────

/// A buffer reused across cycles.
trait ScratchBuffer {
    fn clear(&mut self);
}

impl ScratchBuffer for PendingEventList {
    fn clear(&mut self) {
        PendingEventList::clear(self);
    }
}

impl<T> ScratchBuffer for Vec<T> {
    fn clear(&mut self) {
        Vec::clear(self);
    }
}

impl ScratchBuffer for WriteCommand {
    fn clear(&mut self) {
        WriteCommand::clear(self);
    }
}

/// Clears a scratch buffer on entry and again on exit, so no data leaks
/// from one cycle into the next even if a cycle unwinds.
struct RuntimeBufferSentinel<'a, B: ScratchBuffer> {
    buffer: &'a mut B,
}

impl<'a, B: ScratchBuffer> RuntimeBufferSentinel<'a, B> {
    fn new(buffer: &'a mut B) -> Self {
        buffer.clear();
        Self { buffer }
    }
}

impl<B: ScratchBuffer> core::ops::Deref for RuntimeBufferSentinel<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.buffer
    }
}

impl<B: ScratchBuffer> core::ops::DerefMut for RuntimeBufferSentinel<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.buffer
    }
}

impl<B: ScratchBuffer> Drop for RuntimeBufferSentinel<'_, B> {
    fn drop(&mut self) {
        self.buffer.clear();
    }
}

#[derive(Default)]
struct ReadBuffers {
    events: PendingEventList,
}

#[derive(Default)]
struct WriteBuffers {
    events: PendingEventList,
    outputs_to_notify: Vec<usize>,
    command: WriteCommand,
}

// ─── Transaction ────────────────────────────────────────────────────

/// One batched read cycle and one batched write cycle over a fixed set of
/// points.
pub struct IoTransaction {
    name: String,
    component: String,
    device: Arc<dyn Device>,
    phase: Phase,
    read_status: Arc<CommonStatus>,
    write_status: Arc<CommonStatus>,
    read_block: Arc<DataBlock>,
    write_block: Arc<DataBlock>,
    inputs: Vec<Arc<Input>>,
    outputs: Vec<Arc<Output>>,
    read_command: ReadCommand,
    read_buffers: Mutex<ReadBuffers>,
    write_buffers: Mutex<WriteBuffers>,
}

impl IoTransaction {
    /// Create a transaction of I/O component `component` that issues its
    /// commands through `device`.
    pub fn new(name: impl Into<String>, component: impl Into<String>, device: Arc<dyn Device>) -> Self {
        let name = name.into();
        Self {
            read_block: Arc::new(DataBlock::new(format!("{name}/read"))),
            write_block: Arc::new(DataBlock::new(format!("{name}/write"))),
            name,
            component: component.into(),
            device,
            phase: Phase::Configuring,
            read_status: Arc::new(CommonStatus::read_side()),
            write_status: Arc::new(CommonStatus::write_side()),
            inputs: Vec::new(),
            outputs: Vec::new(),
            read_command: ReadCommand::default(),
            read_buffers: Mutex::new(ReadBuffers::default()),
            write_buffers: Mutex::new(WriteBuffers::default()),
        }
    }

    /// Transaction name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// I/O component the transaction belongs to.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Device the transaction issues commands through.
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Attached inputs, in attach order.
    pub fn inputs(&self) -> &[Arc<Input>] {
        &self.inputs
    }

    /// Attached outputs, in attach order.
    pub fn outputs(&self) -> &[Arc<Output>] {
        &self.outputs
    }

    /// Data block of the read side.
    pub fn read_block(&self) -> &Arc<DataBlock> {
        &self.read_block
    }

    /// Data block of the write side.
    pub fn write_block(&self) -> &Arc<DataBlock> {
        &self.write_block
    }

    /// Common status of the read side.
    pub fn read_status(&self) -> &CommonStatus {
        &self.read_status
    }

    /// Common status of the write side.
    pub fn write_status(&self) -> &CommonStatus {
        &self.write_status
    }

    /// The read command built by [`prepare`](Self::prepare).
    pub fn read_command(&self) -> &ReadCommand {
        &self.read_command
    }

    // ─── Configuration ──────────────────────────────────────────────

    /// Attach an input.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError::ForeignComponent`] if the input belongs to
    /// another I/O component, [`AttachError::AlreadyAttached`] if it is
    /// attached to a transaction already.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is already realized.
    pub fn add_input(&mut self, input: &Arc<Input>) -> Result<(), AttachError> {
        self.expect_configuring("add_input");
        self.check_component(input.name(), input.component())?;
        input.bind(self.link(&self.read_block, &self.read_status))?;
        self.inputs.push(Arc::clone(input));
        Ok(())
    }

    /// Attach an output.
    ///
    /// # Errors
    ///
    /// Same as [`add_input`](Self::add_input).
    ///
    /// # Panics
    ///
    /// Panics if the transaction is already realized.
    pub fn add_output(&mut self, output: &Arc<Output>) -> Result<(), AttachError> {
        self.expect_configuring("add_output");
        self.check_component(output.name(), output.component())?;
        output.bind(self.link(&self.write_block, &self.write_status))?;
        self.outputs.push(Arc::clone(output));
        Ok(())
    }

    /// Fix the block layouts and size the scratch buffers.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn realize(&mut self) {
        if self.phase != Phase::Configuring {
            panic!("internal error: transaction '{}' realized twice", self.name);
        }

        let mut read_events = 0;
        let mut write_events = 0;
        let mut read_array = DataArray::new();
        let mut write_array = DataArray::new();

        self.read_status.attach(&mut read_array, &mut read_events);
        self.write_status.attach(&mut write_array, &mut write_events);
        for input in &self.inputs {
            input.attach_input(&mut read_array, &mut read_events);
        }
        for output in &self.outputs {
            output.attach_output(&mut write_array, &mut write_events);
        }

        self.read_block.create(read_array);
        self.write_block.create(write_array);

        self.read_buffers.get_mut().events.reset(read_events);
        let write = self.write_buffers.get_mut();
        write.events.reset(write_events);
        write.outputs_to_notify = Vec::with_capacity(self.outputs.len());

        self.phase = Phase::Realized;
        info!(
            transaction = %self.name,
            inputs = self.inputs.len(),
            outputs = self.outputs.len(),
            read_events,
            write_events,
            "transaction realized"
        );
    }

    /// Build the read command and tell each input where its value is.
    ///
    /// # Panics
    ///
    /// Panics unless the transaction is realized and not yet prepared.
    pub fn prepare(&mut self) {
        match self.phase {
            Phase::Realized => {}
            Phase::Configuring => panic!(
                "internal error: transaction '{}' prepared before it was realized",
                self.name
            ),
            Phase::Prepared => panic!("internal error: transaction '{}' prepared twice", self.name),
        }

        let mut command = ReadCommand::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let index = command.push(ReadEntry {
                address: input.address(),
                data_type: input.data_type(),
            });
            input.set_read_index(index);
        }
        self.read_command = command;

        self.phase = Phase::Prepared;
        debug!(transaction = %self.name, entries = self.read_command.len(), "read command prepared");
    }

    // ─── Cycles ─────────────────────────────────────────────────────

    /// Run the task for `role`.
    pub fn perform(&self, role: TaskRole, timestamp: SystemTime) {
        match role {
            TaskRole::Read => self.read(timestamp),
            TaskRole::Write => self.write(timestamp),
        }
    }

    /// Read all inputs with one device command.
    ///
    /// Device errors are absorbed: they become the read error of every
    /// input and raise the transaction's `readError` event.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is not prepared.
    pub fn read(&self, timestamp: SystemTime) {
        if self.phase != Phase::Prepared {
            panic!(
                "internal error: read cycle on transaction '{}' before it was prepared",
                self.name
            );
        }

        let result = self.device.read(&self.read_command);
        if let Err(error) = &result {
            debug!(transaction = %self.name, %error, "read failed");
        }
        self.update_inputs(timestamp, result.as_ref().map_err(|error| *error));
    }

    /// Write all outputs that have a queued value with one device command.
    ///
    /// Does nothing at all if no output has a queued value.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is not realized.
    pub fn write(&self, timestamp: SystemTime) {
        self.expect_realized("write");
        let mut buffers = self.lock_buffers(&self.write_buffers, TaskRole::Write);
        let WriteBuffers {
            events,
            outputs_to_notify,
            command,
        } = &mut *buffers;
        let mut notify = RuntimeBufferSentinel::new(outputs_to_notify);
        let mut command = RuntimeBufferSentinel::new(command);

        for (index, output) in self.outputs.iter().enumerate() {
            if output.add_to_write_command(&mut command) {
                notify.push(index);
            }
        }

        if notify.is_empty() {
            trace!(transaction = %self.name, "nothing to write");
            return;
        }

        // Outputs whose value failed to encode carry their own error and
        // are not part of the command.
        let error = if command.is_empty() {
            None
        } else {
            self.device.write(&command).err()
        };
        if let Some(error) = error {
            debug!(transaction = %self.name, %error, "write failed");
        }

        self.update_outputs(timestamp, error, &notify, events);
    }

    /// Mark every input as having no data, without a device round trip.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is not realized.
    pub fn invalidate_data(&self, timestamp: SystemTime) {
        self.update_inputs(timestamp, Err(IoError::NoData));
    }

    /// Apply a read outcome to the common read status and every input,
    /// commit, then fire the resulting events.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is not realized or another read-side
    /// update is running.
    pub fn update_inputs(&self, timestamp: SystemTime, outcome: PayloadOrError<'_>) {
        self.expect_realized("update_inputs");
        let mut buffers = self.lock_buffers(&self.read_buffers, TaskRole::Read);
        let mut events = RuntimeBufferSentinel::new(&mut buffers.events);

        let mut sentinel = self.read_block.open();
        let common = self
            .read_status
            .update(&mut sentinel, timestamp, outcome.err(), &mut events);
        for input in &self.inputs {
            input.update_read_state(&mut sentinel, timestamp, outcome, common, &mut events);
        }
        sentinel.commit(timestamp, &mut events);
    }

    fn update_outputs(
        &self,
        timestamp: SystemTime,
        error: Option<IoError>,
        notify: &[usize],
        events: &mut PendingEventList,
    ) {
        let mut events = RuntimeBufferSentinel::new(events);

        let mut sentinel = self.write_block.open();
        self.write_status
            .update(&mut sentinel, timestamp, error, &mut events);
        for &index in notify {
            self.outputs[index].update_write_state(&mut sentinel, timestamp, error, &mut events);
        }
        sentinel.commit(timestamp, &mut events);
    }

    // ─── Introspection ──────────────────────────────────────────────

    /// Look up a transaction attribute by name.
    pub fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        self.read_status
            .resolve_attribute(name)
            .or_else(|| self.write_status.resolve_attribute(name))
    }

    /// Look up a transaction event by name.
    ///
    /// Both sides raise an error event; `"writeError"` resolves to the
    /// write side and `"readError"` to the read side.
    pub fn resolve_event(&self, name: &str) -> Option<&Event> {
        self.read_status
            .resolve_event(name)
            .or_else(|| self.write_status.resolve_event(name))
    }

    /// Visit every attribute, read side first.
    pub fn for_each_attribute(&self, f: &mut dyn FnMut(&Attribute) -> ControlFlow<()>) -> ControlFlow<()> {
        self.read_status.for_each_attribute(f)?;
        self.write_status.for_each_attribute(f)
    }

    /// Visit every event, read side first.
    pub fn for_each_event(&self, f: &mut dyn FnMut(&Event) -> ControlFlow<()>) -> ControlFlow<()> {
        self.read_status.for_each_event(f)?;
        self.write_status.for_each_event(f)
    }

    /// Visit the schedulable tasks.
    pub fn for_each_task(&self, f: &mut dyn FnMut(TaskRole) -> ControlFlow<()>) -> ControlFlow<()> {
        f(TaskRole::Read)?;
        f(TaskRole::Write)
    }

    /// Read accessor for a transaction attribute.
    ///
    /// Returns `None` for unknown attributes and before `realize`.
    pub fn make_read_handle(&self, attribute: &Attribute) -> Option<ReadHandle> {
        self.read_status
            .make_read_handle(&self.read_block, attribute)
            .or_else(|| self.write_status.make_read_handle(&self.write_block, attribute))
    }

    /// Read accessor for a transaction attribute given by name.
    pub fn read_handle(&self, name: &str) -> Option<ReadHandle> {
        self.make_read_handle(&self.resolve_attribute(name)?)
    }

    // ─── Helpers ────────────────────────────────────────────────────

    fn link(&self, block: &Arc<DataBlock>, status: &Arc<CommonStatus>) -> TransactionLink {
        TransactionLink {
            name: self.name.clone(),
            block: Arc::clone(block),
            status: Arc::clone(status),
        }
    }

    fn check_component(&self, point: &str, component: &str) -> Result<(), AttachError> {
        if component == self.component {
            return Ok(());
        }
        Err(AttachError::ForeignComponent {
            point: point.to_string(),
            point_component: component.to_string(),
            transaction: self.name.clone(),
            transaction_component: self.component.clone(),
        })
    }

    fn expect_configuring(&self, operation: &str) {
        if self.phase != Phase::Configuring {
            panic!(
                "internal error: IoTransaction::{operation}() called on '{}' after it was realized",
                self.name
            );
        }
    }

    fn expect_realized(&self, operation: &str) {
        if self.phase == Phase::Configuring {
            panic!(
                "internal error: IoTransaction::{operation}() called on '{}' before it was realized",
                self.name
            );
        }
    }

    fn lock_buffers<'a, B>(&self, buffers: &'a Mutex<B>, role: TaskRole) -> MutexGuard<'a, B> {
        match buffers.try_lock() {
            Some(guard) => guard,
            None => panic!(
                "internal error: overlapping {role} cycles on transaction '{}'",
                self.name
            ),
        }
    }
}

impl core::fmt::Debug for IoTransaction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IoTransaction")
            .field("name", &self.name)
            .field("component", &self.component)
            .field("device", &self.device.name())
            .field("phase", &self.phase)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}
