//! Simulation device.
//!
//! An in-memory address space. Reads return the bytes stored at each
//! requested address, writes store them. Addresses never written read back
//! as the zero value of the requested type. Faults can be injected per
//! direction to exercise error paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use batchio_common::device::command::{ReadCommand, ReadPayload, WriteCommand};
use batchio_common::device::driver::Device;
use batchio_common::error::IoError;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::scalar::{ScalarType, default_bytes};

/// Driver name the simulation device registers under.
pub const DRIVER_NAME: &str = "simulation";

/// Stored content of one address. `None` marks an address the device
/// cannot supply.
type Cell = Option<Vec<u8>>;

/// In-memory device.
#[derive(Default)]
pub struct SimulationDevice {
    memory: RwLock<HashMap<u32, Cell>>,
    read_fault: Mutex<Option<IoError>>,
    write_fault: Mutex<Option<IoError>>,
    reads: AtomicU64,
    writes: AtomicU64,
    last_write: Mutex<Option<WriteCommand>>,
}

impl SimulationDevice {
    /// Create a device with an empty address space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes at `address`.
    pub fn poke(&self, address: u32, bytes: Vec<u8>) {
        self.memory.write().insert(address, Some(bytes));
    }

    /// Store an encoded value at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Encode`] if the value cannot be encoded.
    pub fn poke_value<T: ScalarType>(&self, address: u32, value: &T) -> Result<(), IoError> {
        self.poke(address, value.encode()?);
        Ok(())
    }

    /// Make `address` unreadable. Reads report no field for it.
    pub fn clear(&self, address: u32) {
        self.memory.write().insert(address, None);
    }

    /// Raw bytes stored at `address`, if any.
    pub fn peek(&self, address: u32) -> Option<Vec<u8>> {
        self.memory.read().get(&address).cloned().flatten()
    }

    /// Decoded value stored at `address`, if any.
    pub fn peek_value<T: ScalarType>(&self, address: u32) -> Option<T> {
        T::decode(&self.peek(address)?).ok()
    }

    /// Fail every read with `fault` until cleared with `None`.
    pub fn fail_reads(&self, fault: Option<IoError>) {
        *self.read_fault.lock() = fault;
    }

    /// Fail every write with `fault` until cleared with `None`.
    pub fn fail_writes(&self, fault: Option<IoError>) {
        *self.write_fault.lock() = fault;
    }

    /// Number of read commands executed, failed ones included.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of write commands executed, failed ones included.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Most recent write command, failed ones included.
    pub fn last_write(&self) -> Option<WriteCommand> {
        self.last_write.lock().clone()
    }
}

impl Device for SimulationDevice {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn read(&self, command: &ReadCommand) -> Result<ReadPayload, IoError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if let Some(fault) = *self.read_fault.lock() {
            return Err(fault);
        }

        let memory = self.memory.read();
        let payload: ReadPayload = command
            .entries()
            .iter()
            .map(|entry| match memory.get(&entry.address) {
                Some(cell) => cell.clone(),
                None => Some(default_bytes(entry.data_type)),
            })
            .collect();
        trace!(entries = command.len(), "simulated read");
        Ok(payload)
    }

    fn write(&self, command: &WriteCommand) -> Result<(), IoError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        *self.last_write.lock() = Some(command.clone());
        if let Some(fault) = *self.write_fault.lock() {
            return Err(fault);
        }

        let mut memory = self.memory.write();
        for entry in command.entries() {
            memory.insert(entry.address, Some(entry.data.clone()));
        }
        trace!(entries = command.len(), "simulated write");
        Ok(())
    }
}

/// Factory function for creating a simulation device.
pub fn create_device() -> Arc<dyn Device> {
    Arc::new(SimulationDevice::new())
}
