//! Device trait and error types.
//!
//! This module defines:
//! - `Device` trait - Interface a transaction issues its commands through
//! - `DeviceError` enum - Errors creating or looking up devices
//! - `DeviceFactory` type alias - Factory function type

use std::sync::Arc;
use thiserror::Error;

use super::command::{ReadCommand, ReadPayload, WriteCommand};
use crate::error::IoError;

/// Errors creating devices.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    /// No device driver with this name is registered
    #[error("Device driver not found: {0}")]
    NotFound(String),
}

/// Factory function type for creating device instances.
pub type DeviceFactory = fn() -> Arc<dyn Device>;

/// Trait defining the command interface of a device.
///
/// Commands are synchronous. A transaction calls `read()` from its read
/// cycle and `write()` from its write cycle; the two may run on different
/// threads, so implementations must tolerate concurrent calls of
/// different kinds.
///
/// Any failure is reported as an opaque [`IoError`]. The core never
/// retries and never inspects transport detail beyond the code.
pub trait Device: Send + Sync {
    /// Returns the device driver name (e.g., "simulation").
    fn name(&self) -> &str;

    /// Execute a read command.
    ///
    /// On success the payload must contain one field per command entry,
    /// in command order. Fields the device could not supply may be `None`.
    fn read(&self, command: &ReadCommand) -> Result<ReadPayload, IoError>;

    /// Execute a write command.
    fn write(&self, command: &WriteCommand) -> Result<(), IoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullDevice;

    impl Device for NullDevice {
        fn name(&self) -> &str {
            "null"
        }

        fn read(&self, command: &ReadCommand) -> Result<ReadPayload, IoError> {
            Ok(command.entries().iter().map(|_| None).collect())
        }

        fn write(&self, _command: &WriteCommand) -> Result<(), IoError> {
            Err(IoError::device(5))
        }
    }

    #[test]
    fn device_error_display() {
        let err = DeviceError::NotFound("modbus".to_string());
        assert!(err.to_string().contains("modbus"));
    }

    #[test]
    fn trait_object_dispatch() {
        let device: Arc<dyn Device> = Arc::new(NullDevice);
        let payload = device.read(&ReadCommand::default()).unwrap();
        assert!(payload.is_empty());
        assert_eq!(device.write(&WriteCommand::new()), Err(IoError::device(5)));
    }
}
