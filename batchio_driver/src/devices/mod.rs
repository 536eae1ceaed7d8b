//! Device implementations.
//!
//! - [`simulation`] - In-memory device for development and testing
//!
//! # Adding New Devices
//!
//! 1. Create a new submodule under `devices/`
//! 2. Implement the `Device` trait from `batchio_common::device::driver`
//! 3. Register its factory in [`register_builtin`]

pub mod simulation;

use crate::device_registry::DeviceRegistry;

/// Register all built-in devices.
pub fn register_builtin(registry: &mut DeviceRegistry) {
    registry.register(simulation::DRIVER_NAME, simulation::create_device);
}
