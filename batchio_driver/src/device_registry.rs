//! Device registry.
//!
//! Provides a `DeviceRegistry` struct for registering and looking up device
//! factories by driver name. The registry is built at startup and handed
//! to the runtime; there is no global state.

use std::collections::HashMap;
use std::sync::Arc;

use batchio_common::device::driver::{Device, DeviceError, DeviceFactory};

use crate::devices;

/// Registry of available device drivers.
pub struct DeviceRegistry {
    factories: HashMap<&'static str, DeviceFactory>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        devices::register_builtin(&mut registry);
        registry
    }

    /// Register a device factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: DeviceFactory) {
        if self.factories.contains_key(name) {
            panic!("Device driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a device factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DeviceFactory> {
        self.factories.get(name).copied()
    }

    /// Create a device instance by driver name.
    ///
    /// # Errors
    /// Returns `DeviceError::NotFound` if no driver with the given name is registered.
    pub fn create_device(&self, name: &str) -> Result<Arc<dyn Device>, DeviceError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered driver names.
    pub fn list_devices(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchio_common::device::command::{ReadCommand, ReadPayload, WriteCommand};
    use batchio_common::error::IoError;

    struct TestDevice;

    impl Device for TestDevice {
        fn name(&self) -> &str {
            "test"
        }

        fn read(&self, command: &ReadCommand) -> Result<ReadPayload, IoError> {
            Ok(command.entries().iter().map(|_| None).collect())
        }

        fn write(&self, _command: &WriteCommand) -> Result<(), IoError> {
            Ok(())
        }
    }

    fn create_test_device() -> Arc<dyn Device> {
        Arc::new(TestDevice)
    }

    #[test]
    fn registry_register_and_create() {
        let mut reg = DeviceRegistry::new();
        reg.register("test_device", create_test_device);

        let device = reg.create_device("test_device").expect("should create");
        assert_eq!(device.name(), "test");
    }

    #[test]
    fn registry_device_not_found() {
        let reg = DeviceRegistry::new();
        let result = reg.create_device("nonexistent");
        assert!(matches!(result, Err(DeviceError::NotFound(_))));
    }

    #[test]
    fn registry_list_devices() {
        let mut reg = DeviceRegistry::new();
        reg.register("alpha", create_test_device);
        reg.register("beta", create_test_device);

        let mut names = reg.list_devices();
        names.sort();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn builtin_registry_has_simulation() {
        let reg = DeviceRegistry::with_builtin();
        assert!(reg.get_factory("simulation").is_some());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_duplicate_panics() {
        let mut reg = DeviceRegistry::new();
        reg.register("dup", create_test_device);
        reg.register("dup", create_test_device);
    }
}
