//! Runtime builder and periodic scheduler.
//!
//! [`Runtime`] turns a validated [`IoConfig`] into a running I/O graph:
//! it creates the device, builds every transaction and point, resolves the
//! point to transaction references, then realizes and prepares each
//! transaction. [`Runtime::run`] drives the read and write task of every
//! transaction at its configured period until the running flag clears.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use batchio_common::config::ConfigError;
use batchio_common::device::driver::{Device, DeviceError};
use batchio_common::io::config::IoConfig;
use batchio_common::model::TaskRole;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::device_registry::DeviceRegistry;
use crate::point::{AttachError, Input, Output};
use crate::transaction::IoTransaction;

/// Longest uninterrupted sleep, bounding the shutdown latency.
const MAX_SLEEP: Duration = Duration::from_millis(50);

/// Error building a runtime.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// The configuration could not be loaded or is inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The device could not be created.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// A point could not be attached to its transaction.
    #[error(transparent)]
    Attach(#[from] AttachError),
}

/// Scheduler counters returned by [`Runtime::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Read tasks performed.
    pub reads: u64,
    /// Write tasks performed.
    pub writes: u64,
    /// Tasks that started a full period or more behind schedule.
    pub overruns: u64,
}

/// Periods of one transaction's tasks.
#[derive(Debug, Clone, Copy)]
struct Periods {
    read: Duration,
    write: Duration,
}

/// One schedulable task.
struct ScheduledTask {
    transaction: usize,
    role: TaskRole,
    period: Duration,
    next_due: Instant,
}

/// A realized, prepared I/O graph bound to one device.
pub struct Runtime {
    service_name: String,
    device: Arc<dyn Device>,
    transactions: Vec<Arc<IoTransaction>>,
    periods: Vec<Periods>,
    inputs: Vec<Arc<Input>>,
    outputs: Vec<Arc<Output>>,
    running: Arc<AtomicBool>,
}

impl Runtime {
    /// Load a configuration file and build the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or validated, or if
    /// building fails (see [`from_config`](Self::from_config)).
    pub fn load(path: &Path, registry: &DeviceRegistry) -> Result<Self, RuntimeError> {
        let config = IoConfig::load_validated(path)?;
        info!(path = %path.display(), "configuration loaded");
        Self::from_config(config, registry)
    }

    /// Build the runtime with the device named in the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Device`] if the driver is not registered,
    /// otherwise the errors of [`with_device`](Self::with_device).
    pub fn from_config(config: IoConfig, registry: &DeviceRegistry) -> Result<Self, RuntimeError> {
        let device = registry.create_device(&config.device.driver)?;
        info!(driver = %config.device.driver, "device created");
        Self::with_device(config, device)
    }

    /// Build the runtime around an existing device.
    ///
    /// Nothing is returned on error; transactions built so far are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] if cross references do not
    /// resolve, [`RuntimeError::Attach`] if a point belongs to another I/O
    /// component than its transaction.
    pub fn with_device(config: IoConfig, device: Arc<dyn Device>) -> Result<Self, RuntimeError> {
        config.validate()?;
        let component = config.device.component.as_str();

        // First pass: transactions.
        let mut transactions = Vec::with_capacity(config.transactions.len());
        let mut periods = Vec::with_capacity(config.transactions.len());
        let mut by_name = HashMap::with_capacity(config.transactions.len());
        for (index, transaction) in config.transactions.iter().enumerate() {
            transactions.push(IoTransaction::new(
                transaction.name.as_str(),
                component,
                Arc::clone(&device),
            ));
            periods.push(Periods {
                read: Duration::from_millis(transaction.read_period_ms),
                write: Duration::from_millis(transaction.write_period_ms),
            });
            by_name.insert(transaction.name.as_str(), index);
        }

        let lookup = |point: &str, transaction: &str| -> Result<usize, ConfigError> {
            by_name.get(transaction).copied().ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "point '{point}' references unknown transaction '{transaction}'"
                ))
            })
        };

        // Second pass: points and their transaction references.
        let mut inputs = Vec::with_capacity(config.inputs.len());
        for point in &config.inputs {
            let input = Arc::new(Input::new(
                point.name.as_str(),
                config.component_of(point),
                point.data_type,
                point.address,
            ));
            let index = lookup(&point.name, &point.transaction)?;
            transactions[index].add_input(&input)?;
            inputs.push(input);
        }

        let mut outputs = Vec::with_capacity(config.outputs.len());
        for point in &config.outputs {
            let output = Arc::new(Output::new(
                point.name.as_str(),
                config.component_of(point),
                point.data_type,
                point.address,
            ));
            let index = lookup(&point.name, &point.transaction)?;
            transactions[index].add_output(&output)?;
            outputs.push(output);
        }

        let transactions = transactions
            .into_iter()
            .map(|mut transaction| {
                transaction.realize();
                transaction.prepare();
                Arc::new(transaction)
            })
            .collect::<Vec<_>>();

        info!(
            service = %config.shared.service_name,
            transactions = transactions.len(),
            inputs = inputs.len(),
            outputs = outputs.len(),
            "runtime ready"
        );

        Ok(Self {
            service_name: config.shared.service_name,
            device,
            transactions,
            periods,
            inputs,
            outputs,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// Service instance name.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Device every transaction issues its commands through.
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Transactions, in declaration order.
    pub fn transactions(&self) -> &[Arc<IoTransaction>] {
        &self.transactions
    }

    /// Inputs, in declaration order.
    pub fn inputs(&self) -> &[Arc<Input>] {
        &self.inputs
    }

    /// Outputs, in declaration order.
    pub fn outputs(&self) -> &[Arc<Output>] {
        &self.outputs
    }

    /// Transaction by name.
    pub fn transaction(&self, name: &str) -> Option<&Arc<IoTransaction>> {
        self.transactions.iter().find(|t| t.name() == name)
    }

    /// Input by name.
    pub fn input(&self, name: &str) -> Option<&Arc<Input>> {
        self.inputs.iter().find(|p| p.name() == name)
    }

    /// Output by name.
    pub fn output(&self, name: &str) -> Option<&Arc<Output>> {
        self.outputs.iter().find(|p| p.name() == name)
    }

    /// Get the running flag for signal handlers.
    ///
    /// Clearing it makes [`run`](Self::run) return within one sleep slice.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Request [`run`](Self::run) to return.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Mark the inputs of every transaction as having no data.
    pub fn invalidate_all(&self, timestamp: SystemTime) {
        for transaction in &self.transactions {
            transaction.invalidate_data(timestamp);
        }
    }

    // ─── Scheduler ──────────────────────────────────────────────────

    /// Perform every task at its period until the running flag clears,
    /// then invalidate all inputs.
    ///
    /// Tasks run on the calling thread in due order. A task that falls a
    /// full period behind is rescheduled from now instead of catching up.
    pub fn run(&self) -> RuntimeStats {
        let start = Instant::now();
        let mut tasks = Vec::with_capacity(self.transactions.len() * 2);
        for (index, transaction) in self.transactions.iter().enumerate() {
            let periods = self.periods[index];
            let _ = transaction.for_each_task(&mut |role| {
                let period = match role {
                    TaskRole::Read => periods.read,
                    TaskRole::Write => periods.write,
                };
                tasks.push(ScheduledTask {
                    transaction: index,
                    role,
                    period,
                    next_due: start,
                });
                std::ops::ControlFlow::Continue(())
            });
        }

        info!(tasks = tasks.len(), "scheduler started");
        let mut stats = RuntimeStats::default();

        while self.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            for task in tasks.iter_mut().filter(|task| task.next_due <= now) {
                self.transactions[task.transaction].perform(task.role, SystemTime::now());
                match task.role {
                    TaskRole::Read => stats.reads += 1,
                    TaskRole::Write => stats.writes += 1,
                }

                task.next_due += task.period;
                let now = Instant::now();
                if task.next_due + task.period <= now {
                    stats.overruns += 1;
                    if stats.overruns <= 10 || stats.overruns % 1000 == 0 {
                        warn!(
                            transaction = %self.transactions[task.transaction].name(),
                            role = %task.role,
                            overruns = stats.overruns,
                            "task fell behind schedule"
                        );
                    }
                    task.next_due = now + task.period;
                }
            }

            let Some(next_due) = tasks.iter().map(|task| task.next_due).min() else {
                std::thread::sleep(MAX_SLEEP);
                continue;
            };
            let wait = next_due.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                std::thread::sleep(wait.min(MAX_SLEEP));
            }
        }

        debug!(?stats, "scheduler stopping");
        self.invalidate_all(SystemTime::now());
        info!(
            reads = stats.reads,
            writes = stats.writes,
            overruns = stats.overruns,
            "scheduler stopped"
        );
        stats
    }
}

impl core::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Runtime")
            .field("service_name", &self.service_name)
            .field("device", &self.device.name())
            .field("transactions", &self.transactions)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchio_common::config::ConfigLoader;
    use batchio_common::data::Value;
    use batchio_common::error::IoError;

    const CONFIG: &str = r#"
[shared]
service_name = "unit"

[[transactions]]
name = "fast"
read_period_ms = 5
write_period_ms = 5

[[inputs]]
name = "level"
data_type = "int32"
transaction = "fast"
address = 1

[[outputs]]
name = "setpoint"
data_type = "int32"
transaction = "fast"
address = 1
"#;

    #[test]
    fn builds_and_resolves_points() {
        let config = IoConfig::from_toml(CONFIG).unwrap();
        let runtime = Runtime::from_config(config, &DeviceRegistry::with_builtin()).unwrap();
        assert_eq!(runtime.service_name(), "unit");

        let transaction = runtime.transaction("fast").unwrap();
        assert_eq!(transaction.inputs().len(), 1);
        assert_eq!(transaction.read_command().len(), 1);
        assert_eq!(runtime.input("level").unwrap().transaction_name(), Some("fast"));
        assert!(runtime.output("nope").is_none());
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let mut config = IoConfig::from_toml(CONFIG).unwrap();
        config.device.driver = "modbus".to_string();
        let err = Runtime::from_config(config, &DeviceRegistry::with_builtin()).unwrap_err();
        assert!(matches!(err, RuntimeError::Device(DeviceError::NotFound(_))));
    }

    #[test]
    fn foreign_component_is_rejected() {
        let text = CONFIG.replace("address = 1\n\n[[outputs]]", "address = 1\ncomponent = \"plc9\"\n\n[[outputs]]");
        let config = IoConfig::from_toml_str(&text).unwrap();
        let err = Runtime::from_config(config, &DeviceRegistry::with_builtin()).unwrap_err();
        assert!(matches!(err, RuntimeError::Attach(AttachError::ForeignComponent { .. })));
    }

    #[test]
    fn stopped_runtime_invalidates_inputs() {
        let config = IoConfig::from_toml(CONFIG).unwrap();
        let runtime = Runtime::from_config(config, &DeviceRegistry::with_builtin()).unwrap();
        runtime.stop();
        let stats = runtime.run();
        assert_eq!(stats, RuntimeStats::default());

        let error = runtime.input("level").unwrap().read_handle("error").unwrap();
        assert_eq!(error.read(), Ok(Value::Error(Some(IoError::NoData))));
    }
}
