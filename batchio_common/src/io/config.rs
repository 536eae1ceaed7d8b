//! I/O configuration structs.
//!
//! Deserialized from the batchio TOML document. Parsing rejects unknown
//! parameters, missing fields and unknown data type keywords with the TOML
//! source location; [`IoConfig::validate`] then resolves the references
//! between points and transactions. A document that fails either step is
//! rejected as a whole.
//!
//! ```toml
//! [shared]
//! service_name = "press-line"
//!
//! [device]
//! driver = "simulation"
//! component = "plc1"
//!
//! [[transactions]]
//! name = "fast"
//! read_period_ms = 10
//!
//! [[inputs]]
//! name = "door_open"
//! data_type = "bool"
//! transaction = "fast"
//! address = 0
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::config::{ConfigError, ConfigLoader, SharedConfig};
use crate::data::DataType;

/// Default device driver.
pub const DEFAULT_DRIVER: &str = "simulation";
/// Default I/O component name.
pub const DEFAULT_COMPONENT: &str = "device";
/// Default read and write period in milliseconds.
pub const DEFAULT_PERIOD_MS: u64 = 100;

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

fn default_component() -> String {
    DEFAULT_COMPONENT.to_string()
}

fn default_period() -> u64 {
    DEFAULT_PERIOD_MS
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Cross-reference validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoConfigError {
    /// A transaction or point has an empty name.
    #[error("{kind} with empty name")]
    EmptyName {
        /// "transaction", "input" or "output"
        kind: &'static str,
    },
    /// Two transactions share a name.
    #[error("duplicate transaction '{name}'")]
    DuplicateTransaction {
        /// Transaction name
        name: String,
    },
    /// Two points of the same direction share a name.
    #[error("duplicate {kind} '{name}'")]
    DuplicatePoint {
        /// "input" or "output"
        kind: &'static str,
        /// Point name
        name: String,
    },
    /// A point references a transaction that does not exist.
    #[error("{kind} '{point}' references unknown transaction '{transaction}'")]
    UnknownTransaction {
        /// "input" or "output"
        kind: &'static str,
        /// Point name
        point: String,
        /// Referenced transaction name
        transaction: String,
    },
    /// A period of zero.
    #[error("transaction '{name}' has a zero {which} period")]
    ZeroPeriod {
        /// Transaction name
        name: String,
        /// "read" or "write"
        which: &'static str,
    },
}

impl From<IoConfigError> for ConfigError {
    fn from(error: IoConfigError) -> Self {
        ConfigError::ValidationError(error.to_string())
    }
}

// ─── Sections ───────────────────────────────────────────────────────

/// `[device]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Registered device driver name.
    #[serde(default = "default_driver")]
    pub driver: String,
    /// I/O component every transaction and point belongs to by default.
    #[serde(default = "default_component")]
    pub component: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            component: default_component(),
        }
    }
}

/// `[[transactions]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionConfig {
    /// Transaction name, referenced by points.
    pub name: String,
    /// Period of the read task [ms].
    #[serde(default = "default_period")]
    pub read_period_ms: u64,
    /// Period of the write task [ms].
    #[serde(default = "default_period")]
    pub write_period_ms: u64,
}

/// `[[inputs]]` or `[[outputs]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointConfig {
    /// Point name.
    pub name: String,
    /// Scalar type keyword selecting the value handler.
    pub data_type: DataType,
    /// Name of the owning transaction.
    pub transaction: String,
    /// Device item address.
    pub address: u32,
    /// I/O component override. Defaults to the device component.
    #[serde(default)]
    pub component: Option<String>,
}

/// Complete I/O configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IoConfig {
    /// Common settings.
    pub shared: SharedConfig,
    /// Device settings.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Transactions, in declaration order.
    #[serde(default)]
    pub transactions: Vec<TransactionConfig>,
    /// Inputs, in declaration order.
    #[serde(default)]
    pub inputs: Vec<PointConfig>,
    /// Outputs, in declaration order.
    #[serde(default)]
    pub outputs: Vec<PointConfig>,
}

impl IoConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config = Self::from_toml_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a TOML file.
    pub fn load_validated(path: &std::path::Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate names and cross references.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        let mut transactions = HashSet::new();
        for transaction in &self.transactions {
            if transaction.name.is_empty() {
                return Err(IoConfigError::EmptyName {
                    kind: "transaction",
                }
                .into());
            }
            if !transactions.insert(transaction.name.as_str()) {
                return Err(IoConfigError::DuplicateTransaction {
                    name: transaction.name.clone(),
                }
                .into());
            }
            for (which, period) in [
                ("read", transaction.read_period_ms),
                ("write", transaction.write_period_ms),
            ] {
                if period == 0 {
                    return Err(IoConfigError::ZeroPeriod {
                        name: transaction.name.clone(),
                        which,
                    }
                    .into());
                }
            }
        }

        for (kind, points) in [("input", &self.inputs), ("output", &self.outputs)] {
            let mut names = HashSet::new();
            for point in points {
                if point.name.is_empty() {
                    return Err(IoConfigError::EmptyName { kind }.into());
                }
                if !names.insert(point.name.as_str()) {
                    return Err(IoConfigError::DuplicatePoint {
                        kind,
                        name: point.name.clone(),
                    }
                    .into());
                }
                if !transactions.contains(point.transaction.as_str()) {
                    return Err(IoConfigError::UnknownTransaction {
                        kind,
                        point: point.name.clone(),
                        transaction: point.transaction.clone(),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    /// Component a point belongs to.
    pub fn component_of<'a>(&'a self, point: &'a PointConfig) -> &'a str {
        point
            .component
            .as_deref()
            .unwrap_or(self.device.component.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[shared]
service_name = "unit"

[[transactions]]
name = "t1"

[[inputs]]
name = "a"
data_type = "bool"
transaction = "t1"
address = 1
"#;

    #[test]
    fn defaults_are_applied() {
        let config = IoConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.device, DeviceConfig::default());
        assert_eq!(config.transactions[0].read_period_ms, DEFAULT_PERIOD_MS);
        assert_eq!(config.component_of(&config.inputs[0]), DEFAULT_COMPONENT);
        assert!(config.outputs.is_empty());
    }

    #[test]
    fn unknown_transaction_reference_is_rejected() {
        let text = MINIMAL.replace("transaction = \"t1\"", "transaction = \"t9\"");
        match IoConfig::from_toml(&text) {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("t9"));
                assert!(msg.contains("'a'"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn zero_period_is_rejected() {
        let text = MINIMAL.replace("name = \"t1\"", "name = \"t1\"\nwrite_period_ms = 0");
        assert!(matches!(
            IoConfig::from_toml(&text),
            Err(ConfigError::ValidationError(msg)) if msg.contains("write")
        ));
    }
}
