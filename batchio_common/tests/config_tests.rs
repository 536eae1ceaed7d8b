//! I/O configuration loading tests.
//!
//! Tests for `IoConfig`: full document loading from disk, unknown parameter
//! rejection with source location, missing fields, unknown data type
//! keywords, duplicate names, component overrides.

use batchio_common::config::ConfigError;
use batchio_common::data::DataType;
use batchio_common::io::config::IoConfig;
use std::fs;
use tempfile::TempDir;

const FULL: &str = r#"
[shared]
service_name = "press-line"
log_level = "debug"

[device]
driver = "simulation"
component = "plc1"

[[transactions]]
name = "fast"
read_period_ms = 10
write_period_ms = 20

[[transactions]]
name = "slow"

[[inputs]]
name = "door_open"
data_type = "bool"
transaction = "fast"
address = 0

[[inputs]]
name = "pressure"
data_type = "float64"
transaction = "slow"
address = 8

[[outputs]]
name = "setpoint"
data_type = "int32"
transaction = "fast"
address = 100

[[outputs]]
name = "label"
data_type = "string"
transaction = "fast"
address = 101
component = "hmi"
"#;

fn expect_parse_error(text: &str) -> String {
    match IoConfig::from_toml(text) {
        Err(ConfigError::ParseError(msg)) => msg,
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_full_document_loads_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("batchio.toml");
    fs::write(&path, FULL).unwrap();

    let config = IoConfig::load_validated(&path).unwrap();
    assert_eq!(config.shared.service_name, "press-line");
    assert_eq!(config.device.component, "plc1");
    assert_eq!(config.transactions.len(), 2);
    assert_eq!(config.transactions[0].write_period_ms, 20);
    assert_eq!(config.inputs[1].data_type, DataType::Float64);
    assert_eq!(config.outputs[0].address, 100);
    assert_eq!(config.component_of(&config.outputs[0]), "plc1");
    assert_eq!(config.component_of(&config.outputs[1]), "hmi");
}

#[test]
fn test_missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let result = IoConfig::load_validated(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

#[test]
fn test_unknown_parameter_reports_location() {
    let text = FULL.replace("address = 8", "address = 8\nscale = 2.0");
    let msg = expect_parse_error(&text);
    assert!(msg.contains("scale"), "{msg}");
    assert!(msg.contains("line"), "{msg}");
}

#[test]
fn test_unknown_data_type_keyword_is_rejected() {
    let text = FULL.replace("data_type = \"float64\"", "data_type = \"real\"");
    let msg = expect_parse_error(&text);
    assert!(msg.contains("real"), "{msg}");
}

#[test]
fn test_missing_required_field_is_rejected() {
    let text = FULL.replace("transaction = \"slow\"\n", "");
    let msg = expect_parse_error(&text);
    assert!(msg.contains("transaction"), "{msg}");
}

#[test]
fn test_duplicate_point_names_are_rejected() {
    let text = FULL.replace("name = \"pressure\"", "name = \"door_open\"");
    match IoConfig::from_toml(&text) {
        Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("door_open")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_duplicate_transaction_names_are_rejected() {
    let text = FULL.replace("name = \"slow\"", "name = \"fast\"");
    assert!(matches!(
        IoConfig::from_toml(&text),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_same_name_allowed_across_directions() {
    let text = FULL.replace("name = \"setpoint\"", "name = \"door_open\"");
    assert!(IoConfig::from_toml(&text).is_ok());
}
