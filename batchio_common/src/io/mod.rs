//! I/O graph configuration.
//!
//! Describes the device, the transactions and the data points attached to
//! them. Parsed from the same TOML document as [`crate::config::SharedConfig`].

pub mod config;
