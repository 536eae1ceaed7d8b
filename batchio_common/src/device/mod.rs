//! Device command interface.
//!
//! The device performs the actual read and write commands for an I/O
//! transaction. Its transport and protocol are out of scope for the core;
//! only the command and payload shapes are defined here.

pub mod command;
pub mod driver;
