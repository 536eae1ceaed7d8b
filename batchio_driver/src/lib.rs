//! # batchio Driver Library
//!
//! Batched I/O transactions over typed data points.
//!
//! A transaction groups inputs and outputs of one I/O component. Each read
//! cycle issues one device read for all inputs, each write cycle one device
//! write for all outputs with a queued value. Point state lives in the
//! transaction's versioned data blocks; change events fire only after the
//! block commit.
//!
//! # Module Structure
//!
//! - [`scalar`] - Scalar value types and their byte codec
//! - [`handler`] - Typed input and output handlers
//! - [`status`] - Common read and write status of a transaction
//! - [`point`] - Inputs and outputs
//! - [`transaction`] - `IoTransaction` lifecycle and cycles
//! - [`device_registry`] - Device factory registration
//! - [`devices`] - Device implementations
//! - [`runtime`] - Configuration driven runtime and scheduler
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Runtime                                 │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │  Scheduler  ├───►│ IoTransaction│◄──►│  Device (trait obj) │  │
//! │  │ (periods)   │    │ read / write │    │                     │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            │ update                              │
//! │               ┌────────────┴────────────┐                        │
//! │               ▼                         ▼                        │
//! │     ┌──────────────────┐      ┌──────────────────┐               │
//! │     │ Input handlers   │      │ Output handlers  │               │
//! │     │ read DataBlock   │      │ write DataBlock  │               │
//! │     └──────────────────┘      └──────────────────┘               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod device_registry;
pub mod devices;
pub mod handler;
pub mod point;
pub mod runtime;
pub mod scalar;
pub mod status;
pub mod transaction;

// Re-export key types for convenience
pub use crate::device_registry::DeviceRegistry;
pub use crate::devices::simulation::SimulationDevice;
pub use crate::point::{AttachError, Input, Output};
pub use crate::runtime::{Runtime, RuntimeError, RuntimeStats};
pub use crate::scalar::ScalarType;
pub use crate::status::{CommonChanges, CommonStatus};
pub use crate::transaction::{IoTransaction, Phase};

static_assertions::assert_impl_all!(IoTransaction: Send, Sync);
static_assertions::assert_impl_all!(Input: Send, Sync);
static_assertions::assert_impl_all!(Output: Send, Sync);
static_assertions::assert_impl_all!(Runtime: Send, Sync);
