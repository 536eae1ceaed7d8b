//! # batchio Versioned State Blocks
//!
//! In-process state storage for batched I/O transactions. Each transaction
//! owns two [`DataBlock`]s, one per side. A block holds a fixed layout of
//! type-erased records, has exactly one writer at a time and any number of
//! concurrent readers.
//!
//! ## Write Path
//!
//! ```text
//! ┌─────────────────┐  open   ┌─────────────────┐ commit  ┌─────────────────┐
//! │   DataBlock     ├────────►│  WriteSentinel  ├────────►│ Snapshot (v+2)  │
//! │   (v even)      │         │  (v+1 odd)      │         │ then events     │
//! └─────────────────┘         └────────┬────────┘         └─────────────────┘
//!                                      │ drop
//!                                      ▼
//!                             ┌─────────────────┐
//!                             │ Snapshot (v)    │
//!                             │ no events       │
//!                             └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use batchio_state::{DataArray, DataBlock, PendingEventList};
//! use std::time::SystemTime;
//!
//! let mut layout = DataArray::new();
//! let counter = layout.add(0u32);
//! let block = DataBlock::new("example");
//! block.create(layout);
//!
//! let mut events = PendingEventList::new();
//! let mut sentinel = block.open();
//! *sentinel.get_mut(counter) += 1;
//! sentinel.commit(SystemTime::now(), &mut events);
//!
//! assert_eq!(block.read(counter, |v| *v), Some(1));
//! assert_eq!(block.version(), 2);
//! ```
//!
//! ## Thread Safety
//!
//! - **DataBlock**: `Send + Sync`; readers never wait for a writer to finish
//!   staging
//! - **WriteSentinel**: one per block at a time, opening a second one panics
//! - **PendingEventList**: owned by the cycle that fills it

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod error;
pub mod handle;
pub mod layout;
pub mod pending;
pub mod sentinel;
pub mod version;

pub use block::{DataBlock, Snapshot};
pub use error::AccessError;
pub use handle::{ReadHandle, WriteHandle};
pub use layout::{DataArray, SlotHandle, SlotRecord};
pub use pending::PendingEventList;
pub use sentinel::WriteSentinel;
pub use version::VersionCounter;

static_assertions::assert_impl_all!(DataBlock: Send, Sync);
static_assertions::assert_impl_all!(ReadHandle: Send, Sync, Clone);
static_assertions::assert_impl_all!(WriteHandle: Send, Sync, Clone);
static_assertions::assert_impl_all!(PendingEventList: Send);
