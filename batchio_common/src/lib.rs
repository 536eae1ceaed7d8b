//! batchio Common Library
//!
//! Shared types for all batchio workspace crates.
//!
//! # Module Structure
//!
//! - [`data`] - Data type keywords, dynamic values, quality, direction
//! - [`error`] - I/O error codes stored in state records
//! - [`event`] - Change notification events
//! - [`model`] - Attributes, tasks and well-known names
//! - [`device`] - Device trait and command types
//! - [`config`] - Configuration loading traits and types
//! - [`io`] - I/O graph configuration
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod event;
pub mod io;
pub mod model;
pub mod prelude;

static_assertions::assert_impl_all!(event::Event: Send, Sync, Clone);
static_assertions::assert_impl_all!(error::IoError: Send, Sync, Copy);
