//! Workspace placeholder crate.
//!
//! This crate exists to expose the individual workspace crates (e.g.,
//! `core-sync`, `core-runtime`, `bridge-sqlite`) behind shared feature flags.
//! Host applications can depend on `picker-workspace` and enable the
//! documented features without needing to wire each crate individually.

pub use bridge_traits;
#[cfg(feature = "sqlite")]
pub use bridge_sqlite;
pub use core_runtime;
pub use core_sync;
