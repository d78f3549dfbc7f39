//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the picker sync core:
//! - Logging and tracing infrastructure
//! - Device sync configuration
//! - Event bus system for change notifications
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the sync core depends on. It
//! establishes the logging conventions and the event broadcasting mechanism
//! the picker UI observes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{ConfigStore, PickerConfig};
pub use error::{Error, Result};
pub use events::{EventBus, PickerEvent};
