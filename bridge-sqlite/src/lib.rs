//! # SQLite Bridge Adapters
//!
//! Concrete bridge implementations backed by SQLite, used by hosts that keep
//! their preferences in local database files.
//!
//! Currently ships [`SqliteSettingsStore`], the persistence behind the sync
//! core's user-prefs and sync-prefs namespaces.

pub mod settings;

pub use settings::SqliteSettingsStore;
