//! # Picker Sync Module
//!
//! Keeps the device-local picker database consistent with the media
//! providers on the device: the built-in local provider and, when one is
//! enabled, a third-party cloud provider.
//!
//! ## Components
//!
//! - **Controller** (`controller`): public entry points, lock composition
//!   and retry policy
//! - **Planner** (`planner`): decides per provider between no sync, an
//!   incremental delta, a full resync, or a reset
//! - **Paged Engine** (`pager`): executes paged provider queries as
//!   resumable, transactional writes
//! - **Cloud Provider State** (`cloud_state`): tri-state tracking of the
//!   active cloud provider and its persisted encoding
//! - **Provider Registry** (`registry`): installed-provider enumeration and
//!   allow-list filtering
//! - **Preferences** (`preferences`): typed accessor over the user-prefs
//!   and sync-prefs namespaces
//! - **Notifications** (`notify`): observable-URI assembly and publishing

pub mod cloud_state;
pub mod controller;
pub mod error;
pub mod notify;
pub mod pager;
pub mod planner;
pub mod preferences;
pub mod registry;

pub use cloud_state::{CloudProviderState, CLOUD_PROVIDER_UNSET_VALUE};
pub use controller::{
    PickerSyncController, IDLE_MAINTENANCE_SYNC_LOCK, LOCAL_PICKER_PROVIDER_AUTHORITY,
};
pub use error::{Result, SyncError};
pub use notify::{build_notification_uri, PICKER_INTERNAL_BASE_URI};
pub use pager::{PageState, SyncOperation};
pub use planner::{SyncRequestParams, PAGE_SIZE};
pub use preferences::{resume_key, SyncPreferences};
pub use registry::ProviderRegistry;
