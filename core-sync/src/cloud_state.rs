//! Tri-state tracking of the active cloud provider.
//!
//! The state distinguishes "never configured" from "explicitly cleared by
//! the user": after an explicit clear the controller must not auto-select a
//! default provider again, while a never-configured device may. The
//! in-memory representation is an explicit tagged enum; the persisted form
//! is the user-prefs string (absent key / `"-"` sentinel / authority).

use bridge_traits::ProviderInfo;

/// Persisted sentinel meaning "the user explicitly cleared the provider".
pub const CLOUD_PROVIDER_UNSET_VALUE: &str = "-";

/// The active cloud provider, as tracked in memory under the
/// cloud-provider lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudProviderState {
    /// Never configured; default selection may pick a provider.
    NotSet,
    /// Explicitly cleared by the user; no cloud sync, no auto-selection.
    Unset,
    /// This provider is active.
    Set(ProviderInfo),
}

impl CloudProviderState {
    /// The active authority, `None` unless a provider is set.
    pub fn authority(&self) -> Option<&str> {
        match self {
            CloudProviderState::Set(info) => Some(&info.authority),
            _ => None,
        }
    }

    /// The active provider identity, the empty sentinel unless set.
    pub fn provider_info(&self) -> ProviderInfo {
        match self {
            CloudProviderState::Set(info) => info.clone(),
            _ => ProviderInfo::empty(),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, CloudProviderState::Set(_))
    }

    /// The user-prefs encoding of this state: `None` removes the key,
    /// `Some` stores the value.
    pub fn to_persisted_value(&self) -> Option<&str> {
        match self {
            CloudProviderState::NotSet => None,
            CloudProviderState::Unset => Some(CLOUD_PROVIDER_UNSET_VALUE),
            CloudProviderState::Set(info) => Some(&info.authority),
        }
    }

    /// Whether a raw persisted value is the explicit-clear sentinel.
    pub fn is_unset_sentinel(raw: &str) -> bool {
        raw == CLOUD_PROVIDER_UNSET_VALUE
    }
}
