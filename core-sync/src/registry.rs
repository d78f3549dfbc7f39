//! Cloud provider registry.
//!
//! Enumerates the cloud media providers installed on the device and applies
//! the device allow-list from the [`ConfigStore`]. The local provider is
//! not part of these listings; it is owned by the picker process itself.

use std::sync::Arc;

use bridge_traits::{ProviderDiscovery, ProviderInfo};
use core_runtime::ConfigStore;

use crate::error::{Result, SyncError};

pub struct ProviderRegistry {
    discovery: Arc<dyn ProviderDiscovery>,
    config: Arc<dyn ConfigStore>,
}

impl ProviderRegistry {
    pub fn new(discovery: Arc<dyn ProviderDiscovery>, config: Arc<dyn ConfigStore>) -> Self {
        Self { discovery, config }
    }

    /// Installed **and** allow-listed cloud providers.
    pub async fn available_cloud_providers(&self) -> Result<Vec<ProviderInfo>> {
        let allowed = self.config.allowed_cloud_provider_packages();
        let installed = self.installed().await?;

        Ok(installed
            .into_iter()
            .filter(|info| allowed.iter().any(|pkg| info.matches_package(pkg)))
            .collect())
    }

    /// Installed cloud providers, ignoring the allow-list. Used for
    /// provider-support checks and diagnostics.
    pub async fn all_available_cloud_providers(&self) -> Result<Vec<ProviderInfo>> {
        self.installed().await
    }

    /// Resolve an authority to its [`ProviderInfo`], or the empty sentinel
    /// when the authority is absent from the relevant listing.
    pub async fn resolve(
        &self,
        authority: Option<&str>,
        ignore_allowlist: bool,
    ) -> Result<ProviderInfo> {
        let Some(authority) = authority else {
            return Ok(ProviderInfo::empty());
        };

        let providers = if ignore_allowlist {
            self.all_available_cloud_providers().await?
        } else {
            self.available_cloud_providers().await?
        };

        Ok(providers
            .into_iter()
            .find(|info| info.authority == authority)
            .unwrap_or_else(ProviderInfo::empty))
    }

    /// Process identity of the picker process itself.
    pub fn current_uid(&self) -> u32 {
        self.discovery.current_uid()
    }

    async fn installed(&self) -> Result<Vec<ProviderInfo>> {
        self.discovery
            .installed_providers()
            .await
            .map_err(|e| SyncError::Provider(e.to_string()))
    }
}
