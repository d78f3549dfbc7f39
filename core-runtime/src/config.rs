//! # Sync Configuration
//!
//! Provides the device sync configuration consumed by the picker sync core.
//!
//! ## Overview
//!
//! The [`ConfigStore`] trait is the read surface the sync controller
//! consults at decision points: whether the cloud-media feature is enabled
//! at all, which cloud provider packages are allow-listed, and which
//! package (if any) should be selected as the default cloud provider when
//! none was ever configured.
//!
//! [`PickerConfig`] is the standard implementation, assembled with a
//! fail-fast builder. Hosts wire it from their flag system at startup;
//! tests either build one inline or substitute their own `ConfigStore`
//! fake.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::PickerConfig;
//!
//! let config = PickerConfig::builder()
//!     .cloud_media_enabled(true)
//!     .allow_cloud_provider("com.example.photos")
//!     .default_cloud_provider_package("com.example.photos")
//!     .build()
//!     .expect("valid picker config");
//!
//! assert!(config.cloud_media_enabled);
//! ```

use crate::error::{Error, Result};

/// Read surface for the device sync configuration.
///
/// Implementations must answer from current state on every call; the sync
/// controller re-reads flags at each decision point rather than caching
/// them.
pub trait ConfigStore: Send + Sync {
    /// Whether cloud media integration in the photo picker is enabled.
    fn cloud_media_enabled(&self) -> bool;

    /// Package name of the cloud provider to select by default when none
    /// has ever been configured, if the device ships one.
    fn default_cloud_provider_package(&self) -> Option<String>;

    /// Package names of the cloud providers the device allows.
    fn allowed_cloud_provider_packages(&self) -> Vec<String>;
}

/// Standard [`ConfigStore`] implementation holding a fixed snapshot of the
/// device flags.
#[derive(Debug, Clone, Default)]
pub struct PickerConfig {
    /// Whether cloud media integration is enabled.
    pub cloud_media_enabled: bool,
    /// Default cloud provider package, if any.
    pub default_cloud_provider_package: Option<String>,
    /// Allow-listed cloud provider packages.
    pub allowed_cloud_provider_packages: Vec<String>,
}

impl PickerConfig {
    /// Start building a configuration.
    pub fn builder() -> PickerConfigBuilder {
        PickerConfigBuilder::default()
    }
}

impl ConfigStore for PickerConfig {
    fn cloud_media_enabled(&self) -> bool {
        self.cloud_media_enabled
    }

    fn default_cloud_provider_package(&self) -> Option<String> {
        self.default_cloud_provider_package.clone()
    }

    fn allowed_cloud_provider_packages(&self) -> Vec<String> {
        self.allowed_cloud_provider_packages.clone()
    }
}

/// Builder for [`PickerConfig`] with fail-fast validation.
#[derive(Debug, Default)]
pub struct PickerConfigBuilder {
    cloud_media_enabled: bool,
    default_cloud_provider_package: Option<String>,
    allowed_cloud_provider_packages: Vec<String>,
}

impl PickerConfigBuilder {
    /// Enable or disable cloud media integration.
    pub fn cloud_media_enabled(mut self, enabled: bool) -> Self {
        self.cloud_media_enabled = enabled;
        self
    }

    /// Set the default cloud provider package.
    pub fn default_cloud_provider_package(mut self, package: impl Into<String>) -> Self {
        self.default_cloud_provider_package = Some(package.into());
        self
    }

    /// Add a package to the cloud provider allow-list.
    pub fn allow_cloud_provider(mut self, package: impl Into<String>) -> Self {
        self.allowed_cloud_provider_packages.push(package.into());
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a default cloud provider package is
    /// named but missing from the allow-list; such a default could never
    /// be selected.
    pub fn build(self) -> Result<PickerConfig> {
        if let Some(default_pkg) = &self.default_cloud_provider_package {
            if !self
                .allowed_cloud_provider_packages
                .iter()
                .any(|pkg| pkg == default_pkg)
            {
                return Err(Error::Config(format!(
                    "Default cloud provider package '{}' is not allow-listed",
                    default_pkg
                )));
            }
        }

        Ok(PickerConfig {
            cloud_media_enabled: self.cloud_media_enabled,
            default_cloud_provider_package: self.default_cloud_provider_package,
            allowed_cloud_provider_packages: self.allowed_cloud_provider_packages,
        })
    }
}
