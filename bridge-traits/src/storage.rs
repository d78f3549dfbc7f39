//! Key-Value Settings Storage
//!
//! Abstracts platform-specific preferences storage. The sync core keeps two
//! independent namespaces on top of this trait: *user-prefs* (which cloud
//! provider the user selected) and *sync-prefs* (per-provider sync cursors
//! and resumable page tokens), each backed by its own store instance.
//!
//! Every call is atomic on its own; readers never observe a torn write.
//! Reads of missing keys succeed and return `None`.

use crate::error::Result;

/// Key-value settings storage trait.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_authority(store: &dyn SettingsStore) -> Result<()> {
///     store.set_string("cloud_provider_authority", "com.example.photos").await?;
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value.
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store an integer value.
    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    /// Retrieve an integer value.
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Delete a setting. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists.
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List all setting keys.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all settings.
    async fn clear_all(&self) -> Result<()>;
}

// Blanket implementation so an Arc<dyn SettingsStore> can be passed where a
// store is expected.
#[async_trait::async_trait]
impl SettingsStore for std::sync::Arc<dyn SettingsStore> {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_string(key, value).await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        (**self).get_string(key).await
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        (**self).set_i64(key, value).await
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        (**self).get_i64(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        (**self).has_key(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        (**self).list_keys().await
    }

    async fn clear_all(&self) -> Result<()> {
        (**self).clear_all().await
    }
}
