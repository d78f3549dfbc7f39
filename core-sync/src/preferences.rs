//! Typed accessor over the two preferences namespaces.
//!
//! *User-prefs* holds the single key recording which cloud provider the
//! user selected. *Sync-prefs* holds per-provider sync cursors and the
//! resumable page tokens of in-flight paged operations, keyed with a
//! `local_provider:` / `cloud_provider:` prefix so the two providers never
//! collide.
//!
//! Reads of missing values yield defaults (`None` strings, `-1`
//! generations); only the underlying store failing surfaces as an error.

use std::sync::Arc;

use bridge_traits::{MediaCollectionInfo, SettingsStore};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::pager::SyncOperation;

/// User-prefs key holding the persisted cloud provider authority.
pub const PREFS_KEY_CLOUD_PROVIDER_AUTHORITY: &str = "cloud_provider_authority";

const PREFS_KEY_LOCAL_PREFIX: &str = "local_provider:";
const PREFS_KEY_CLOUD_PREFIX: &str = "cloud_provider:";

const PREFS_KEY_MEDIA_COLLECTION_ID: &str = "media_collection_id";
const PREFS_KEY_LAST_MEDIA_SYNC_GENERATION: &str = "last_media_sync_generation";

const PREFS_KEY_RESUME: &str = "resume";
const PREFS_KEY_OPERATION_MEDIA_ADD_PREFIX: &str = "media_add:";
const PREFS_KEY_OPERATION_ALBUM_ADD_PREFIX: &str = "album_add:";
const PREFS_KEY_OPERATION_MEDIA_REMOVE_PREFIX: &str = "media_remove:";

fn prefs_key(is_local: bool, key: &str) -> String {
    let prefix = if is_local {
        PREFS_KEY_LOCAL_PREFIX
    } else {
        PREFS_KEY_CLOUD_PREFIX
    };
    format!("{prefix}{key}")
}

/// Resume key for a paged operation, e.g. `cloud_provider:media_add:resume`.
pub fn resume_key(is_local: bool, op: SyncOperation) -> String {
    let op_prefix = match op {
        SyncOperation::AddMedia => PREFS_KEY_OPERATION_MEDIA_ADD_PREFIX,
        SyncOperation::AddAlbum => PREFS_KEY_OPERATION_ALBUM_ADD_PREFIX,
        SyncOperation::RemoveMedia => PREFS_KEY_OPERATION_MEDIA_REMOVE_PREFIX,
    };
    prefs_key(is_local, &format!("{op_prefix}{PREFS_KEY_RESUME}"))
}

/// The controller's view of the two preferences namespaces.
pub struct SyncPreferences {
    user_prefs: Arc<dyn SettingsStore>,
    sync_prefs: Arc<dyn SettingsStore>,
}

impl SyncPreferences {
    pub fn new(user_prefs: Arc<dyn SettingsStore>, sync_prefs: Arc<dyn SettingsStore>) -> Self {
        Self {
            user_prefs,
            sync_prefs,
        }
    }

    /// Raw persisted cloud provider authority, `None` when the key is
    /// absent. The value may be the unset sentinel; decoding it is the
    /// cloud-state layer's job.
    pub async fn raw_cloud_authority(&self) -> Result<Option<String>> {
        self.user_prefs
            .get_string(PREFS_KEY_CLOUD_PROVIDER_AUTHORITY)
            .await
            .map_err(|e| SyncError::Preferences(e.to_string()))
    }

    /// Persist a raw cloud provider authority value (authority string or
    /// the unset sentinel).
    pub async fn put_cloud_authority(&self, value: &str) -> Result<()> {
        self.user_prefs
            .set_string(PREFS_KEY_CLOUD_PROVIDER_AUTHORITY, value)
            .await
            .map_err(|e| SyncError::Preferences(e.to_string()))
    }

    /// Remove the persisted cloud provider authority, leaving the state
    /// "never configured".
    pub async fn clear_cloud_authority(&self) -> Result<()> {
        self.user_prefs
            .delete(PREFS_KEY_CLOUD_PROVIDER_AUTHORITY)
            .await
            .map_err(|e| SyncError::Preferences(e.to_string()))
    }

    /// The cached collection cursor for a provider. Missing entries read
    /// back as `(None, -1)`.
    pub async fn cached_collection_info(&self, is_local: bool) -> Result<MediaCollectionInfo> {
        let collection_id = self
            .sync_prefs
            .get_string(&prefs_key(is_local, PREFS_KEY_MEDIA_COLLECTION_ID))
            .await
            .map_err(|e| SyncError::Preferences(e.to_string()))?;
        let last_sync_generation = self
            .sync_prefs
            .get_i64(&prefs_key(is_local, PREFS_KEY_LAST_MEDIA_SYNC_GENERATION))
            .await
            .map_err(|e| SyncError::Preferences(e.to_string()))?
            .unwrap_or(-1);

        Ok(MediaCollectionInfo {
            collection_id,
            last_sync_generation,
        })
    }

    /// Commit (or with `None`, clear) the cached collection cursor.
    ///
    /// Clearing also drops every resume token of the provider: resume
    /// tokens must never outlive the collection they were issued for.
    pub async fn cache_collection_info(
        &self,
        is_local: bool,
        info: Option<&MediaCollectionInfo>,
    ) -> Result<()> {
        match info {
            Some(info) => {
                if let Some(collection_id) = &info.collection_id {
                    self.sync_prefs
                        .set_string(
                            &prefs_key(is_local, PREFS_KEY_MEDIA_COLLECTION_ID),
                            collection_id,
                        )
                        .await
                        .map_err(|e| SyncError::Preferences(e.to_string()))?;
                } else {
                    self.sync_prefs
                        .delete(&prefs_key(is_local, PREFS_KEY_MEDIA_COLLECTION_ID))
                        .await
                        .map_err(|e| SyncError::Preferences(e.to_string()))?;
                }
                self.sync_prefs
                    .set_i64(
                        &prefs_key(is_local, PREFS_KEY_LAST_MEDIA_SYNC_GENERATION),
                        info.last_sync_generation,
                    )
                    .await
                    .map_err(|e| SyncError::Preferences(e.to_string()))?;
            }
            None => {
                for key in [
                    prefs_key(is_local, PREFS_KEY_MEDIA_COLLECTION_ID),
                    prefs_key(is_local, PREFS_KEY_LAST_MEDIA_SYNC_GENERATION),
                    resume_key(is_local, SyncOperation::AddMedia),
                    resume_key(is_local, SyncOperation::AddAlbum),
                    resume_key(is_local, SyncOperation::RemoveMedia),
                ] {
                    self.sync_prefs
                        .delete(&key)
                        .await
                        .map_err(|e| SyncError::Preferences(e.to_string()))?;
                }
            }
        }
        Ok(())
    }

    /// The page token a previously interrupted operation should resume
    /// from, or `None` if there is nothing to resume.
    pub async fn resume_token(&self, resume_key: &str) -> Result<Option<String>> {
        self.sync_prefs
            .get_string(resume_key)
            .await
            .map_err(|e| SyncError::Preferences(e.to_string()))
    }

    /// Remember the token of the next page to fetch. `None` clears the
    /// entry, marking the operation complete.
    pub async fn remember_resume_token(
        &self,
        resume_key: &str,
        token: Option<&str>,
    ) -> Result<()> {
        match token {
            Some(token) => {
                debug!(resume_key, token, "Saving next page token");
                self.sync_prefs
                    .set_string(resume_key, token)
                    .await
                    .map_err(|e| SyncError::Preferences(e.to_string()))
            }
            None => {
                debug!(resume_key, "Clearing next page token");
                self.sync_prefs
                    .delete(resume_key)
                    .await
                    .map_err(|e| SyncError::Preferences(e.to_string()))
            }
        }
    }
}
