//! Media Provider Abstractions
//!
//! Defines the query contract between the sync core and the media-provider
//! backends installed on the device: the built-in local provider and any
//! third-party cloud provider.
//!
//! A provider publishes a *media collection*: the set of items it currently
//! exposes, identified by an opaque collection id. Providers advance a
//! monotonically non-decreasing sync generation whenever items are added,
//! modified or removed, which enables incremental sync queries.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Query argument honored-args key for the page size.
pub const ARG_PAGE_SIZE: &str = "page_size";

/// Query argument honored-args key for the opaque page token.
pub const ARG_PAGE_TOKEN: &str = "page_token";

/// Query argument honored-args key for the sync generation.
pub const ARG_SYNC_GENERATION: &str = "sync_generation";

/// Query argument honored-args key for the album id.
pub const ARG_ALBUM_ID: &str = "album_id";

/// Identity of a media-provider installation on the device.
///
/// The `authority` is globally unique per installation. An empty value is
/// used as the "no provider" sentinel, mirroring how the platform reports
/// a missing or cleared cloud provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Globally unique authority string of the provider.
    pub authority: String,
    /// Package that ships the provider.
    pub package_name: String,
    /// Process identity the host OS assigned to the provider's package.
    pub uid: u32,
}

impl ProviderInfo {
    /// Create a provider identity record.
    pub fn new(
        authority: impl Into<String>,
        package_name: impl Into<String>,
        uid: u32,
    ) -> Self {
        Self {
            authority: authority.into(),
            package_name: package_name.into(),
            uid,
        }
    }

    /// The "no provider" sentinel value.
    pub fn empty() -> Self {
        Self {
            authority: String::new(),
            package_name: String::new(),
            uid: 0,
        }
    }

    /// Whether this is the "no provider" sentinel.
    pub fn is_empty(&self) -> bool {
        self.authority.is_empty()
    }

    /// Whether this provider is shipped by `package_name`.
    pub fn matches_package(&self, package_name: &str) -> bool {
        !self.is_empty() && self.package_name == package_name
    }

    /// The authority as an `Option`, `None` for the sentinel.
    pub fn authority_opt(&self) -> Option<&str> {
        if self.is_empty() {
            None
        } else {
            Some(&self.authority)
        }
    }
}

/// Snapshot of a provider's collection identity, fetched via
/// [`MediaProviderClient::media_collection_info`] or read back from the
/// sync-prefs cache.
///
/// A change in `collection_id` means the provider replaced its catalog
/// wholesale; only the generation advancing means items changed in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCollectionInfo {
    /// Opaque id of the provider's current collection. `None` when never
    /// synced (cache miss) or when the provider misbehaves.
    pub collection_id: Option<String>,
    /// Generation the collection was last synced at; `-1` when unknown.
    pub last_sync_generation: i64,
}

impl MediaCollectionInfo {
    pub fn new(collection_id: impl Into<String>, last_sync_generation: i64) -> Self {
        Self {
            collection_id: Some(collection_id.into()),
            last_sync_generation,
        }
    }
}

impl Default for MediaCollectionInfo {
    fn default() -> Self {
        Self {
            collection_id: None,
            last_sync_generation: -1,
        }
    }
}

/// One media item row returned by a provider query.
///
/// This is the projection the picker database ingests; `date_taken_ms` is
/// additionally used as the payload of per-page change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItemRow {
    /// Provider-scoped id of the item.
    pub id: String,
    /// MIME type, e.g. `image/jpeg`.
    pub mime_type: String,
    /// Capture timestamp in epoch milliseconds.
    pub date_taken_ms: i64,
    /// Item size in bytes.
    pub size_bytes: i64,
    /// Duration for video items, `0` otherwise.
    pub duration_ms: i64,
}

/// Arguments for a paged provider query.
///
/// Providers report back which of these they actually honored via
/// [`PageExtras::honored_args`]; the sync core treats a silently ignored
/// required argument as a fatal provider defect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryArgs {
    /// Restrict the query to one album.
    pub album_id: Option<String>,
    /// Only return items changed after this generation.
    pub sync_generation: Option<i64>,
    /// Requested page size.
    pub page_size: Option<i32>,
    /// Opaque continuation token from the previous page.
    pub page_token: Option<String>,
}

/// Provider metadata attached to every query response page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtras {
    /// Collection id the page was served from.
    pub media_collection_id: Option<String>,
    /// Token for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
    /// Names of the query arguments the provider honored (`ARG_*` values).
    pub honored_args: Vec<String>,
}

/// One page of a provider query response: the rows plus the extras.
///
/// `extras` is optional because a defective provider may omit it entirely;
/// the sync core validates its presence.
#[derive(Debug, Clone, Default)]
pub struct ProviderPage {
    pub rows: Vec<MediaItemRow>,
    pub extras: Option<PageExtras>,
}

/// Query surface of the media providers installed on the device.
///
/// One client instance serves every authority, the way a platform content
/// resolver does. Calls may block on IPC to the provider process and are
/// expected to be issued off the UI thread.
#[async_trait::async_trait]
pub trait MediaProviderClient: Send + Sync {
    /// Fetch the provider's current collection id and sync generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached or rejects the
    /// call.
    async fn media_collection_info(&self, authority: &str) -> Result<MediaCollectionInfo>;

    /// Query one page of the provider's media items.
    async fn query_media(&self, authority: &str, args: &QueryArgs) -> Result<ProviderPage>;

    /// Query one page of the provider's deleted media ids.
    ///
    /// Used for the remove phase of incremental sync; rows carry the ids of
    /// items deleted since the requested sync generation.
    async fn query_deleted_media(
        &self,
        authority: &str,
        args: &QueryArgs,
    ) -> Result<ProviderPage>;
}

/// Enumeration of media-provider installations on the device.
#[async_trait::async_trait]
pub trait ProviderDiscovery: Send + Sync {
    /// All media providers currently installed, irrespective of any
    /// allow-list.
    async fn installed_providers(&self) -> Result<Vec<ProviderInfo>>;

    /// Process identity of the calling (picker) process itself.
    fn current_uid(&self) -> u32;
}

/// Hook into the OS storage service that tracks the active cloud media
/// provider system-wide.
#[async_trait::async_trait]
pub trait SystemStorageService: Send + Sync {
    /// Report the active cloud media provider to the system.
    ///
    /// # Errors
    ///
    /// May fail with [`BridgeError::PermissionDenied`](crate::BridgeError)
    /// when the caller does not hold the required privilege; callers treat
    /// this notification as best-effort.
    async fn set_cloud_media_provider(&self, authority: Option<&str>) -> Result<()>;
}
