//! Sync planning.
//!
//! Compares the cached collection cursor of a provider with the provider's
//! latest [`MediaCollectionInfo`] and decides how much work the sync needs:
//! nothing, an incremental delta, a full resync, or a reset.

use bridge_traits::MediaCollectionInfo;

use crate::error::{Result, SyncError};

/// Number of rows requested per page when paged sync is enforced.
pub const PAGE_SIZE: i32 = 1000;

/// The planner's verdict for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRequestParams {
    /// Cursor and provider agree; nothing to do.
    None,
    /// No provider to sync against any more; wipe its rows and cursor.
    Reset,
    /// The provider's collection changed identity; resync from scratch.
    Full {
        latest: MediaCollectionInfo,
        page_size: i32,
    },
    /// The collection advanced; fetch changes after `from_generation`.
    Incremental {
        from_generation: i64,
        latest: MediaCollectionInfo,
        page_size: i32,
    },
}

impl SyncRequestParams {
    pub fn for_full(latest: MediaCollectionInfo) -> Self {
        SyncRequestParams::Full {
            latest,
            page_size: PAGE_SIZE,
        }
    }

    pub fn for_incremental(from_generation: i64, latest: MediaCollectionInfo) -> Self {
        SyncRequestParams::Incremental {
            from_generation,
            latest,
            page_size: PAGE_SIZE,
        }
    }

    /// The latest collection info the verdict was computed against, when
    /// the verdict implies work.
    pub fn latest(&self) -> Option<&MediaCollectionInfo> {
        match self {
            SyncRequestParams::Full { latest, .. }
            | SyncRequestParams::Incremental { latest, .. } => Some(latest),
            _ => None,
        }
    }
}

/// Decide the sync type for a provider from its cached and latest
/// collection info.
///
/// # Errors
///
/// Returns [`SyncError::InvalidCollectionInfo`] when the provider reports a
/// missing/empty collection id or a negative generation; providers are
/// required to publish both.
pub fn decide(
    cached: &MediaCollectionInfo,
    latest: &MediaCollectionInfo,
) -> Result<SyncRequestParams> {
    let latest_id = latest.collection_id.as_deref().unwrap_or_default();

    if latest_id.is_empty() || latest.last_sync_generation < 0 {
        return Err(SyncError::InvalidCollectionInfo {
            collection_id: latest.collection_id.clone(),
            generation: latest.last_sync_generation,
        });
    }

    if cached.collection_id.as_deref() != Some(latest_id) {
        Ok(SyncRequestParams::for_full(latest.clone()))
    } else if cached.last_sync_generation == latest.last_sync_generation {
        Ok(SyncRequestParams::None)
    } else {
        Ok(SyncRequestParams::for_incremental(
            cached.last_sync_generation,
            latest.clone(),
        ))
    }
}
