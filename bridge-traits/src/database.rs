//! Picker Database Facade
//!
//! The picker database is the device-local index the photo-picker UI reads.
//! The sync core never touches the storage schema directly; every write goes
//! through the [`PickerDbFacade`] as a scoped [`DbWriteOperation`].
//!
//! ## Write operation contract
//!
//! A write operation is a transactional handle. The holder calls
//! [`DbWriteOperation::execute`] one or more times, then marks the operation
//! successful with [`DbWriteOperation::set_success`]. Dropping a handle that
//! was never marked successful MUST roll the transaction back; this mirrors
//! a try-with-resources scope and is what makes partially written pages
//! invisible after a crash.

use crate::error::Result;
use crate::provider::MediaItemRow;

/// Scoped transactional write handle on the picker database.
///
/// Implementations must roll back on drop unless [`set_success`] was called.
///
/// [`set_success`]: DbWriteOperation::set_success
#[async_trait::async_trait]
pub trait DbWriteOperation: Send {
    /// Apply a batch of rows to the operation's target table.
    ///
    /// Reset-flavored operations take no rows and are executed with `None`.
    /// Returns the number of rows written or removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying database write fails; the
    /// operation is then expected to roll back on drop.
    async fn execute(&mut self, batch: Option<&[MediaItemRow]>) -> Result<u64>;

    /// Mark the operation successful so the transaction commits on drop.
    fn set_success(&mut self);
}

/// Transactional writer and cloud-authority switch on the picker database.
///
/// The facade is the only component that knows the storage schema. It is
/// thread-safe for the operations documented here; the degree of mutual
/// exclusion between concurrently open write operations is up to the
/// implementation.
#[async_trait::async_trait]
pub trait PickerDbFacade: Send + Sync {
    /// Atomically switch which cloud authority's rows are visible to
    /// queries. `None` disables cloud rows entirely.
    async fn set_cloud_provider(&self, authority: Option<&str>) -> Result<()>;

    /// Begin adding media rows for `authority`.
    async fn begin_add_media_operation(
        &self,
        authority: &str,
    ) -> Result<Box<dyn DbWriteOperation>>;

    /// Begin adding album-media rows for `authority` under `album_id`.
    async fn begin_add_album_media_operation(
        &self,
        authority: &str,
        album_id: &str,
    ) -> Result<Box<dyn DbWriteOperation>>;

    /// Begin removing media rows for `authority`.
    async fn begin_remove_media_operation(
        &self,
        authority: &str,
    ) -> Result<Box<dyn DbWriteOperation>>;

    /// Begin wiping all media rows previously synced for `authority`.
    ///
    /// `None` wipes the rows of a provider that is no longer known (e.g.
    /// after the cloud provider was cleared).
    async fn begin_reset_media_operation(
        &self,
        authority: Option<&str>,
    ) -> Result<Box<dyn DbWriteOperation>>;

    /// Begin wiping album-media rows for `authority`; `album_id` of `None`
    /// wipes every album of that provider.
    async fn begin_reset_album_media_operation(
        &self,
        authority: Option<&str>,
        album_id: Option<&str>,
    ) -> Result<Box<dyn DbWriteOperation>>;
}
