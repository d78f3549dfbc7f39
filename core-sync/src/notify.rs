//! Change-notification publishing.
//!
//! Observers of the picker database register on a small set of observable
//! URIs. After each committed page the sync engine publishes the matching
//! URI together with the first row's capture timestamp, so the UI can
//! decide whether the visible range is affected without re-querying.

use std::sync::Arc;

use core_runtime::{EventBus, PickerEvent};
use tracing::{debug, warn};

use crate::pager::SyncOperation;

/// Base of the picker-internal observable URIs.
pub const PICKER_INTERNAL_BASE_URI: &str = "picker://internal";

const PATH_UPDATE: &str = "update";
const PATH_MEDIA: &str = "media";
const PATH_ALBUM_CONTENT: &str = "album_content";

/// Assemble the observable URI for a completed page of `op`.
///
/// Media operations notify `<base>/update/media/<dateTakenMs>`; album
/// operations notify `<base>/update/album_content/<albumId>/<dateTakenMs>`.
/// A remove scoped to an album notifies the album form. Returns `None` for
/// combinations that carry no notification (an album operation without an
/// album id).
pub fn build_notification_uri(
    op: SyncOperation,
    album_id: Option<&str>,
    date_taken_ms: i64,
) -> Option<String> {
    let media_uri =
        || format!("{PICKER_INTERNAL_BASE_URI}/{PATH_UPDATE}/{PATH_MEDIA}/{date_taken_ms}");
    let album_uri = |album_id: &str| {
        format!(
            "{PICKER_INTERNAL_BASE_URI}/{PATH_UPDATE}/{PATH_ALBUM_CONTENT}/{album_id}/{date_taken_ms}"
        )
    };

    match op {
        SyncOperation::AddMedia => Some(media_uri()),
        SyncOperation::AddAlbum => match album_id {
            Some(album_id) => Some(album_uri(album_id)),
            None => {
                warn!("Album operation without album id carries no notification");
                None
            }
        },
        SyncOperation::RemoveMedia => match album_id {
            Some(album_id) => Some(album_uri(album_id)),
            None => Some(media_uri()),
        },
    }
}

/// Publishes picker events on the event bus. Publishing is fire-and-forget;
/// having no observers is not an error.
pub struct NotificationPublisher {
    events: Arc<EventBus>,
}

impl NotificationPublisher {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self { events }
    }

    /// Notify observers that a page of `op` landed in the database.
    pub fn publish_page(&self, op: SyncOperation, album_id: Option<&str>, date_taken_ms: i64) {
        let Some(uri) = build_notification_uri(op, album_id, date_taken_ms) else {
            return;
        };

        let event = match album_id {
            Some(album_id) if op != SyncOperation::AddMedia => PickerEvent::AlbumContentUpdated {
                uri,
                album_id: album_id.to_string(),
                date_taken_ms,
            },
            _ => PickerEvent::MediaUpdated { uri, date_taken_ms },
        };

        self.emit(event);
    }

    /// Ask the picker UI to refresh after a cloud provider change.
    pub fn publish_ui_refresh(&self) {
        self.emit(PickerEvent::UiRefreshRequested);
    }

    /// Audit event recording a cloud provider change.
    pub fn publish_provider_changed(&self, uid: u32, package_name: &str) {
        self.emit(PickerEvent::CloudProviderChanged {
            uid,
            package_name: package_name.to_string(),
        });
    }

    fn emit(&self, event: PickerEvent) {
        if self.events.emit(event).is_err() {
            debug!("No picker observers registered; dropping notification");
        }
    }
}
