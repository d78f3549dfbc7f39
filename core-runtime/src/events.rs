//! # Event Bus System
//!
//! Provides an event-driven architecture for the picker sync core using
//! `tokio::sync::broadcast`. This is the change-notification mechanism the
//! picker UI observes: instead of polling the database, observers subscribe
//! here and react to the typed events the sync controller publishes.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: the [`PickerEvent`] enum covering data-change
//!   notifications and provider lifecycle events
//! - **EventBus**: central broadcast channel for publishing events
//! - **Subscription Management**: multiple subscribers can listen
//!   independently
//!
//! ## Usage
//!
//! ```no_run
//! use core_runtime::events::{EventBus, PickerEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = stream.recv().await {
//!         if matches!(event, PickerEvent::UiRefreshRequested) {
//!             // reload picker UI state
//!         }
//!     }
//! });
//! # }
//! ```
//!
//! ## Error Handling
//!
//! The bus uses `tokio::sync::broadcast`; subscribers should treat
//! `RecvError::Lagged` as non-fatal (they missed events but can continue)
//! and `RecvError::Closed` as the shutdown signal.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Events published by the picker sync core.
///
/// The URI-carrying variants mirror the observable URIs the picker UI
/// registers content observers on; the URI is pre-assembled by the
/// publisher so subscribers can route on it directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PickerEvent {
    /// New or removed media rows landed in the picker database.
    MediaUpdated {
        /// Observable URI of the form `<internal>/update/media/<dateTakenMs>`.
        uri: String,
        /// Capture timestamp of the first row of the committed page.
        date_taken_ms: i64,
    },
    /// Album content rows landed in the picker database.
    AlbumContentUpdated {
        /// Observable URI of the form
        /// `<internal>/update/album_content/<albumId>/<dateTakenMs>`.
        uri: String,
        /// Album whose content changed.
        album_id: String,
        /// Capture timestamp of the first row of the committed page.
        date_taken_ms: i64,
    },
    /// The picker UI should refresh wholesale (cloud provider changed).
    UiRefreshRequested,
    /// Audit event: the active cloud provider changed.
    CloudProviderChanged {
        /// Uid of the new provider's package, `0` when cleared.
        uid: u32,
        /// Package name of the new provider, empty when cleared.
        package_name: String,
    },
}

impl PickerEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &'static str {
        match self {
            PickerEvent::MediaUpdated { .. } => "Media rows updated in picker database",
            PickerEvent::AlbumContentUpdated { .. } => "Album content updated in picker database",
            PickerEvent::UiRefreshRequested => "Picker UI refresh requested",
            PickerEvent::CloudProviderChanged { .. } => "Active cloud provider changed",
        }
    }
}

/// Central broadcast channel for publishing picker events.
///
/// Cloning is cheap; clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PickerEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none. Publishers that don't care whether anyone
    /// is listening can ignore the result.
    pub fn emit(&self, event: PickerEvent) -> Result<usize, SendError<PickerEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all
    /// future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<PickerEvent> {
        self.sender.subscribe()
    }

    /// Number of currently active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}
