//! # Picker Sync Controller
//!
//! Syncs the local and the currently enabled cloud media provider into the
//! picker database, so the picker UI can be served entirely from the local
//! index without contacting the providers.
//!
//! ## Overview
//!
//! The controller is a process-wide singleton created once at startup. Per
//! provider it plans the required work by comparing the cached collection
//! cursor against the provider's latest collection info, executes the
//! resulting reset / full / incremental sync as paged, resumable writes
//! through the [`PickerDbFacade`], and publishes change notifications as
//! pages land.
//!
//! ## Locking
//!
//! Three locks serialize the moving parts:
//!
//! - the **cloud-provider lock** (`cloud_state`) guards the in-memory
//!   provider tri-state and the set-provider flow;
//! - the **cloud-sync lock** serializes end-to-end cloud syncs, including
//!   the disable/re-enable of cloud queries on the facade;
//! - the process-wide [`IDLE_MAINTENANCE_SYNC_LOCK`] serializes local
//!   full-media syncs with other maintenance jobs touching the database.
//!
//! When both cloud locks are needed, the cloud-sync lock comes first. The
//! helpers that need the provider state mid-sync take a [`CloudSyncGuard`]
//! parameter, so the reverse order cannot be written.

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use bridge_traits::{
    MediaCollectionInfo, MediaProviderClient, PickerDbFacade, ProviderDiscovery, ProviderInfo,
    QueryArgs, SettingsStore, SystemStorageService,
};
use core_runtime::{ConfigStore, EventBus};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, instrument, warn};

use crate::cloud_state::CloudProviderState;
use crate::error::{Result, SyncError};
use crate::notify::NotificationPublisher;
use crate::pager::{self, PagedSyncContext, PagedSyncRequest, SyncOperation};
use crate::planner::{self, SyncRequestParams};
use crate::preferences::SyncPreferences;
use crate::registry::ProviderRegistry;

/// Authority of the built-in local media provider.
pub const LOCAL_PICKER_PROVIDER_AUTHORITY: &str = "local_picker_provider";

/// Serializes picker syncs with the idle-maintenance job. Process-wide
/// because that job does not go through the controller but touches the same
/// database.
pub static IDLE_MAINTENANCE_SYNC_LOCK: Mutex<()> = Mutex::const_new(());

static INSTANCE: OnceLock<Arc<PickerSyncController>> = OnceLock::new();

/// Proof that the cloud-sync lock is held.
///
/// Obtainable only from `cloud_sync_lock`; helpers that must take the
/// cloud-provider lock while a sync is in flight require one, which makes
/// "cloud-sync before cloud-provider" the only acquisition order that
/// compiles.
struct CloudSyncGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

pub struct PickerSyncController {
    client: Arc<dyn MediaProviderClient>,
    storage_service: Arc<dyn SystemStorageService>,
    db_facade: Arc<dyn PickerDbFacade>,
    config: Arc<dyn ConfigStore>,
    prefs: SyncPreferences,
    registry: ProviderRegistry,
    publisher: NotificationPublisher,
    local_provider: String,
    /// Cloud-provider lock.
    cloud_state: Mutex<CloudProviderState>,
    /// Cloud-sync lock.
    cloud_sync_lock: Mutex<()>,
}

impl PickerSyncController {
    /// Create a controller with the default local provider authority.
    ///
    /// Runs cloud provider initialization (including default selection)
    /// before returning, so a constructed controller always has a settled
    /// provider state.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        client: Arc<dyn MediaProviderClient>,
        discovery: Arc<dyn ProviderDiscovery>,
        storage_service: Arc<dyn SystemStorageService>,
        db_facade: Arc<dyn PickerDbFacade>,
        config: Arc<dyn ConfigStore>,
        user_prefs: Arc<dyn SettingsStore>,
        sync_prefs: Arc<dyn SettingsStore>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        Self::with_local_provider(
            client,
            discovery,
            storage_service,
            db_facade,
            config,
            user_prefs,
            sync_prefs,
            event_bus,
            LOCAL_PICKER_PROVIDER_AUTHORITY,
        )
        .await
    }

    /// Create a controller with an explicit local provider authority.
    #[allow(clippy::too_many_arguments)]
    pub async fn with_local_provider(
        client: Arc<dyn MediaProviderClient>,
        discovery: Arc<dyn ProviderDiscovery>,
        storage_service: Arc<dyn SystemStorageService>,
        db_facade: Arc<dyn PickerDbFacade>,
        config: Arc<dyn ConfigStore>,
        user_prefs: Arc<dyn SettingsStore>,
        sync_prefs: Arc<dyn SettingsStore>,
        event_bus: Arc<EventBus>,
        local_provider: impl Into<String>,
    ) -> Result<Self> {
        let controller = Self {
            client,
            storage_service,
            db_facade,
            registry: ProviderRegistry::new(discovery, config.clone()),
            config,
            prefs: SyncPreferences::new(user_prefs, sync_prefs),
            publisher: NotificationPublisher::new(event_bus),
            local_provider: local_provider.into(),
            cloud_state: Mutex::new(CloudProviderState::NotSet),
            cloud_sync_lock: Mutex::new(()),
        };

        controller.init_cloud_provider().await?;
        Ok(controller)
    }

    /// Create the process-wide controller instance.
    ///
    /// Later calls keep the first instance; the constructed controller is
    /// returned either way so callers can hold their own handle.
    #[allow(clippy::too_many_arguments)]
    pub async fn initialize(
        client: Arc<dyn MediaProviderClient>,
        discovery: Arc<dyn ProviderDiscovery>,
        storage_service: Arc<dyn SystemStorageService>,
        db_facade: Arc<dyn PickerDbFacade>,
        config: Arc<dyn ConfigStore>,
        user_prefs: Arc<dyn SettingsStore>,
        sync_prefs: Arc<dyn SettingsStore>,
        event_bus: Arc<EventBus>,
    ) -> Result<Arc<Self>> {
        let controller = Arc::new(
            Self::new(
                client,
                discovery,
                storage_service,
                db_facade,
                config,
                user_prefs,
                sync_prefs,
                event_bus,
            )
            .await?,
        );
        let _ = INSTANCE.set(controller.clone());
        Ok(controller)
    }

    /// The process-wide controller instance.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotInitialized`] if [`initialize`] has not run.
    ///
    /// [`initialize`]: PickerSyncController::initialize
    pub fn instance_or_err() -> Result<Arc<Self>> {
        INSTANCE.get().cloned().ok_or(SyncError::NotInitialized)
    }

    // ========================================================================
    // Cloud provider state
    // ========================================================================

    async fn init_cloud_provider(&self) -> Result<()> {
        let mut state = self.cloud_state.lock().await;

        if !self.config.cloud_media_enabled() {
            debug!("Cloud media feature is disabled during controller construction");
            self.persist_cloud_provider_locked(&mut state, CloudProviderState::NotSet)
                .await?;
            return Ok(());
        }

        let cached_authority = self.prefs.raw_cloud_authority().await?;

        if let Some(raw) = &cached_authority {
            if CloudProviderState::is_unset_sentinel(raw) {
                debug!("Cloud provider state is unset during controller construction");
                *state = CloudProviderState::Unset;
                return Ok(());
            }
        }

        self.init_cloud_provider_locked(&mut state, cached_authority.as_deref())
            .await
    }

    /// Default provider selection; runs with the cloud-provider lock held.
    async fn init_cloud_provider_locked(
        &self,
        state: &mut CloudProviderState,
        cached_authority: Option<&str>,
    ) -> Result<()> {
        let default_info = self.default_cloud_provider_info(cached_authority).await?;

        if default_info.authority_opt() == cached_authority {
            // Set without persisting: persisting would tell observers that
            // cloud media just became available, which it did not.
            *state = if default_info.is_empty() {
                CloudProviderState::NotSet
            } else {
                CloudProviderState::Set(default_info.clone())
            };
        } else {
            let target = if default_info.is_empty() {
                CloudProviderState::NotSet
            } else {
                CloudProviderState::Set(default_info.clone())
            };
            self.persist_cloud_provider_locked(state, target).await?;
        }

        debug!(
            authority = ?default_info.authority_opt(),
            "Initialized cloud provider"
        );
        Ok(())
    }

    /// Pick the provider to use when none was explicitly configured: a sole
    /// available provider wins, then the previously cached one, then the
    /// device default package.
    async fn default_cloud_provider_info(
        &self,
        last_provider: Option<&str>,
    ) -> Result<ProviderInfo> {
        let providers = self.registry.available_cloud_providers().await?;

        if providers.len() == 1 {
            info!(
                authority = %providers[0].authority,
                "Only one available cloud provider, using it as the default"
            );
            return Ok(providers[0].clone());
        }

        if let Some(last) = last_provider {
            if let Some(provider) = providers.iter().find(|p| p.authority == last) {
                return Ok(provider.clone());
            }
        }

        if let Some(default_pkg) = self.config.default_cloud_provider_package() {
            if let Some(provider) = providers.iter().find(|p| p.matches_package(&default_pkg)) {
                return Ok(provider.clone());
            }
        }

        // No default configured, or the default is not installed
        Ok(ProviderInfo::empty())
    }

    /// Update the in-memory tri-state and its persisted encoding, notify
    /// the system storage service (best-effort) and the picker UI.
    async fn persist_cloud_provider_locked(
        &self,
        state: &mut CloudProviderState,
        new_state: CloudProviderState,
    ) -> Result<()> {
        *state = new_state.clone();

        match new_state.to_persisted_value() {
            Some(value) => self.prefs.put_cloud_authority(value).await?,
            None => self.prefs.clear_cloud_authority().await?,
        }

        let authority = new_state.authority();

        // Only privileged processes may update the storage service; a
        // rejection is logged, not raised.
        if let Err(e) = self
            .storage_service
            .set_cloud_media_provider(authority)
            .await
        {
            warn!(
                ?authority,
                error = %e,
                "Failed to notify the system of the cloud provider update"
            );
        }

        debug!(?authority, "Updated cloud provider");

        if authority.is_some() {
            // A freshly selected provider starts from a clean cursor;
            // stale resume tokens must not leak into its first sync.
            self.prefs.cache_collection_info(false, None).await?;
        }

        self.publisher.publish_ui_refresh();
        Ok(())
    }

    /// Enable the provider with `authority` as the cloud provider, or clear
    /// the selection with `None`.
    ///
    /// The switch does not sync the new provider; no cloud items are served
    /// from the picker db until the next sync. Callers should schedule one.
    ///
    /// Returns `true` if the provider was enabled or cleared, `false` when
    /// the feature is disabled or the authority is unknown.
    #[instrument(skip(self))]
    pub async fn set_cloud_provider(&self, authority: Option<&str>) -> bool {
        self.set_cloud_provider_internal(authority, false).await
    }

    /// [`set_cloud_provider`](Self::set_cloud_provider) ignoring the
    /// allow-list. Meant for tests and development tooling.
    #[instrument(skip(self))]
    pub async fn force_set_cloud_provider(&self, authority: Option<&str>) -> bool {
        self.set_cloud_provider_internal(authority, true).await
    }

    async fn set_cloud_provider_internal(
        &self,
        authority: Option<&str>,
        ignore_allowlist: bool,
    ) -> bool {
        debug!(?authority, ignore_allowlist, "set_cloud_provider");

        if !self.config.cloud_media_enabled() {
            warn!(
                ?authority,
                "Ignoring the cloud provider update since the cloud media feature is disabled"
            );
            return false;
        }

        {
            let state = self.cloud_state.lock().await;
            if state.authority() == authority {
                warn!(?authority, "Cloud provider already set");
                return true;
            }
        }

        let new_info = match self.registry.resolve(authority, ignore_allowlist).await {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, "Failed to resolve cloud provider");
                return false;
            }
        };

        if authority.is_none() || !new_info.is_empty() {
            let mut state = self.cloud_state.lock().await;

            // Disable cloud queries on the db until the next sync; the new
            // provider's rows only become visible once a sync has put them
            // there.
            if let Err(e) = self.db_facade.set_cloud_provider(None).await {
                error!(error = %e, "Failed to disable cloud queries on the picker db");
                return false;
            }

            let old_authority = state.authority().map(str::to_string);
            let target = if new_info.is_empty() {
                CloudProviderState::Unset
            } else {
                CloudProviderState::Set(new_info.clone())
            };
            if let Err(e) = self.persist_cloud_provider_locked(&mut state, target).await {
                error!(error = %e, "Failed to persist the cloud provider");
                return false;
            }

            self.publisher
                .publish_provider_changed(new_info.uid, &new_info.package_name);
            info!(
                old = ?old_authority,
                new = ?new_info.authority_opt(),
                "Cloud provider changed successfully"
            );
            return true;
        }

        warn!(?authority, "Cloud provider not supported");
        false
    }

    /// Authority of the current cloud provider, `None` when no provider is
    /// set.
    pub async fn cloud_provider(&self) -> Option<String> {
        self.cloud_state
            .lock()
            .await
            .authority()
            .map(str::to_string)
    }

    /// [`ProviderInfo`] of the current cloud provider, the empty sentinel
    /// when no provider is set.
    pub async fn current_cloud_provider_info(&self) -> ProviderInfo {
        self.cloud_state.lock().await.provider_info()
    }

    /// Authority of the local provider.
    pub fn local_provider(&self) -> &str {
        &self.local_provider
    }

    /// Installed and allow-listed cloud providers.
    pub async fn available_cloud_providers(&self) -> Vec<ProviderInfo> {
        match self.registry.available_cloud_providers().await {
            Ok(providers) => providers,
            Err(e) => {
                error!(error = %e, "Failed to enumerate available cloud providers");
                Vec::new()
            }
        }
    }

    /// Whether `authority` is the local provider or the currently set cloud
    /// provider.
    pub async fn is_provider_enabled(&self, authority: &str) -> bool {
        if self.local_provider == authority {
            return true;
        }

        let state = self.cloud_state.lock().await;
        state.is_set() && state.authority() == Some(authority)
    }

    /// [`is_provider_enabled`](Self::is_provider_enabled) additionally
    /// checking the caller's process identity.
    pub async fn is_provider_enabled_for_uid(&self, authority: &str, uid: u32) -> bool {
        if uid == self.registry.current_uid() && self.local_provider == authority {
            return true;
        }

        let state = self.cloud_state.lock().await;
        match &*state {
            CloudProviderState::Set(info) => info.uid == uid && info.authority == authority,
            _ => false,
        }
    }

    /// Whether `authority` belongs to any installed provider with matching
    /// uid, regardless of selection or allow-listing.
    pub async fn is_provider_supported(&self, authority: &str, uid: u32) -> bool {
        if uid == self.registry.current_uid() && self.local_provider == authority {
            return true;
        }

        match self.registry.all_available_cloud_providers().await {
            Ok(infos) => infos
                .iter()
                .any(|info| info.uid == uid && info.authority == authority),
            Err(e) => {
                error!(error = %e, "Failed to enumerate installed providers");
                false
            }
        }
    }

    /// React to a package removal: if the removed package shipped the
    /// current cloud provider, clear it, move the persisted state back to
    /// "never configured" and re-run default selection.
    pub async fn notify_package_removal(&self, package_name: &str) {
        let mut state = self.cloud_state.lock().await;
        if !state.provider_info().matches_package(package_name) {
            return;
        }

        info!(
            package_name,
            "Package of the current cloud provider was removed"
        );
        self.reset_cloud_provider_locked(&mut state).await;
    }

    async fn reset_cloud_provider_locked(&self, state: &mut CloudProviderState) {
        if let Err(e) = self.db_facade.set_cloud_provider(None).await {
            error!(error = %e, "Failed to disable cloud queries on the picker db");
        }
        if let Err(e) = self
            .persist_cloud_provider_locked(state, CloudProviderState::Unset)
            .await
        {
            error!(error = %e, "Failed to clear the removed cloud provider");
            return;
        }
        self.publisher.publish_provider_changed(0, "");

        // The explicit clear above persisted the unset sentinel; dropping
        // the key instead leaves the state "never configured" so default
        // selection may run again.
        if let Err(e) = self.prefs.clear_cloud_authority().await {
            error!(error = %e, "Failed to clear the persisted cloud authority");
            return;
        }
        *state = CloudProviderState::NotSet;

        if let Err(e) = self.init_cloud_provider_locked(state, None).await {
            error!(error = %e, "Failed to re-run cloud provider default selection");
        }
    }

    // ========================================================================
    // Sync orchestration
    // ========================================================================

    /// Sync the local and the currently enabled cloud provider, in that
    /// order.
    pub async fn sync_all_media(&self) -> bool {
        debug!("sync_all_media");
        let local_ok = self.sync_all_media_from_local_provider().await;
        let cloud_ok = self.sync_all_media_from_cloud_provider().await;
        local_ok && cloud_ok
    }

    /// Sync all media from the local provider.
    #[instrument(skip(self))]
    pub async fn sync_all_media_from_local_provider(&self) -> bool {
        // Picker sync and idle-maintenance flows touch the same tables and
        // can deadlock; serialize them.
        let _idle_lock = IDLE_MAINTENANCE_SYNC_LOCK.lock().await;

        let authority = self.local_provider.clone();
        self.sync_all_media_from_provider(Some(&authority), true, true, false)
            .await
    }

    /// Sync all media from the currently enabled cloud provider.
    ///
    /// Cloud queries on the picker db are disabled for the duration of the
    /// sync and re-enabled afterwards only if the active provider did not
    /// change in the meantime.
    #[instrument(skip(self))]
    pub async fn sync_all_media_from_cloud_provider(&self) -> bool {
        let sync_guard = CloudSyncGuard {
            _guard: self.cloud_sync_lock.lock().await,
        };

        let cloud_provider = self.cloud_provider().await;

        // Disable cloud queries while the sync runs; queries arriving
        // meanwhile see local items only.
        if let Err(e) = self.db_facade.set_cloud_provider(None).await {
            error!(error = %e, "Failed to disable cloud queries on the picker db");
            return false;
        }

        let did_sync_finish = self
            .sync_all_media_from_provider(cloud_provider.as_deref(), false, true, true)
            .await;

        if !did_sync_finish {
            error!(
                authority = ?cloud_provider,
                "Failed to fully complete the cloud sync; the provider may have changed \
                 mid-sync or only a partial sync was committed"
            );
        }

        // Reset the album-media tables every time all media is synced.
        // TODO: confirm whether the local provider's album media really
        // needs to be dropped here too, or only the cloud provider's.
        self.reset_album_media(&sync_guard).await;

        // Re-enable cloud queries for the latest provider, but only if it
        // is still the provider this sync ran against.
        let reenabled = self
            .reenable_cloud_queries_if_unchanged(&sync_guard, cloud_provider.as_deref())
            .await;

        did_sync_finish && reenabled
    }

    async fn reenable_cloud_queries_if_unchanged(
        &self,
        _sync: &CloudSyncGuard<'_>,
        snapshot: Option<&str>,
    ) -> bool {
        let state = self.cloud_state.lock().await;
        if state.authority() == snapshot {
            if let Err(e) = self.db_facade.set_cloud_provider(snapshot).await {
                error!(error = %e, "Failed to re-enable cloud queries on the picker db");
                return false;
            }
            true
        } else {
            error!(
                expected = ?snapshot,
                current = ?state.authority(),
                "Cloud provider changed during the sync; leaving cloud queries disabled"
            );
            false
        }
    }

    /// Sync one album's media from the local or the cloud provider.
    pub async fn sync_album_media(&self, album_id: &str, is_local: bool) -> bool {
        if is_local {
            self.sync_album_media_from_local_provider(album_id).await
        } else {
            self.sync_album_media_from_cloud_provider(album_id).await
        }
    }

    /// Sync one album's media from the local provider.
    #[instrument(skip(self))]
    pub async fn sync_album_media_from_local_provider(&self, album_id: &str) -> bool {
        let authority = self.local_provider.clone();
        self.sync_album_media_from_provider(Some(&authority), true, album_id, false)
            .await
    }

    /// Sync one album's media from the currently enabled cloud provider.
    #[instrument(skip(self))]
    pub async fn sync_album_media_from_cloud_provider(&self, album_id: &str) -> bool {
        let _sync_guard = CloudSyncGuard {
            _guard: self.cloud_sync_lock.lock().await,
        };

        let cloud_provider = self.cloud_provider().await;
        self.sync_album_media_from_provider(cloud_provider.as_deref(), false, album_id, true)
            .await
    }

    /// Album sync is always a reset followed by a full paged add. There is
    /// no retry: album sync has no incremental mode, so a repeat attempt
    /// would fail the same way.
    async fn sync_album_media_from_provider(
        &self,
        authority: Option<&str>,
        is_local: bool,
        album_id: &str,
        enforce_paged_sync: bool,
    ) -> bool {
        let mut args = QueryArgs {
            album_id: Some(album_id.to_string()),
            ..QueryArgs::default()
        };
        if enforce_paged_sync {
            args.page_size = Some(planner::PAGE_SIZE);
        }

        let result = async {
            self.execute_sync_album_reset(authority, is_local, Some(album_id))
                .await?;
            if let Some(authority) = authority {
                self.execute_sync_add_album(authority, is_local, album_id, args)
                    .await?;
            }
            Ok::<(), SyncError>(())
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, album_id, "Failed to sync album media");
                false
            }
        }
    }

    /// Wipe the media previously synced from both providers, along with
    /// their cursors and resume tokens.
    #[instrument(skip(self))]
    pub async fn reset_all_media(&self) -> bool {
        let local_authority = self.local_provider.clone();
        let local_ok = match self.reset_all_media_for(Some(&local_authority), true).await {
            Ok(ok) => ok,
            Err(e) => {
                error!(error = %e, "Failed to reset local media");
                false
            }
        };

        let _sync_guard = CloudSyncGuard {
            _guard: self.cloud_sync_lock.lock().await,
        };
        let cloud_provider = self.cloud_provider().await;
        let cloud_ok = match self
            .reset_all_media_for(cloud_provider.as_deref(), false)
            .await
        {
            Ok(ok) => ok,
            Err(e) => {
                error!(error = %e, "Failed to reset cloud media");
                false
            }
        };

        local_ok && cloud_ok
    }

    async fn reset_all_media_for(&self, authority: Option<&str>, is_local: bool) -> Result<bool> {
        self.execute_sync_reset(authority, is_local).await?;
        self.cache_media_collection_info(authority, is_local, None)
            .await
    }

    async fn reset_album_media(&self, sync_guard: &CloudSyncGuard<'_>) {
        if let Err(e) = self
            .execute_sync_album_reset(Some(&self.local_provider), true, None)
            .await
        {
            error!(error = %e, "Failed to reset local album media");
        }

        let cloud_provider = self.cloud_provider().await;
        if let Err(e) = self
            .execute_sync_album_reset_cloud(sync_guard, cloud_provider.as_deref())
            .await
        {
            error!(error = %e, "Failed to reset cloud album media");
        }
    }

    async fn execute_sync_album_reset_cloud(
        &self,
        _sync: &CloudSyncGuard<'_>,
        authority: Option<&str>,
    ) -> Result<()> {
        self.execute_sync_album_reset(authority, false, None).await
    }

    // ========================================================================
    // Planner dispatch
    // ========================================================================

    /// Returns `true` if the sync finished and the latest collection info
    /// was committed.
    async fn sync_all_media_from_provider(
        &self,
        authority: Option<&str>,
        is_local: bool,
        retry_on_failure: bool,
        enforce_paged_sync: bool,
    ) -> bool {
        debug!(
            ?authority,
            is_local, retry_on_failure, "sync_all_media_from_provider"
        );

        let mut retry = retry_on_failure;
        loop {
            match self
                .try_sync_all_media_from_provider(authority, is_local, enforce_paged_sync)
                .await
            {
                Ok(finished) => return finished,
                Err(e) if e.aborts_without_retry() => {
                    error!(error = %e, ?authority, "Aborting media sync");
                    return false;
                }
                Err(e) => {
                    // Reset to a clean slate, then retry once from scratch
                    // in case the failure was transient.
                    if let Err(reset_err) = self.reset_all_media_for(authority, is_local).await {
                        error!(
                            error = %reset_err,
                            "Failed to reset media after a sync failure"
                        );
                    }
                    error!(error = %e, retry, "Failed to sync all media; media was reset");
                    if !retry {
                        return false;
                    }
                    retry = false;
                }
            }
        }
    }

    async fn try_sync_all_media_from_provider(
        &self,
        authority: Option<&str>,
        is_local: bool,
        enforce_paged_sync: bool,
    ) -> Result<bool> {
        let params = self.sync_request_params(authority, is_local).await?;

        match params {
            SyncRequestParams::None => Ok(true),
            SyncRequestParams::Reset => {
                // Only reached when the cloud authority was cleared and its
                // rows are still in the db.
                self.reset_all_media_for(authority, is_local).await
            }
            planned => match authority {
                Some(authority) => {
                    self.execute_planned_sync(authority, is_local, enforce_paged_sync, planned)
                        .await
                }
                None => Err(SyncError::Provider(
                    "Planner produced work for a missing authority".to_string(),
                )),
            },
        }
    }

    async fn execute_planned_sync(
        &self,
        authority: &str,
        is_local: bool,
        enforce_paged_sync: bool,
        params: SyncRequestParams,
    ) -> Result<bool> {
        match params {
            SyncRequestParams::Full { latest, page_size } => {
                if !self.reset_all_media_for(Some(authority), is_local).await? {
                    return Ok(false);
                }

                let mut query_args = QueryArgs::default();
                if enforce_paged_sync {
                    query_args.page_size = Some(page_size);
                }
                self.execute_sync_add(
                    authority,
                    is_local,
                    latest.collection_id.as_deref(),
                    false,
                    enforce_paged_sync,
                    query_args,
                )
                .await?;

                // Commit the sync position
                self.cache_media_collection_info(Some(authority), is_local, Some(&latest))
                    .await
            }
            SyncRequestParams::Incremental {
                from_generation,
                latest,
                page_size,
            } => {
                let mut query_args = QueryArgs {
                    sync_generation: Some(from_generation),
                    ..QueryArgs::default()
                };
                if enforce_paged_sync {
                    query_args.page_size = Some(page_size);
                }

                self.execute_sync_add(
                    authority,
                    is_local,
                    latest.collection_id.as_deref(),
                    true,
                    enforce_paged_sync,
                    query_args.clone(),
                )
                .await?;
                self.execute_sync_remove(
                    authority,
                    is_local,
                    latest.collection_id.as_deref(),
                    query_args,
                )
                .await?;

                // Commit the sync position
                self.cache_media_collection_info(Some(authority), is_local, Some(&latest))
                    .await
            }
            SyncRequestParams::None | SyncRequestParams::Reset => Ok(true),
        }
    }

    /// Plan the sync for a provider. For the cloud path the authority is
    /// re-checked against the active provider under the cloud-provider
    /// lock; a mismatch means the request is for a provider that is no
    /// longer current.
    async fn sync_request_params(
        &self,
        authority: Option<&str>,
        is_local: bool,
    ) -> Result<SyncRequestParams> {
        if is_local {
            self.sync_request_params_internal(authority, is_local).await
        } else {
            let state = self.cloud_state.lock().await;
            if state.authority() != authority {
                return Err(SyncError::RequestObsolete(format!(
                    "Requested provider: {:?}, current provider: {:?}",
                    authority,
                    state.authority()
                )));
            }
            self.sync_request_params_internal(authority, is_local).await
        }
    }

    async fn sync_request_params_internal(
        &self,
        authority: Option<&str>,
        is_local: bool,
    ) -> Result<SyncRequestParams> {
        debug!(?authority, is_local, "sync_request_params");

        let Some(authority) = authority else {
            // Only the cloud authority can be missing
            return Ok(SyncRequestParams::Reset);
        };

        let cached = self.prefs.cached_collection_info(is_local).await?;
        let latest = self
            .client
            .media_collection_info(authority)
            .await
            .map_err(|e| SyncError::Provider(e.to_string()))?;

        debug!(?cached, ?latest, "Comparing collection info");
        let result = planner::decide(&cached, &latest)?;
        debug!(?result, "Planned sync request");
        Ok(result)
    }

    // ========================================================================
    // Engine wrappers
    // ========================================================================

    fn paged_sync_context(&self) -> PagedSyncContext<'_> {
        PagedSyncContext {
            client: self.client.as_ref(),
            facade: self.db_facade.as_ref(),
            prefs: &self.prefs,
            publisher: &self.publisher,
        }
    }

    async fn execute_sync_add(
        &self,
        authority: &str,
        is_local: bool,
        expected_collection_id: Option<&str>,
        is_incremental: bool,
        enforce_paged_sync: bool,
        args: QueryArgs,
    ) -> Result<()> {
        info!(authority, is_local, is_incremental, "Executing sync add");

        pager::execute_paged_sync(
            &self.paged_sync_context(),
            PagedSyncRequest {
                authority,
                is_local,
                expected_collection_id,
                expected_honored_args: pager::add_media_honored_args(
                    is_incremental,
                    enforce_paged_sync,
                ),
                args,
                op: SyncOperation::AddMedia,
                album_id: None,
            },
        )
        .await
        .map(|_| ())
    }

    async fn execute_sync_remove(
        &self,
        authority: &str,
        is_local: bool,
        expected_collection_id: Option<&str>,
        args: QueryArgs,
    ) -> Result<()> {
        info!(authority, is_local, "Executing sync remove");

        pager::execute_paged_sync(
            &self.paged_sync_context(),
            PagedSyncRequest {
                authority,
                is_local,
                expected_collection_id,
                expected_honored_args: pager::remove_media_honored_args(),
                args,
                op: SyncOperation::RemoveMedia,
                album_id: None,
            },
        )
        .await
        .map(|_| ())
    }

    async fn execute_sync_add_album(
        &self,
        authority: &str,
        is_local: bool,
        album_id: &str,
        args: QueryArgs,
    ) -> Result<()> {
        info!(authority, is_local, album_id, "Executing album sync add");

        // Album sync is always full; there is no collection id to pin
        // across pages.
        pager::execute_paged_sync(
            &self.paged_sync_context(),
            PagedSyncRequest {
                authority,
                is_local,
                expected_collection_id: None,
                expected_honored_args: pager::add_album_honored_args(),
                args,
                op: SyncOperation::AddAlbum,
                album_id: Some(album_id),
            },
        )
        .await
        .map(|_| ())
    }

    async fn execute_sync_reset(&self, authority: Option<&str>, is_local: bool) -> Result<()> {
        info!(?authority, is_local, "Executing sync reset");

        let mut operation = self
            .db_facade
            .begin_reset_media_operation(authority)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;
        let write_count = operation
            .execute(None)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;
        operation.set_success();

        info!(?authority, is_local, write_count, "Sync reset complete");
        Ok(())
    }

    async fn execute_sync_album_reset(
        &self,
        authority: Option<&str>,
        is_local: bool,
        album_id: Option<&str>,
    ) -> Result<()> {
        info!(?authority, is_local, ?album_id, "Executing album sync reset");

        let mut operation = self
            .db_facade
            .begin_reset_album_media_operation(authority, album_id)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;
        let write_count = operation
            .execute(None)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;
        operation.set_success();

        info!(
            ?authority,
            is_local,
            ?album_id,
            write_count,
            "Album sync reset complete"
        );
        Ok(())
    }

    /// Commit the latest collection info once a sync completed. For the
    /// cloud path the commit is skipped (returning `false`) when the active
    /// provider changed while the sync ran.
    async fn cache_media_collection_info(
        &self,
        authority: Option<&str>,
        is_local: bool,
        info: Option<&MediaCollectionInfo>,
    ) -> Result<bool> {
        let Some(authority) = authority else {
            debug!("Ignoring cache media collection info for missing authority");
            return Ok(true);
        };

        if is_local {
            self.prefs.cache_collection_info(true, info).await?;
            Ok(true)
        } else {
            let state = self.cloud_state.lock().await;
            if state.authority() == Some(authority) {
                self.prefs.cache_collection_info(false, info).await?;
                Ok(true)
            } else {
                error!(
                    authority,
                    current = ?state.authority(),
                    "Not caching collection info; the cloud provider changed"
                );
                Ok(false)
            }
        }
    }

    /// The page token a previously interrupted operation would resume from.
    pub async fn page_token_from_resume_key(&self, resume_key: &str) -> Option<String> {
        match self.prefs.resume_token(resume_key).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, resume_key, "Failed to read resume token");
                None
            }
        }
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Human-readable controller state for bug reports.
    pub async fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Picker sync controller state:");
        let _ = writeln!(out, "  local_provider={}", self.local_provider);
        let _ = writeln!(
            out,
            "  cloud_provider_info={:?}",
            self.current_cloud_provider_info().await
        );

        match self.registry.all_available_cloud_providers().await {
            Ok(providers) => {
                let _ = writeln!(out, "  all_available_cloud_providers={providers:?}");
            }
            Err(e) => {
                let _ = writeln!(out, "  all_available_cloud_providers=<error: {e}>");
            }
        }

        match self.prefs.raw_cloud_authority().await {
            Ok(raw) => {
                let _ = writeln!(out, "  persisted_cloud_authority={raw:?}");
            }
            Err(e) => {
                let _ = writeln!(out, "  persisted_cloud_authority=<error: {e}>");
            }
        }

        for (label, is_local) in [
            ("cached_local_media_collection_info", true),
            ("cached_cloud_media_collection_info", false),
        ] {
            match self.prefs.cached_collection_info(is_local).await {
                Ok(info) => {
                    let _ = writeln!(out, "  {label}={info:?}");
                }
                Err(e) => {
                    let _ = writeln!(out, "  {label}=<error: {e}>");
                }
            }
        }

        out
    }
}

impl std::fmt::Debug for PickerSyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickerSyncController")
            .field("local_provider", &self.local_provider)
            .finish_non_exhaustive()
    }
}
