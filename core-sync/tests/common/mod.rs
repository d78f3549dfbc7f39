//! Shared mocks and harness for the controller integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    DbWriteOperation, MediaCollectionInfo, MediaItemRow, MediaProviderClient, PageExtras,
    PickerDbFacade, ProviderDiscovery, ProviderInfo, ProviderPage, QueryArgs, SettingsStore,
    SystemStorageService,
};
use core_runtime::{EventBus, PickerConfig};
use core_sync::PickerSyncController;
use tokio::sync::Notify;

pub const LOCAL_AUTHORITY: &str = "local_picker_provider";

pub const CLOUD_AUTHORITY: &str = "com.example.photos.cloud";
pub const CLOUD_PACKAGE: &str = "com.example.photos";
pub const CLOUD_UID: u32 = 10_123;

pub const OTHER_CLOUD_AUTHORITY: &str = "com.example.gallery.cloud";
pub const OTHER_CLOUD_PACKAGE: &str = "com.example.gallery";
pub const OTHER_CLOUD_UID: u32 = 10_456;

pub fn cloud_provider_info() -> ProviderInfo {
    ProviderInfo::new(CLOUD_AUTHORITY, CLOUD_PACKAGE, CLOUD_UID)
}

pub fn other_cloud_provider_info() -> ProviderInfo {
    ProviderInfo::new(OTHER_CLOUD_AUTHORITY, OTHER_CLOUD_PACKAGE, OTHER_CLOUD_UID)
}

pub fn make_rows(count: usize, first_date_taken_ms: i64) -> Vec<MediaItemRow> {
    (0..count)
        .map(|i| MediaItemRow {
            id: format!("item-{i}"),
            mime_type: "image/jpeg".to_string(),
            date_taken_ms: first_date_taken_ms - i as i64,
            size_bytes: 1024,
            duration_ms: 0,
        })
        .collect()
}

// ============================================================================
// Mock settings store
// ============================================================================

#[derive(Clone)]
enum StoredValue {
    Str(String),
    I64(i64),
}

/// In-memory `SettingsStore`; one instance per namespace, like the
/// production sqlite stores.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: StdMutex<HashMap<String, StoredValue>>,
}

impl MemorySettingsStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), StoredValue::Str(value.to_string()));
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        match self.values.lock().unwrap().get(key) {
            Some(StoredValue::Str(s)) => Ok(Some(s.clone())),
            Some(StoredValue::I64(_)) => Err(BridgeError::OperationFailed(format!(
                "Type mismatch for key {key}"
            ))),
            None => Ok(None),
        }
    }

    async fn set_i64(&self, key: &str, value: i64) -> BridgeResult<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), StoredValue::I64(value));
        Ok(())
    }

    async fn get_i64(&self, key: &str) -> BridgeResult<Option<i64>> {
        match self.values.lock().unwrap().get(key) {
            Some(StoredValue::I64(v)) => Ok(Some(*v)),
            Some(StoredValue::Str(_)) => Err(BridgeError::OperationFailed(format!(
                "Type mismatch for key {key}"
            ))),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        let mut keys: Vec<String> = self.values.lock().unwrap().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.values.lock().unwrap().clear();
        Ok(())
    }
}

// ============================================================================
// Mock media provider
// ============================================================================

#[derive(Default)]
struct ScriptedProvider {
    collection: MediaCollectionInfo,
    /// Media pages addressed by the page token that requests them.
    media_pages: HashMap<Option<String>, ProviderPage>,
    /// Deleted-media pages addressed the same way.
    deleted_pages: HashMap<Option<String>, ProviderPage>,
}

/// Scripted provider client. Pages are addressed by request token so tests
/// can replay resumption from any saved token.
#[derive(Default)]
pub struct MockMediaProvider {
    providers: StdMutex<HashMap<String, ScriptedProvider>>,
    media_queries: StdMutex<Vec<(String, QueryArgs)>>,
    deleted_queries: StdMutex<Vec<(String, QueryArgs)>>,
    /// When set, the next media query requesting this token first signals
    /// `paused` and then waits for `resume`.
    pause_before_token: StdMutex<Option<Option<String>>>,
    pub paused: Notify,
    pub resume: Notify,
}

impl MockMediaProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_collection_info(&self, authority: &str, collection_id: &str, generation: i64) {
        let mut providers = self.providers.lock().unwrap();
        let provider = providers.entry(authority.to_string()).or_default();
        provider.collection = MediaCollectionInfo::new(collection_id, generation);
    }

    pub fn set_raw_collection_info(&self, authority: &str, info: MediaCollectionInfo) {
        let mut providers = self.providers.lock().unwrap();
        providers.entry(authority.to_string()).or_default().collection = info;
    }

    /// Script the media pages for `authority` as a chain:
    /// `(request_token, rows, next_token)` per page.
    pub fn set_media_pages(
        &self,
        authority: &str,
        collection_id: &str,
        honored_args: &[&str],
        pages: Vec<(Option<&str>, Vec<MediaItemRow>, Option<&str>)>,
    ) {
        let mut providers = self.providers.lock().unwrap();
        let provider = providers.entry(authority.to_string()).or_default();
        provider.media_pages = Self::build_pages(collection_id, honored_args, pages);
    }

    pub fn set_deleted_pages(
        &self,
        authority: &str,
        collection_id: &str,
        honored_args: &[&str],
        pages: Vec<(Option<&str>, Vec<MediaItemRow>, Option<&str>)>,
    ) {
        let mut providers = self.providers.lock().unwrap();
        let provider = providers.entry(authority.to_string()).or_default();
        provider.deleted_pages = Self::build_pages(collection_id, honored_args, pages);
    }

    fn build_pages(
        collection_id: &str,
        honored_args: &[&str],
        pages: Vec<(Option<&str>, Vec<MediaItemRow>, Option<&str>)>,
    ) -> HashMap<Option<String>, ProviderPage> {
        pages
            .into_iter()
            .map(|(request_token, rows, next_token)| {
                (
                    request_token.map(str::to_string),
                    ProviderPage {
                        rows,
                        extras: Some(PageExtras {
                            media_collection_id: Some(collection_id.to_string()),
                            next_page_token: next_token.map(str::to_string),
                            honored_args: honored_args.iter().map(|a| a.to_string()).collect(),
                        }),
                    },
                )
            })
            .collect()
    }

    /// Strip the extras from every scripted media page of `authority`.
    pub fn drop_media_extras(&self, authority: &str) {
        let mut providers = self.providers.lock().unwrap();
        if let Some(provider) = providers.get_mut(authority) {
            for page in provider.media_pages.values_mut() {
                page.extras = None;
            }
        }
    }

    /// Pause the media query that requests `token` until the test calls
    /// `resume.notify_one()`.
    pub fn pause_before(&self, token: Option<&str>) {
        *self.pause_before_token.lock().unwrap() = Some(token.map(str::to_string));
    }

    pub fn media_queries(&self) -> Vec<(String, QueryArgs)> {
        self.media_queries.lock().unwrap().clone()
    }

    pub fn deleted_queries(&self) -> Vec<(String, QueryArgs)> {
        self.deleted_queries.lock().unwrap().clone()
    }

    fn page_for(
        &self,
        authority: &str,
        args: &QueryArgs,
        deleted: bool,
    ) -> BridgeResult<ProviderPage> {
        let providers = self.providers.lock().unwrap();
        let provider = providers
            .get(authority)
            .ok_or_else(|| BridgeError::NotAvailable(format!("provider {authority}")))?;
        let pages = if deleted {
            &provider.deleted_pages
        } else {
            &provider.media_pages
        };
        pages
            .get(&args.page_token)
            .cloned()
            .ok_or_else(|| {
                BridgeError::OperationFailed(format!(
                    "No page scripted for token {:?}",
                    args.page_token
                ))
            })
    }
}

#[async_trait]
impl MediaProviderClient for MockMediaProvider {
    async fn media_collection_info(&self, authority: &str) -> BridgeResult<MediaCollectionInfo> {
        let providers = self.providers.lock().unwrap();
        providers
            .get(authority)
            .map(|p| p.collection.clone())
            .ok_or_else(|| BridgeError::NotAvailable(format!("provider {authority}")))
    }

    async fn query_media(&self, authority: &str, args: &QueryArgs) -> BridgeResult<ProviderPage> {
        let pause = {
            let mut pause_slot = self.pause_before_token.lock().unwrap();
            if pause_slot.as_ref() == Some(&args.page_token) {
                pause_slot.take();
                true
            } else {
                false
            }
        };
        if pause {
            self.paused.notify_one();
            self.resume.notified().await;
        }

        self.media_queries
            .lock()
            .unwrap()
            .push((authority.to_string(), args.clone()));
        self.page_for(authority, args, false)
    }

    async fn query_deleted_media(
        &self,
        authority: &str,
        args: &QueryArgs,
    ) -> BridgeResult<ProviderPage> {
        self.deleted_queries
            .lock()
            .unwrap()
            .push((authority.to_string(), args.clone()));
        self.page_for(authority, args, true)
    }
}

// ============================================================================
// Mock picker db facade
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    AddMedia,
    AddAlbum,
    RemoveMedia,
    ResetMedia,
    ResetAlbumMedia,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedOp {
    pub kind: OpKind,
    pub authority: Option<String>,
    pub album_id: Option<String>,
    pub rows: u64,
}

#[derive(Default)]
struct FacadeState {
    cloud_authority: Option<String>,
    committed: Vec<CommittedOp>,
    rolled_back: u32,
    begin_attempts: HashMap<OpKind, u32>,
    /// Ops whose `begin_*` should fail, with the error to fail with.
    fail_begin: HashMap<OpKind, FailureKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidArgument,
    Database,
}

/// Records committed write operations and the facade's cloud authority
/// switch. Operations roll back on drop unless marked successful.
#[derive(Default)]
pub struct MockDbFacade {
    state: Arc<StdMutex<FacadeState>>,
}

impl MockDbFacade {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cloud_authority(&self) -> Option<String> {
        self.state.lock().unwrap().cloud_authority.clone()
    }

    pub fn committed(&self) -> Vec<CommittedOp> {
        self.state.lock().unwrap().committed.clone()
    }

    pub fn committed_of_kind(&self, kind: OpKind) -> Vec<CommittedOp> {
        self.committed()
            .into_iter()
            .filter(|op| op.kind == kind)
            .collect()
    }

    pub fn rolled_back(&self) -> u32 {
        self.state.lock().unwrap().rolled_back
    }

    pub fn begin_attempts(&self, kind: OpKind) -> u32 {
        self.state
            .lock()
            .unwrap()
            .begin_attempts
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_begin(&self, kind: OpKind, failure: FailureKind) {
        self.state.lock().unwrap().fail_begin.insert(kind, failure);
    }

    fn begin(
        &self,
        kind: OpKind,
        authority: Option<&str>,
        album_id: Option<&str>,
    ) -> BridgeResult<Box<dyn DbWriteOperation>> {
        let mut state = self.state.lock().unwrap();
        *state.begin_attempts.entry(kind).or_insert(0) += 1;

        if let Some(failure) = state.fail_begin.get(&kind) {
            return Err(match failure {
                FailureKind::InvalidArgument => {
                    BridgeError::InvalidArgument(format!("cannot open {kind:?}"))
                }
                FailureKind::Database => {
                    BridgeError::DatabaseError(format!("cannot open {kind:?}"))
                }
            });
        }

        Ok(Box::new(MockWriteOp {
            state: self.state.clone(),
            kind,
            authority: authority.map(str::to_string),
            album_id: album_id.map(str::to_string),
            rows: 0,
            executed: false,
            success: false,
        }))
    }
}

struct MockWriteOp {
    state: Arc<StdMutex<FacadeState>>,
    kind: OpKind,
    authority: Option<String>,
    album_id: Option<String>,
    rows: u64,
    executed: bool,
    success: bool,
}

#[async_trait]
impl DbWriteOperation for MockWriteOp {
    async fn execute(&mut self, batch: Option<&[MediaItemRow]>) -> BridgeResult<u64> {
        self.executed = true;
        self.rows = batch.map(|rows| rows.len() as u64).unwrap_or(0);
        Ok(self.rows)
    }

    fn set_success(&mut self) {
        self.success = true;
    }
}

impl Drop for MockWriteOp {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        if self.success {
            state.committed.push(CommittedOp {
                kind: self.kind,
                authority: self.authority.clone(),
                album_id: self.album_id.clone(),
                rows: self.rows,
            });
        } else if self.executed {
            state.rolled_back += 1;
        }
    }
}

#[async_trait]
impl PickerDbFacade for MockDbFacade {
    async fn set_cloud_provider(&self, authority: Option<&str>) -> BridgeResult<()> {
        self.state.lock().unwrap().cloud_authority = authority.map(str::to_string);
        Ok(())
    }

    async fn begin_add_media_operation(
        &self,
        authority: &str,
    ) -> BridgeResult<Box<dyn DbWriteOperation>> {
        self.begin(OpKind::AddMedia, Some(authority), None)
    }

    async fn begin_add_album_media_operation(
        &self,
        authority: &str,
        album_id: &str,
    ) -> BridgeResult<Box<dyn DbWriteOperation>> {
        self.begin(OpKind::AddAlbum, Some(authority), Some(album_id))
    }

    async fn begin_remove_media_operation(
        &self,
        authority: &str,
    ) -> BridgeResult<Box<dyn DbWriteOperation>> {
        self.begin(OpKind::RemoveMedia, Some(authority), None)
    }

    async fn begin_reset_media_operation(
        &self,
        authority: Option<&str>,
    ) -> BridgeResult<Box<dyn DbWriteOperation>> {
        self.begin(OpKind::ResetMedia, authority, None)
    }

    async fn begin_reset_album_media_operation(
        &self,
        authority: Option<&str>,
        album_id: Option<&str>,
    ) -> BridgeResult<Box<dyn DbWriteOperation>> {
        self.begin(OpKind::ResetAlbumMedia, authority, album_id)
    }
}

// ============================================================================
// Mock discovery and storage service
// ============================================================================

pub struct MockDiscovery {
    providers: StdMutex<Vec<ProviderInfo>>,
    uid: u32,
}

impl MockDiscovery {
    pub fn new(providers: Vec<ProviderInfo>, uid: u32) -> Arc<Self> {
        Arc::new(Self {
            providers: StdMutex::new(providers),
            uid,
        })
    }

    pub fn set_installed(&self, providers: Vec<ProviderInfo>) {
        *self.providers.lock().unwrap() = providers;
    }

    pub fn remove_package(&self, package_name: &str) {
        self.providers
            .lock()
            .unwrap()
            .retain(|p| !p.matches_package(package_name));
    }
}

#[async_trait]
impl ProviderDiscovery for MockDiscovery {
    async fn installed_providers(&self) -> BridgeResult<Vec<ProviderInfo>> {
        Ok(self.providers.lock().unwrap().clone())
    }

    fn current_uid(&self) -> u32 {
        self.uid
    }
}

#[derive(Default)]
pub struct MockStorageService {
    pub recorded: StdMutex<Vec<Option<String>>>,
    pub reject: StdMutex<bool>,
}

impl MockStorageService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_updates(&self) {
        *self.reject.lock().unwrap() = true;
    }

    pub fn recorded(&self) -> Vec<Option<String>> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl SystemStorageService for MockStorageService {
    async fn set_cloud_media_provider(&self, authority: Option<&str>) -> BridgeResult<()> {
        if *self.reject.lock().unwrap() {
            return Err(BridgeError::PermissionDenied(
                "only the media process may update the storage service".to_string(),
            ));
        }
        self.recorded
            .lock()
            .unwrap()
            .push(authority.map(str::to_string));
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub controller: Arc<PickerSyncController>,
    pub provider: Arc<MockMediaProvider>,
    pub facade: Arc<MockDbFacade>,
    pub discovery: Arc<MockDiscovery>,
    pub storage: Arc<MockStorageService>,
    pub user_prefs: Arc<MemorySettingsStore>,
    pub sync_prefs: Arc<MemorySettingsStore>,
    pub events: Arc<EventBus>,
}

impl Harness {
    pub async fn seed_cursor(&self, is_local: bool, collection_id: &str, generation: i64) {
        let prefix = if is_local {
            "local_provider"
        } else {
            "cloud_provider"
        };
        self.sync_prefs
            .set_string(&format!("{prefix}:media_collection_id"), collection_id)
            .await
            .unwrap();
        self.sync_prefs
            .set_i64(&format!("{prefix}:last_media_sync_generation"), generation)
            .await
            .unwrap();
    }

    pub async fn cached_cursor(&self, is_local: bool) -> (Option<String>, i64) {
        let prefix = if is_local {
            "local_provider"
        } else {
            "cloud_provider"
        };
        let id = self
            .sync_prefs
            .get_string(&format!("{prefix}:media_collection_id"))
            .await
            .unwrap();
        let generation = self
            .sync_prefs
            .get_i64(&format!("{prefix}:last_media_sync_generation"))
            .await
            .unwrap()
            .unwrap_or(-1);
        (id, generation)
    }

    pub async fn resume_token(&self, key: &str) -> Option<String> {
        self.sync_prefs.get_string(key).await.unwrap()
    }

    pub async fn seed_resume_token(&self, key: &str, token: &str) {
        self.sync_prefs.set_string(key, token).await.unwrap();
    }

    pub async fn persisted_cloud_authority(&self) -> Option<String> {
        self.user_prefs
            .get_string("cloud_provider_authority")
            .await
            .unwrap()
    }

    /// Enable the standard cloud provider and forget the bookkeeping the
    /// switch itself produced, so tests start from a clean slate.
    pub async fn enable_cloud_provider(&self) {
        assert!(
            self.controller
                .set_cloud_provider(Some(CLOUD_AUTHORITY))
                .await
        );
    }
}

pub struct HarnessBuilder {
    config: Option<PickerConfig>,
    installed: Vec<ProviderInfo>,
    seeded_user_prefs: Vec<(String, String)>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            installed: vec![cloud_provider_info(), other_cloud_provider_info()],
            seeded_user_prefs: Vec::new(),
        }
    }

    /// Both standard test providers installed and allow-listed, feature
    /// enabled. With two candidates and no default package, construction
    /// auto-selects nothing.
    pub fn default_config() -> PickerConfig {
        PickerConfig::builder()
            .cloud_media_enabled(true)
            .allow_cloud_provider(CLOUD_PACKAGE)
            .allow_cloud_provider(OTHER_CLOUD_PACKAGE)
            .build()
            .unwrap()
    }

    pub fn config(mut self, config: PickerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn installed(mut self, providers: Vec<ProviderInfo>) -> Self {
        self.installed = providers;
        self
    }

    pub fn seed_user_pref(mut self, key: &str, value: &str) -> Self {
        self.seeded_user_prefs
            .push((key.to_string(), value.to_string()));
        self
    }

    pub async fn build(self) -> Harness {
        let provider = MockMediaProvider::new();
        let facade = MockDbFacade::new();
        let discovery = MockDiscovery::new(self.installed, 1000);
        let storage = MockStorageService::new();
        let user_prefs = MemorySettingsStore::new();
        let sync_prefs = MemorySettingsStore::new();
        let events = Arc::new(EventBus::new(64));

        for (key, value) in &self.seeded_user_prefs {
            user_prefs.set_string(key, value).await.unwrap();
        }

        let config = Arc::new(self.config.unwrap_or_else(Self::default_config));

        let controller = Arc::new(
            PickerSyncController::new(
                provider.clone(),
                discovery.clone(),
                storage.clone(),
                facade.clone(),
                config,
                user_prefs.clone(),
                sync_prefs.clone(),
                events.clone(),
            )
            .await
            .expect("controller construction"),
        );

        Harness {
            controller,
            provider,
            facade,
            discovery,
            storage,
            user_prefs,
            sync_prefs,
            events,
        }
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
