//! Paged sync engine.
//!
//! Executes a page-by-page sync from a provider into the picker database.
//! The per-run position is an explicit [`PageState`] advanced by the pure
//! [`validate_page`] function; the side-effecting steps (provider query,
//! scoped DB write, resume-token persist, notification) sit behind the
//! bridge traits so a run can be replayed in tests from any saved token.
//!
//! After every committed page the next page token is persisted under the
//! operation's resume key. A run that dies mid-way therefore resumes at the
//! first uncommitted page on the next invocation instead of starting over.

use std::collections::HashSet;

use bridge_traits::{
    provider::{ARG_ALBUM_ID, ARG_PAGE_SIZE, ARG_SYNC_GENERATION},
    BridgeError, MediaProviderClient, PageExtras, PickerDbFacade, QueryArgs,
};
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::notify::NotificationPublisher;
use crate::preferences::{resume_key, SyncPreferences};

/// The flavor of a paged write into the picker database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    /// Add (or upsert) media rows.
    AddMedia,
    /// Add album-content rows for one album.
    AddAlbum,
    /// Remove media rows listed by the provider's deleted-media query.
    RemoveMedia,
}

/// Position of one paged run: the token to fetch next, the tokens already
/// consumed this run (cycle detection), and the rows written so far.
#[derive(Debug, Default)]
pub struct PageState {
    next_token: Option<String>,
    seen_tokens: HashSet<String>,
    total_rows: u64,
}

impl PageState {
    /// Start a run, optionally resuming from a persisted token.
    pub fn new(resume_token: Option<String>) -> Self {
        Self {
            next_token: resume_token,
            seen_tokens: HashSet::new(),
            total_rows: 0,
        }
    }

    /// Token to pass as `page_token` for the next query, if any.
    pub fn next_token(&self) -> Option<&str> {
        self.next_token.as_deref()
    }

    /// Tokens returned by the provider so far in this run.
    pub fn seen_tokens(&self) -> &HashSet<String> {
        &self.seen_tokens
    }

    /// Record a committed page: its row count and the token the provider
    /// returned for the page after it.
    pub fn record_page(&mut self, next_token: Option<String>, rows_written: u64) {
        if let Some(token) = &next_token {
            self.seen_tokens.insert(token.clone());
        }
        self.next_token = next_token;
        self.total_rows += rows_written;
    }

    /// Whether the provider reported no further pages.
    pub fn is_done(&self) -> bool {
        self.next_token.is_none()
    }

    /// Rows written across all committed pages of this run.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }
}

/// Validate one response page and extract the next page token.
///
/// The page is rejected when the extras are missing entirely, when the
/// collection id does not match the one the run was planned against, when
/// the provider failed to honor a required query argument, or when the next
/// page token was already seen this run (a provider paging cycle).
pub fn validate_page(
    extras: Option<&PageExtras>,
    expected_collection_id: Option<&str>,
    expected_honored_args: &[&'static str],
    seen_tokens: &HashSet<String>,
) -> Result<Option<String>> {
    let Some(extras) = extras else {
        return Err(SyncError::MissingPageExtras);
    };

    if let Some(expected) = expected_collection_id {
        if extras.media_collection_id.as_deref() != Some(expected) {
            return Err(SyncError::CollectionIdMismatch {
                expected: expected.to_string(),
                found: extras.media_collection_id.clone(),
            });
        }
    }

    let honored = |arg: &str| extras.honored_args.iter().any(|h| h == arg);
    if !expected_honored_args.iter().all(|arg| honored(arg)) {
        return Err(SyncError::UnhonoredArgs {
            expected: expected_honored_args
                .iter()
                .map(|a| a.to_string())
                .collect(),
            found: extras.honored_args.clone(),
        });
    }

    if let Some(next) = &extras.next_page_token {
        if seen_tokens.contains(next) {
            return Err(SyncError::RepeatedPageToken(next.clone()));
        }
    }

    Ok(extras.next_page_token.clone())
}

/// Everything a paged run needs to touch the outside world.
pub(crate) struct PagedSyncContext<'a> {
    pub client: &'a dyn MediaProviderClient,
    pub facade: &'a dyn PickerDbFacade,
    pub prefs: &'a SyncPreferences,
    pub publisher: &'a NotificationPublisher,
}

/// One paged run: which provider, which operation, and what the pages must
/// prove about themselves.
pub(crate) struct PagedSyncRequest<'a> {
    pub authority: &'a str,
    pub is_local: bool,
    /// Collection id every page must report; `None` for album operations,
    /// which are always full syncs.
    pub expected_collection_id: Option<&'a str>,
    /// Query arguments the provider must confirm as honored.
    pub expected_honored_args: Vec<&'static str>,
    /// Base query arguments; the engine fills in `page_token` per page.
    pub args: QueryArgs,
    pub op: SyncOperation,
    pub album_id: Option<&'a str>,
}

/// Execute a page-by-page sync from the provider, returning the total row
/// count written.
pub(crate) async fn execute_paged_sync(
    ctx: &PagedSyncContext<'_>,
    req: PagedSyncRequest<'_>,
) -> Result<u64> {
    let resume_key = resume_key(req.is_local, req.op);

    let resume_token = ctx.prefs.resume_token(&resume_key).await?;
    if let Some(token) = &resume_token {
        info!(
            resume_key = %resume_key,
            token = %token,
            "Resumable operation found, resuming from saved page token"
        );
    }
    let mut state = PageState::new(resume_token);

    loop {
        let mut args = req.args.clone();
        args.page_token = state.next_token().map(str::to_string);

        let mut operation = begin_operation(ctx, &req).await?;

        let page = match req.op {
            SyncOperation::RemoveMedia => ctx.client.query_deleted_media(req.authority, &args),
            SyncOperation::AddMedia | SyncOperation::AddAlbum => {
                ctx.client.query_media(req.authority, &args)
            }
        }
        .await
        .map_err(|e| SyncError::Provider(e.to_string()))?;

        let next_token = validate_page(
            page.extras.as_ref(),
            req.expected_collection_id,
            &req.expected_honored_args,
            state.seen_tokens(),
        )?;

        let rows_written = operation
            .execute(Some(&page.rows))
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        let first_date_taken_ms = page.rows.first().map(|row| row.date_taken_ms);

        operation.set_success();
        // Dropping the handle commits; every page is durable before its
        // resume token is advanced.
        drop(operation);

        state.record_page(next_token, rows_written);
        ctx.prefs
            .remember_resume_token(&resume_key, state.next_token())
            .await?;

        debug!(
            authority = req.authority,
            rows_written,
            total_rows = state.total_rows(),
            "Committed sync page"
        );

        if let Some(date_taken_ms) = first_date_taken_ms {
            ctx.publisher.publish_page(req.op, req.album_id, date_taken_ms);
        }

        if state.is_done() {
            break;
        }
    }

    info!(
        authority = req.authority,
        total_rows = state.total_rows(),
        "Paged sync successful"
    );
    Ok(state.total_rows())
}

/// Required honored args for an add operation.
pub(crate) fn add_media_honored_args(
    is_incremental: bool,
    enforce_paged_sync: bool,
) -> Vec<&'static str> {
    let mut expected = Vec::new();
    if is_incremental {
        expected.push(ARG_SYNC_GENERATION);
    }
    if enforce_paged_sync {
        expected.push(ARG_PAGE_SIZE);
    }
    expected
}

/// Required honored args for a remove operation.
pub(crate) fn remove_media_honored_args() -> Vec<&'static str> {
    vec![ARG_SYNC_GENERATION]
}

/// Required honored args for an album add operation.
pub(crate) fn add_album_honored_args() -> Vec<&'static str> {
    vec![ARG_ALBUM_ID]
}

async fn begin_operation(
    ctx: &PagedSyncContext<'_>,
    req: &PagedSyncRequest<'_>,
) -> Result<Box<dyn bridge_traits::DbWriteOperation>> {
    let result = match req.op {
        SyncOperation::AddMedia => ctx.facade.begin_add_media_operation(req.authority).await,
        SyncOperation::AddAlbum => {
            let Some(album_id) = req.album_id else {
                return Err(SyncError::OperationUnopenable(
                    "Cannot begin an album add operation without an album id".to_string(),
                ));
            };
            ctx.facade
                .begin_add_album_media_operation(req.authority, album_id)
                .await
        }
        SyncOperation::RemoveMedia => ctx.facade.begin_remove_media_operation(req.authority).await,
    };

    result.map_err(|e| match e {
        BridgeError::InvalidArgument(msg) => SyncError::OperationUnopenable(msg),
        other => SyncError::Database(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extras(
        collection_id: Option<&str>,
        next_token: Option<&str>,
        honored: &[&str],
    ) -> PageExtras {
        PageExtras {
            media_collection_id: collection_id.map(str::to_string),
            next_page_token: next_token.map(str::to_string),
            honored_args: honored.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn missing_extras_is_fatal() {
        assert!(matches!(
            validate_page(None, None, &[], &HashSet::new()),
            Err(SyncError::MissingPageExtras)
        ));
    }

    #[test]
    fn mismatched_collection_id_is_fatal() {
        let extras = extras(Some("C2"), None, &[]);
        assert!(matches!(
            validate_page(Some(&extras), Some("C1"), &[], &HashSet::new()),
            Err(SyncError::CollectionIdMismatch { .. })
        ));
    }

    #[test]
    fn collection_id_is_not_checked_when_not_expected() {
        let extras = extras(None, Some("p1"), &[ARG_ALBUM_ID]);
        let next = validate_page(Some(&extras), None, &[ARG_ALBUM_ID], &HashSet::new()).unwrap();
        assert_eq!(next.as_deref(), Some("p1"));
    }

    #[test]
    fn unhonored_required_arg_is_fatal() {
        let extras = extras(Some("C1"), None, &[ARG_PAGE_SIZE]);
        assert!(matches!(
            validate_page(
                Some(&extras),
                Some("C1"),
                &[ARG_SYNC_GENERATION, ARG_PAGE_SIZE],
                &HashSet::new()
            ),
            Err(SyncError::UnhonoredArgs { .. })
        ));
    }

    #[test]
    fn extra_honored_args_are_allowed() {
        let extras = extras(Some("C1"), None, &[ARG_SYNC_GENERATION, ARG_PAGE_SIZE]);
        validate_page(Some(&extras), Some("C1"), &[ARG_SYNC_GENERATION], &HashSet::new()).unwrap();
    }

    #[test]
    fn repeated_page_token_is_fatal() {
        let mut seen = HashSet::new();
        seen.insert("p1".to_string());
        let extras = extras(Some("C1"), Some("p1"), &[]);
        assert!(matches!(
            validate_page(Some(&extras), Some("C1"), &[], &seen),
            Err(SyncError::RepeatedPageToken(token)) if token == "p1"
        ));
    }

    #[test]
    fn page_state_tracks_tokens_and_rows() {
        let mut state = PageState::new(None);
        assert!(state.is_done());

        state.record_page(Some("p1".to_string()), 500);
        assert!(!state.is_done());
        assert_eq!(state.next_token(), Some("p1"));
        assert!(state.seen_tokens().contains("p1"));

        state.record_page(None, 300);
        assert!(state.is_done());
        assert_eq!(state.total_rows(), 800);
    }

    #[test]
    fn page_state_resumes_from_saved_token() {
        let state = PageState::new(Some("p2".to_string()));
        assert!(!state.is_done());
        assert_eq!(state.next_token(), Some("p2"));
        // The resumed token was consumed by the previous run; only tokens
        // returned in this run participate in cycle detection.
        assert!(state.seen_tokens().is_empty());
    }
}
