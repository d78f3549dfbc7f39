use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The active cloud provider changed while an operation planned for the
    /// previous one was still in flight.
    #[error("Sync request obsolete: {0}")]
    RequestObsolete(String),

    #[error("Unexpected latest media collection info: id={collection_id:?}, generation={generation}")]
    InvalidCollectionInfo {
        collection_id: Option<String>,
        generation: i64,
    },

    #[error("Mismatched media collection id. Expected: {expected}. Found: {found:?}")]
    CollectionIdMismatch {
        expected: String,
        found: Option<String>,
    },

    #[error("Provider response page is missing its extras")]
    MissingPageExtras,

    #[error("Unhonored query args. Expected: {expected:?}. Found: {found:?}")]
    UnhonoredArgs {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Found repeated page token: {0}")]
    RepeatedPageToken(String),

    #[error("Failed to open database write operation: {0}")]
    OperationUnopenable(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Preferences error: {0}")]
    Preferences(String),

    #[error("Picker sync controller is not initialized")]
    NotInitialized,
}

impl SyncError {
    /// Whether this error leaves the run aborted with no reset and no
    /// retry: the provider swap case and the unopenable-write-operation
    /// case, where retrying against the same state cannot help.
    pub fn aborts_without_retry(&self) -> bool {
        matches!(
            self,
            SyncError::RequestObsolete(_) | SyncError::OperationUnopenable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
