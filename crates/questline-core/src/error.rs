use questline_storage::StorageError;
use thiserror::Error;

/// Domain failures. Every variant is recoverable and is reported to callers as
/// a `success: false` result rather than a transport error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyCollected(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    UnknownOperation(String),
}

impl LedgerError {
    pub fn task_not_found() -> Self {
        Self::NotFound("Error: Task ID not found.".to_string())
    }
}

/// Engine failures that escape the structured-result channel.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The caller named an operation the engine does not know.
    #[error("{0}")]
    UnknownOperation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("corrupt stored data for '{username}': {detail}")]
    CorruptRecord { username: String, detail: String },
}

impl EngineError {
    pub(crate) fn corrupt(username: &str, detail: impl Into<String>) -> Self {
        Self::CorruptRecord {
            username: username.to_string(),
            detail: detail.into(),
        }
    }
}
