use crate::model::LedgerRecord;
use crate::StorageResult;
use async_trait::async_trait;

/// Storage interface for account rows and per-user task documents.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Load one account row.
    async fn get_user_data(&self, username: &str) -> StorageResult<Option<LedgerRecord>>;

    /// Overwrite the account row for `username`.
    async fn save_user_data(&self, username: &str, record: &LedgerRecord) -> StorageResult<()>;

    /// Load the serialized task list stored under `list_key`.
    async fn get_tasks(&self, username: &str, list_key: &str) -> StorageResult<Option<String>>;

    /// Replace the serialized task list stored under `list_key`.
    async fn save_tasks(&self, username: &str, list_key: &str, document: &str)
        -> StorageResult<()>;
}

/// Storage interface for session tokens and account removal.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Issue a new token for `username` valid for `ttl_secs`.
    async fn create_session(&self, username: &str, ttl_secs: i64) -> StorageResult<String>;

    /// Resolve a token to its username. Expired tokens resolve to `None`.
    async fn get_username_from_session(&self, token: &str) -> StorageResult<Option<String>>;

    async fn delete_session(&self, token: &str) -> StorageResult<()>;

    /// Remove the account row, every task list, and every session of `username`.
    async fn delete_user_and_data(&self, username: &str) -> StorageResult<()>;
}

/// Unified storage bundle consumed by the ledger engine.
pub trait QuestlineStorage: LedgerStore + SessionStore + Send + Sync {}

impl<T> QuestlineStorage for T where T: LedgerStore + SessionStore + Send + Sync {}
