//! In-memory reference implementation of the storage traits.
//!
//! Deterministic and test-friendly. Nothing survives a restart; use the
//! SQLite adapter for durable deployments.

use crate::model::{LedgerRecord, SessionRecord};
use crate::traits::{LedgerStore, SessionStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory Questline storage adapter.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, LedgerRecord>>,
    tasks: RwLock<HashMap<(String, String), String>>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(name: &str) -> StorageError {
    StorageError::Backend(format!("{name} lock poisoned"))
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn get_user_data(&self, username: &str) -> StorageResult<Option<LedgerRecord>> {
        let guard = self.users.read().map_err(|_| poisoned("users"))?;
        Ok(guard.get(username).cloned())
    }

    async fn save_user_data(&self, username: &str, record: &LedgerRecord) -> StorageResult<()> {
        if record.username != username {
            return Err(StorageError::InvalidInput(format!(
                "record for '{}' cannot be saved under '{}'",
                record.username, username
            )));
        }
        let mut guard = self.users.write().map_err(|_| poisoned("users"))?;
        guard.insert(username.to_string(), record.clone());
        Ok(())
    }

    async fn get_tasks(&self, username: &str, list_key: &str) -> StorageResult<Option<String>> {
        let guard = self.tasks.read().map_err(|_| poisoned("tasks"))?;
        Ok(guard
            .get(&(username.to_string(), list_key.to_string()))
            .cloned())
    }

    async fn save_tasks(
        &self,
        username: &str,
        list_key: &str,
        document: &str,
    ) -> StorageResult<()> {
        let mut guard = self.tasks.write().map_err(|_| poisoned("tasks"))?;
        guard.insert(
            (username.to_string(), list_key.to_string()),
            document.to_string(),
        );
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create_session(&self, username: &str, ttl_secs: i64) -> StorageResult<String> {
        if username.trim().is_empty() {
            return Err(StorageError::InvalidInput(
                "session username must not be empty".to_string(),
            ));
        }
        let token = Uuid::new_v4().simple().to_string();
        let record = SessionRecord {
            token: token.clone(),
            username: username.to_string(),
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        };
        let mut guard = self.sessions.write().map_err(|_| poisoned("sessions"))?;
        guard.insert(token.clone(), record);
        Ok(token)
    }

    async fn get_username_from_session(&self, token: &str) -> StorageResult<Option<String>> {
        let guard = self.sessions.read().map_err(|_| poisoned("sessions"))?;
        Ok(guard
            .get(token)
            .filter(|session| !session.is_expired(Utc::now()))
            .map(|session| session.username.clone()))
    }

    async fn delete_session(&self, token: &str) -> StorageResult<()> {
        let mut guard = self.sessions.write().map_err(|_| poisoned("sessions"))?;
        guard.remove(token);
        Ok(())
    }

    async fn delete_user_and_data(&self, username: &str) -> StorageResult<()> {
        self.users
            .write()
            .map_err(|_| poisoned("users"))?
            .remove(username);
        self.tasks
            .write()
            .map_err(|_| poisoned("tasks"))?
            .retain(|(owner, _), _| owner != username);
        self.sessions
            .write()
            .map_err(|_| poisoned("sessions"))?
            .retain(|_, session| session.username != username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TASK_LIST_KEY;

    #[tokio::test]
    async fn user_rows_round_trip_by_username() {
        let store = InMemoryStore::new();
        assert!(store.get_user_data("alice").await.unwrap().is_none());

        let mut record = LedgerRecord::new("alice");
        record.sp_points = 40;
        store.save_user_data("alice", &record).await.unwrap();

        let loaded = store.get_user_data("alice").await.unwrap().unwrap();
        assert_eq!(loaded.sp_points, 40);
    }

    #[tokio::test]
    async fn rejects_record_saved_under_foreign_username() {
        let store = InMemoryStore::new();
        let err = store
            .save_user_data("bob", &LedgerRecord::new("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let store = InMemoryStore::new();
        let live = store.create_session("alice", 3600).await.unwrap();
        let expired = store.create_session("alice", -1).await.unwrap();

        assert_eq!(
            store.get_username_from_session(&live).await.unwrap(),
            Some("alice".to_string())
        );
        assert_eq!(store.get_username_from_session(&expired).await.unwrap(), None);

        store.delete_session(&live).await.unwrap();
        assert_eq!(store.get_username_from_session(&live).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_user_and_data_removes_everything_for_that_user() {
        let store = InMemoryStore::new();
        store
            .save_user_data("alice", &LedgerRecord::new("alice"))
            .await
            .unwrap();
        store
            .save_tasks("alice", TASK_LIST_KEY, "[]")
            .await
            .unwrap();
        store.save_tasks("bob", TASK_LIST_KEY, "[]").await.unwrap();
        let token = store.create_session("alice", 3600).await.unwrap();

        store.delete_user_and_data("alice").await.unwrap();

        assert!(store.get_user_data("alice").await.unwrap().is_none());
        assert!(store.get_tasks("alice", TASK_LIST_KEY).await.unwrap().is_none());
        assert!(store.get_tasks("bob", TASK_LIST_KEY).await.unwrap().is_some());
        assert!(store.get_username_from_session(&token).await.unwrap().is_none());
    }
}
