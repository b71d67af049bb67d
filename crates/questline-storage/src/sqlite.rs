//! SQLite adapter for Questline storage.
//!
//! Task lists are kept as one JSON document per `(username, list_key)` so the
//! engine's load-all / save-all contract maps onto a single row.

use crate::model::{LedgerRecord, SessionRecord};
use crate::traits::{LedgerStore, SessionStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

/// SQLite-backed storage adapter.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect (creating the database file if missing) and initialize schema.
    pub async fn connect(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::InvalidInput(format!("invalid sqlite url: {e}")))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Backend(format!("sqlite connect failed: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                rank TEXT NOT NULL DEFAULT '',
                sp_points INTEGER NOT NULL DEFAULT 0,
                task_points INTEGER NOT NULL DEFAULT 0,
                claimed_task_points INTEGER NULL,
                failed_points INTEGER NULL,
                last_sp_collect INTEGER NOT NULL DEFAULT 0,
                last_task_refresh INTEGER NOT NULL DEFAULT 0,
                daily_completed_count INTEGER NOT NULL DEFAULT 0,
                user_objective TEXT NOT NULL DEFAULT ''
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                username TEXT NOT NULL,
                list_key TEXT NOT NULL,
                document TEXT NOT NULL,
                PRIMARY KEY (username, list_key)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_sessions_username ON sessions (username)",
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

fn decode<'r, T>(row: &'r SqliteRow, column: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| StorageError::Serialization(format!("sqlite decode {column} failed: {e}")))
}

fn row_to_record(row: &SqliteRow) -> StorageResult<LedgerRecord> {
    Ok(LedgerRecord {
        username: decode(row, "username")?,
        rank: decode(row, "rank")?,
        sp_points: decode(row, "sp_points")?,
        task_points: decode(row, "task_points")?,
        claimed_task_points: decode(row, "claimed_task_points")?,
        failed_points: decode(row, "failed_points")?,
        last_sp_collect: decode(row, "last_sp_collect")?,
        last_task_refresh: decode(row, "last_task_refresh")?,
        daily_completed_count: decode(row, "daily_completed_count")?,
        user_objective: decode(row, "user_objective")?,
    })
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn get_user_data(&self, username: &str) -> StorageResult<Option<LedgerRecord>> {
        let row = sqlx::query(
            r#"
            SELECT username, rank, sp_points, task_points, claimed_task_points,
                   failed_points, last_sp_collect, last_task_refresh,
                   daily_completed_count, user_objective
            FROM users
            WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("sqlite load user failed: {e}")))?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn save_user_data(&self, username: &str, record: &LedgerRecord) -> StorageResult<()> {
        if record.username != username {
            return Err(StorageError::InvalidInput(format!(
                "record for '{}' cannot be saved under '{}'",
                record.username, username
            )));
        }
        sqlx::query(
            r#"
            INSERT INTO users (
                username, rank, sp_points, task_points, claimed_task_points,
                failed_points, last_sp_collect, last_task_refresh,
                daily_completed_count, user_objective
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(username) DO UPDATE SET
                rank = excluded.rank,
                sp_points = excluded.sp_points,
                task_points = excluded.task_points,
                claimed_task_points = excluded.claimed_task_points,
                failed_points = excluded.failed_points,
                last_sp_collect = excluded.last_sp_collect,
                last_task_refresh = excluded.last_task_refresh,
                daily_completed_count = excluded.daily_completed_count,
                user_objective = excluded.user_objective
            "#,
        )
        .bind(username)
        .bind(&record.rank)
        .bind(record.sp_points)
        .bind(record.task_points)
        .bind(record.claimed_task_points)
        .bind(record.failed_points)
        .bind(record.last_sp_collect)
        .bind(record.last_task_refresh)
        .bind(record.daily_completed_count)
        .bind(&record.user_objective)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("sqlite save user failed: {e}")))?;
        Ok(())
    }

    async fn get_tasks(&self, username: &str, list_key: &str) -> StorageResult<Option<String>> {
        let row = sqlx::query("SELECT document FROM tasks WHERE username = ?1 AND list_key = ?2")
            .bind(username)
            .bind(list_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("sqlite load tasks failed: {e}")))?;

        row.as_ref().map(|row| decode(row, "document")).transpose()
    }

    async fn save_tasks(
        &self,
        username: &str,
        list_key: &str,
        document: &str,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (username, list_key, document)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(username, list_key) DO UPDATE SET document = excluded.document
            "#,
        )
        .bind(username)
        .bind(list_key)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("sqlite save tasks failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create_session(&self, username: &str, ttl_secs: i64) -> StorageResult<String> {
        if username.trim().is_empty() {
            return Err(StorageError::InvalidInput(
                "session username must not be empty".to_string(),
            ));
        }
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now() + Duration::seconds(ttl_secs);
        sqlx::query("INSERT INTO sessions (token, username, expires_at) VALUES (?1, ?2, ?3)")
            .bind(&token)
            .bind(username)
            .bind(expires_at.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("sqlite create session failed: {e}")))?;
        Ok(token)
    }

    async fn get_username_from_session(&self, token: &str) -> StorageResult<Option<String>> {
        let row = sqlx::query("SELECT token, username, expires_at FROM sessions WHERE token = ?1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("sqlite load session failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let expires_at: i64 = decode(&row, "expires_at")?;
        let session = SessionRecord {
            token: decode(&row, "token")?,
            username: decode(&row, "username")?,
            expires_at: DateTime::<Utc>::from_timestamp(expires_at, 0).ok_or_else(|| {
                StorageError::Serialization(format!("session expiry {expires_at} out of range"))
            })?,
        };

        if session.is_expired(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(session.username))
    }

    async fn delete_session(&self, token: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("sqlite delete session failed: {e}")))?;
        Ok(())
    }

    async fn delete_user_and_data(&self, username: &str) -> StorageResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(format!("sqlite begin failed: {e}")))?;

        for stmt in [
            "DELETE FROM tasks WHERE username = ?1",
            "DELETE FROM sessions WHERE username = ?1",
            "DELETE FROM users WHERE username = ?1",
        ] {
            sqlx::query(stmt)
                .bind(username)
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::Backend(format!("sqlite delete user failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(format!("sqlite commit failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TASK_LIST_KEY;

    async fn temp_store() -> SqliteStore {
        let dir = std::env::temp_dir().join(format!("questline-sqlite-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let url = format!("sqlite://{}", dir.join("questline.db").display());
        SqliteStore::connect(&url, 1).await.unwrap()
    }

    #[tokio::test]
    async fn upserts_user_rows_and_keeps_missing_counters_null() {
        let store = temp_store().await;

        let mut record = LedgerRecord::new("alice");
        record.claimed_task_points = None;
        record.failed_points = None;
        store.save_user_data("alice", &record).await.unwrap();
        let loaded = store.get_user_data("alice").await.unwrap().unwrap();
        assert_eq!(loaded.claimed_task_points, None);

        record.sp_points = 60;
        record.claimed_task_points = Some(4);
        store.save_user_data("alice", &record).await.unwrap();
        let loaded = store.get_user_data("alice").await.unwrap().unwrap();
        assert_eq!(loaded.sp_points, 60);
        assert_eq!(loaded.claimed_task_points, Some(4));
    }

    #[tokio::test]
    async fn task_documents_are_replaced_whole() {
        let store = temp_store().await;
        assert!(store.get_tasks("alice", TASK_LIST_KEY).await.unwrap().is_none());

        store
            .save_tasks("alice", TASK_LIST_KEY, r#"[{"id":"a"}]"#)
            .await
            .unwrap();
        store.save_tasks("alice", TASK_LIST_KEY, "[]").await.unwrap();

        assert_eq!(
            store.get_tasks("alice", TASK_LIST_KEY).await.unwrap(),
            Some("[]".to_string())
        );
    }

    #[tokio::test]
    async fn sessions_expire_and_account_deletion_cascades() {
        let store = temp_store().await;
        store
            .save_user_data("alice", &LedgerRecord::new("alice"))
            .await
            .unwrap();
        store.save_tasks("alice", TASK_LIST_KEY, "[]").await.unwrap();
        let live = store.create_session("alice", 3600).await.unwrap();
        let expired = store.create_session("alice", -10).await.unwrap();

        assert_eq!(
            store.get_username_from_session(&live).await.unwrap(),
            Some("alice".to_string())
        );
        assert!(store
            .get_username_from_session(&expired)
            .await
            .unwrap()
            .is_none());

        store.delete_user_and_data("alice").await.unwrap();
        assert!(store.get_user_data("alice").await.unwrap().is_none());
        assert!(store.get_tasks("alice", TASK_LIST_KEY).await.unwrap().is_none());
        assert!(store.get_username_from_session(&live).await.unwrap().is_none());
    }
}
