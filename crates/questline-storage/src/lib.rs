//! Questline storage collaborators.
//!
//! This crate defines the persistence contract the ledger engine consumes:
//! - account rows (`LedgerStore::get_user_data` / `save_user_data`)
//! - one serialized task document per user and list key
//! - session tokens and whole-account removal (`SessionStore`)
//!
//! Two adapters ship with it: [`memory::InMemoryStore`] and, behind the
//! `sqlite` feature, [`sqlite::SqliteStore`].

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
#[cfg(feature = "sqlite")]
pub mod sqlite;
mod traits;

pub use error::{StorageError, StorageResult};
pub use model::{LedgerRecord, SessionRecord, TASK_LIST_KEY};
pub use traits::{LedgerStore, QuestlineStorage, SessionStore};

use std::sync::Arc;

/// Storage backend selection.
#[derive(Debug, Clone, Default)]
pub enum StorageConfig {
    /// Keep every account in process memory only.
    #[default]
    Memory,
    /// Persist accounts, task lists, and sessions in a SQLite database.
    Sqlite {
        database_url: String,
        max_connections: u32,
    },
}

impl StorageConfig {
    pub fn sqlite(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self::Sqlite {
            database_url: database_url.into(),
            max_connections,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite { .. } => "sqlite",
        }
    }

    /// Build the configured backend.
    pub async fn connect(&self) -> StorageResult<Arc<dyn QuestlineStorage>> {
        match self {
            Self::Memory => Ok(Arc::new(memory::InMemoryStore::new())),
            #[cfg(feature = "sqlite")]
            Self::Sqlite {
                database_url,
                max_connections,
            } => {
                let store = sqlite::SqliteStore::connect(database_url, *max_connections).await?;
                tracing::info!(database_url = %database_url, "sqlite storage ready");
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "sqlite"))]
            Self::Sqlite { .. } => Err(StorageError::Backend(
                "sqlite storage requires the `sqlite` feature".to_string(),
            )),
        }
    }
}
