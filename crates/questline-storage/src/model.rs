use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task list key used for a user's single working list.
pub const TASK_LIST_KEY: &str = "all_tasks";

/// Persisted account row.
///
/// `rank` and `task_points` are written for readers of the raw store but are
/// derived values; the ledger engine recomputes both on every load. The two
/// counter fields are optional because accounts created before point tracking
/// was introduced never stored them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub username: String,
    #[serde(default)]
    pub rank: String,
    #[serde(default)]
    pub sp_points: i64,
    #[serde(default)]
    pub task_points: i64,
    #[serde(default)]
    pub claimed_task_points: Option<i64>,
    #[serde(default)]
    pub failed_points: Option<i64>,
    #[serde(default)]
    pub last_sp_collect: i64,
    #[serde(default)]
    pub last_task_refresh: i64,
    #[serde(default)]
    pub daily_completed_count: i64,
    #[serde(default)]
    pub user_objective: String,
}

impl LedgerRecord {
    /// Default row for an account seen for the first time.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            rank: String::new(),
            sp_points: 0,
            task_points: 0,
            claimed_task_points: Some(0),
            failed_points: Some(0),
            last_sp_collect: 0,
            last_task_refresh: 0,
            daily_completed_count: 0,
            user_objective: String::new(),
        }
    }
}

/// Session token bound to a username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
