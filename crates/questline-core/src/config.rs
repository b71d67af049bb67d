use crate::error::LedgerError;
use crate::rank::RankTable;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

/// Coins credited the first time a task is completed within a claim cycle.
pub const TASK_COMPLETION_REWARD: u64 = 2;
/// Diamonds credited by the once-per-day collection.
pub const DAILY_CHECKIN_REWARD: u64 = 10;
/// Asia/Kolkata, which observes no daylight saving.
pub const DEFAULT_RESET_UTC_OFFSET_MINUTES: i32 = 330;
/// 30 days.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 86_400;

/// What happens to a non-permanent task's claim when it is un-completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPenaltyPolicy {
    /// The claim is kept, so every later toggle-off charges the penalty again.
    #[default]
    EveryUncomplete,
    /// The claim is cleared on the first penalty, for permanent and
    /// non-permanent tasks alike.
    OncePerClaim,
}

/// Ledger engine configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub task_completion_reward: u64,
    pub daily_checkin_reward: u64,
    /// Fixed offset of the reference timezone whose midnight is the daily boundary.
    pub reset_utc_offset_minutes: i32,
    pub session_ttl_secs: i64,
    pub repeat_penalty: RepeatPenaltyPolicy,
    pub rank_table: RankTable,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            task_completion_reward: TASK_COMPLETION_REWARD,
            daily_checkin_reward: DAILY_CHECKIN_REWARD,
            reset_utc_offset_minutes: DEFAULT_RESET_UTC_OFFSET_MINUTES,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            repeat_penalty: RepeatPenaltyPolicy::default(),
            rank_table: RankTable::default(),
        }
    }
}

impl LedgerConfig {
    pub fn reset_offset(&self) -> Result<FixedOffset, LedgerError> {
        self.reset_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                LedgerError::Configuration(format!(
                    "reset offset of {} minutes is out of range",
                    self.reset_utc_offset_minutes
                ))
            })
    }

    /// Check everything the engine relies on before it serves requests.
    pub fn validate(&self) -> Result<FixedOffset, LedgerError> {
        self.rank_table.validate()?;
        if self.session_ttl_secs <= 0 {
            return Err(LedgerError::Configuration(
                "session ttl must be positive".to_string(),
            ));
        }
        self.reset_offset()
    }
}
