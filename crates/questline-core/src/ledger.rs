use crate::error::LedgerError;
use crate::rank::{RankTable, RankTier};
use questline_storage::LedgerRecord;
use serde::{Deserialize, Serialize};

/// One user's account, owned by the request that loaded it.
///
/// Coins are never stored independently: [`Ledger::task_points`] is always
/// `claimed_task_points - failed_points`. The cached rank is refreshed from
/// `sp_points` on load and after every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    username: String,
    pub(crate) sp_points: u64,
    pub(crate) claimed_task_points: u64,
    pub(crate) failed_points: u64,
    pub(crate) last_sp_collect: i64,
    pub(crate) last_task_refresh: i64,
    pub(crate) daily_completed_count: i64,
    pub(crate) user_objective: String,
    pub(crate) rank: RankTier,
}

/// Scoreboard returned with every successful task action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub tp: i64,
    pub sp: u64,
    pub failed: u64,
    pub rank: String,
    pub daily_count: i64,
}

fn counter(value: i64, field: &str) -> Result<u64, String> {
    u64::try_from(value).map_err(|_| format!("{field} is negative ({value})"))
}

impl Ledger {
    /// Rebuild a ledger from its stored row.
    ///
    /// Missing counters from legacy rows read as zero; the stored rank and
    /// coin total are ignored and recomputed.
    pub fn from_record(record: LedgerRecord, table: &RankTable) -> Result<Self, String> {
        let sp_points = counter(record.sp_points, "sp_points")?;
        let claimed_task_points =
            counter(record.claimed_task_points.unwrap_or(0), "claimed_task_points")?;
        let failed_points = counter(record.failed_points.unwrap_or(0), "failed_points")?;
        let rank = table
            .resolve(sp_points)
            .map_err(|e| e.to_string())?
            .clone();

        Ok(Self {
            username: record.username,
            sp_points,
            claimed_task_points,
            failed_points,
            last_sp_collect: record.last_sp_collect,
            last_task_refresh: record.last_task_refresh,
            daily_completed_count: record.daily_completed_count,
            user_objective: record.user_objective,
            rank,
        })
    }

    /// Row written back to storage, with derived fields freshly computed.
    pub fn to_record(&self) -> LedgerRecord {
        LedgerRecord {
            username: self.username.clone(),
            rank: self.rank.title.clone(),
            sp_points: clamp_i64(self.sp_points),
            task_points: self.task_points(),
            claimed_task_points: Some(clamp_i64(self.claimed_task_points)),
            failed_points: Some(clamp_i64(self.failed_points)),
            last_sp_collect: self.last_sp_collect,
            last_task_refresh: self.last_task_refresh,
            daily_completed_count: self.daily_completed_count,
            user_objective: self.user_objective.clone(),
        }
    }

    pub fn refresh_rank(&mut self, table: &RankTable) -> Result<(), LedgerError> {
        self.rank = table.resolve(self.sp_points)?.clone();
        Ok(())
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn sp_points(&self) -> u64 {
        self.sp_points
    }

    pub fn claimed_task_points(&self) -> u64 {
        self.claimed_task_points
    }

    pub fn failed_points(&self) -> u64 {
        self.failed_points
    }

    /// Coins: claimed rewards minus penalties. May be negative.
    pub fn task_points(&self) -> i64 {
        clamp_i64(self.claimed_task_points) - clamp_i64(self.failed_points)
    }

    pub fn last_sp_collect(&self) -> i64 {
        self.last_sp_collect
    }

    pub fn last_task_refresh(&self) -> i64 {
        self.last_task_refresh
    }

    pub fn daily_completed_count(&self) -> i64 {
        self.daily_completed_count
    }

    pub fn user_objective(&self) -> &str {
        &self.user_objective
    }

    pub fn set_objective(&mut self, objective: String) {
        self.user_objective = objective;
    }

    pub fn rank(&self) -> &RankTier {
        &self.rank
    }

    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            tp: self.task_points(),
            sp: self.sp_points,
            failed: self.failed_points,
            rank: self.rank.title.clone(),
            daily_count: self.daily_completed_count,
        }
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
pub(crate) fn test_ledger(username: &str) -> Ledger {
    Ledger::from_record(LedgerRecord::new(username), &RankTable::default())
        .expect("default record is valid")
}
