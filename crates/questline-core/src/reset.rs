use crate::clock::day_boundary;
use crate::ledger::Ledger;
use crate::tasks::TaskList;
use chrono::{DateTime, FixedOffset, Utc};

/// What a daily reset did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub fired: bool,
    pub removed_tasks: usize,
    pub reopened_tasks: usize,
}

/// Roll the account over if the last refresh predates today's midnight in `offset`.
///
/// Non-permanent tasks are dropped. Permanent tasks stay with `completed`
/// cleared and `claimed` kept. Idempotent within one local day.
pub fn apply_daily_reset(
    ledger: &mut Ledger,
    tasks: &mut TaskList,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> ResetReport {
    if ledger.last_task_refresh >= day_boundary(now, offset) {
        return ResetReport::default();
    }

    let before = tasks.len();
    let mut reopened_tasks = 0;
    tasks.retain_mut(|task| {
        if !task.permanent {
            return false;
        }
        if task.completed {
            task.completed = false;
            reopened_tasks += 1;
        }
        true
    });

    ledger.daily_completed_count = 0;
    ledger.last_task_refresh = now.timestamp();

    ResetReport {
        fired: true,
        removed_tasks: before - tasks.len(),
        reopened_tasks,
    }
}
