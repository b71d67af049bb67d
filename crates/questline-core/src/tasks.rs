use crate::config::RepeatPenaltyPolicy;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::sanitize::escape_html;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single to-do entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    /// The current completion cycle has already been rewarded.
    #[serde(default)]
    pub claimed: bool,
    /// Survives daily rollover.
    #[serde(default)]
    pub permanent: bool,
}

/// Ledger effect of a toggle, rendered for display by `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointsChange {
    Awarded(u64),
    AlreadyClaimed,
    Penalized(u64),
    NoPenalty,
}

impl fmt::Display for PointsChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Awarded(points) => write!(f, "+{points}"),
            Self::AlreadyClaimed => f.write_str("+0 (Already claimed for this cycle)"),
            Self::Penalized(points) => write!(f, "-{points}"),
            Self::NoPenalty => f.write_str("-0 (Not claimed, no penalty)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub id: String,
    pub completed: bool,
    pub points_change: PointsChange,
}

/// A user's tasks, persisted whole as one ordered JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Parse a stored document. A blank document is an empty list.
    pub fn parse(document: &str) -> Result<Self, serde_json::Error> {
        if document.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            tasks: serde_json::from_str(document)?,
        })
    }

    pub fn to_document(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.tasks)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub(crate) fn retain_mut(&mut self, f: impl FnMut(&mut Task) -> bool) {
        self.tasks.retain_mut(f);
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Task, LedgerError> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(LedgerError::task_not_found)
    }

    /// Append a new incomplete, unclaimed task.
    pub fn add(&mut self, text: &str, permanent: bool) -> Result<Task, LedgerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LedgerError::Validation(
                "Error: Task text must not be empty.".to_string(),
            ));
        }

        let mut id = Uuid::new_v4().simple().to_string();
        while self.get(&id).is_some() {
            id = Uuid::new_v4().simple().to_string();
        }

        let task = Task {
            id,
            text: escape_html(text),
            completed: false,
            claimed: false,
            permanent,
        };
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Flip completion and apply the reward or penalty to `ledger`.
    ///
    /// A reward is credited once per claim cycle. Un-completing a claimed task
    /// always charges the penalty; the claim is then cleared for permanent
    /// tasks, and for every task under [`RepeatPenaltyPolicy::OncePerClaim`].
    /// Penalties only ever grow `failed_points`; `claimed_task_points` is
    /// never decremented.
    pub fn toggle(
        &mut self,
        id: &str,
        ledger: &mut Ledger,
        reward: u64,
        policy: RepeatPenaltyPolicy,
    ) -> Result<ToggleOutcome, LedgerError> {
        let task = self.find_mut(id)?;
        task.completed = !task.completed;

        let points_change = if task.completed {
            ledger.daily_completed_count += 1;
            if task.claimed {
                PointsChange::AlreadyClaimed
            } else {
                ledger.claimed_task_points = ledger.claimed_task_points.saturating_add(reward);
                task.claimed = true;
                PointsChange::Awarded(reward)
            }
        } else {
            ledger.daily_completed_count -= 1;
            if task.claimed {
                ledger.failed_points = ledger.failed_points.saturating_add(reward);
                if task.permanent || policy == RepeatPenaltyPolicy::OncePerClaim {
                    task.claimed = false;
                }
                PointsChange::Penalized(reward)
            } else {
                PointsChange::NoPenalty
            }
        };

        Ok(ToggleOutcome {
            id: task.id.clone(),
            completed: task.completed,
            points_change,
        })
    }

    /// Remove a task. Points it earned or cost stay on the ledger.
    pub fn delete(&mut self, id: &str) -> Result<Task, LedgerError> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(LedgerError::task_not_found)?;
        Ok(self.tasks.remove(index))
    }

    /// Move a task in or out of the permanent set, clearing its completion.
    pub fn set_permanent(&mut self, id: &str, permanent: bool) -> Result<&Task, LedgerError> {
        let task = self.find_mut(id)?;
        task.permanent = permanent;
        task.completed = false;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TASK_COMPLETION_REWARD as REWARD;
    use crate::ledger::test_ledger;

    const EVERY: RepeatPenaltyPolicy = RepeatPenaltyPolicy::EveryUncomplete;

    #[test]
    fn add_rejects_blank_text_and_sanitizes() {
        let mut list = TaskList::default();
        assert!(matches!(
            list.add("   ", false),
            Err(LedgerError::Validation(_))
        ));

        let task = list.add("  <b>ship</b> ", true).unwrap();
        assert_eq!(task.text, "&lt;b&gt;ship&lt;/b&gt;");
        assert!(!task.completed);
        assert!(!task.claimed);
        assert!(task.permanent);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn add_generates_distinct_ids() {
        let mut list = TaskList::default();
        let a = list.add("a", false).unwrap();
        let b = list.add("b", false).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn non_permanent_cycle_charges_penalty_without_second_reward() {
        let mut ledger = test_ledger("alice");
        let mut list = TaskList::default();
        let id = list.add("write report", false).unwrap().id;

        let done = list.toggle(&id, &mut ledger, REWARD, EVERY).unwrap();
        assert_eq!(done.points_change, PointsChange::Awarded(REWARD));
        let after_first_completion = ledger.task_points();

        let undone = list.toggle(&id, &mut ledger, REWARD, EVERY).unwrap();
        assert_eq!(undone.points_change, PointsChange::Penalized(REWARD));
        assert!(list.get(&id).unwrap().claimed);

        let redone = list.toggle(&id, &mut ledger, REWARD, EVERY).unwrap();
        assert_eq!(redone.points_change, PointsChange::AlreadyClaimed);

        assert_eq!(ledger.claimed_task_points(), REWARD);
        assert_eq!(ledger.failed_points(), REWARD);
        assert_eq!(
            ledger.task_points(),
            after_first_completion - REWARD as i64
        );
        assert_eq!(ledger.daily_completed_count(), 1);
    }

    #[test]
    fn repeated_toggle_off_of_non_permanent_task_keeps_charging() {
        let mut ledger = test_ledger("alice");
        let mut list = TaskList::default();
        let id = list.add("flaky", false).unwrap().id;

        for _ in 0..3 {
            list.toggle(&id, &mut ledger, REWARD, EVERY).unwrap();
            list.toggle(&id, &mut ledger, REWARD, EVERY).unwrap();
        }

        assert_eq!(ledger.claimed_task_points(), REWARD);
        assert_eq!(ledger.failed_points(), 3 * REWARD);
        assert_eq!(ledger.task_points(), -2 * REWARD as i64);
    }

    #[test]
    fn once_per_claim_policy_clears_claim_for_non_permanent_tasks() {
        let mut ledger = test_ledger("alice");
        let mut list = TaskList::default();
        let id = list.add("flaky", false).unwrap().id;
        let policy = RepeatPenaltyPolicy::OncePerClaim;

        for _ in 0..3 {
            list.toggle(&id, &mut ledger, REWARD, policy).unwrap();
            list.toggle(&id, &mut ledger, REWARD, policy).unwrap();
        }

        assert_eq!(ledger.claimed_task_points(), 3 * REWARD);
        assert_eq!(ledger.failed_points(), 3 * REWARD);
        assert_eq!(ledger.task_points(), 0);
    }

    #[test]
    fn permanent_cycle_earns_reward_again() {
        let mut ledger = test_ledger("alice");
        let mut list = TaskList::default();
        let id = list.add("exercise", true).unwrap().id;

        list.toggle(&id, &mut ledger, REWARD, EVERY).unwrap();
        assert_eq!(ledger.task_points(), 2);

        let undone = list.toggle(&id, &mut ledger, REWARD, EVERY).unwrap();
        assert_eq!(undone.points_change, PointsChange::Penalized(REWARD));
        assert!(!list.get(&id).unwrap().claimed);
        assert_eq!(ledger.task_points(), 0);

        let redone = list.toggle(&id, &mut ledger, REWARD, EVERY).unwrap();
        assert_eq!(redone.points_change, PointsChange::Awarded(REWARD));
        assert_eq!(ledger.claimed_task_points(), 4);
        assert_eq!(ledger.failed_points(), 2);
        assert_eq!(ledger.task_points(), 2);
    }

    #[test]
    fn uncompleting_unclaimed_task_is_free_and_count_may_go_negative() {
        let mut ledger = test_ledger("alice");
        let mut list = TaskList::new(vec![Task {
            id: "t1".to_string(),
            text: "restored".to_string(),
            completed: true,
            claimed: false,
            permanent: false,
        }]);

        let outcome = list.toggle("t1", &mut ledger, REWARD, EVERY).unwrap();
        assert_eq!(outcome.points_change, PointsChange::NoPenalty);
        assert!(!outcome.completed);
        assert_eq!(ledger.failed_points(), 0);
        assert_eq!(ledger.daily_completed_count(), -1);
    }

    #[test]
    fn delete_leaves_point_history_untouched() {
        let mut ledger = test_ledger("alice");
        let mut list = TaskList::default();
        let id = list.add("done deal", false).unwrap().id;
        list.toggle(&id, &mut ledger, REWARD, EVERY).unwrap();
        let before = ledger.clone();

        let removed = list.delete(&id).unwrap();
        assert!(removed.claimed && removed.completed);
        assert!(list.is_empty());
        assert_eq!(ledger, before);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut ledger = test_ledger("alice");
        let mut list = TaskList::default();
        assert_eq!(
            list.toggle("nope", &mut ledger, REWARD, EVERY).unwrap_err(),
            LedgerError::task_not_found()
        );
        assert!(matches!(list.delete("nope"), Err(LedgerError::NotFound(_))));
        assert!(matches!(
            list.set_permanent("nope", true),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn set_permanent_clears_completion_but_keeps_claim() {
        let mut ledger = test_ledger("alice");
        let mut list = TaskList::default();
        let id = list.add("read", false).unwrap().id;
        list.toggle(&id, &mut ledger, REWARD, EVERY).unwrap();
        let before = ledger.clone();

        let task = list.set_permanent(&id, true).unwrap();
        assert!(task.permanent);
        assert!(!task.completed);
        assert!(task.claimed);
        assert_eq!(ledger, before);
    }

    #[test]
    fn parses_blank_and_legacy_documents() {
        assert!(TaskList::parse("").unwrap().is_empty());

        let list = TaskList::parse(r#"[{"id":"a","text":"old","completed":true,"permanent":false}]"#)
            .unwrap();
        assert!(!list.get("a").unwrap().claimed);
        assert!(TaskList::parse("{not json").is_err());
    }

    #[test]
    fn points_change_renders_display_strings() {
        assert_eq!(PointsChange::Awarded(2).to_string(), "+2");
        assert_eq!(PointsChange::Penalized(2).to_string(), "-2");
        assert_eq!(
            PointsChange::AlreadyClaimed.to_string(),
            "+0 (Already claimed for this cycle)"
        );
        assert_eq!(
            PointsChange::NoPenalty.to_string(),
            "-0 (Not claimed, no penalty)"
        );
    }
}
