//! Request-scoped ledger engine.
//!
//! Every operation follows the same shape: load the account and its task
//! list, apply the daily reset, run the operation, then persist whatever
//! changed. Callers that need per-account serialization wrap these calls in
//! their own lock; the engine itself holds no state between requests.

use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::diamonds::{can_collect, collect_diamonds};
use crate::error::{EngineError, LedgerError};
use crate::ledger::Ledger;
use crate::protocol::{
    DashboardResponse, Endpoint, EndpointRequest, EndpointResponse, ObjectiveResponse,
    SpCollectResponse, TaskActionRequest, TaskActionResponse, TaskCommand,
    LEGACY_PLACEHOLDER_OBJECTIVE,
};
use crate::reset::apply_daily_reset;
use crate::sanitize::escape_html;
use crate::tasks::TaskList;
use chrono::{DateTime, FixedOffset, Utc};
use questline_storage::{LedgerRecord, QuestlineStorage, TASK_LIST_KEY};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One loaded account plus what needs writing back.
struct Account {
    ledger: Ledger,
    tasks: TaskList,
    ledger_dirty: bool,
    tasks_dirty: bool,
}

pub struct LedgerEngine {
    store: Arc<dyn QuestlineStorage>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
    offset: FixedOffset,
}

impl LedgerEngine {
    /// Build an engine, rejecting configurations it could not serve.
    pub fn new(
        store: Arc<dyn QuestlineStorage>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        let offset = config.validate()?;
        Ok(Self {
            store,
            clock,
            config,
            offset,
        })
    }

    /// Resolve a session token to its username.
    pub async fn authenticate(&self, token: &str) -> Result<Option<String>, EngineError> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self.store.get_username_from_session(token).await?)
    }

    /// Issue a session for `username` with the configured lifetime.
    pub async fn create_session(&self, username: &str) -> Result<String, EngineError> {
        let token = self
            .store
            .create_session(username, self.config.session_ttl_secs)
            .await?;
        info!(username, "session issued");
        Ok(token)
    }

    pub async fn logout(&self, token: &str) -> Result<(), EngineError> {
        self.store.delete_session(token).await?;
        debug!("session closed");
        Ok(())
    }

    /// Remove the account with all its tasks and sessions.
    pub async fn delete_account(&self, username: &str) -> Result<(), EngineError> {
        self.store.delete_user_and_data(username).await?;
        info!(username, "account deleted");
        Ok(())
    }

    /// Run one task action.
    ///
    /// Unknown action names are returned as [`EngineError::UnknownOperation`];
    /// every other domain failure comes back as a `success: false` response.
    pub async fn task_action(
        &self,
        username: &str,
        request: TaskActionRequest,
    ) -> Result<TaskActionResponse, EngineError> {
        let command = match TaskCommand::try_from(request) {
            Err(LedgerError::UnknownOperation(message)) => {
                return Err(EngineError::UnknownOperation(message));
            }
            other => other,
        };

        let now = self.clock.now();
        let mut account = self.load(username, now).await?;
        let result = command.and_then(|command| self.apply_task_command(&mut account, command));
        self.persist(&mut account).await?;

        Ok(match result {
            Ok(mut response) => {
                response.user_data = Some(account.ledger.snapshot());
                response
            }
            Err(error) => {
                debug!(username, %error, "task action rejected");
                TaskActionResponse::failure(&error)
            }
        })
    }

    fn apply_task_command(
        &self,
        account: &mut Account,
        command: TaskCommand,
    ) -> Result<TaskActionResponse, LedgerError> {
        let action = command.name();
        let response = match command {
            TaskCommand::Add { text, permanent } => {
                let task = account.tasks.add(&text, permanent)?;
                TaskActionResponse {
                    success: true,
                    task: Some(task),
                    ..TaskActionResponse::default()
                }
            }
            TaskCommand::Toggle { id } => {
                let outcome = account.tasks.toggle(
                    &id,
                    &mut account.ledger,
                    self.config.task_completion_reward,
                    self.config.repeat_penalty,
                )?;
                account.ledger_dirty = true;
                TaskActionResponse {
                    success: true,
                    id: Some(outcome.id),
                    completed: Some(outcome.completed),
                    points_change: Some(outcome.points_change.to_string()),
                    ..TaskActionResponse::default()
                }
            }
            TaskCommand::Delete { id } => {
                let removed = account.tasks.delete(&id)?;
                TaskActionResponse {
                    success: true,
                    id: Some(removed.id),
                    message: Some("Task Deleted.".to_string()),
                    ..TaskActionResponse::default()
                }
            }
            TaskCommand::SetPermanent { id, permanent } => {
                let task = account.tasks.set_permanent(&id, permanent)?;
                TaskActionResponse {
                    success: true,
                    id: Some(task.id.clone()),
                    permanent: Some(task.permanent),
                    completed: Some(task.completed),
                    ..TaskActionResponse::default()
                }
            }
        };
        account.tasks_dirty = true;
        info!(
            username = account.ledger.username(),
            action,
            task_points = account.ledger.task_points(),
            "task action applied"
        );
        Ok(response)
    }

    /// Collect today's diamonds.
    pub async fn sp_collect(&self, username: &str) -> Result<SpCollectResponse, EngineError> {
        let now = self.clock.now();
        let mut account = self.load(username, now).await?;

        let result = collect_diamonds(
            &mut account.ledger,
            now,
            self.offset,
            self.config.daily_checkin_reward,
            &self.config.rank_table,
        );
        let response = match result {
            Ok(total) => {
                account.ledger_dirty = true;
                info!(username, sp_points = total, "diamonds collected");
                SpCollectResponse {
                    success: true,
                    message: format!(
                        "💎 COLLECTED! +{} 💎. Total: {total}",
                        self.config.daily_checkin_reward
                    ),
                    sp_points: Some(total),
                    rank: Some(account.ledger.rank().title.clone()),
                }
            }
            Err(error) => {
                debug!(username, %error, "diamond collection rejected");
                SpCollectResponse {
                    success: false,
                    message: error.to_string(),
                    sp_points: None,
                    rank: None,
                }
            }
        };

        self.persist(&mut account).await?;
        Ok(response)
    }

    /// Store the trimmed, escaped objective. Empty text clears it.
    pub async fn save_objective(
        &self,
        username: &str,
        objective: &str,
    ) -> Result<ObjectiveResponse, EngineError> {
        let now = self.clock.now();
        let mut account = self.load(username, now).await?;

        let objective = escape_html(objective.trim());
        account.ledger.set_objective(objective.clone());
        account.ledger_dirty = true;
        self.persist(&mut account).await?;

        debug!(username, "objective saved");
        Ok(ObjectiveResponse {
            success: true,
            objective: Some(objective),
            message: None,
        })
    }

    /// Current account state after applying any pending daily reset.
    pub async fn dashboard(&self, username: &str) -> Result<DashboardResponse, EngineError> {
        let now = self.clock.now();
        let mut account = self.load(username, now).await?;
        self.persist(&mut account).await?;

        let objective = match account.ledger.user_objective() {
            LEGACY_PLACEHOLDER_OBJECTIVE => String::new(),
            other => other.to_string(),
        };
        Ok(DashboardResponse {
            username: username.to_string(),
            user_data: account.ledger.snapshot(),
            rank_description: account.ledger.rank().description.clone(),
            objective,
            can_collect_diamonds: can_collect(&account.ledger, now, self.offset),
            tasks: account.tasks.tasks().to_vec(),
        })
    }

    /// Route a single-endpoint request by its `endpoint` name.
    pub async fn dispatch(
        &self,
        username: &str,
        request: EndpointRequest,
    ) -> Result<EndpointResponse, EngineError> {
        let endpoint: Endpoint = request.endpoint.parse().map_err(|error: LedgerError| {
            warn!(username, endpoint = %request.endpoint, "unknown endpoint");
            EngineError::UnknownOperation(error.to_string())
        })?;

        match endpoint {
            Endpoint::TaskAction => self
                .task_action(username, request.task_action())
                .await
                .map(EndpointResponse::TaskAction),
            Endpoint::SpCollect => self
                .sp_collect(username)
                .await
                .map(EndpointResponse::SpCollect),
            Endpoint::SaveObjective => {
                let objective = request.objective.as_deref().unwrap_or_default();
                self.save_objective(username, objective)
                    .await
                    .map(EndpointResponse::SaveObjective)
            }
        }
    }

    async fn load(&self, username: &str, now: DateTime<Utc>) -> Result<Account, EngineError> {
        let (record, seeded) = match self.store.get_user_data(username).await? {
            Some(record) => (record, false),
            None => (LedgerRecord::new(username), true),
        };
        let mut ledger = Ledger::from_record(record, &self.config.rank_table)
            .map_err(|detail| EngineError::corrupt(username, detail))?;

        let mut tasks = match self.store.get_tasks(username, TASK_LIST_KEY).await? {
            Some(document) => TaskList::parse(&document)
                .map_err(|e| EngineError::corrupt(username, format!("task list: {e}")))?,
            None => TaskList::default(),
        };

        let report = apply_daily_reset(&mut ledger, &mut tasks, now, self.offset);
        if report.fired {
            info!(
                username,
                removed = report.removed_tasks,
                reopened = report.reopened_tasks,
                "daily reset applied"
            );
        }

        Ok(Account {
            ledger,
            tasks,
            ledger_dirty: seeded || report.fired,
            tasks_dirty: report.fired,
        })
    }

    async fn persist(&self, account: &mut Account) -> Result<(), EngineError> {
        let username = account.ledger.username().to_string();
        if account.tasks_dirty {
            let document = account
                .tasks
                .to_document()
                .map_err(|e| EngineError::corrupt(&username, format!("task list: {e}")))?;
            if let Err(error) = self
                .store
                .save_tasks(&username, TASK_LIST_KEY, &document)
                .await
            {
                warn!(username = %username, %error, "failed to save task list");
                return Err(error.into());
            }
            account.tasks_dirty = false;
        }
        if account.ledger_dirty {
            let record = account.ledger.to_record();
            if let Err(error) = self.store.save_user_data(&username, &record).await {
                warn!(username = %username, %error, "failed to save account");
                return Err(error.into());
            }
            account.ledger_dirty = false;
        }
        Ok(())
    }
}
