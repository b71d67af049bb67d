//! Questline point and task ledger engine.
//!
//! Each account carries two currencies. Diamonds come from a once-per-day
//! collection gate and decide the account's rank. Coins are earned by
//! completing tasks and lost by un-completing them. A daily rollover at
//! midnight in a fixed reference timezone drops one-off tasks and reopens
//! permanent ones.
//!
//! Persistence and sessions are collaborators from `questline-storage`; the
//! engine loads an explicit [`Ledger`] per request, mutates it, and writes it
//! back.

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod diamonds;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod protocol;
pub mod rank;
pub mod reset;
pub mod sanitize;
pub mod tasks;

pub use clock::{day_boundary, Clock, ManualClock, SystemClock};
pub use config::{
    LedgerConfig, RepeatPenaltyPolicy, DAILY_CHECKIN_REWARD, DEFAULT_RESET_UTC_OFFSET_MINUTES,
    DEFAULT_SESSION_TTL_SECS, TASK_COMPLETION_REWARD,
};
pub use diamonds::{can_collect, collect_diamonds};
pub use engine::LedgerEngine;
pub use error::{EngineError, LedgerError};
pub use ledger::{Ledger, UserSnapshot};
pub use protocol::{
    DashboardResponse, Endpoint, EndpointRequest, EndpointResponse, ObjectiveResponse,
    SpCollectResponse, TaskActionRequest, TaskActionResponse, TaskCommand,
};
pub use rank::{RankTable, RankTier};
pub use reset::{apply_daily_reset, ResetReport};
pub use tasks::{PointsChange, Task, TaskList, ToggleOutcome};
