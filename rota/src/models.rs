// Core task model: declarations, catch-up policies, history rows, trackers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a registered task.
///
/// Ids survive restarts and key all persisted state, so hosts should treat
/// them as part of their data schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What happens to triggers that were missed while the process was down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchUpPolicy {
    /// No history is kept at all; the task only ever fires live.
    None,
    /// History is kept but missed triggers are never replayed.
    #[default]
    Never,
    /// Any number of missed triggers collapses into a single replay.
    Once,
    /// Every missed trigger is replayed individually, oldest first.
    All,
}

impl CatchUpPolicy {
    pub fn can_catch_up(self) -> bool {
        matches!(self, Self::Once | Self::All)
    }

    /// Volatile tasks (`None`) never write history rows.
    pub fn keeps_history(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// When a task fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Calendar instants matching a 5-field cron expression.
    Cron { expression: String },
    /// Every `minutes` elapsed minutes, tracked by a persisted counter.
    Interval {
        minutes: u32,
        /// Fire once immediately when the cycle has no history yet.
        #[serde(default)]
        trigger_on_create: bool,
        /// Zero the elapsed counter after the startup catch-up pass.
        #[serde(default = "default_reset_elapsed")]
        reset_elapsed_on_start: bool,
    },
}

fn default_reset_elapsed() -> bool {
    true
}

/// Immutable description of a task, fixed at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDeclaration {
    pub id: TaskId,
    pub trigger: Trigger,
    #[serde(default)]
    pub catch_up: CatchUpPolicy,
}

impl TaskDeclaration {
    /// A calendar-triggered task. Use a schedule when the WHEN matters,
    /// e.g. "every day at 16:00".
    pub fn cron(id: impl Into<TaskId>, expression: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            trigger: Trigger::Cron {
                expression: expression.into(),
            },
            catch_up: CatchUpPolicy::default(),
        }
    }

    /// An interval-triggered task. Use a cycle when only the cadence
    /// matters, e.g. "every two hours".
    pub fn interval(id: impl Into<TaskId>, minutes: u32) -> Self {
        Self {
            id: id.into(),
            trigger: Trigger::Interval {
                minutes,
                trigger_on_create: false,
                reset_elapsed_on_start: true,
            },
            catch_up: CatchUpPolicy::default(),
        }
    }

    pub fn with_catch_up(mut self, policy: CatchUpPolicy) -> Self {
        self.catch_up = policy;
        self
    }

    /// Marks an interval task to fire once when it is created without any
    /// prior history. No effect on cron tasks.
    pub fn trigger_on_create(mut self) -> Self {
        if let Trigger::Interval {
            trigger_on_create, ..
        } = &mut self.trigger
        {
            *trigger_on_create = true;
        }
        self
    }

    /// Keeps the persisted elapsed counter across restarts instead of
    /// zeroing it after catch-up. No effect on cron tasks.
    pub fn keep_elapsed_on_start(mut self) -> Self {
        if let Trigger::Interval {
            reset_elapsed_on_start,
            ..
        } = &mut self.trigger
        {
            *reset_elapsed_on_start = false;
        }
        self
    }
}

/// One appended row of trigger history.
///
/// Rows reconstruct the last trigger time on restart and feed the
/// missed-occurrence math. Only written for tasks whose policy keeps history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub task_id: TaskId,
    pub created_at: DateTime<Utc>,
    /// Why the task fired, e.g. "automatic" or "catchup all - 2/5".
    pub reason: String,
    pub success: bool,
}

impl HistoryRecord {
    pub fn new(task_id: TaskId, reason: impl Into<String>, success: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            created_at: Utc::now(),
            reason: reason.into(),
            success,
        }
    }
}

/// The persisted elapsed-minutes record for one cycle. One row per task id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleTracker {
    pub id: Uuid,
    pub task_id: TaskId,
    /// Minutes elapsed in the current cycle.
    pub elapsed_minutes: u32,
}

impl CycleTracker {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            elapsed_minutes: 0,
        }
    }
}
