// Error handling framework

use crate::models::TaskId;
use thiserror::Error;

/// Cron expression errors
#[derive(Error, Debug)]
pub enum CronError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Cron expression '{expression}' never matches a future instant")]
    NoUpcomingOccurrence { expression: String },
}

/// Task registration errors, raised before any engine starts
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Task {0} is already registered")]
    DuplicateTask(TaskId),

    #[error(transparent)]
    Cron(#[from] CronError),

    #[error("Cycle {id} has an unsupported interval of {minutes} minutes (minimum is 1)")]
    IntervalTooShort { id: TaskId, minutes: u32 },
}

/// History store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("History store backend failure: {0}")]
    Backend(String),
}

/// Errors that abort engine startup
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Catch-up of task {task} failed ({attempt})")]
    CatchUpFailed { task: TaskId, attempt: String },

    #[error("Initial trigger of cycle {task} failed")]
    InitialTriggerFailed { task: TaskId },
}

/// Manual trigger errors
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("No task registered under id {0}")]
    UnknownTask(TaskId),
}

/// Component initialization errors, fatal to process startup
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Component {0} is registered more than once")]
    DuplicateComponent(String),

    #[error("Component {component} depends on unknown component {dependency}")]
    UnknownDependency {
        component: String,
        dependency: String,
    },

    #[error("Dependency cycle detected: {path}")]
    DependencyCycle { path: String },

    #[error("Initialization of {component} failed")]
    Component {
        component: String,
        #[source]
        source: anyhow::Error,
    },
}
