// Trigger engines for calendar (schedule) and interval (cycle) tasks

mod cycle;
mod schedule;

pub use cycle::CycleEngine;
pub use schedule::ScheduleEngine;

use crate::history::HistoryStore;
use crate::models::{CatchUpPolicy, HistoryRecord, TaskId};
use crate::registry::TaskHandler;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, warn};

/// Runs a handler on the task pool. A panicking handler is contained and
/// counted as a failed run.
pub(crate) async fn execute(handler: &Arc<dyn TaskHandler>) -> bool {
    let handler = Arc::clone(handler);
    match tokio::spawn(async move { handler.run().await }).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "task handler panicked");
            false
        }
    }
}

/// Persists a history row unless the task is volatile, returning the instant
/// the task's last trigger advances to. A failed write is logged and the
/// in-memory state still moves forward so the cadence is not stalled.
pub(crate) async fn record_trigger(
    store: &dyn HistoryStore,
    id: &TaskId,
    policy: CatchUpPolicy,
    reason: &str,
    success: bool,
) -> DateTime<Utc> {
    if !policy.keeps_history() {
        return Utc::now();
    }
    let row = HistoryRecord::new(id.clone(), reason, success);
    match store.append(row).await {
        Ok(saved) => saved.created_at,
        Err(e) => {
            warn!(task = %id, error = %e, "failed to persist trigger history");
            Utc::now()
        }
    }
}
