// Persistence boundary for trigger history and cycle trackers

use crate::errors::StoreError;
use crate::models::{CycleTracker, HistoryRecord, TaskId};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[cfg(test)]
use mockall::automock;

/// Durable storage for trigger history and elapsed-minute trackers.
///
/// Implementations live with the host application; the engines only require
/// the operations below. History is append-only, trackers are one mutable
/// row per cycle id.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Latest history row per task id, used once at load to resurrect each
    /// task's last-trigger state.
    async fn latest_history_by_task(&self) -> Result<HashMap<TaskId, HistoryRecord>, StoreError>;

    /// Appends one history row and returns it as stored.
    async fn append(&self, record: HistoryRecord) -> Result<HistoryRecord, StoreError>;

    /// The tracker row for a cycle id, if one exists.
    async fn tracker(&self, task_id: &TaskId) -> Result<Option<CycleTracker>, StoreError>;

    /// Creates a tracker with zero elapsed minutes. Returns the existing row
    /// when one is already present.
    async fn create_tracker(&self, task_id: &TaskId) -> Result<CycleTracker, StoreError>;

    /// Persists a batch of trackers in one write.
    async fn save_trackers(&self, trackers: &[CycleTracker]) -> Result<(), StoreError>;
}

/// In-memory store for tests and hosts that do not need durability.
#[derive(Default)]
pub struct MemoryHistoryStore {
    records: RwLock<Vec<HistoryRecord>>,
    trackers: RwLock<Vec<CycleTracker>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All history rows for one task, oldest first.
    pub async fn records_for(&self, task_id: &TaskId) -> Vec<HistoryRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| &record.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Seeds a pre-existing history row, as a previous process run would
    /// have left it.
    pub async fn seed(&self, record: HistoryRecord) {
        self.records.write().await.push(record);
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn latest_history_by_task(&self) -> Result<HashMap<TaskId, HistoryRecord>, StoreError> {
        let records = self.records.read().await;
        let mut latest: HashMap<TaskId, HistoryRecord> = HashMap::new();
        for record in records.iter() {
            match latest.get(&record.task_id) {
                Some(existing) if existing.created_at >= record.created_at => {}
                _ => {
                    latest.insert(record.task_id.clone(), record.clone());
                }
            }
        }
        Ok(latest)
    }

    async fn append(&self, record: HistoryRecord) -> Result<HistoryRecord, StoreError> {
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn tracker(&self, task_id: &TaskId) -> Result<Option<CycleTracker>, StoreError> {
        Ok(self
            .trackers
            .read()
            .await
            .iter()
            .find(|tracker| &tracker.task_id == task_id)
            .cloned())
    }

    async fn create_tracker(&self, task_id: &TaskId) -> Result<CycleTracker, StoreError> {
        let mut trackers = self.trackers.write().await;
        if let Some(existing) = trackers.iter().find(|t| &t.task_id == task_id) {
            return Ok(existing.clone());
        }
        let tracker = CycleTracker::new(task_id.clone());
        trackers.push(tracker.clone());
        Ok(tracker)
    }

    async fn save_trackers(&self, updated: &[CycleTracker]) -> Result<(), StoreError> {
        let mut trackers = self.trackers.write().await;
        for update in updated {
            match trackers.iter_mut().find(|t| t.task_id == update.task_id) {
                Some(existing) => *existing = update.clone(),
                None => trackers.push(update.clone()),
            }
        }
        Ok(())
    }
}
