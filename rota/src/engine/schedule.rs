// Calendar-triggered tasks: one-shot timers armed from cron occurrence math

use crate::clock::{format_duration, CronClock};
use crate::engine::{execute, record_trigger};
use crate::errors::{StartupError, TriggerError};
use crate::history::HistoryStore;
use crate::models::{CatchUpPolicy, TaskId};
use crate::registry::{TaskHandler, TaskRegistry};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

struct ScheduleTask {
    id: TaskId,
    clock: CronClock,
    catch_up: CatchUpPolicy,
    handler: Arc<dyn TaskHandler>,
    state: Mutex<ScheduleState>,
}

/// Mutable per-task state. The timer handle is `Some` only while armed; at
/// most one timer is ever live per task.
struct ScheduleState {
    last_trigger: Option<DateTime<Utc>>,
    timer: Option<JoinHandle<()>>,
}

struct ScheduleInner {
    tasks: Vec<Arc<ScheduleTask>>,
    store: Arc<dyn HistoryStore>,
}

/// Owns every calendar-triggered task. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ScheduleEngine {
    inner: Arc<ScheduleInner>,
}

impl ScheduleEngine {
    /// Builds the engine from the registry, seeding each task's last trigger
    /// from the latest persisted history row.
    pub async fn load(
        registry: &TaskRegistry,
        store: Arc<dyn HistoryStore>,
    ) -> Result<Self, StartupError> {
        let histories = store.latest_history_by_task().await?;
        let mut tasks = Vec::with_capacity(registry.schedules().len());
        for spec in registry.schedules() {
            let last_trigger = histories.get(&spec.id).map(|h| h.created_at);
            tasks.push(Arc::new(ScheduleTask {
                id: spec.id.clone(),
                clock: spec.clock.clone(),
                catch_up: spec.catch_up,
                handler: Arc::clone(&spec.handler),
                state: Mutex::new(ScheduleState {
                    last_trigger,
                    timer: None,
                }),
            }));
        }
        info!(count = tasks.len(), "loaded schedules");
        Ok(Self {
            inner: Arc::new(ScheduleInner { tasks, store }),
        })
    }

    /// Replays missed triggers per task policy, then arms every timer.
    /// A failed catch-up aborts startup: missed mandatory work must not be
    /// skipped silently.
    pub async fn start(&self) -> Result<(), StartupError> {
        perform_catch_ups(&self.inner).await?;
        for task in &self.inner.tasks {
            arm(&self.inner, task).await;
        }
        Ok(())
    }

    /// Fires a task outside its cadence with a caller-supplied reason,
    /// running the same disarm, execute, persist, re-arm sequence as a
    /// timer expiry.
    pub async fn trigger(&self, id: &TaskId, reason: &str) -> Result<bool, TriggerError> {
        let task = self
            .find(id)
            .ok_or_else(|| TriggerError::UnknownTask(id.clone()))?;
        disarm(&task).await;
        Ok(fire_and_rearm(&self.inner, &task, reason).await)
    }

    /// Disarms every timer. Handlers already in flight are not interrupted.
    pub async fn shutdown(&self) {
        for task in &self.inner.tasks {
            disarm(task).await;
        }
    }

    pub async fn last_trigger(&self, id: &TaskId) -> Option<DateTime<Utc>> {
        let task = self.find(id)?;
        let state = task.state.lock().await;
        state.last_trigger
    }

    /// One-line status of a task for consoles and logs.
    pub async fn describe(&self, id: &TaskId) -> Option<String> {
        let task = self.find(id)?;
        let last = task.state.lock().await.last_trigger;
        Some(format!(
            "schedule {} - next: {} - last: {}",
            task.id,
            format_duration(task.clock.ms_until_next(Utc::now()) / 1000),
            last.map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        ))
    }

    pub fn len(&self) -> usize {
        self.inner.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tasks.is_empty()
    }

    fn find(&self, id: &TaskId) -> Option<Arc<ScheduleTask>> {
        self.inner.tasks.iter().find(|task| &task.id == id).cloned()
    }
}

/// Checks every task that keeps history and allows catch-up for occurrences
/// missed while the process was down, replaying them per policy. `All`
/// replays run oldest first; any failed replay is fatal.
async fn perform_catch_ups(inner: &Arc<ScheduleInner>) -> Result<(), StartupError> {
    let mut caught_up = 0u32;
    for task in &inner.tasks {
        if !task.catch_up.can_catch_up() {
            continue;
        }
        let Some(last) = task.state.lock().await.last_trigger else {
            continue;
        };
        let missed = task.clock.occurrences_since(last);
        if missed == 0 {
            continue;
        }
        caught_up += 1;
        match task.catch_up {
            CatchUpPolicy::Once => {
                info!(task = %task.id, missed, "catching up once for all missed triggers");
                let reason = format!("catchup once - missed {missed}");
                if !fire_catch_up(inner, task, &reason).await {
                    return Err(StartupError::CatchUpFailed {
                        task: task.id.clone(),
                        attempt: reason,
                    });
                }
            }
            CatchUpPolicy::All => {
                info!(task = %task.id, missed, "replaying every missed trigger");
                for i in 1..=missed {
                    let reason = format!("catchup all - {i}/{missed}");
                    if !fire_catch_up(inner, task, &reason).await {
                        return Err(StartupError::CatchUpFailed {
                            task: task.id.clone(),
                            attempt: reason,
                        });
                    }
                }
            }
            CatchUpPolicy::None | CatchUpPolicy::Never => {}
        }
    }
    if caught_up == 0 {
        info!("no schedules required a catch-up");
    }
    Ok(())
}

/// Executes one catch-up replay. Timers are not touched here; they are only
/// armed after the whole catch-up pass succeeded.
async fn fire_catch_up(
    inner: &Arc<ScheduleInner>,
    task: &Arc<ScheduleTask>,
    reason: &str,
) -> bool {
    let success = execute(&task.handler).await;
    let stamp = record_trigger(
        inner.store.as_ref(),
        &task.id,
        task.catch_up,
        reason,
        success,
    )
    .await;
    task.state.lock().await.last_trigger = Some(stamp);
    success
}

/// Executes the handler, persists the outcome and re-arms. The re-arm runs
/// on every path: a failed handler or a failed history write must not stop
/// the cadence.
#[instrument(skip(inner, task), fields(task_id = %task.id))]
async fn fire_and_rearm(
    inner: &Arc<ScheduleInner>,
    task: &Arc<ScheduleTask>,
    reason: &str,
) -> bool {
    info!("schedule triggered");
    let success = execute(&task.handler).await;
    if !success {
        warn!("schedule handler reported failure");
    }
    let stamp = record_trigger(
        inner.store.as_ref(),
        &task.id,
        task.catch_up,
        reason,
        success,
    )
    .await;
    task.state.lock().await.last_trigger = Some(stamp);
    arm(inner, task).await;
    success
}

/// Arms the one-shot timer for the next occurrence, replacing any armed
/// timer. A non-positive delay (clock skew, an already elapsed slot) fires
/// immediately instead of arming.
fn arm<'a>(
    inner: &'a Arc<ScheduleInner>,
    task: &'a Arc<ScheduleTask>,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
    let mut state = task.state.lock().await;
    if let Some(timer) = state.timer.take() {
        timer.abort();
    }
    let ms = task.clock.ms_until_next(Utc::now());
    if ms <= 0 {
        warn!(task = %task.id, "time to next trigger is not in the future, firing now");
        let inner = Arc::clone(inner);
        let task = Arc::clone(task);
        drop(state);
        tokio::spawn(async move {
            fire_and_rearm(&inner, &task, "time to next <= 0").await;
        });
        return;
    }
    info!(task = %task.id, next_in = %format_duration(ms / 1000), "schedule armed");
    let inner = Arc::clone(inner);
    let timer_task = Arc::clone(task);
    state.timer = Some(tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        // This one-shot has elapsed; clear the handle without aborting so
        // the re-arm installs a fresh timer.
        timer_task.state.lock().await.timer = None;
        fire_and_rearm(&inner, &timer_task, "automatic").await;
    }));
    })
}

async fn disarm(task: &ScheduleTask) {
    let mut state = task.state.lock().await;
    if let Some(timer) = state.timer.take() {
        timer.abort();
    }
}
