// Interval-triggered tasks sharing one coarse minute tick

use crate::config::EngineConfig;
use crate::engine::{execute, record_trigger};
use crate::errors::{StartupError, TriggerError};
use crate::history::HistoryStore;
use crate::models::{CatchUpPolicy, CycleTracker, TaskId};
use crate::registry::{TaskHandler, TaskRegistry};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

struct CycleTask {
    id: TaskId,
    interval_minutes: u32,
    trigger_on_create: bool,
    reset_elapsed_on_start: bool,
    catch_up: CatchUpPolicy,
    handler: Arc<dyn TaskHandler>,
    tracker: Mutex<CycleTracker>,
    /// Reentrancy guard: the shared tick may elapse while a fire is still
    /// running, and concurrent manual triggers must be rejected.
    firing: AtomicBool,
    last_trigger: Mutex<Option<DateTime<Utc>>>,
    /// Fires during this process lifetime; catch-up replays are not counted.
    trigger_count: AtomicU32,
}

impl CycleTask {
    async fn minutes_to_next(&self) -> u32 {
        let elapsed = self.tracker.lock().await.elapsed_minutes;
        self.interval_minutes.saturating_sub(elapsed)
    }
}

struct CycleInner {
    tasks: Vec<Arc<CycleTask>>,
    store: Arc<dyn HistoryStore>,
    tick_interval: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

/// Owns every interval-triggered task. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CycleEngine {
    inner: Arc<CycleInner>,
}

impl CycleEngine {
    /// Builds the engine from the registry. Each task is seeded from its
    /// persisted tracker (created on first run if absent) and the latest
    /// history row.
    pub async fn load(
        registry: &TaskRegistry,
        store: Arc<dyn HistoryStore>,
        config: &EngineConfig,
    ) -> Result<Self, StartupError> {
        let histories = store.latest_history_by_task().await?;
        let mut tasks = Vec::with_capacity(registry.cycles().len());
        for spec in registry.cycles() {
            let tracker = match store.tracker(&spec.id).await? {
                Some(tracker) => tracker,
                None => store.create_tracker(&spec.id).await?,
            };
            let last_trigger = histories.get(&spec.id).map(|h| h.created_at);
            tasks.push(Arc::new(CycleTask {
                id: spec.id.clone(),
                interval_minutes: spec.interval_minutes,
                trigger_on_create: spec.trigger_on_create,
                reset_elapsed_on_start: spec.reset_elapsed_on_start,
                catch_up: spec.catch_up,
                handler: Arc::clone(&spec.handler),
                tracker: Mutex::new(tracker),
                firing: AtomicBool::new(false),
                last_trigger: Mutex::new(last_trigger),
                trigger_count: AtomicU32::new(0),
            }));
        }
        info!(count = tasks.len(), "loaded cycles");
        Ok(Self {
            inner: Arc::new(CycleInner {
                tasks,
                store,
                tick_interval: Duration::from_secs(config.cycle_tick_seconds),
                ticker: Mutex::new(None),
            }),
        })
    }

    /// Replays missed fires, resets flagged counters, then starts the
    /// shared tick. A failed catch-up or initial trigger aborts startup.
    pub async fn start(&self) -> Result<(), StartupError> {
        perform_catch_ups(&self.inner).await?;
        for task in &self.inner.tasks {
            let minutes_to_next = task.minutes_to_next().await;
            info!(
                task = %task.id,
                minutes = minutes_to_next,
                "cycle scheduled"
            );
        }
        start_ticker(&self.inner).await;
        Ok(())
    }

    /// Fires a cycle outside its cadence. A trigger while the same task is
    /// already firing is rejected and reported as a failure. Resets the
    /// elapsed counter on completion.
    pub async fn trigger(&self, id: &TaskId, reason: &str) -> Result<bool, TriggerError> {
        let task = self
            .find(id)
            .ok_or_else(|| TriggerError::UnknownTask(id.clone()))?;
        Ok(fire(&self.inner, &task, reason, false).await)
    }

    /// Stops the shared ticker. Fires already in flight are not interrupted.
    pub async fn shutdown(&self) {
        if let Some(ticker) = self.inner.ticker.lock().await.take() {
            ticker.abort();
        }
    }

    pub async fn elapsed_minutes(&self, id: &TaskId) -> Option<u32> {
        let task = self.find(id)?;
        let tracker = task.tracker.lock().await;
        Some(tracker.elapsed_minutes)
    }

    pub async fn last_trigger(&self, id: &TaskId) -> Option<DateTime<Utc>> {
        let task = self.find(id)?;
        let last = task.last_trigger.lock().await;
        *last
    }

    pub fn trigger_count(&self, id: &TaskId) -> Option<u32> {
        self.find(id)
            .map(|task| task.trigger_count.load(Ordering::Relaxed))
    }

    /// One-line status of a task for consoles and logs.
    pub async fn describe(&self, id: &TaskId) -> Option<String> {
        let task = self.find(id)?;
        let last = *task.last_trigger.lock().await;
        Some(format!(
            "cycle {} - minutes to next: {} - triggers: {} - last: {}",
            task.id,
            task.minutes_to_next().await,
            task.trigger_count.load(Ordering::Relaxed),
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

    fn find(&self, id: &TaskId) -> Option<Arc<CycleTask>> {
        self.inner.tasks.iter().find(|task| &task.id == id).cloned()
    }
}

/// Startup reconciliation: new cycles flagged `trigger_on_create` fire once,
/// cycles with catch-up enabled replay their missed fires, and counters
/// flagged to reset are zeroed only after the catch-up math consumed their
/// pre-restart values.
async fn perform_catch_ups(inner: &Arc<CycleInner>) -> Result<(), StartupError> {
    for task in &inner.tasks {
        let last = *task.last_trigger.lock().await;
        match last {
            None if task.trigger_on_create => {
                info!(task = %task.id, "new cycle flagged to trigger on creation, firing");
                if !fire_catch_up(inner, task, "initial").await {
                    return Err(StartupError::InitialTriggerFailed {
                        task: task.id.clone(),
                    });
                }
            }
            Some(last) if task.catch_up.can_catch_up() => {
                let missed = missed_triggers(task, last).await;
                if missed == 0 {
                    continue;
                }
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
            _ => {}
        }
    }

    let mut reset = Vec::new();
    for task in inner.tasks.iter().filter(|t| t.reset_elapsed_on_start) {
        let mut tracker = task.tracker.lock().await;
        if tracker.elapsed_minutes > 0 {
            info!(task = %task.id, "resetting elapsed minutes");
        }
        tracker.elapsed_minutes = 0;
        reset.push(tracker.clone());
    }
    if !reset.is_empty() {
        if let Err(e) = inner.store.save_trackers(&reset).await {
            warn!(error = %e, "failed to persist reset trackers");
        }
    }
    Ok(())
}

/// Missed fire count since the persisted last trigger, adjusted for minutes
/// already elapsed in the current cycle:
/// `floor((minutes_since_last - elapsed) / interval)`.
async fn missed_triggers(task: &CycleTask, last: DateTime<Utc>) -> u32 {
    let elapsed = task.tracker.lock().await.elapsed_minutes as i64;
    let adjusted = (Utc::now() - last).num_minutes() - elapsed;
    if adjusted <= 0 {
        return 0;
    }
    (adjusted / task.interval_minutes as i64) as u32
}

/// Executes one catch-up replay. The reentrancy flag, elapsed counter and
/// trigger count are not touched; only the last-trigger instant advances.
async fn fire_catch_up(inner: &Arc<CycleInner>, task: &Arc<CycleTask>, reason: &str) -> bool {
    let success = execute(&task.handler).await;
    let stamp = record_trigger(
        inner.store.as_ref(),
        &task.id,
        task.catch_up,
        reason,
        success,
    )
    .await;
    *task.last_trigger.lock().await = Some(stamp);
    success
}

async fn start_ticker(inner: &Arc<CycleInner>) {
    let mut guard = inner.ticker.lock().await;
    if guard.is_some() {
        return;
    }
    let inner_ref = Arc::clone(inner);
    *guard = Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(inner_ref.tick_interval);
        // The first tick of an interval completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            tick(&inner_ref).await;
        }
    }));
}

/// One pass of the shared tick: advance every counter, fire the due tasks
/// asynchronously, then persist the whole batch of trackers in one write.
async fn tick(inner: &Arc<CycleInner>) {
    for task in &inner.tasks {
        let mut tracker = task.tracker.lock().await;
        tracker.elapsed_minutes += 1;
        if tracker.elapsed_minutes < task.interval_minutes {
            continue;
        }
        if task.firing.load(Ordering::Acquire) {
            warn!(task = %task.id, "cycle elapsed but is still firing, delaying one tick");
            tracker.elapsed_minutes -= 1;
            continue;
        }
        tracker.elapsed_minutes = 0;
        drop(tracker);
        let inner_ref = Arc::clone(inner);
        let task_ref = Arc::clone(task);
        tokio::spawn(async move {
            fire(&inner_ref, &task_ref, "automatic", true).await;
        });
    }

    let mut batch = Vec::with_capacity(inner.tasks.len());
    for task in &inner.tasks {
        batch.push(task.tracker.lock().await.clone());
    }
    if batch.is_empty() {
        return;
    }
    if let Err(e) = inner.store.save_trackers(&batch).await {
        warn!(error = %e, "failed to persist cycle trackers");
    }
}

/// Executes one fire. The reentrancy flag is claimed first; a fire already
/// in flight causes this one to be rejected with `false`. The flag is
/// released on every path.
#[instrument(skip(inner, task), fields(task_id = %task.id))]
async fn fire(
    inner: &Arc<CycleInner>,
    task: &Arc<CycleTask>,
    reason: &str,
    automatic: bool,
) -> bool {
    if task
        .firing
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!("cycle is already firing, rejecting trigger");
        return false;
    }
    info!("cycle triggered");
    let success = execute(&task.handler).await;
    if !success {
        warn!("cycle handler reported failure");
    }
    let stamp = record_trigger(
        inner.store.as_ref(),
        &task.id,
        task.catch_up,
        reason,
        success,
    )
    .await;
    *task.last_trigger.lock().await = Some(stamp);
    task.trigger_count.fetch_add(1, Ordering::Relaxed);
    if !automatic {
        // The shared tick already zeroed the counter for automatic fires
        task.tracker.lock().await.elapsed_minutes = 0;
    }
    let minutes_to_next = task.minutes_to_next().await;
    debug!(minutes = minutes_to_next, "next cycle fire");
    task.firing.store(false, Ordering::Release);
    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistoryStore;
    use crate::models::{HistoryRecord, TaskDeclaration};
    use crate::registry::handler_fn;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::Notify;
    use uuid::Uuid;

    fn counting_handler(count: &Arc<AtomicU32>, result: bool) -> Arc<dyn TaskHandler> {
        let count = Arc::clone(count);
        handler_fn(move || {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                result
            }
        })
    }

    /// Long tick so the live ticker never interferes with direct tick calls.
    fn test_config() -> EngineConfig {
        EngineConfig {
            timezone: chrono_tz::UTC,
            cycle_tick_seconds: 3_600,
        }
    }

    async fn engine_with(
        store: Arc<MemoryHistoryStore>,
        declaration: TaskDeclaration,
        handler: Arc<dyn TaskHandler>,
    ) -> CycleEngine {
        let mut registry = TaskRegistry::new(chrono_tz::UTC);
        registry.register(declaration, handler).unwrap();
        CycleEngine::load(&registry, store as Arc<dyn HistoryStore>, &test_config())
            .await
            .unwrap()
    }

    async fn seed_tracker(store: &MemoryHistoryStore, task: &str, elapsed: u32) {
        let mut tracker = CycleTracker::new(TaskId::new(task));
        tracker.elapsed_minutes = elapsed;
        store.save_trackers(&[tracker]).await.unwrap();
    }

    async fn seed_history(store: &MemoryHistoryStore, task: &str, age: ChronoDuration) {
        store
            .seed(HistoryRecord {
                id: Uuid::new_v4(),
                task_id: TaskId::new(task),
                created_at: Utc::now() - age,
                reason: "automatic".to_string(),
                success: true,
            })
            .await;
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_tick_below_interval_only_advances_counter() {
        let store = Arc::new(MemoryHistoryStore::new());
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5),
            counting_handler(&count, true),
        )
        .await;

        tick(&engine.inner).await;
        assert_eq!(
            engine.elapsed_minutes(&TaskId::new("weather")).await,
            Some(1)
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);
        // The batch write persisted the advanced counter
        assert_eq!(
            store
                .tracker(&TaskId::new("weather"))
                .await
                .unwrap()
                .unwrap()
                .elapsed_minutes,
            1
        );
    }

    #[tokio::test]
    async fn test_counter_reaching_interval_fires_and_resets() {
        let store = Arc::new(MemoryHistoryStore::new());
        seed_tracker(&store, "weather", 4).await;
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5),
            counting_handler(&count, true),
        )
        .await;

        tick(&engine.inner).await;
        let count_ref = Arc::clone(&count);
        wait_for(move || count_ref.load(Ordering::SeqCst) == 1).await;

        let id = TaskId::new("weather");
        assert_eq!(engine.elapsed_minutes(&id).await, Some(0));
        let engine_ref = engine.clone();
        wait_for(move || engine_ref.trigger_count(&TaskId::new("weather")) == Some(1)).await;
        assert!(engine.last_trigger(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_tick_while_firing_rolls_counter_back_one() {
        let store = Arc::new(MemoryHistoryStore::new());
        seed_tracker(&store, "weather", 4).await;
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5),
            counting_handler(&count, true),
        )
        .await;

        engine.inner.tasks[0].firing.store(true, Ordering::Release);
        tick(&engine.inner).await;

        // Incremented to 5, suppressed, rolled back to 4
        assert_eq!(
            engine.elapsed_minutes(&TaskId::new("weather")).await,
            Some(4)
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // The suppressed fire happens on the following tick
        engine.inner.tasks[0].firing.store(false, Ordering::Release);
        tick(&engine.inner).await;
        let count_ref = Arc::clone(&count);
        wait_for(move || count_ref.load(Ordering::SeqCst) == 1).await;
        assert_eq!(
            engine.elapsed_minutes(&TaskId::new("weather")).await,
            Some(0)
        );
    }

    #[tokio::test]
    async fn test_interval_of_one_fires_every_tick() {
        let store = Arc::new(MemoryHistoryStore::new());
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("pulse", 1),
            counting_handler(&count, true),
        )
        .await;

        tick(&engine.inner).await;
        let count_ref = Arc::clone(&count);
        wait_for(move || count_ref.load(Ordering::SeqCst) == 1).await;
        tick(&engine.inner).await;
        let count_ref = Arc::clone(&count);
        wait_for(move || count_ref.load(Ordering::SeqCst) == 2).await;
    }

    #[tokio::test]
    async fn test_concurrent_manual_triggers_exactly_one_succeeds() {
        let store = Arc::new(MemoryHistoryStore::new());
        let gate = Arc::new(Notify::new());
        let gate_ref = Arc::clone(&gate);
        let handler = handler_fn(move || {
            let gate = Arc::clone(&gate_ref);
            async move {
                gate.notified().await;
                true
            }
        });
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5),
            handler,
        )
        .await;

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .trigger(&TaskId::new("weather"), "first")
                    .await
                    .unwrap()
            })
        };
        // Let the first trigger claim the reentrancy flag
        let engine_ref = engine.clone();
        wait_for(move || {
            engine_ref.inner.tasks[0].firing.load(Ordering::Acquire)
        })
        .await;

        let second = engine.trigger(&TaskId::new("weather"), "second").await.unwrap();
        assert!(!second);

        gate.notify_one();
        assert!(first.await.unwrap());
        assert_eq!(engine.trigger_count(&TaskId::new("weather")), Some(1));
    }

    #[tokio::test]
    async fn test_manual_trigger_resets_elapsed_and_records_reason() {
        let store = Arc::new(MemoryHistoryStore::new());
        seed_tracker(&store, "weather", 3).await;
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5),
            counting_handler(&count, true),
        )
        .await;

        let id = TaskId::new("weather");
        assert!(engine.trigger(&id, "requested by operator").await.unwrap());
        assert_eq!(engine.elapsed_minutes(&id).await, Some(0));
        let records = store.records_for(&id).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason, "requested by operator");
    }

    #[tokio::test]
    async fn test_trigger_on_create_fires_once_without_counting() {
        let store = Arc::new(MemoryHistoryStore::new());
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5).trigger_on_create(),
            counting_handler(&count, true),
        )
        .await;
        engine.start().await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        let records = store.records_for(&TaskId::new("weather")).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason, "initial");
        // Catch-up fires are not counted as lifetime triggers
        assert_eq!(engine.trigger_count(&TaskId::new("weather")), Some(0));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_initial_trigger_aborts_startup() {
        let store = Arc::new(MemoryHistoryStore::new());
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5).trigger_on_create(),
            counting_handler(&count, false),
        )
        .await;
        let err = engine.start().await.unwrap_err();
        assert!(matches!(err, StartupError::InitialTriggerFailed { .. }));
    }

    #[tokio::test]
    async fn test_catch_up_all_replays_missed_cycles() {
        let store = Arc::new(MemoryHistoryStore::new());
        // 22 minutes offline with 2 already elapsed: floor((22 - 2) / 5) = 4
        seed_history(&store, "weather", ChronoDuration::minutes(22)).await;
        seed_tracker(&store, "weather", 2).await;
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5).with_catch_up(CatchUpPolicy::All),
            counting_handler(&count, true),
        )
        .await;
        engine.start().await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 4);
        let records = store.records_for(&TaskId::new("weather")).await;
        assert_eq!(records.len(), 5);
        assert_eq!(records[1].reason, "catchup all - 1/4");
        assert_eq!(records[4].reason, "catchup all - 4/4");
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_catch_up_once_collapses_missed_cycles() {
        let store = Arc::new(MemoryHistoryStore::new());
        seed_history(&store, "weather", ChronoDuration::minutes(22)).await;
        seed_tracker(&store, "weather", 2).await;
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5).with_catch_up(CatchUpPolicy::Once),
            counting_handler(&count, true),
        )
        .await;
        engine.start().await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        let records = store.records_for(&TaskId::new("weather")).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].reason, "catchup once - missed 4");
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_reset_elapsed_on_start_zeroes_and_persists() {
        let store = Arc::new(MemoryHistoryStore::new());
        seed_tracker(&store, "weather", 3).await;
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5),
            counting_handler(&count, true),
        )
        .await;
        engine.start().await.unwrap();

        let id = TaskId::new("weather");
        assert_eq!(engine.elapsed_minutes(&id).await, Some(0));
        assert_eq!(
            store.tracker(&id).await.unwrap().unwrap().elapsed_minutes,
            0
        );
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_keep_elapsed_on_start_preserves_counter() {
        let store = Arc::new(MemoryHistoryStore::new());
        seed_tracker(&store, "weather", 3).await;
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5).keep_elapsed_on_start(),
            counting_handler(&count, true),
        )
        .await;
        engine.start().await.unwrap();

        assert_eq!(
            engine.elapsed_minutes(&TaskId::new("weather")).await,
            Some(3)
        );
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_volatile_cycle_never_writes_history() {
        let store = Arc::new(MemoryHistoryStore::new());
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("ping", 5).with_catch_up(CatchUpPolicy::None),
            counting_handler(&count, true),
        )
        .await;

        let id = TaskId::new("ping");
        assert!(engine.trigger(&id, "manual").await.unwrap());
        assert!(store.records_for(&id).await.is_empty());
        assert!(engine.last_trigger(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_trigger_unknown_task_errors() {
        let store = Arc::new(MemoryHistoryStore::new());
        let registry = TaskRegistry::new(chrono_tz::UTC);
        let engine = CycleEngine::load(
            &registry,
            store as Arc<dyn HistoryStore>,
            &test_config(),
        )
        .await
        .unwrap();
        let err = engine
            .trigger(&TaskId::new("ghost"), "manual")
            .await
            .unwrap_err();
        assert!(matches!(err, TriggerError::UnknownTask(_)));
    }

    #[tokio::test]
    async fn test_describe_mentions_minutes_to_next() {
        let store = Arc::new(MemoryHistoryStore::new());
        seed_tracker(&store, "weather", 2).await;
        let count = Arc::new(AtomicU32::new(0));
        let engine = engine_with(
            Arc::clone(&store),
            TaskDeclaration::interval("weather", 5).keep_elapsed_on_start(),
            counting_handler(&count, true),
        )
        .await;
        let text = engine.describe(&TaskId::new("weather")).await.unwrap();
        assert!(text.contains("cycle weather"));
        assert!(text.contains("minutes to next: 3"));
    }
}
