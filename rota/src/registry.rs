// Explicit task registration, replacing runtime discovery of task methods

use crate::clock::CronClock;
use crate::errors::RegistrationError;
use crate::models::{CatchUpPolicy, TaskDeclaration, TaskId, Trigger};
use async_trait::async_trait;
use chrono_tz::Tz;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

/// A task body. Returns `true` when the run succeeded.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self) -> bool;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    async fn run(&self) -> bool {
        (self.0)().await
    }
}

/// Wraps an async closure as a shareable [`TaskHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn TaskHandler>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// A calendar-triggered task as the engines consume it.
#[derive(Clone)]
pub struct ScheduleSpec {
    pub id: TaskId,
    pub clock: CronClock,
    pub catch_up: CatchUpPolicy,
    pub handler: Arc<dyn TaskHandler>,
}

/// An interval-triggered task as the engines consume it.
#[derive(Clone)]
pub struct CycleSpec {
    pub id: TaskId,
    pub interval_minutes: u32,
    pub trigger_on_create: bool,
    pub reset_elapsed_on_start: bool,
    pub catch_up: CatchUpPolicy,
    pub handler: Arc<dyn TaskHandler>,
}

/// Every declared task together with its handler.
///
/// Hosts populate the registry at startup; the engines split it into
/// schedules and cycles. All validation happens here, before anything runs.
pub struct TaskRegistry {
    timezone: Tz,
    ids: HashSet<TaskId>,
    schedules: Vec<ScheduleSpec>,
    cycles: Vec<CycleSpec>,
}

impl TaskRegistry {
    /// Creates an empty registry. Cron expressions of every registered task
    /// are evaluated in `timezone`.
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            ids: HashSet::new(),
            schedules: Vec::new(),
            cycles: Vec::new(),
        }
    }

    /// Validates the declaration and stores it with its handler.
    ///
    /// Duplicate ids, invalid cron expressions and intervals below one
    /// minute are rejected; a failed registration leaves the registry
    /// unchanged.
    pub fn register(
        &mut self,
        declaration: TaskDeclaration,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), RegistrationError> {
        if self.ids.contains(&declaration.id) {
            return Err(RegistrationError::DuplicateTask(declaration.id));
        }
        let TaskDeclaration {
            id,
            trigger,
            catch_up,
        } = declaration;
        match trigger {
            Trigger::Cron { expression } => {
                let clock = CronClock::parse(&expression, self.timezone)?;
                self.ids.insert(id.clone());
                self.schedules.push(ScheduleSpec {
                    id,
                    clock,
                    catch_up,
                    handler,
                });
            }
            Trigger::Interval {
                minutes,
                trigger_on_create,
                reset_elapsed_on_start,
            } => {
                if minutes < 1 {
                    return Err(RegistrationError::IntervalTooShort { id, minutes });
                }
                self.ids.insert(id.clone());
                self.cycles.push(CycleSpec {
                    id,
                    interval_minutes: minutes,
                    trigger_on_create,
                    reset_elapsed_on_start,
                    catch_up,
                    handler,
                });
            }
        }
        Ok(())
    }

    pub fn schedules(&self) -> &[ScheduleSpec] {
        &self.schedules
    }

    pub fn cycles(&self) -> &[CycleSpec] {
        &self.cycles
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn len(&self) -> usize {
        self.schedules.len() + self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatchUpPolicy;

    fn noop() -> Arc<dyn TaskHandler> {
        handler_fn(|| async { true })
    }

    #[test]
    fn test_register_schedule_and_cycle() {
        let mut registry = TaskRegistry::new(chrono_tz::UTC);
        registry
            .register(TaskDeclaration::cron("report", "0 16 * * *"), noop())
            .unwrap();
        registry
            .register(TaskDeclaration::interval("weather", 15), noop())
            .unwrap();

        assert_eq!(registry.schedules().len(), 1);
        assert_eq!(registry.cycles().len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_id_is_rejected_across_kinds() {
        let mut registry = TaskRegistry::new(chrono_tz::UTC);
        registry
            .register(TaskDeclaration::cron("report", "0 16 * * *"), noop())
            .unwrap();
        let err = registry
            .register(TaskDeclaration::interval("report", 5), noop())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateTask(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_cron_expression_is_rejected() {
        let mut registry = TaskRegistry::new(chrono_tz::UTC);
        let err = registry
            .register(TaskDeclaration::cron("broken", "every day please"), noop())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Cron(_)));
        assert!(registry.is_empty());

        // A failed registration leaves the id reusable
        registry
            .register(TaskDeclaration::cron("broken", "0 4 * * *"), noop())
            .unwrap();
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut registry = TaskRegistry::new(chrono_tz::UTC);
        let err = registry
            .register(TaskDeclaration::interval("too-fast", 0), noop())
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::IntervalTooShort { minutes: 0, .. }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_one_minute_interval_is_allowed() {
        let mut registry = TaskRegistry::new(chrono_tz::UTC);
        registry
            .register(TaskDeclaration::interval("every-minute", 1), noop())
            .unwrap();
        assert_eq!(registry.cycles()[0].interval_minutes, 1);
    }

    #[test]
    fn test_declaration_options_survive_registration() {
        let mut registry = TaskRegistry::new(chrono_tz::UTC);
        registry
            .register(
                TaskDeclaration::interval("weather", 15)
                    .trigger_on_create()
                    .keep_elapsed_on_start()
                    .with_catch_up(CatchUpPolicy::All),
                noop(),
            )
            .unwrap();
        let spec = &registry.cycles()[0];
        assert!(spec.trigger_on_create);
        assert!(!spec.reset_elapsed_on_start);
        assert_eq!(spec.catch_up, CatchUpPolicy::All);
    }

    #[tokio::test]
    async fn test_handler_fn_adapts_closures() {
        let handler = handler_fn(|| async { false });
        assert!(!handler.run().await);
    }
}
