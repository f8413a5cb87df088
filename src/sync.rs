use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::SyncPolicy;
use crate::document::{AppId, LiveApp};
use crate::error::ConvergeError;
use crate::scheduler::Scheduler;

/// Scheduler-side condition an action waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// The app exists and runs at least one task.
    Deployed,
    /// The scheduler no longer knows the app.
    Absent,
}

impl Condition {
    fn holds(self, live: Option<&LiveApp>) -> bool {
        match self {
            Condition::Deployed => live.is_some_and(|app| app.tasks_running() > 0),
            Condition::Absent => live.is_none(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Deployed => f.write_str("deployed"),
            Condition::Absent => f.write_str("absent"),
        }
    }
}

/// Polls the scheduler at a fixed interval until a condition holds or the
/// attempt budget runs out.
pub struct StatusSync {
    scheduler: Arc<dyn Scheduler>,
    policy: SyncPolicy,
}

impl StatusSync {
    pub fn new(scheduler: Arc<dyn Scheduler>, policy: SyncPolicy) -> Self {
        Self { scheduler, policy }
    }

    /// Check `condition` up to `max_attempts` times, sleeping `interval`
    /// between checks. Read errors abort the wait immediately.
    pub async fn await_condition(
        &self,
        id: &AppId,
        condition: Condition,
    ) -> Result<(), ConvergeError> {
        let SyncPolicy {
            max_attempts,
            interval,
        } = self.policy;

        for attempt in 1..=max_attempts {
            let live = self.scheduler.read(id).await?;
            if condition.holds(live.as_ref()) {
                info!(app = %id, %condition, attempt, "condition reached");
                return Ok(());
            }
            debug!(app = %id, %condition, attempt, max_attempts, "condition not yet reached");
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        warn!(app = %id, %condition, max_attempts, "gave up waiting");
        Err(ConvergeError::Timeout {
            app_id: id.to_string(),
            endpoint: self.scheduler.endpoint().to_string(),
            condition,
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_scheduler::MockScheduler;
    use serde_json::json;
    use std::time::Duration;

    fn policy(max_attempts: u32) -> SyncPolicy {
        SyncPolicy {
            max_attempts,
            interval: Duration::from_secs(3),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deployed_satisfied_on_first_check() {
        let mock = Arc::new(MockScheduler::new());
        mock.insert(json!({"id": "/web", "tasksRunning": 2}));
        let sync = StatusSync::new(mock.clone(), policy(5));

        sync.await_condition(&AppId::new("web").unwrap(), Condition::Deployed)
            .await
            .unwrap();
        assert_eq!(mock.calls().reads, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn never_satisfied_checks_exactly_n_times() {
        let mock = Arc::new(MockScheduler::new());
        mock.insert(json!({"id": "/web", "tasksRunning": 0}));
        let sync = StatusSync::new(mock.clone(), policy(4));

        let started = tokio::time::Instant::now();
        let err = sync
            .await_condition(&AppId::new("web").unwrap(), Condition::Deployed)
            .await
            .unwrap_err();

        assert_eq!(mock.calls().reads, 4);
        // three sleeps: none after the final check
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(9), "waited {waited:?}");
        assert!(waited < Duration::from_secs(12), "waited {waited:?}");
        match err {
            ConvergeError::Timeout {
                app_id,
                endpoint,
                condition,
                attempts,
            } => {
                assert_eq!(app_id, "web");
                assert_eq!(endpoint, "mock://marathon");
                assert_eq!(condition, Condition::Deployed);
                assert_eq!(attempts, 4);
            }
            other => panic!("expected Timeout, got: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn absent_waits_out_lingering_app() {
        let mock = Arc::new(MockScheduler::new().with_delete_lag(2));
        mock.insert(json!({"id": "/web"}));
        let id = AppId::new("web").unwrap();
        mock.delete(&id, false).await.unwrap();

        let sync = StatusSync::new(mock.clone(), policy(5));
        sync.await_condition(&id, Condition::Absent).await.unwrap();
        assert_eq!(mock.calls().reads, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_app_never_counts_as_deployed() {
        let mock = Arc::new(MockScheduler::new());
        let sync = StatusSync::new(mock.clone(), policy(2));
        let err = sync
            .await_condition(&AppId::new("ghost").unwrap(), Condition::Deployed)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvergeError::Timeout { .. }), "got: {err}");
        assert_eq!(mock.calls().reads, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_times_out_without_reading() {
        let mock = Arc::new(MockScheduler::new());
        let sync = StatusSync::new(mock.clone(), policy(0));
        let err = sync
            .await_condition(&AppId::new("web").unwrap(), Condition::Absent)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("absent"), "got: {err}");
        assert_eq!(mock.calls().reads, 0);
    }
}
