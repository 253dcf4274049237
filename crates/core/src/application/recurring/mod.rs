// Recurrence Scheduler - materializes recurring definitions into task instances

mod definition;
mod generate;

pub use definition::{CreateDefinitionRequest, UpdateDefinitionRequest};
pub use generate::{FailedDefinition, GenerationSummary, SkipReason, SkippedDefinition};

use crate::application::board_lock::BoardLocks;
use crate::application::constants::{
    DEFAULT_PASS_DEADLINE, DEFAULT_TICK_INTERVAL, ERROR_RECOVERY_SLEEP_DURATION,
};
use crate::application::shutdown::ShutdownToken;
use crate::error::Result;
use crate::port::{
    ActivityRecorder, IdProvider, TaskRepository, TimeProvider, TransactionalTaskRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info};

/// Timing knobs for the background loop
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Delay between scheduled passes
    pub tick_interval: Duration,
    /// Budget for one pass
    pub pass_deadline: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            pass_deadline: DEFAULT_PASS_DEADLINE,
        }
    }
}

/// Recurrence scheduler
///
/// Owns no state besides the board lock registry, which it shares with
/// `DependencyGraph` so both serialize on the same board.
pub struct RecurrenceScheduler {
    repo: Arc<dyn TaskRepository>,
    tx_repo: Arc<dyn TransactionalTaskRepository>,
    activity: Arc<dyn ActivityRecorder>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    board_locks: Arc<BoardLocks>,
    config: SchedulerConfig,
}

impl RecurrenceScheduler {
    pub fn new(
        repo: Arc<dyn TaskRepository>,
        tx_repo: Arc<dyn TransactionalTaskRepository>,
        activity: Arc<dyn ActivityRecorder>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        board_locks: Arc<BoardLocks>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            repo,
            tx_repo,
            activity,
            id_provider,
            time_provider,
            board_locks,
            config,
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Run a pass at the current time (manual trigger)
    pub async fn run_now(&self) -> Result<GenerationSummary> {
        let now = self.time_provider.now_millis();
        info!(now = now, "Running manual generation pass");
        self.generate_due_tasks(now).await
    }

    /// Scheduling loop; returns once `shutdown` fires
    ///
    /// Should be spawned in tokio::spawn
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(
            tick_interval_secs = self.config.tick_interval.as_secs(),
            pass_deadline_secs = self.config.pass_deadline.as_secs(),
            "Recurrence scheduler started"
        );

        let mut tick = interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {},
                _ = shutdown.wait() => break,
            }

            let now = self.time_provider.now_millis();
            if let Err(e) = self.generate_due_tasks(now).await {
                error!(error = %e, "Generation pass failed");
                tokio::select! {
                    _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                    _ = shutdown.wait() => break,
                }
            }
        }

        info!("Recurrence scheduler stopped");
    }
}
