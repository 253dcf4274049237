//! Shared wiring for the SQLite-backed end-to-end tests

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use taskboard_core::application::{
    BoardLocks, DependencyGraph, RecurrenceScheduler, SchedulerConfig,
};
use taskboard_core::domain::{Board, Task};
use taskboard_core::port::id_provider::UuidProvider;
use taskboard_core::port::time_provider::mocks::FixedTimeProvider;
use taskboard_core::port::TaskRepository;
use taskboard_infra_sqlite::{
    create_pool, run_migrations, SqliteActivityRecorder, SqliteTaskRepository,
};

pub const BOARD: &str = "home";

/// Midnight UTC of the given date, as epoch ms
pub fn at(y: i32, m: u32, d: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
        .unwrap()
        .timestamp_millis()
}

/// Fully wired engine over one SQLite database
pub struct Engine {
    pub pool: sqlx::SqlitePool,
    pub repo: Arc<SqliteTaskRepository>,
    pub activity: Arc<SqliteActivityRecorder>,
    pub time: Arc<FixedTimeProvider>,
    pub locks: Arc<BoardLocks>,
    pub scheduler: RecurrenceScheduler,
    pub graph: DependencyGraph,
}

impl Engine {
    pub async fn in_memory(now: i64) -> Self {
        Self::open("sqlite::memory:", now).await
    }

    pub async fn open(url: &str, now: i64) -> Self {
        let pool = create_pool(url).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time = Arc::new(FixedTimeProvider::new(now));
        let repo = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let activity = Arc::new(SqliteActivityRecorder::new(pool.clone(), time.clone()));
        let locks = Arc::new(BoardLocks::new());

        let scheduler = RecurrenceScheduler::new(
            repo.clone(),
            repo.clone(),
            activity.clone(),
            Arc::new(UuidProvider),
            time.clone(),
            locks.clone(),
            SchedulerConfig::default(),
        );
        let graph = DependencyGraph::new(repo.clone(), activity.clone(), locks.clone());

        Self {
            pool,
            repo,
            activity,
            time,
            locks,
            scheduler,
            graph,
        }
    }

    /// Second scheduler over the same database with its own lock registry,
    /// as a separate process would have
    pub fn detached_scheduler(&self) -> RecurrenceScheduler {
        RecurrenceScheduler::new(
            self.repo.clone(),
            self.repo.clone(),
            self.activity.clone(),
            Arc::new(UuidProvider),
            self.time.clone(),
            Arc::new(BoardLocks::new()),
            SchedulerConfig::default(),
        )
    }

    pub async fn seed_board(&self) {
        self.repo
            .insert_board(&Board::new(BOARD, "Home", 0))
            .await
            .unwrap();
    }

    pub async fn seed_task(&self, id: &str, title: &str) -> Task {
        self.repo
            .create_task(BOARD, &Task::new(id, BOARD, title, 0))
            .await
            .unwrap()
    }

    /// Generated instances of a definition, ordered by due date
    pub async fn instances_of(&self, definition_id: &str) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .repo
            .list_tasks(BOARD)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.recurring_definition_id.as_deref() == Some(definition_id))
            .collect();
        tasks.sort_by_key(|t| t.due_date);
        tasks
    }
}

/// File-backed database path unique to this test run
pub fn temp_db_url(name: &str) -> (String, PathBuf) {
    let path = std::env::temp_dir().join(format!(
        "taskboard_{}_{}.db",
        name,
        uuid::Uuid::new_v4()
    ));
    (format!("sqlite://{}", path.display()), path)
}
