// Taskboard Infrastructure - SQLite Adapter
// Implements: TaskRepository, TransactionalTaskRepository, ActivityRecorder

mod activity_recorder;
mod connection;
mod error;
mod migration;
mod task_repository;
mod transaction;

pub use activity_recorder::{ActivityEntry, SqliteActivityRecorder};
pub use connection::create_pool;
pub use migration::run_migrations;
pub use task_repository::SqliteTaskRepository;
pub use transaction::SqliteTaskTransaction;
