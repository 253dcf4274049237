// Port Layer - Interfaces for external dependencies

pub mod activity_recorder;
pub mod id_provider; // For deterministic testing
pub mod task_repository;
pub mod time_provider;
pub mod transaction;

// Re-exports
pub use activity_recorder::ActivityRecorder;
pub use id_provider::IdProvider;
pub use task_repository::TaskRepository;
pub use time_provider::TimeProvider;
pub use transaction::{TaskRepositoryTransaction, Transaction, TransactionalTaskRepository};
