// Domain Layer - Pure business logic and entities

pub mod activity;
pub mod error;
pub mod recurrence;
pub mod task;

// Re-exports
pub use activity::ActivityEvent;
pub use error::DomainError;
pub use recurrence::{
    DefinitionId, DefinitionUpdate, Frequency, RecurrencePattern, RecurringTaskDefinition,
};
pub use task::{BlockedTask, Board, BoardId, DependencyEdge, Subtask, Task, TaskId};
