// Application Layer - Use Cases and Business Logic

pub mod board_lock;
pub mod constants;
pub mod dependency_graph;
pub mod pattern;
pub mod recurring;
pub mod shutdown;

// Re-exports
pub use board_lock::{BoardGuard, BoardLocks};
pub use dependency_graph::DependencyGraph;
pub use pattern::next_due_date;
pub use recurring::{
    CreateDefinitionRequest, FailedDefinition, GenerationSummary, RecurrenceScheduler,
    SchedulerConfig, SkipReason, SkippedDefinition, UpdateDefinitionRequest,
};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
