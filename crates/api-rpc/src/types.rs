//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use serde::{Deserialize, Serialize};
use taskboard_core::application::{GenerationSummary, UpdateDefinitionRequest};
use taskboard_core::domain::{BlockedTask, Task};

/// recurring.run.v1 - Run a generation pass now (no params)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub ran_at: i64,
    #[serde(flatten)]
    pub summary: GenerationSummary,
}

/// recurring.create.v1 takes `CreateDefinitionRequest` as is and
/// returns the stored definition
pub use taskboard_core::application::CreateDefinitionRequest as CreateRecurringRequest;

/// recurring.update.v1 - Change pattern and/or active flag
#[derive(Debug, Deserialize)]
pub struct UpdateRecurringRequest {
    pub definition_id: String,
    #[serde(flatten)]
    pub changes: UpdateDefinitionRequest,
}

/// recurring.delete.v1
#[derive(Debug, Deserialize)]
pub struct DeleteRecurringRequest {
    pub definition_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRecurringResponse {
    pub definition_id: String,
    pub deleted: bool,
}

/// dependency.add.v1 / dependency.remove.v1 - `task_id` depends on `depends_on`
#[derive(Debug, Deserialize)]
pub struct DependencyRequest {
    pub board_id: String,
    pub task_id: String,
    pub depends_on: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveDependencyResponse {
    pub removed: bool,
}

/// dependency.show.v1 - Dependency/blocker view of one task
#[derive(Debug, Deserialize)]
pub struct ShowDependenciesRequest {
    pub board_id: String,
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowDependenciesResponse {
    pub task_id: String,
    /// Tasks this one waits on
    pub dependencies: Vec<Task>,
    /// Tasks waiting on this one
    pub blockers: Vec<Task>,
    pub can_start: bool,
}

/// dependency.blocked.v1 - Blocked tasks across all boards (no params)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedResponse {
    pub tasks: Vec<BlockedTask>,
}
