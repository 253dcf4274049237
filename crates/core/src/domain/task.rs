// Board & Task Domain Model

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Board ID (UUID v4)
pub type BoardId = String;

/// Task ID (UUID v4)
pub type TaskId = String;

/// Board owning tasks, recurring definitions and dependency edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    pub created_at: i64, // epoch ms
}

impl Board {
    pub fn new(id: impl Into<String>, name: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at,
        }
    }
}

/// Checklist item inside a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    pub completed: bool,
}

impl Subtask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
        }
    }
}

/// Board task
///
/// `dependencies` holds the ids of tasks (same board) that must be completed
/// before this one can start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub board_id: BoardId,
    pub title: String,
    pub description: Option<String>,
    pub column: Option<String>,
    pub labels: Vec<String>,
    pub completed: bool,
    pub due_date: Option<i64>, // epoch ms
    pub subtasks: Vec<Subtask>,
    pub dependencies: BTreeSet<TaskId>,

    /// Set on instances materialized from a recurring definition
    pub recurring_definition_id: Option<String>,

    pub created_at: i64, // epoch ms
}

impl Task {
    /// Create a new task
    ///
    /// # Arguments
    ///
    /// * `id` - Unique task ID (injected, not generated)
    /// * `board_id` - Owning board
    /// * `title` - Task title
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        board_id: impl Into<String>,
        title: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            board_id: board_id.into(),
            title: title.into(),
            description: None,
            column: None,
            labels: Vec::new(),
            completed: false,
            due_date: None,
            subtasks: Vec::new(),
            dependencies: BTreeSet::new(),
            recurring_definition_id: None,
            created_at,
        }
    }

    /// Build a fresh instance of this task for one recurrence cycle
    ///
    /// Content is cloned; completion state is reset, edges are not carried over.
    pub fn instantiate(
        &self,
        id: impl Into<String>,
        definition_id: impl Into<String>,
        due_date: i64,
        created_at: i64,
    ) -> Task {
        Task {
            id: id.into(),
            board_id: self.board_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            column: self.column.clone(),
            labels: self.labels.clone(),
            completed: false,
            due_date: Some(due_date),
            subtasks: self
                .subtasks
                .iter()
                .map(|s| Subtask {
                    title: s.title.clone(),
                    completed: false,
                })
                .collect(),
            dependencies: BTreeSet::new(),
            recurring_definition_id: Some(definition_id.into()),
            created_at,
        }
    }

    pub fn depends_on(&self, task_id: &str) -> bool {
        self.dependencies.contains(task_id)
    }
}

/// Directed "task depends on depends_on" relation within one board
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub board_id: BoardId,
    pub task_id: TaskId,
    pub depends_on: TaskId,
}

/// Incomplete task waiting on at least one incomplete dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedTask {
    pub task: Task,
    pub blocking_tasks: Vec<Task>,
}
