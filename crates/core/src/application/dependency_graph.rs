// Dependency Graph - acyclic "task depends on task" edges within a board
//
// Status queries (dependencies, blockers, can_start, blocked list) are derived
// from the repository on every call; nothing is cached here.

use crate::application::board_lock::BoardLocks;
use crate::domain::{ActivityEvent, BlockedTask, DependencyEdge, DomainError, Task, TaskId};
use crate::error::{AppError, Result};
use crate::port::{ActivityRecorder, TaskRepository};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

pub struct DependencyGraph {
    repo: Arc<dyn TaskRepository>,
    activity: Arc<dyn ActivityRecorder>,
    board_locks: Arc<BoardLocks>,
}

impl DependencyGraph {
    pub fn new(
        repo: Arc<dyn TaskRepository>,
        activity: Arc<dyn ActivityRecorder>,
        board_locks: Arc<BoardLocks>,
    ) -> Self {
        Self {
            repo,
            activity,
            board_locks,
        }
    }

    /// Record that `task_id` depends on `depends_on`
    ///
    /// An edge that already exists is returned as is.
    ///
    /// # Errors
    /// - `NotFound` if either task is not on the board
    /// - `CircularDependency` if the edge would close a cycle; nothing is written
    pub async fn add_dependency(
        &self,
        board_id: &str,
        task_id: &str,
        depends_on: &str,
    ) -> Result<DependencyEdge> {
        let _guard = self.board_locks.acquire(board_id).await;

        let task = self.require_task(board_id, task_id).await?;
        self.require_task(board_id, depends_on).await?;

        let edge = DependencyEdge {
            board_id: board_id.to_string(),
            task_id: task_id.to_string(),
            depends_on: depends_on.to_string(),
        };

        if task.depends_on(depends_on) {
            debug!(task_id = %task_id, depends_on = %depends_on, "Dependency already present");
            return Ok(edge);
        }

        let tasks = self.repo.list_tasks(board_id).await?;
        if would_create_cycle(&tasks, task_id, depends_on) {
            return Err(DomainError::CircularDependency {
                task: task_id.to_string(),
                depends_on: depends_on.to_string(),
            }
            .into());
        }

        let mut edges = task.dependencies;
        edges.insert(depends_on.to_string());
        self.repo
            .set_dependency_edges(board_id, task_id, &edges)
            .await?;

        info!(board_id = %board_id, task_id = %task_id, depends_on = %depends_on, "Dependency added");
        self.activity
            .record(ActivityEvent::DependencyAdded {
                board_id: board_id.to_string(),
                task_id: task_id.to_string(),
                depends_on: depends_on.to_string(),
            })
            .await;

        Ok(edge)
    }

    /// Drop an edge; false if it did not exist
    pub async fn remove_dependency(
        &self,
        board_id: &str,
        task_id: &str,
        depends_on: &str,
    ) -> Result<bool> {
        let _guard = self.board_locks.acquire(board_id).await;

        let mut edges = self.require_task(board_id, task_id).await?.dependencies;
        if !edges.remove(depends_on) {
            return Ok(false);
        }
        self.repo
            .set_dependency_edges(board_id, task_id, &edges)
            .await?;

        info!(board_id = %board_id, task_id = %task_id, depends_on = %depends_on, "Dependency removed");
        self.activity
            .record(ActivityEvent::DependencyRemoved {
                board_id: board_id.to_string(),
                task_id: task_id.to_string(),
                depends_on: depends_on.to_string(),
            })
            .await;

        Ok(true)
    }

    /// Tasks `task_id` waits on
    pub async fn get_dependencies(&self, board_id: &str, task_id: &str) -> Result<Vec<Task>> {
        let task = self.require_task(board_id, task_id).await?;
        Ok(self
            .repo
            .list_tasks(board_id)
            .await?
            .into_iter()
            .filter(|t| task.dependencies.contains(&t.id))
            .collect())
    }

    /// Tasks that depend on `task_id`
    pub async fn get_blockers(&self, board_id: &str, task_id: &str) -> Result<Vec<Task>> {
        self.require_task(board_id, task_id).await?;
        Ok(self
            .repo
            .list_tasks(board_id)
            .await?
            .into_iter()
            .filter(|t| t.depends_on(task_id))
            .collect())
    }

    /// True when every dependency of `task_id` is completed
    pub async fn can_start(&self, board_id: &str, task_id: &str) -> Result<bool> {
        Ok(self
            .get_dependencies(board_id, task_id)
            .await?
            .iter()
            .all(|t| t.completed))
    }

    /// Incomplete tasks on any board with at least one incomplete dependency
    pub async fn list_blocked(&self) -> Result<Vec<BlockedTask>> {
        let mut blocked = Vec::new();
        for board in self.repo.list_boards().await? {
            blocked.extend(blocked_on_board(self.repo.list_tasks(&board.id).await?));
        }
        Ok(blocked)
    }

    async fn require_task(&self, board_id: &str, task_id: &str) -> Result<Task> {
        self.repo
            .get_task(board_id, task_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Task {} not found on board {}", task_id, board_id))
            })
    }
}

/// BFS from `depends_on` along depends-on edges; true if `task_id` is reachable
fn would_create_cycle(tasks: &[Task], task_id: &str, depends_on: &str) -> bool {
    if task_id == depends_on {
        return true;
    }

    let edges: HashMap<&str, Vec<&str>> = tasks
        .iter()
        .map(|t| (t.id.as_str(), t.dependencies.iter().map(String::as_str).collect()))
        .collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([depends_on]);

    while let Some(current) = queue.pop_front() {
        if current == task_id {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(next) = edges.get(current) {
            queue.extend(next.iter().filter(|id| !visited.contains(*id)));
        }
    }

    false
}

fn blocked_on_board(tasks: Vec<Task>) -> Vec<BlockedTask> {
    let by_id: HashMap<TaskId, Task> = tasks.iter().map(|t| (t.id.clone(), t.clone())).collect();

    tasks
        .into_iter()
        .filter(|t| !t.completed)
        .filter_map(|task| {
            let blocking_tasks: Vec<Task> = task
                .dependencies
                .iter()
                .filter_map(|id| by_id.get(id))
                .filter(|dep| !dep.completed)
                .cloned()
                .collect();
            (!blocking_tasks.is_empty()).then_some(BlockedTask {
                task,
                blocking_tasks,
            })
        })
        .collect()
}
