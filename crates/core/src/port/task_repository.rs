// Task Repository Port (Interface)

use crate::domain::{
    Board, DefinitionUpdate, RecurrencePattern, RecurringTaskDefinition, Task, TaskId,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Repository interface for boards, tasks, recurring definitions and edges
///
/// The repository is the single source of truth; the engine keeps no durable
/// state of its own.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a new board
    async fn insert_board(&self, board: &Board) -> Result<()>;

    /// Find board by ID
    async fn get_board(&self, board_id: &str) -> Result<Option<Board>>;

    /// All boards
    async fn list_boards(&self) -> Result<Vec<Board>>;

    /// Delete a board with its tasks, edges and recurring definitions
    async fn delete_board(&self, board_id: &str) -> Result<bool>;

    /// Find a task belonging to `board_id`
    async fn get_task(&self, board_id: &str, task_id: &str) -> Result<Option<Task>>;

    /// All tasks of a board, including their dependency sets
    async fn list_tasks(&self, board_id: &str) -> Result<Vec<Task>>;

    /// Insert a task into `board_id`
    async fn create_task(&self, board_id: &str, task: &Task) -> Result<Task>;

    /// Update task content and completion (dependency sets are left untouched)
    async fn update_task(&self, task: &Task) -> Result<bool>;

    /// Delete a task; edges pointing at it from other tasks are removed too
    async fn delete_task(&self, board_id: &str, task_id: &str) -> Result<bool>;

    /// Definitions with `is_active = true`
    async fn list_active_recurring_definitions(&self) -> Result<Vec<RecurringTaskDefinition>>;

    /// Find definition by ID
    async fn get_recurring_definition(&self, id: &str) -> Result<Option<RecurringTaskDefinition>>;

    /// Insert a new definition
    async fn insert_recurring_definition(&self, definition: &RecurringTaskDefinition) -> Result<()>;

    /// Write back the cursor fields; false if the definition does not exist
    async fn update_recurring_definition(&self, id: &str, update: &DefinitionUpdate)
        -> Result<bool>;

    /// Swap the pattern, reset the cursor and set the active flag in one write
    async fn replace_recurring_pattern(
        &self,
        id: &str,
        pattern: &RecurrencePattern,
        next_due_date: i64,
        is_active: bool,
    ) -> Result<bool>;

    /// Hard-delete a definition
    async fn delete_recurring_definition(&self, id: &str) -> Result<bool>;

    /// Ids of the tasks `task_id` depends on
    async fn get_dependency_edges(&self, board_id: &str, task_id: &str) -> Result<BTreeSet<TaskId>>;

    /// Replace the dependency set of `task_id`
    async fn set_dependency_edges(
        &self,
        board_id: &str,
        task_id: &str,
        depends_on: &BTreeSet<TaskId>,
    ) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::DefinitionId;
    use crate::error::AppError;
    use crate::port::transaction::{
        TaskRepositoryTransaction, Transaction, TransactionalTaskRepository,
    };
    use std::collections::{BTreeMap, HashSet};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MemoryState {
        boards: BTreeMap<String, Board>,
        tasks: BTreeMap<String, Task>,
        definitions: BTreeMap<DefinitionId, RecurringTaskDefinition>,
        failing_definitions: HashSet<DefinitionId>,
        create_task_calls: usize,
        definition_writes: usize,
    }

    impl MemoryState {
        fn insert_task(&mut self, board_id: &str, task: &Task) -> Result<Task> {
            if !self.boards.contains_key(board_id) {
                return Err(AppError::NotFound(format!("Board {} not found", board_id)));
            }
            let mut task = task.clone();
            task.board_id = board_id.to_string();
            self.tasks.insert(task.id.clone(), task.clone());
            self.create_task_calls += 1;
            Ok(task)
        }

        fn check_writable(&self, id: &str) -> Result<()> {
            if self.failing_definitions.contains(id) {
                return Err(AppError::Database(format!(
                    "Injected storage failure for definition {}",
                    id
                )));
            }
            Ok(())
        }

        fn advance(&mut self, id: &str, expected: i64, update: &DefinitionUpdate) -> Result<bool> {
            self.check_writable(id)?;
            match self.definitions.get_mut(id) {
                Some(def) if def.next_due_date == expected => {
                    def.apply(update);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    /// In-memory TaskRepository for testing
    #[derive(Clone, Default)]
    pub struct InMemoryTaskRepository {
        state: Arc<Mutex<MemoryState>>,
    }

    impl InMemoryTaskRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every write to `definition_id` fail with a storage error
        pub fn fail_definition(&self, definition_id: &str) {
            self.state
                .lock()
                .unwrap()
                .failing_definitions
                .insert(definition_id.to_string());
        }

        /// Non-transactional definition writes (updates and pattern swaps)
        pub fn definition_writes(&self) -> usize {
            self.state.lock().unwrap().definition_writes
        }

        /// Number of tasks created (directly or through transactions)
        pub fn create_task_calls(&self) -> usize {
            self.state.lock().unwrap().create_task_calls
        }

        /// Instances generated from `definition_id`
        pub fn instances_of(&self, definition_id: &str) -> Vec<Task> {
            self.state
                .lock()
                .unwrap()
                .tasks
                .values()
                .filter(|t| t.recurring_definition_id.as_deref() == Some(definition_id))
                .cloned()
                .collect()
        }

        /// Snapshot of every edge, as (task, depends_on) pairs
        pub fn edge_snapshot(&self) -> BTreeSet<(TaskId, TaskId)> {
            self.state
                .lock()
                .unwrap()
                .tasks
                .values()
                .flat_map(|t| t.dependencies.iter().map(|d| (t.id.clone(), d.clone())))
                .collect()
        }
    }

    #[async_trait]
    impl TaskRepository for InMemoryTaskRepository {
        async fn insert_board(&self, board: &Board) -> Result<()> {
            self.state
                .lock()
                .unwrap()
                .boards
                .insert(board.id.clone(), board.clone());
            Ok(())
        }

        async fn get_board(&self, board_id: &str) -> Result<Option<Board>> {
            Ok(self.state.lock().unwrap().boards.get(board_id).cloned())
        }

        async fn list_boards(&self) -> Result<Vec<Board>> {
            Ok(self.state.lock().unwrap().boards.values().cloned().collect())
        }

        async fn delete_board(&self, board_id: &str) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            if state.boards.remove(board_id).is_none() {
                return Ok(false);
            }
            state.tasks.retain(|_, t| t.board_id != board_id);
            state.definitions.retain(|_, d| d.board_id != board_id);
            Ok(true)
        }

        async fn get_task(&self, board_id: &str, task_id: &str) -> Result<Option<Task>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .tasks
                .get(task_id)
                .filter(|t| t.board_id == board_id)
                .cloned())
        }

        async fn list_tasks(&self, board_id: &str) -> Result<Vec<Task>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .tasks
                .values()
                .filter(|t| t.board_id == board_id)
                .cloned()
                .collect())
        }

        async fn create_task(&self, board_id: &str, task: &Task) -> Result<Task> {
            self.state.lock().unwrap().insert_task(board_id, task)
        }

        async fn update_task(&self, task: &Task) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            match state.tasks.get_mut(&task.id) {
                Some(existing) if existing.board_id == task.board_id => {
                    let dependencies = std::mem::take(&mut existing.dependencies);
                    *existing = task.clone();
                    existing.dependencies = dependencies;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn delete_task(&self, board_id: &str, task_id: &str) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            let removed = match state.tasks.get(task_id) {
                Some(t) if t.board_id == board_id => state.tasks.remove(task_id).is_some(),
                _ => false,
            };
            if removed {
                for task in state.tasks.values_mut() {
                    task.dependencies.remove(task_id);
                }
            }
            Ok(removed)
        }

        async fn list_active_recurring_definitions(&self) -> Result<Vec<RecurringTaskDefinition>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .definitions
                .values()
                .filter(|d| d.is_active)
                .cloned()
                .collect())
        }

        async fn get_recurring_definition(
            &self,
            id: &str,
        ) -> Result<Option<RecurringTaskDefinition>> {
            Ok(self.state.lock().unwrap().definitions.get(id).cloned())
        }

        async fn insert_recurring_definition(
            &self,
            definition: &RecurringTaskDefinition,
        ) -> Result<()> {
            self.state
                .lock()
                .unwrap()
                .definitions
                .insert(definition.id.clone(), definition.clone());
            Ok(())
        }

        async fn update_recurring_definition(
            &self,
            id: &str,
            update: &DefinitionUpdate,
        ) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            state.check_writable(id)?;
            state.definition_writes += 1;
            match state.definitions.get_mut(id) {
                Some(def) => {
                    def.apply(update);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn replace_recurring_pattern(
            &self,
            id: &str,
            pattern: &RecurrencePattern,
            next_due_date: i64,
            is_active: bool,
        ) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            state.check_writable(id)?;
            state.definition_writes += 1;
            match state.definitions.get_mut(id) {
                Some(def) => {
                    def.pattern = pattern.clone();
                    def.next_due_date = next_due_date;
                    def.is_active = is_active;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn delete_recurring_definition(&self, id: &str) -> Result<bool> {
            Ok(self.state.lock().unwrap().definitions.remove(id).is_some())
        }

        async fn get_dependency_edges(
            &self,
            board_id: &str,
            task_id: &str,
        ) -> Result<BTreeSet<TaskId>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .tasks
                .get(task_id)
                .filter(|t| t.board_id == board_id)
                .map(|t| t.dependencies.clone())
                .unwrap_or_default())
        }

        async fn set_dependency_edges(
            &self,
            board_id: &str,
            task_id: &str,
            depends_on: &BTreeSet<TaskId>,
        ) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            match state.tasks.get_mut(task_id) {
                Some(task) if task.board_id == board_id => {
                    task.dependencies = depends_on.clone();
                    Ok(())
                }
                _ => Err(AppError::NotFound(format!("Task {} not found", task_id))),
            }
        }
    }

    enum PendingOp {
        CreateTask(String, Task),
        Advance(String, i64, DefinitionUpdate),
    }

    /// Buffered transaction applied atomically on commit
    pub struct InMemoryTransaction {
        state: Arc<Mutex<MemoryState>>,
        pending: Vec<PendingOp>,
    }

    #[async_trait]
    impl Transaction for InMemoryTransaction {
        async fn commit(self: Box<Self>) -> Result<()> {
            let InMemoryTransaction { state, pending } = *self;
            let mut guard = state.lock().unwrap();

            // All-or-nothing: stage on a copy, swap in only if every op succeeds
            let mut staged = guard.clone();
            for op in pending {
                match op {
                    PendingOp::CreateTask(board_id, task) => {
                        staged.insert_task(&board_id, &task)?;
                    }
                    PendingOp::Advance(id, expected, update) => {
                        if !staged.advance(&id, expected, &update)? {
                            return Err(AppError::Database(format!(
                                "Definition {} changed before commit",
                                id
                            )));
                        }
                    }
                }
            }
            *guard = staged;
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl TaskRepositoryTransaction for InMemoryTransaction {
        async fn create_task(&mut self, board_id: &str, task: &Task) -> Result<()> {
            self.pending
                .push(PendingOp::CreateTask(board_id.to_string(), task.clone()));
            Ok(())
        }

        async fn advance_recurring_definition(
            &mut self,
            id: &str,
            expected_next_due_date: i64,
            update: &DefinitionUpdate,
        ) -> Result<bool> {
            let state = self.state.lock().unwrap();
            if state.failing_definitions.contains(id) {
                return Err(AppError::Database(format!(
                    "Injected storage failure for definition {}",
                    id
                )));
            }
            let matches = state
                .definitions
                .get(id)
                .map(|d| d.next_due_date == expected_next_due_date)
                .unwrap_or(false);
            drop(state);

            if matches {
                self.pending.push(PendingOp::Advance(
                    id.to_string(),
                    expected_next_due_date,
                    *update,
                ));
            }
            Ok(matches)
        }
    }

    #[async_trait]
    impl TransactionalTaskRepository for InMemoryTaskRepository {
        async fn begin_transaction(&self) -> Result<Box<dyn TaskRepositoryTransaction>> {
            Ok(Box::new(InMemoryTransaction {
                state: Arc::clone(&self.state),
                pending: Vec::new(),
            }))
        }
    }
}
