// SQLite TaskRepository Implementation

use crate::error::{decode_json, map_sqlx_error};
use crate::SqliteTaskTransaction;
use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use taskboard_core::domain::{
    Board, DefinitionUpdate, Frequency, RecurrencePattern, RecurringTaskDefinition, Subtask, Task,
    TaskId,
};
use taskboard_core::error::{AppError, Result};
use taskboard_core::port::{
    TaskRepository, TaskRepositoryTransaction, TransactionalTaskRepository,
};

const TASK_COLUMNS: &str = "id, board_id, title, description, column_name, labels, completed, \
                            due_date, subtasks, recurring_definition_id, created_at";

const DEFINITION_COLUMNS: &str = "id, board_id, template_task_id, frequency, interval, \
                                  days_of_week, day_of_month, end_date, next_due_date, \
                                  last_generated_at, is_active, created_at";

pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn edges_of_board(&self, board_id: &str) -> Result<HashMap<TaskId, BTreeSet<TaskId>>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT task_id, depends_on_task_id FROM task_dependencies WHERE board_id = ?",
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut edges: HashMap<TaskId, BTreeSet<TaskId>> = HashMap::new();
        for (task_id, depends_on) in rows {
            edges.entry(task_id).or_default().insert(depends_on);
        }
        Ok(edges)
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn insert_board(&self, board: &Board) -> Result<()> {
        sqlx::query("INSERT INTO boards (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&board.id)
            .bind(&board.name)
            .bind(board.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_board(&self, board_id: &str) -> Result<Option<Board>> {
        let row: Option<BoardRow> =
            sqlx::query_as("SELECT id, name, created_at FROM boards WHERE id = ?")
                .bind(board_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(BoardRow::into_board))
    }

    async fn list_boards(&self) -> Result<Vec<Board>> {
        let rows: Vec<BoardRow> =
            sqlx::query_as("SELECT id, name, created_at FROM boards ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(BoardRow::into_board).collect())
    }

    async fn delete_board(&self, board_id: &str) -> Result<bool> {
        // Tasks, edges and definitions go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM boards WHERE id = ?")
            .bind(board_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_task(&self, board_id: &str, task_id: &str) -> Result<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tasks WHERE id = ? AND board_id = ?",
            TASK_COLUMNS
        ))
        .bind(task_id)
        .bind(board_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let dependencies = self.get_dependency_edges(board_id, task_id).await?;
        row.into_task(dependencies).map(Some)
    }

    async fn list_tasks(&self, board_id: &str) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tasks WHERE board_id = ? ORDER BY created_at, id",
            TASK_COLUMNS
        ))
        .bind(board_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut edges = self.edges_of_board(board_id).await?;
        rows.into_iter()
            .map(|row| {
                let deps = edges.remove(&row.id).unwrap_or_default();
                row.into_task(deps)
            })
            .collect()
    }

    async fn create_task(&self, board_id: &str, task: &Task) -> Result<Task> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        insert_task_row(&mut *tx, board_id, task).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        let mut created = task.clone();
        created.board_id = board_id.to_string();
        Ok(created)
    }

    async fn update_task(&self, task: &Task) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET title = ?, description = ?, column_name = ?, labels = ?,
                completed = ?, due_date = ?, subtasks = ?
            WHERE id = ? AND board_id = ?
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.column)
        .bind(serde_json::to_string(&task.labels)?)
        .bind(task.completed)
        .bind(task.due_date)
        .bind(serde_json::to_string(&task.subtasks)?)
        .bind(&task.id)
        .bind(&task.board_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_task(&self, board_id: &str, task_id: &str) -> Result<bool> {
        // Edges in both directions are dropped by ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND board_id = ?")
            .bind(task_id)
            .bind(board_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active_recurring_definitions(&self) -> Result<Vec<RecurringTaskDefinition>> {
        let rows: Vec<DefinitionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM recurring_definitions WHERE is_active = 1 ORDER BY next_due_date, id",
            DEFINITION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(DefinitionRow::into_definition).collect()
    }

    async fn get_recurring_definition(&self, id: &str) -> Result<Option<RecurringTaskDefinition>> {
        let row: Option<DefinitionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM recurring_definitions WHERE id = ?",
            DEFINITION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(DefinitionRow::into_definition).transpose()
    }

    async fn insert_recurring_definition(&self, definition: &RecurringTaskDefinition) -> Result<()> {
        let pattern = &definition.pattern;
        sqlx::query(&format!(
            "INSERT INTO recurring_definitions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            DEFINITION_COLUMNS
        ))
        .bind(&definition.id)
        .bind(&definition.board_id)
        .bind(&definition.template_task_id)
        .bind(pattern.frequency.to_string())
        .bind(i64::from(pattern.interval))
        .bind(serde_json::to_string(&pattern.days_of_week)?)
        .bind(pattern.day_of_month.map(i64::from))
        .bind(pattern.end_date)
        .bind(definition.next_due_date)
        .bind(definition.last_generated_at)
        .bind(definition.is_active)
        .bind(definition.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_recurring_definition(
        &self,
        id: &str,
        update: &DefinitionUpdate,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE recurring_definitions
            SET next_due_date = ?, last_generated_at = ?, is_active = ?
            WHERE id = ?
            "#,
        )
        .bind(update.next_due_date)
        .bind(update.last_generated_at)
        .bind(update.is_active)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_recurring_pattern(
        &self,
        id: &str,
        pattern: &RecurrencePattern,
        next_due_date: i64,
        is_active: bool,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE recurring_definitions
            SET frequency = ?, interval = ?, days_of_week = ?, day_of_month = ?,
                end_date = ?, next_due_date = ?, is_active = ?
            WHERE id = ?
            "#,
        )
        .bind(pattern.frequency.to_string())
        .bind(i64::from(pattern.interval))
        .bind(serde_json::to_string(&pattern.days_of_week)?)
        .bind(pattern.day_of_month.map(i64::from))
        .bind(pattern.end_date)
        .bind(next_due_date)
        .bind(is_active)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_recurring_definition(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recurring_definitions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_dependency_edges(&self, board_id: &str, task_id: &str) -> Result<BTreeSet<TaskId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT depends_on_task_id FROM task_dependencies WHERE board_id = ? AND task_id = ?",
        )
        .bind(board_id)
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(ids.into_iter().collect())
    }

    async fn set_dependency_edges(
        &self,
        board_id: &str,
        task_id: &str,
        depends_on: &BTreeSet<TaskId>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE id = ? AND board_id = ?")
            .bind(task_id)
            .bind(board_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if exists == 0 {
            return Err(AppError::NotFound(format!("Task {} not found", task_id)));
        }

        sqlx::query("DELETE FROM task_dependencies WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        insert_edges(&mut *tx, board_id, task_id, depends_on).await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl TransactionalTaskRepository for SqliteTaskRepository {
    async fn begin_transaction(&self) -> Result<Box<dyn TaskRepositoryTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteTaskTransaction::new(tx)))
    }
}

/// Insert a task row plus its edges on an open connection
pub(crate) async fn insert_task_row(
    conn: &mut SqliteConnection,
    board_id: &str,
    task: &Task,
) -> Result<()> {
    let board_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM boards WHERE id = ?")
        .bind(board_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    if board_exists == 0 {
        return Err(AppError::NotFound(format!("Board {} not found", board_id)));
    }

    sqlx::query(&format!(
        "INSERT INTO tasks ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        TASK_COLUMNS
    ))
    .bind(&task.id)
    .bind(board_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.column)
    .bind(serde_json::to_string(&task.labels)?)
    .bind(task.completed)
    .bind(task.due_date)
    .bind(serde_json::to_string(&task.subtasks)?)
    .bind(&task.recurring_definition_id)
    .bind(task.created_at)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    insert_edges(conn, board_id, &task.id, &task.dependencies).await
}

async fn insert_edges(
    conn: &mut SqliteConnection,
    board_id: &str,
    task_id: &str,
    depends_on: &BTreeSet<TaskId>,
) -> Result<()> {
    for target in depends_on {
        sqlx::query(
            "INSERT INTO task_dependencies (board_id, task_id, depends_on_task_id) VALUES (?, ?, ?)",
        )
        .bind(board_id)
        .bind(task_id)
        .bind(target)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    }
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct BoardRow {
    id: String,
    name: String,
    created_at: i64,
}

impl BoardRow {
    fn into_board(self) -> Board {
        Board {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: String,
    board_id: String,
    title: String,
    description: Option<String>,
    column_name: Option<String>,
    labels: String,   // JSON
    completed: bool,
    due_date: Option<i64>,
    subtasks: String, // JSON
    recurring_definition_id: Option<String>,
    created_at: i64,
}

impl TaskRow {
    fn into_task(self, dependencies: BTreeSet<TaskId>) -> Result<Task> {
        let labels: Vec<String> = decode_json("labels", &self.labels)?;
        let subtasks: Vec<Subtask> = decode_json("subtasks", &self.subtasks)?;

        Ok(Task {
            id: self.id,
            board_id: self.board_id,
            title: self.title,
            description: self.description,
            column: self.column_name,
            labels,
            completed: self.completed,
            due_date: self.due_date,
            subtasks,
            dependencies,
            recurring_definition_id: self.recurring_definition_id,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DefinitionRow {
    id: String,
    board_id: String,
    template_task_id: String,
    frequency: String,
    interval: i64,
    days_of_week: String, // JSON
    day_of_month: Option<i64>,
    end_date: Option<i64>,
    next_due_date: i64,
    last_generated_at: Option<i64>,
    is_active: bool,
    created_at: i64,
}

impl DefinitionRow {
    fn into_definition(self) -> Result<RecurringTaskDefinition> {
        let frequency: Frequency = self.frequency.parse()?;
        let interval = u32::try_from(self.interval).map_err(|_| {
            AppError::Database(format!("Definition {} has invalid interval", self.id))
        })?;
        let day_of_month = self
            .day_of_month
            .map(u32::try_from)
            .transpose()
            .map_err(|_| {
                AppError::Database(format!("Definition {} has invalid day_of_month", self.id))
            })?;

        Ok(RecurringTaskDefinition {
            pattern: RecurrencePattern {
                frequency,
                interval,
                days_of_week: decode_json("days_of_week", &self.days_of_week)?,
                day_of_month,
                end_date: self.end_date,
            },
            id: self.id,
            board_id: self.board_id,
            template_task_id: self.template_task_id,
            next_due_date: self.next_due_date,
            last_generated_at: self.last_generated_at,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}
