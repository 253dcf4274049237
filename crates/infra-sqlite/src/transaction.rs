// SQLite Transaction Implementation

use crate::error::map_sqlx_error;
use crate::task_repository::insert_task_row;
use async_trait::async_trait;
use sqlx::{Sqlite, Transaction as SqlxTransaction};
use taskboard_core::domain::{DefinitionUpdate, Task};
use taskboard_core::error::Result;
use taskboard_core::port::{TaskRepositoryTransaction, Transaction};

pub struct SqliteTaskTransaction {
    tx: SqlxTransaction<'static, Sqlite>,
}

impl SqliteTaskTransaction {
    pub fn new(tx: SqlxTransaction<'static, Sqlite>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transaction for SqliteTaskTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl TaskRepositoryTransaction for SqliteTaskTransaction {
    async fn create_task(&mut self, board_id: &str, task: &Task) -> Result<()> {
        insert_task_row(&mut *self.tx, board_id, task).await
    }

    async fn advance_recurring_definition(
        &mut self,
        id: &str,
        expected_next_due_date: i64,
        update: &DefinitionUpdate,
    ) -> Result<bool> {
        // Compare-and-set on the cursor: zero rows means another pass won
        let result = sqlx::query(
            r#"
            UPDATE recurring_definitions
            SET next_due_date = ?, last_generated_at = ?, is_active = ?
            WHERE id = ? AND next_due_date = ? AND is_active = 1
            "#,
        )
        .bind(update.next_due_date)
        .bind(update.last_generated_at)
        .bind(update.is_active)
        .bind(id)
        .bind(expected_next_due_date)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}
