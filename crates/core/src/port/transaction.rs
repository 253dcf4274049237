// Transaction port for atomic generate-and-advance

use crate::domain::{DefinitionUpdate, Task};
use crate::error::Result;
use async_trait::async_trait;

/// Transaction trait for atomic multi-step operations
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Transactional TaskRepository operations
#[async_trait]
pub trait TransactionalTaskRepository: Send + Sync {
    /// Begin a new transaction
    async fn begin_transaction(&self) -> Result<Box<dyn TaskRepositoryTransaction>>;
}

/// TaskRepository operations within a transaction
#[async_trait]
pub trait TaskRepositoryTransaction: Transaction {
    /// Insert a generated task instance (within transaction)
    async fn create_task(&mut self, board_id: &str, task: &Task) -> Result<()>;

    /// Advance a definition's cursor only if it still points at
    /// `expected_next_due_date` (within transaction)
    ///
    /// Returns false when another pass already moved the cursor.
    async fn advance_recurring_definition(
        &mut self,
        id: &str,
        expected_next_due_date: i64,
        update: &DefinitionUpdate,
    ) -> Result<bool>;
}
