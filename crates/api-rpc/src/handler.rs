//! RPC Method Handlers
//!
//! Thin adapters from RPC types onto the scheduler and dependency graph.

use crate::error::to_rpc_error;
use crate::types::{
    BlockedResponse, CreateRecurringRequest, DeleteRecurringRequest, DeleteRecurringResponse,
    DependencyRequest, RemoveDependencyResponse, RunResponse, ShowDependenciesRequest,
    ShowDependenciesResponse, UpdateRecurringRequest,
};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use taskboard_core::application::{DependencyGraph, RecurrenceScheduler};
use taskboard_core::domain::{DependencyEdge, RecurringTaskDefinition};
use taskboard_core::port::TimeProvider;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    scheduler: Arc<RecurrenceScheduler>,
    graph: Arc<DependencyGraph>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RpcHandler {
    pub fn new(
        scheduler: Arc<RecurrenceScheduler>,
        graph: Arc<DependencyGraph>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            scheduler,
            graph,
            time_provider,
        }
    }

    /// recurring.run.v1
    pub async fn run(&self) -> Result<RunResponse, ErrorObjectOwned> {
        let ran_at = self.time_provider.now_millis();
        let summary = self
            .scheduler
            .generate_due_tasks(ran_at)
            .await
            .map_err(to_rpc_error)?;
        Ok(RunResponse { ran_at, summary })
    }

    /// recurring.create.v1
    pub async fn create_recurring(
        &self,
        params: CreateRecurringRequest,
    ) -> Result<RecurringTaskDefinition, ErrorObjectOwned> {
        self.scheduler
            .create_definition(params)
            .await
            .map_err(to_rpc_error)
    }

    /// recurring.update.v1
    pub async fn update_recurring(
        &self,
        params: UpdateRecurringRequest,
    ) -> Result<RecurringTaskDefinition, ErrorObjectOwned> {
        self.scheduler
            .update_definition(&params.definition_id, params.changes)
            .await
            .map_err(to_rpc_error)
    }

    /// recurring.delete.v1
    pub async fn delete_recurring(
        &self,
        params: DeleteRecurringRequest,
    ) -> Result<DeleteRecurringResponse, ErrorObjectOwned> {
        let deleted = self
            .scheduler
            .delete_definition(&params.definition_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(DeleteRecurringResponse {
            definition_id: params.definition_id,
            deleted,
        })
    }

    /// dependency.add.v1
    pub async fn add_dependency(
        &self,
        params: DependencyRequest,
    ) -> Result<DependencyEdge, ErrorObjectOwned> {
        self.graph
            .add_dependency(&params.board_id, &params.task_id, &params.depends_on)
            .await
            .map_err(to_rpc_error)
    }

    /// dependency.remove.v1
    pub async fn remove_dependency(
        &self,
        params: DependencyRequest,
    ) -> Result<RemoveDependencyResponse, ErrorObjectOwned> {
        let removed = self
            .graph
            .remove_dependency(&params.board_id, &params.task_id, &params.depends_on)
            .await
            .map_err(to_rpc_error)?;
        Ok(RemoveDependencyResponse { removed })
    }

    /// dependency.show.v1
    pub async fn show_dependencies(
        &self,
        params: ShowDependenciesRequest,
    ) -> Result<ShowDependenciesResponse, ErrorObjectOwned> {
        let dependencies = self
            .graph
            .get_dependencies(&params.board_id, &params.task_id)
            .await
            .map_err(to_rpc_error)?;
        let blockers = self
            .graph
            .get_blockers(&params.board_id, &params.task_id)
            .await
            .map_err(to_rpc_error)?;
        let can_start = dependencies.iter().all(|t| t.completed);

        debug!(
            task_id = %params.task_id,
            dependencies = dependencies.len(),
            blockers = blockers.len(),
            "Dependency view served"
        );

        Ok(ShowDependenciesResponse {
            task_id: params.task_id,
            dependencies,
            blockers,
            can_start,
        })
    }

    /// dependency.blocked.v1
    pub async fn blocked(&self) -> Result<BlockedResponse, ErrorObjectOwned> {
        let tasks = self.graph.list_blocked().await.map_err(to_rpc_error)?;
        Ok(BlockedResponse { tasks })
    }
}
