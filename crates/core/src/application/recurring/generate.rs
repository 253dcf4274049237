// Generation Pass Use Case
//
// For every active definition whose cursor is due:
//   load template -> instantiate -> advance cursor -> record activity
// Instance creation and cursor advance commit in one transaction, under the
// board lock, against a definition re-read inside that lock.

use super::RecurrenceScheduler;
use crate::application::pattern::next_due_date;
use crate::domain::{ActivityEvent, DefinitionId, DefinitionUpdate, RecurringTaskDefinition};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Why a due definition was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BoardMissing,
    TemplateMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDefinition {
    pub definition_id: DefinitionId,
    pub reason: SkipReason,
}

/// Definition whose generation hit a storage error; retried next tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDefinition {
    pub definition_id: DefinitionId,
    pub error: String,
}

/// Outcome of one generation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Instances created in this pass
    pub generated: usize,
    /// Definitions that reached their end date and were switched off
    pub deactivated: usize,
    pub skipped: Vec<SkippedDefinition>,
    pub failed: Vec<FailedDefinition>,
    /// Definitions not reached before the pass deadline
    pub deferred: Vec<DefinitionId>,
}

impl GenerationSummary {
    /// True if any due definition did not generate for a reason other than skipping
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() || !self.deferred.is_empty()
    }

    fn merge(&mut self, other: GenerationSummary) {
        self.generated += other.generated;
        self.deactivated += other.deactivated;
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
        self.deferred.extend(other.deferred);
    }

    fn skip(&mut self, definition_id: &str, reason: SkipReason) {
        self.skipped.push(SkippedDefinition {
            definition_id: definition_id.to_string(),
            reason,
        });
    }

    fn fail(&mut self, definition_id: &str, error: impl ToString) {
        self.failed.push(FailedDefinition {
            definition_id: definition_id.to_string(),
            error: error.to_string(),
        });
    }
}

/// Result of firing a single definition
enum Fired {
    Generated { deactivated: bool },
    /// Cursor already moved past `now` (concurrent or repeated pass)
    AlreadyCurrent,
    TemplateMissing,
}

impl RecurrenceScheduler {
    /// Materialize every due definition once
    ///
    /// Storage errors on individual definitions are collected in the summary;
    /// only a failure to list definitions fails the pass itself.
    pub async fn generate_due_tasks(&self, now: i64) -> Result<GenerationSummary> {
        let deadline = Instant::now() + self.config.pass_deadline;

        let mut by_board: BTreeMap<String, Vec<RecurringTaskDefinition>> = BTreeMap::new();
        for def in self.repo.list_active_recurring_definitions().await? {
            if def.is_due(now) {
                by_board.entry(def.board_id.clone()).or_default().push(def);
            }
        }

        let due: usize = by_board.values().map(Vec::len).sum();
        info!(
            now = now,
            due_definitions = due,
            boards = by_board.len(),
            "Starting generation pass"
        );

        let board_passes = by_board
            .into_iter()
            .map(|(board_id, defs)| self.generate_for_board(board_id, defs, now, deadline));

        let mut summary = GenerationSummary::default();
        for board_summary in futures::future::join_all(board_passes).await {
            summary.merge(board_summary);
        }

        if summary.is_partial() {
            warn!(
                generated = summary.generated,
                failed = summary.failed.len(),
                deferred = summary.deferred.len(),
                skipped = summary.skipped.len(),
                "Generation pass completed with failures"
            );
        } else {
            info!(
                generated = summary.generated,
                deactivated = summary.deactivated,
                skipped = summary.skipped.len(),
                "Generation pass completed"
            );
        }

        Ok(summary)
    }

    async fn generate_for_board(
        &self,
        board_id: String,
        definitions: Vec<RecurringTaskDefinition>,
        now: i64,
        deadline: Instant,
    ) -> GenerationSummary {
        let mut summary = GenerationSummary::default();

        let _guard =
            match tokio::time::timeout_at(deadline, self.board_locks.acquire(&board_id)).await {
                Ok(guard) => guard,
                Err(_) => {
                    warn!(board_id = %board_id, "Pass deadline reached waiting for board lock");
                    summary.deferred = definitions.into_iter().map(|d| d.id).collect();
                    return summary;
                }
            };

        match self.repo.get_board(&board_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(board_id = %board_id, "Board no longer exists, skipping its definitions");
                for def in &definitions {
                    summary.skip(&def.id, SkipReason::BoardMissing);
                }
                return summary;
            }
            Err(e) => {
                warn!(board_id = %board_id, error = %e, "Failed to load board");
                for def in &definitions {
                    summary.fail(&def.id, &e);
                }
                return summary;
            }
        }

        for def in definitions {
            if Instant::now() >= deadline {
                summary.deferred.push(def.id);
                continue;
            }

            match self.fire(&def.id, now).await {
                Ok(Fired::Generated { deactivated }) => {
                    summary.generated += 1;
                    if deactivated {
                        summary.deactivated += 1;
                    }
                }
                Ok(Fired::AlreadyCurrent) => {
                    debug!(definition_id = %def.id, "Definition already advanced, nothing to do");
                }
                Ok(Fired::TemplateMissing) => {
                    warn!(
                        definition_id = %def.id,
                        template_task_id = %def.template_task_id,
                        "Template task no longer exists, skipping"
                    );
                    summary.skip(&def.id, SkipReason::TemplateMissing);
                }
                Err(e) => {
                    warn!(definition_id = %def.id, error = %e, "Generation failed, will retry next tick");
                    summary.fail(&def.id, e);
                }
            }
        }

        summary
    }

    /// Fire one definition; caller holds the board lock
    async fn fire(&self, definition_id: &str, now: i64) -> Result<Fired> {
        // Re-read inside the lock: a previous pass may have advanced the cursor
        let def = match self.repo.get_recurring_definition(definition_id).await? {
            Some(def) if def.is_due(now) => def,
            _ => return Ok(Fired::AlreadyCurrent),
        };

        let Some(template) = self
            .repo
            .get_task(&def.board_id, &def.template_task_id)
            .await?
        else {
            return Ok(Fired::TemplateMissing);
        };

        let exhausted = def.pattern.is_exhausted_at(def.next_due_date);
        let next_due = if exhausted {
            def.next_due_date
        } else {
            next_due_date(def.next_due_date, &def.pattern)?
        };

        let update = DefinitionUpdate {
            next_due_date: next_due,
            last_generated_at: Some(now),
            is_active: !exhausted,
        };
        let instance = template.instantiate(
            self.id_provider.generate_id(),
            &def.id,
            def.next_due_date,
            self.time_provider.now_millis(),
        );

        let mut tx = self.tx_repo.begin_transaction().await?;
        if !tx
            .advance_recurring_definition(&def.id, def.next_due_date, &update)
            .await?
        {
            tx.rollback().await?;
            return Ok(Fired::AlreadyCurrent);
        }
        tx.create_task(&def.board_id, &instance).await?;
        tx.commit().await?;

        info!(
            definition_id = %def.id,
            task_id = %instance.id,
            due_date = def.next_due_date,
            next_due_date = next_due,
            exhausted = exhausted,
            "Generated task from recurrence"
        );

        self.activity
            .record(ActivityEvent::TaskGenerated {
                board_id: def.board_id.clone(),
                task_id: instance.id.clone(),
                definition_id: def.id.clone(),
                due_date: def.next_due_date,
            })
            .await;

        if exhausted {
            self.activity
                .record(ActivityEvent::RecurrenceExhausted {
                    board_id: def.board_id.clone(),
                    definition_id: def.id.clone(),
                })
                .await;
        }

        Ok(Fired::Generated {
            deactivated: exhausted,
        })
    }
}
