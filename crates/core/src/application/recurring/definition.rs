// Definition lifecycle: create / update / delete recurring definitions

use super::RecurrenceScheduler;
use crate::application::pattern::next_due_date;
use crate::domain::{DefinitionUpdate, DomainError, RecurrencePattern, RecurringTaskDefinition};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Attach a recurrence pattern to an existing template task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDefinitionRequest {
    pub board_id: String,
    pub template_task_id: String,
    pub pattern: RecurrencePattern,
    /// Date the first due date is projected from (defaults to now)
    #[serde(default)]
    pub anchor: Option<i64>,
}

/// Partial update; absent fields are left as they are
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDefinitionRequest {
    #[serde(default)]
    pub pattern: Option<RecurrencePattern>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl RecurrenceScheduler {
    /// Create a definition whose first due date follows the anchor
    ///
    /// # Errors
    /// - `InvalidPattern` when the pattern fails validation or ends before the anchor
    /// - `NotFound` when the board or template task does not exist
    pub async fn create_definition(
        &self,
        request: CreateDefinitionRequest,
    ) -> Result<RecurringTaskDefinition> {
        let now = self.time_provider.now_millis();
        let anchor = request.anchor.unwrap_or(now);
        request.pattern.validate_starting_at(anchor)?;

        let _guard = self.board_locks.acquire(&request.board_id).await;

        if self.repo.get_board(&request.board_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Board {} not found",
                request.board_id
            )));
        }
        if self
            .repo
            .get_task(&request.board_id, &request.template_task_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "Task {} not found",
                request.template_task_id
            )));
        }

        let first_due = next_due_date(anchor, &request.pattern)?;

        let definition = RecurringTaskDefinition::new(
            self.id_provider.generate_id(),
            request.board_id,
            request.template_task_id,
            request.pattern,
            first_due,
            now,
        );
        self.repo.insert_recurring_definition(&definition).await?;

        info!(
            definition_id = %definition.id,
            board_id = %definition.board_id,
            frequency = %definition.pattern.frequency,
            next_due_date = definition.next_due_date,
            "Recurring definition created"
        );

        Ok(definition)
    }

    /// Apply a pattern and/or active-flag change in a single write
    ///
    /// A new pattern restarts the cursor from now. Re-activating without a new
    /// pattern keeps the old cursor, and is refused once the final instance
    /// at the end date has been generated.
    pub async fn update_definition(
        &self,
        definition_id: &str,
        request: UpdateDefinitionRequest,
    ) -> Result<RecurringTaskDefinition> {
        let now = self.time_provider.now_millis();
        if let Some(pattern) = &request.pattern {
            pattern.validate_starting_at(now)?;
        }

        let board_id = self.load_definition(definition_id).await?.board_id;
        let _guard = self.board_locks.acquire(&board_id).await;

        // Re-read under the lock; a pass may have advanced the cursor meanwhile
        let mut definition = self.load_definition(definition_id).await?;
        let is_active = request.is_active.unwrap_or(definition.is_active);

        match request.pattern {
            Some(pattern) => {
                let next_due = next_due_date(now, &pattern)?;
                self.repo
                    .replace_recurring_pattern(definition_id, &pattern, next_due, is_active)
                    .await?;
                definition.pattern = pattern;
                definition.next_due_date = next_due;
                definition.is_active = is_active;
            }
            None if is_active != definition.is_active => {
                if is_active && self.final_instance_generated(&definition).await? {
                    return Err(DomainError::ValidationError(format!(
                        "Recurring definition {} already generated its final task; \
                         set a new pattern or end date to resume it",
                        definition_id
                    ))
                    .into());
                }

                let update = DefinitionUpdate {
                    is_active,
                    ..DefinitionUpdate::from(&definition)
                };
                self.repo
                    .update_recurring_definition(definition_id, &update)
                    .await?;
                definition.apply(&update);
            }
            None => {}
        }

        info!(
            definition_id = %definition.id,
            next_due_date = definition.next_due_date,
            is_active = definition.is_active,
            "Recurring definition updated"
        );

        Ok(definition)
    }

    /// True if the cursor sits on the end date and that cycle's instance exists
    async fn final_instance_generated(&self, definition: &RecurringTaskDefinition) -> Result<bool> {
        if !definition.pattern.is_exhausted_at(definition.next_due_date) {
            return Ok(false);
        }
        let tasks = self.repo.list_tasks(&definition.board_id).await?;
        Ok(tasks.iter().any(|t| {
            t.recurring_definition_id.as_deref() == Some(definition.id.as_str())
                && t.due_date == Some(definition.next_due_date)
        }))
    }

    /// Delete a definition; instances already generated are kept
    pub async fn delete_definition(&self, definition_id: &str) -> Result<bool> {
        let Some(definition) = self.repo.get_recurring_definition(definition_id).await? else {
            return Ok(false);
        };
        let _guard = self.board_locks.acquire(&definition.board_id).await;

        let deleted = self.repo.delete_recurring_definition(definition_id).await?;
        if deleted {
            info!(definition_id = %definition_id, "Recurring definition deleted");
        }
        Ok(deleted)
    }

    pub async fn get_definition(&self, definition_id: &str) -> Result<RecurringTaskDefinition> {
        self.load_definition(definition_id).await
    }

    async fn load_definition(&self, definition_id: &str) -> Result<RecurringTaskDefinition> {
        self.repo
            .get_recurring_definition(definition_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Recurring definition {} not found", definition_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::super::SchedulerConfig;
    use super::*;
    use crate::application::board_lock::BoardLocks;
    use crate::domain::{Board, DomainError, Frequency, Task};
    use crate::port::activity_recorder::mocks::RecordingActivityRecorder;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::task_repository::mocks::InMemoryTaskRepository;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use crate::port::TaskRepository;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn at(y: i32, m: u32, d: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    async fn setup() -> (InMemoryTaskRepository, Arc<FixedTimeProvider>, RecurrenceScheduler) {
        let repo = InMemoryTaskRepository::new();
        repo.insert_board(&Board::new("b1", "Home", 0)).await.unwrap();
        repo.create_task("b1", &Task::new("tpl", "b1", "Take out bins", 0))
            .await
            .unwrap();

        let time = Arc::new(FixedTimeProvider::new(at(2025, 1, 3)));
        let scheduler = RecurrenceScheduler::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(RecordingActivityRecorder::new()),
            Arc::new(SequentialIdProvider::new("def")),
            time.clone(),
            Arc::new(BoardLocks::new()),
            SchedulerConfig::default(),
        );
        (repo, time, scheduler)
    }

    fn request(pattern: RecurrencePattern) -> CreateDefinitionRequest {
        CreateDefinitionRequest {
            board_id: "b1".to_string(),
            template_task_id: "tpl".to_string(),
            pattern,
            anchor: None,
        }
    }

    #[tokio::test]
    async fn test_create_projects_first_due_from_now() {
        let (repo, _time, scheduler) = setup().await;

        // now is Friday 2025-01-03
        let def = scheduler
            .create_definition(request(RecurrencePattern::weekly_on(1, [1])))
            .await
            .unwrap();

        assert_eq!(def.next_due_date, at(2025, 1, 6));
        assert!(def.is_active);
        assert_eq!(def.created_at, at(2025, 1, 3));
        assert_eq!(
            repo.get_recurring_definition(&def.id).await.unwrap(),
            Some(def)
        );
    }

    #[tokio::test]
    async fn test_create_honours_anchor() {
        let (_repo, _time, scheduler) = setup().await;
        let mut req = request(RecurrencePattern::monthly_on(1, 31));
        req.anchor = Some(at(2025, 1, 31));

        let def = scheduler.create_definition(req).await.unwrap();
        assert_eq!(def.next_due_date, at(2025, 2, 28));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_pattern() {
        let (repo, _time, scheduler) = setup().await;
        let err = scheduler
            .create_definition(request(RecurrencePattern::daily(0)))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Domain(DomainError::InvalidPattern(_))));
        assert!(repo.list_active_recurring_definitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_template() {
        let (_repo, _time, scheduler) = setup().await;
        let mut req = request(RecurrencePattern::daily(1));
        req.template_task_id = "missing".to_string();

        let err = scheduler.create_definition(req).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_pattern_recomputes_cursor_from_now() {
        let (_repo, time, scheduler) = setup().await;
        let def = scheduler
            .create_definition(request(RecurrencePattern::daily(1)))
            .await
            .unwrap();

        time.set(at(2025, 2, 10));
        let updated = scheduler
            .update_definition(
                &def.id,
                UpdateDefinitionRequest {
                    pattern: Some(RecurrencePattern::new(Frequency::Weekly, 2)),
                    is_active: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.pattern.frequency, Frequency::Weekly);
        assert_eq!(updated.next_due_date, at(2025, 2, 24));
        assert_eq!(scheduler.get_definition(&def.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_pattern_without_change() {
        let (_repo, _time, scheduler) = setup().await;
        let def = scheduler
            .create_definition(request(RecurrencePattern::daily(1)))
            .await
            .unwrap();

        let err = scheduler
            .update_definition(
                &def.id,
                UpdateDefinitionRequest {
                    pattern: Some(RecurrencePattern::monthly_on(1, 40)),
                    is_active: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Domain(DomainError::InvalidPattern(_))));
        assert_eq!(scheduler.get_definition(&def.id).await.unwrap(), def);
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let (repo, _time, scheduler) = setup().await;
        let def = scheduler
            .create_definition(request(RecurrencePattern::daily(1)))
            .await
            .unwrap();

        let paused = scheduler
            .update_definition(
                &def.id,
                UpdateDefinitionRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!paused.is_active);
        assert_eq!(paused.next_due_date, def.next_due_date);
        assert!(repo.list_active_recurring_definitions().await.unwrap().is_empty());

        let resumed = scheduler
            .update_definition(
                &def.id,
                UpdateDefinitionRequest {
                    is_active: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(resumed.is_active);
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_definition() {
        let (_repo, _time, scheduler) = setup().await;

        let err = scheduler
            .update_definition("nope", UpdateDefinitionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(!scheduler.delete_definition("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_definition() {
        let (repo, _time, scheduler) = setup().await;
        let def = scheduler
            .create_definition(request(RecurrencePattern::daily(1)))
            .await
            .unwrap();

        assert!(scheduler.delete_definition(&def.id).await.unwrap());
        assert_eq!(repo.get_recurring_definition(&def.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_rejects_end_date_before_anchor() {
        let (repo, _time, scheduler) = setup().await;
        let mut req = request(RecurrencePattern::daily(1).with_end_date(at(2025, 1, 1)));
        req.anchor = Some(at(2025, 1, 2));

        let err = scheduler.create_definition(req).await.unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::InvalidPattern(_))));

        // Without an anchor the clock (2025-01-03) is the start
        let err = scheduler
            .create_definition(request(
                RecurrencePattern::daily(1).with_end_date(at(2025, 1, 2)),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::InvalidPattern(_))));
        assert!(repo.list_active_recurring_definitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_end_date_in_the_past() {
        let (_repo, time, scheduler) = setup().await;
        let def = scheduler
            .create_definition(request(RecurrencePattern::daily(1)))
            .await
            .unwrap();

        time.set(at(2025, 2, 1));
        let err = scheduler
            .update_definition(
                &def.id,
                UpdateDefinitionRequest {
                    pattern: Some(RecurrencePattern::daily(1).with_end_date(at(2025, 1, 20))),
                    is_active: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Domain(DomainError::InvalidPattern(_))));
        assert_eq!(scheduler.get_definition(&def.id).await.unwrap(), def);
    }

    #[tokio::test]
    async fn test_pattern_and_pause_written_together() {
        let (repo, _time, scheduler) = setup().await;
        let def = scheduler
            .create_definition(request(RecurrencePattern::daily(1)))
            .await
            .unwrap();
        let writes = repo.definition_writes();

        let updated = scheduler
            .update_definition(
                &def.id,
                UpdateDefinitionRequest {
                    pattern: Some(RecurrencePattern::weekly_on(1, [1])),
                    is_active: Some(false),
                },
            )
            .await
            .unwrap();

        assert_eq!(repo.definition_writes(), writes + 1);
        assert!(!updated.is_active);
        assert_eq!(updated.next_due_date, at(2025, 1, 6));
        assert_eq!(scheduler.get_definition(&def.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_definition_untouched() {
        let (repo, _time, scheduler) = setup().await;
        let def = scheduler
            .create_definition(request(RecurrencePattern::daily(1)))
            .await
            .unwrap();
        repo.fail_definition(&def.id);

        let err = scheduler
            .update_definition(
                &def.id,
                UpdateDefinitionRequest {
                    pattern: Some(RecurrencePattern::weekly_on(1, [1])),
                    is_active: Some(false),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(scheduler.get_definition(&def.id).await.unwrap(), def);
    }

    #[tokio::test]
    async fn test_resume_after_final_instance_is_refused() {
        let (repo, time, scheduler) = setup().await;
        // Created 2025-01-03: due 01-04, then the final cycle on 01-05
        let def = scheduler
            .create_definition(request(
                RecurrencePattern::daily(1).with_end_date(at(2025, 1, 5)),
            ))
            .await
            .unwrap();

        for day in [4, 5, 8] {
            time.set(at(2025, 1, day));
            scheduler.run_now().await.unwrap();
        }
        assert!(!scheduler.get_definition(&def.id).await.unwrap().is_active);

        let resume = UpdateDefinitionRequest {
            is_active: Some(true),
            ..Default::default()
        };
        let err = scheduler
            .update_definition(&def.id, resume)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::ValidationError(_))));

        scheduler.run_now().await.unwrap();
        assert_eq!(repo.instances_of(&def.id).len(), 2);

        // A new end date brings it back from now
        let extended = scheduler
            .update_definition(
                &def.id,
                UpdateDefinitionRequest {
                    pattern: Some(RecurrencePattern::daily(1).with_end_date(at(2025, 1, 20))),
                    is_active: Some(true),
                },
            )
            .await
            .unwrap();
        assert!(extended.is_active);
        assert_eq!(extended.next_due_date, at(2025, 1, 9));
    }

    #[tokio::test]
    async fn test_resume_before_final_cycle_is_allowed() {
        let (repo, time, scheduler) = setup().await;
        let def = scheduler
            .create_definition(request(
                RecurrencePattern::daily(1).with_end_date(at(2025, 1, 5)),
            ))
            .await
            .unwrap();

        // Cursor lands on the end date, then the definition is paused
        time.set(at(2025, 1, 4));
        scheduler.run_now().await.unwrap();
        let pause = UpdateDefinitionRequest {
            is_active: Some(false),
            ..Default::default()
        };
        scheduler.update_definition(&def.id, pause).await.unwrap();

        let resume = UpdateDefinitionRequest {
            is_active: Some(true),
            ..Default::default()
        };
        let resumed = scheduler.update_definition(&def.id, resume).await.unwrap();
        assert_eq!(resumed.next_due_date, at(2025, 1, 5));

        time.set(at(2025, 1, 5));
        scheduler.run_now().await.unwrap();
        assert_eq!(repo.instances_of(&def.id).len(), 2);
        assert!(!scheduler.get_definition(&def.id).await.unwrap().is_active);
    }
}
