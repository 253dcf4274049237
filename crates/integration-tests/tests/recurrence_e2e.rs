//! Recurrence generation against a real SQLite database

mod common;

use common::{at, temp_db_url, Engine, BOARD};
use taskboard_core::application::{
    CreateDefinitionRequest, SkipReason, UpdateDefinitionRequest,
};
use taskboard_core::domain::{ActivityEvent, RecurrencePattern, Subtask};
use taskboard_core::port::TaskRepository;

fn weekly_monday() -> RecurrencePattern {
    RecurrencePattern::weekly_on(1, [1])
}

fn request(template: &str, pattern: RecurrencePattern, anchor: Option<i64>) -> CreateDefinitionRequest {
    CreateDefinitionRequest {
        board_id: BOARD.to_string(),
        template_task_id: template.to_string(),
        pattern,
        anchor,
    }
}

/// Weekly Monday pattern created on a Friday
#[tokio::test]
async fn test_weekly_definition_generates_once_and_advances() {
    let engine = Engine::in_memory(at(2025, 1, 3)).await;
    engine.seed_board().await;

    let mut template = taskboard_core::domain::Task::new("bins", BOARD, "Take out bins", 0);
    template.labels = vec!["chores".to_string()];
    template.subtasks = vec![Subtask {
        title: "Recycling".to_string(),
        completed: true,
    }];
    engine.repo.create_task(BOARD, &template).await.unwrap();

    let def = engine
        .scheduler
        .create_definition(request("bins", weekly_monday(), None))
        .await
        .unwrap();
    assert_eq!(def.next_due_date, at(2025, 1, 6));

    engine.time.set(at(2025, 1, 6));
    let summary = engine.scheduler.run_now().await.unwrap();
    assert_eq!(summary.generated, 1);
    assert!(!summary.is_partial());

    let instances = engine.instances_of(&def.id).await;
    assert_eq!(instances.len(), 1);
    let instance = &instances[0];
    assert_eq!(instance.title, "Take out bins");
    assert_eq!(instance.due_date, Some(at(2025, 1, 6)));
    assert_eq!(instance.labels, vec!["chores".to_string()]);
    assert!(!instance.completed);
    assert!(instance.subtasks.iter().all(|s| !s.completed));

    let stored = engine.scheduler.get_definition(&def.id).await.unwrap();
    assert_eq!(stored.next_due_date, at(2025, 1, 13));
    assert_eq!(stored.last_generated_at, Some(at(2025, 1, 6)));
    assert!(stored.is_active);
}

#[tokio::test]
async fn test_repeated_pass_at_same_instant_is_idempotent() {
    let engine = Engine::in_memory(at(2025, 1, 3)).await;
    engine.seed_board().await;
    engine.seed_task("bins", "Take out bins").await;
    let def = engine
        .scheduler
        .create_definition(request("bins", weekly_monday(), None))
        .await
        .unwrap();

    engine.time.set(at(2025, 1, 6));
    let first = engine.scheduler.run_now().await.unwrap();
    let second = engine.scheduler.run_now().await.unwrap();

    assert_eq!(first.generated, 1);
    assert_eq!(second.generated, 0);
    assert_eq!(engine.instances_of(&def.id).await.len(), 1);
}

/// Two schedulers with separate lock registries, one file-backed database
#[tokio::test]
async fn test_concurrent_passes_from_separate_schedulers_generate_once() {
    let (url, path) = temp_db_url("concurrent");
    let engine = Engine::open(&url, at(2025, 1, 3)).await;
    engine.seed_board().await;
    engine.seed_task("bins", "Take out bins").await;
    engine.seed_task("plants", "Water plants").await;

    let bins = engine
        .scheduler
        .create_definition(request("bins", weekly_monday(), None))
        .await
        .unwrap();
    let plants = engine
        .scheduler
        .create_definition(request("plants", RecurrencePattern::daily(2), None))
        .await
        .unwrap();

    engine.time.set(at(2025, 1, 6));
    let other = engine.detached_scheduler();
    let (a, b) = tokio::join!(engine.scheduler.run_now(), other.run_now());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.generated + b.generated, 2);
    assert_eq!(engine.instances_of(&bins.id).await.len(), 1);
    assert_eq!(engine.instances_of(&plants.id).await.len(), 1);

    engine.pool.close().await;
    let _ = std::fs::remove_file(path);
}

/// Months without day 31 clamp, and `day_of_month` pulls the next step back to 31
#[tokio::test]
async fn test_monthly_day_of_month_is_rederived_each_step() {
    let engine = Engine::in_memory(at(2025, 1, 10)).await;
    engine.seed_board().await;
    engine.seed_task("rent", "Pay rent").await;

    let def = engine
        .scheduler
        .create_definition(request(
            "rent",
            RecurrencePattern::monthly_on(1, 31),
            Some(at(2025, 1, 31)),
        ))
        .await
        .unwrap();
    assert_eq!(def.next_due_date, at(2025, 2, 28));

    engine.time.set(at(2025, 2, 28));
    engine.scheduler.run_now().await.unwrap();

    let stored = engine.scheduler.get_definition(&def.id).await.unwrap();
    assert_eq!(stored.next_due_date, at(2025, 3, 31));
}

/// Without `day_of_month` the clamped day carries forward
#[tokio::test]
async fn test_monthly_without_day_of_month_drifts_after_clamp() {
    let engine = Engine::in_memory(at(2025, 1, 10)).await;
    engine.seed_board().await;
    engine.seed_task("rent", "Pay rent").await;

    let def = engine
        .scheduler
        .create_definition(request(
            "rent",
            RecurrencePattern::new(taskboard_core::domain::Frequency::Monthly, 1),
            Some(at(2025, 1, 31)),
        ))
        .await
        .unwrap();
    assert_eq!(def.next_due_date, at(2025, 2, 28));

    engine.time.set(at(2025, 2, 28));
    engine.scheduler.run_now().await.unwrap();

    let stored = engine.scheduler.get_definition(&def.id).await.unwrap();
    assert_eq!(stored.next_due_date, at(2025, 3, 28));
}

#[tokio::test]
async fn test_overdue_definition_catches_up_one_step_per_pass() {
    let engine = Engine::in_memory(at(2025, 1, 3)).await;
    engine.seed_board().await;
    engine.seed_task("bins", "Take out bins").await;
    let def = engine
        .scheduler
        .create_definition(request("bins", weekly_monday(), None))
        .await
        .unwrap();

    // Three Mondays missed
    engine.time.set(at(2025, 1, 22));
    engine.scheduler.run_now().await.unwrap();
    assert_eq!(
        engine.scheduler.get_definition(&def.id).await.unwrap().next_due_date,
        at(2025, 1, 13)
    );

    engine.scheduler.run_now().await.unwrap();
    engine.scheduler.run_now().await.unwrap();
    let summary = engine.scheduler.run_now().await.unwrap();
    assert_eq!(summary.generated, 0);

    let due_dates: Vec<_> = engine
        .instances_of(&def.id)
        .await
        .into_iter()
        .map(|t| t.due_date)
        .collect();
    assert_eq!(
        due_dates,
        vec![Some(at(2025, 1, 6)), Some(at(2025, 1, 13)), Some(at(2025, 1, 20))]
    );
}

#[tokio::test]
async fn test_end_date_deactivates_and_logs_exhaustion() {
    let engine = Engine::in_memory(at(2025, 1, 1)).await;
    engine.seed_board().await;
    engine.seed_task("standup", "Standup notes").await;

    let def = engine
        .scheduler
        .create_definition(request(
            "standup",
            RecurrencePattern::daily(1).with_end_date(at(2025, 1, 3)),
            None,
        ))
        .await
        .unwrap();

    for day in 2..=5 {
        engine.time.set(at(2025, 1, day));
        engine.scheduler.run_now().await.unwrap();
    }

    let stored = engine.scheduler.get_definition(&def.id).await.unwrap();
    assert!(!stored.is_active);
    assert_eq!(engine.instances_of(&def.id).await.len(), 2);

    let entries = engine.activity.recent(BOARD, 10).await.unwrap();
    let generated = entries
        .iter()
        .filter(|e| matches!(e.event, ActivityEvent::TaskGenerated { .. }))
        .count();
    assert_eq!(generated, 2);
    assert!(matches!(
        entries[0].event,
        ActivityEvent::RecurrenceExhausted { ref definition_id, .. } if *definition_id == def.id
    ));
}

#[tokio::test]
async fn test_deleted_template_is_skipped_and_definition_kept() {
    let engine = Engine::in_memory(at(2025, 1, 3)).await;
    engine.seed_board().await;
    engine.seed_task("bins", "Take out bins").await;
    let def = engine
        .scheduler
        .create_definition(request("bins", weekly_monday(), None))
        .await
        .unwrap();

    engine.repo.delete_task(BOARD, "bins").await.unwrap();
    engine.time.set(at(2025, 1, 6));
    let summary = engine.scheduler.run_now().await.unwrap();

    assert_eq!(summary.generated, 0);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].reason, SkipReason::TemplateMissing);
    assert_eq!(
        engine.scheduler.get_definition(&def.id).await.unwrap().next_due_date,
        at(2025, 1, 6)
    );
}

#[tokio::test]
async fn test_deleting_board_cascades_to_definitions() {
    let engine = Engine::in_memory(at(2025, 1, 3)).await;
    engine.seed_board().await;
    engine.seed_task("bins", "Take out bins").await;
    let def = engine
        .scheduler
        .create_definition(request("bins", weekly_monday(), None))
        .await
        .unwrap();

    assert!(engine.repo.delete_board(BOARD).await.unwrap());
    assert!(engine
        .repo
        .get_recurring_definition(&def.id)
        .await
        .unwrap()
        .is_none());

    engine.time.set(at(2025, 1, 6));
    let summary = engine.scheduler.run_now().await.unwrap();
    assert_eq!(summary, Default::default());
}

#[tokio::test]
async fn test_definition_lifecycle_survives_reopen() {
    let (url, path) = temp_db_url("lifecycle");
    let def_id = {
        let engine = Engine::open(&url, at(2025, 1, 3)).await;
        engine.seed_board().await;
        engine.seed_task("bins", "Take out bins").await;
        let def = engine
            .scheduler
            .create_definition(request("bins", weekly_monday(), None))
            .await
            .unwrap();

        engine
            .scheduler
            .update_definition(
                &def.id,
                UpdateDefinitionRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        engine.pool.close().await;
        def.id
    };

    let engine = Engine::open(&url, at(2025, 1, 6)).await;
    let paused = engine.scheduler.get_definition(&def_id).await.unwrap();
    assert!(!paused.is_active);
    assert_eq!(engine.scheduler.run_now().await.unwrap().generated, 0);

    let resumed = engine
        .scheduler
        .update_definition(
            &def_id,
            UpdateDefinitionRequest {
                is_active: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(resumed.next_due_date, at(2025, 1, 6));
    assert_eq!(engine.scheduler.run_now().await.unwrap().generated, 1);

    // Generated instances outlive their definition
    assert!(engine.scheduler.delete_definition(&def_id).await.unwrap());
    assert_eq!(engine.instances_of(&def_id).await.len(), 1);

    engine.pool.close().await;
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_resuming_exhausted_definition_does_not_repeat_final_cycle() {
    let engine = Engine::in_memory(at(2025, 1, 1)).await;
    engine.seed_board().await;
    engine.seed_task("standup", "Standup notes").await;

    let def = engine
        .scheduler
        .create_definition(request(
            "standup",
            RecurrencePattern::daily(1).with_end_date(at(2025, 1, 2)),
            None,
        ))
        .await
        .unwrap();

    engine.time.set(at(2025, 1, 5));
    engine.scheduler.run_now().await.unwrap();
    assert!(!engine.scheduler.get_definition(&def.id).await.unwrap().is_active);

    let resumed = engine
        .scheduler
        .update_definition(
            &def.id,
            UpdateDefinitionRequest {
                is_active: Some(true),
                ..Default::default()
            },
        )
        .await;
    assert!(resumed.is_err());
    engine.scheduler.run_now().await.unwrap();

    let due_dates: Vec<_> = engine
        .instances_of(&def.id)
        .await
        .into_iter()
        .map(|t| t.due_date)
        .collect();
    assert_eq!(due_dates, vec![Some(at(2025, 1, 2))]);
    assert!(!engine.scheduler.get_definition(&def.id).await.unwrap().is_active);
}
