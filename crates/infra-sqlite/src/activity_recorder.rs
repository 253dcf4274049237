// SQLite ActivityRecorder - appends events to activity_log

use crate::error::{decode_json, map_sqlx_error};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use taskboard_core::domain::ActivityEvent;
use taskboard_core::error::Result;
use taskboard_core::port::{ActivityRecorder, TimeProvider};
use tracing::{debug, warn};

/// Stored activity entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub id: i64,
    pub event: ActivityEvent,
    pub created_at: i64,
}

pub struct SqliteActivityRecorder {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteActivityRecorder {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    async fn append(&self, event: &ActivityEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO activity_log (board_id, kind, payload, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(event.board_id())
        .bind(event.kind())
        .bind(serde_json::to_string(event)?)
        .bind(self.time_provider.now_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Most recent entries of a board, newest first
    pub async fn recent(&self, board_id: &str, limit: u32) -> Result<Vec<ActivityEntry>> {
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT id, payload, created_at FROM activity_log WHERE board_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(board_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(id, payload, created_at)| {
                Ok(ActivityEntry {
                    id,
                    event: decode_json("payload", &payload)?,
                    created_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ActivityRecorder for SqliteActivityRecorder {
    async fn record(&self, event: ActivityEvent) {
        // Losing an audit line never fails the operation that produced it
        match self.append(&event).await {
            Ok(()) => debug!(
                board_id = %event.board_id(),
                kind = event.kind(),
                "{}",
                event.description()
            ),
            Err(e) => warn!(
                board_id = %event.board_id(),
                kind = event.kind(),
                error = %e,
                "Failed to record activity"
            ),
        }
    }
}
