// Activity (audit log) events

use serde::{Deserialize, Serialize};

/// Event appended to a board's activity log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityEvent {
    TaskGenerated {
        board_id: String,
        task_id: String,
        definition_id: String,
        due_date: i64,
    },
    RecurrenceExhausted {
        board_id: String,
        definition_id: String,
    },
    DependencyAdded {
        board_id: String,
        task_id: String,
        depends_on: String,
    },
    DependencyRemoved {
        board_id: String,
        task_id: String,
        depends_on: String,
    },
}

impl ActivityEvent {
    pub fn board_id(&self) -> &str {
        match self {
            ActivityEvent::TaskGenerated { board_id, .. }
            | ActivityEvent::RecurrenceExhausted { board_id, .. }
            | ActivityEvent::DependencyAdded { board_id, .. }
            | ActivityEvent::DependencyRemoved { board_id, .. } => board_id,
        }
    }

    /// Stable name stored alongside the JSON payload
    pub fn kind(&self) -> &'static str {
        match self {
            ActivityEvent::TaskGenerated { .. } => "task_generated",
            ActivityEvent::RecurrenceExhausted { .. } => "recurrence_exhausted",
            ActivityEvent::DependencyAdded { .. } => "dependency_added",
            ActivityEvent::DependencyRemoved { .. } => "dependency_removed",
        }
    }

    pub fn description(&self) -> String {
        match self {
            ActivityEvent::TaskGenerated { task_id, .. } => {
                format!("Task {} generated from recurrence", task_id)
            }
            ActivityEvent::RecurrenceExhausted { definition_id, .. } => {
                format!("Recurrence {} reached its end date", definition_id)
            }
            ActivityEvent::DependencyAdded {
                task_id, depends_on, ..
            } => format!("Task {} now depends on {}", task_id, depends_on),
            ActivityEvent::DependencyRemoved {
                task_id, depends_on, ..
            } => format!("Task {} no longer depends on {}", task_id, depends_on),
        }
    }
}
