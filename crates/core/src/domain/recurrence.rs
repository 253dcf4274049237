// Recurrence Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::task::{BoardId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Recurring definition ID (UUID v4)
pub type DefinitionId = String;

/// Recurrence unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Stepped in days, same as `Daily`
    Custom,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
            Frequency::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            "custom" => Ok(Frequency::Custom),
            other => Err(DomainError::InvalidPattern(format!(
                "unknown frequency '{}'",
                other
            ))),
        }
    }
}

/// Rule describing how often a template task regenerates
///
/// Weekdays use 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    pub frequency: Frequency,
    pub interval: u32,
    #[serde(default)]
    pub days_of_week: BTreeSet<u8>,
    #[serde(default)]
    pub day_of_month: Option<u32>,
    #[serde(default)]
    pub end_date: Option<i64>, // epoch ms
}

impl RecurrencePattern {
    pub fn new(frequency: Frequency, interval: u32) -> Self {
        Self {
            frequency,
            interval,
            days_of_week: BTreeSet::new(),
            day_of_month: None,
            end_date: None,
        }
    }

    pub fn daily(interval: u32) -> Self {
        Self::new(Frequency::Daily, interval)
    }

    pub fn weekly_on(interval: u32, days: impl IntoIterator<Item = u8>) -> Self {
        Self {
            days_of_week: days.into_iter().collect(),
            ..Self::new(Frequency::Weekly, interval)
        }
    }

    pub fn monthly_on(interval: u32, day_of_month: u32) -> Self {
        Self {
            day_of_month: Some(day_of_month),
            ..Self::new(Frequency::Monthly, interval)
        }
    }

    pub fn with_end_date(mut self, end_date: i64) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Reject malformed rules before they are stored
    pub fn validate(&self) -> Result<()> {
        if self.interval < 1 {
            return Err(DomainError::InvalidPattern(
                "interval must be at least 1".to_string(),
            ));
        }

        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(DomainError::InvalidPattern(format!(
                    "day_of_month {} out of range 1-31",
                    day
                )));
            }
        }

        if let Some(day) = self.days_of_week.iter().find(|d| **d > 6) {
            return Err(DomainError::InvalidPattern(format!(
                "day_of_week {} out of range 0-6",
                day
            )));
        }

        Ok(())
    }

    /// `validate`, plus an end date that does not precede `start`
    ///
    /// `start` is the instant the first due date is projected from.
    pub fn validate_starting_at(&self, start: i64) -> Result<()> {
        self.validate()?;
        match self.end_date {
            Some(end) if end < start => Err(DomainError::InvalidPattern(format!(
                "end_date {} is before the start {}",
                end, start
            ))),
            _ => Ok(()),
        }
    }

    /// True once `at` has reached the end date
    pub fn is_exhausted_at(&self, at: i64) -> bool {
        matches!(self.end_date, Some(end) if at >= end)
    }
}

/// Persistent cursor of a recurrence pattern over a template task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTaskDefinition {
    pub id: DefinitionId,
    pub board_id: BoardId,
    pub template_task_id: TaskId,
    pub pattern: RecurrencePattern,
    pub next_due_date: i64, // epoch ms
    pub last_generated_at: Option<i64>,
    pub is_active: bool,
    pub created_at: i64,
}

impl RecurringTaskDefinition {
    pub fn new(
        id: impl Into<String>,
        board_id: impl Into<String>,
        template_task_id: impl Into<String>,
        pattern: RecurrencePattern,
        next_due_date: i64,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            board_id: board_id.into(),
            template_task_id: template_task_id.into(),
            pattern,
            next_due_date,
            last_generated_at: None,
            is_active: true,
            created_at,
        }
    }

    pub fn is_due(&self, now: i64) -> bool {
        self.is_active && self.next_due_date <= now
    }

    /// Apply a cursor update in place (mirrors what repositories persist)
    pub fn apply(&mut self, update: &DefinitionUpdate) {
        self.next_due_date = update.next_due_date;
        self.last_generated_at = update.last_generated_at;
        self.is_active = update.is_active;
    }
}

/// Cursor fields written back after a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionUpdate {
    pub next_due_date: i64,
    pub last_generated_at: Option<i64>,
    pub is_active: bool,
}

impl From<&RecurringTaskDefinition> for DefinitionUpdate {
    fn from(def: &RecurringTaskDefinition) -> Self {
        Self {
            next_due_date: def.next_due_date,
            last_generated_at: def.last_generated_at,
            is_active: def.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_well_formed_patterns() {
        assert!(RecurrencePattern::daily(1).validate().is_ok());
        assert!(RecurrencePattern::weekly_on(1, [0, 6]).validate().is_ok());
        assert!(RecurrencePattern::monthly_on(3, 31).validate().is_ok());
    }

    #[test]
    fn test_end_date_before_start_rejected() {
        let pattern = RecurrencePattern::daily(1).with_end_date(1_000);
        assert!(pattern.validate_starting_at(1_000).is_ok());
        assert!(pattern.validate_starting_at(500).is_ok());
        assert!(matches!(
            pattern.validate_starting_at(1_001),
            Err(DomainError::InvalidPattern(_))
        ));
        assert!(RecurrencePattern::daily(1).validate_starting_at(i64::MAX).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let err = RecurrencePattern::daily(0).validate().unwrap_err();
        assert!(matches!(err, DomainError::InvalidPattern(_)));
        assert!(err.to_string().contains("interval"));
    }

    #[test]
    fn test_validate_rejects_day_of_month_out_of_range() {
        assert!(RecurrencePattern::monthly_on(1, 0).validate().is_err());
        assert!(RecurrencePattern::monthly_on(1, 32).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_weekday_out_of_range() {
        let err = RecurrencePattern::weekly_on(1, [1, 7]).validate().unwrap_err();
        assert!(err.to_string().contains("day_of_week 7"));
    }

    #[test]
    fn test_pattern_json_shape() {
        let pattern: RecurrencePattern = serde_json::from_value(serde_json::json!({
            "frequency": "weekly",
            "interval": 1,
            "days_of_week": [3, 1, 1]
        }))
        .unwrap();

        assert_eq!(pattern.frequency, Frequency::Weekly);
        assert_eq!(pattern.days_of_week.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(pattern.day_of_month, None);
        assert_eq!(pattern.end_date, None);
    }

    #[test]
    fn test_frequency_round_trips_through_str() {
        for freq in [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Yearly,
            Frequency::Custom,
        ] {
            assert_eq!(freq.to_string().parse::<Frequency>().unwrap(), freq);
        }
        assert!("hourly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_definition_due_and_apply() {
        let mut def = RecurringTaskDefinition::new(
            "def-1",
            "board-1",
            "task-1",
            RecurrencePattern::daily(1),
            10_000,
            0,
        );
        assert!(def.is_due(10_000));
        assert!(!def.is_due(9_999));

        def.apply(&DefinitionUpdate {
            next_due_date: 20_000,
            last_generated_at: Some(10_000),
            is_active: false,
        });
        assert_eq!(def.next_due_date, 20_000);
        assert_eq!(def.last_generated_at, Some(10_000));
        assert!(!def.is_due(30_000));
    }
}
