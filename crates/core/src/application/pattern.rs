//! Pattern Calculator - projects the next due date of a recurrence pattern
//!
//! Pure calendar arithmetic over UTC timestamps (epoch ms):
//! - daily / custom: `interval` days
//! - weekly: next listed weekday, or `7 * interval` days when none are listed
//! - monthly: `interval` months, day clamped to the target month's length
//! - yearly: `interval` years, Feb 29 clamped to Feb 28 on non-leap years
//!
//! The time of day of `from` is preserved. Results later than the pattern's
//! end date are clamped to the end date.

use crate::domain::error::{DomainError, Result};
use crate::domain::{Frequency, RecurrencePattern};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

/// Compute the due date following `from` under `pattern`
///
/// # Errors
/// - `DomainError::InvalidPattern` if the pattern fails validation
/// - `DomainError::ValidationError` if the date leaves chrono's range
pub fn next_due_date(from: i64, pattern: &RecurrencePattern) -> Result<i64> {
    pattern.validate()?;

    let from_dt = to_datetime(from)?;
    let next = match pattern.frequency {
        Frequency::Daily | Frequency::Custom => add_days(from_dt, i64::from(pattern.interval))?,
        Frequency::Weekly => add_days(from_dt, weekly_step(from_dt, pattern))?,
        Frequency::Monthly => add_months(from_dt, pattern.interval, pattern.day_of_month)?,
        Frequency::Yearly => {
            let months = pattern
                .interval
                .checked_mul(12)
                .ok_or_else(|| out_of_range(from))?;
            add_months(from_dt, months, None)?
        }
    };

    let next = next.timestamp_millis();
    Ok(match pattern.end_date {
        Some(end) if next > end => end,
        _ => next,
    })
}

/// Days until the next occurrence for a weekly pattern
fn weekly_step(from: DateTime<Utc>, pattern: &RecurrencePattern) -> i64 {
    let Some(&first) = pattern.days_of_week.first() else {
        return 7 * i64::from(pattern.interval);
    };

    let current = from.weekday().num_days_from_sunday() as u8;
    match pattern.days_of_week.range(current + 1..).next() {
        Some(&day) => i64::from(day - current),
        None => i64::from(7 - current + first),
    }
}

fn add_days(from: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    from.checked_add_signed(Duration::days(days))
        .ok_or_else(|| out_of_range(from.timestamp_millis()))
}

/// Advance by whole months, then clamp the day to the target month
///
/// With `day_of_month` the day is re-derived from it on every step; without
/// it the source day is kept, so a clamped day carries forward.
fn add_months(from: DateTime<Utc>, months: u32, day_of_month: Option<u32>) -> Result<DateTime<Utc>> {
    let date = from.date_naive();
    let target_first = date
        .with_day(1)
        .and_then(|d| d.checked_add_months(Months::new(months)))
        .ok_or_else(|| out_of_range(from.timestamp_millis()))?;

    let wanted = day_of_month.unwrap_or_else(|| date.day());
    let day = wanted.min(days_in_month(target_first.year(), target_first.month()));

    let target = target_first
        .with_day(day)
        .ok_or_else(|| out_of_range(from.timestamp_millis()))?;
    Ok(target.and_time(from.time()).and_utc())
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

fn to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| out_of_range(millis))
}

fn out_of_range(millis: i64) -> DomainError {
    DomainError::ValidationError(format!("date out of range near {} ms", millis))
}
