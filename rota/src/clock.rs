// Cron occurrence math for calendar-triggered tasks

use crate::errors::CronError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// A parsed cron expression together with the zone it is evaluated in.
///
/// Expressions use the standard 5-field convention (minute, hour, day of
/// month, month, day of week); occurrence math never goes below minute
/// granularity.
#[derive(Debug, Clone)]
pub struct CronClock {
    expression: String,
    schedule: CronSchedule,
    timezone: Tz,
}

impl CronClock {
    /// Parses and validates an expression. An expression without any future
    /// occurrence is rejected here, at registration time.
    pub fn parse(expression: &str, timezone: Tz) -> Result<Self, CronError> {
        let trimmed = expression.trim();
        let fields = trimmed.split_whitespace().count();
        if fields != 5 {
            return Err(CronError::InvalidExpression {
                expression: expression.to_string(),
                reason: format!("expected 5 fields, found {fields}"),
            });
        }
        // The parser wants a seconds field; pin it to zero.
        let schedule =
            CronSchedule::from_str(&format!("0 {trimmed}")).map_err(|e| {
                CronError::InvalidExpression {
                    expression: expression.to_string(),
                    reason: e.to_string(),
                }
            })?;
        let clock = Self {
            expression: trimmed.to_string(),
            schedule,
            timezone,
        };
        if clock.next_occurrence(Utc::now()).is_none() {
            return Err(CronError::NoUpcomingOccurrence {
                expression: trimmed.to_string(),
            });
        }
        Ok(clock)
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next occurrence strictly after `reference`, in UTC.
    pub fn next_occurrence(&self, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = reference.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|next| next.with_timezone(&Utc))
    }

    /// Milliseconds from `now` until the next occurrence. Zero when the
    /// expression has no future occurrence.
    pub fn ms_until_next(&self, now: DateTime<Utc>) -> i64 {
        self.next_occurrence(now)
            .map(|next| (next - now).num_milliseconds())
            .unwrap_or(0)
    }

    /// Counts occurrences strictly between `start` and `end`.
    ///
    /// Both boundaries are excluded: an occurrence landing exactly on
    /// `start` produced the stored last-trigger row, and one landing on
    /// `end` belongs to the live timer.
    pub fn occurrences_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
        if end <= start {
            return 0;
        }
        let local = start.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .map(|next| next.with_timezone(&Utc))
            .take_while(|next| *next < end)
            .count() as u32
    }

    /// Occurrences missed between `since` and now, boundaries excluded.
    pub fn occurrences_since(&self, since: DateTime<Utc>) -> u32 {
        self.occurrences_between(since, Utc::now())
    }
}

/// Formats a number of seconds for consoles and logs, e.g. `1d 2h 5m 30s`.
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "0s".to_string();
    }
    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3_600;
    let minutes = seconds % 3_600 / 60;
    let secs = seconds % 60;
    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    if hours > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    if secs > 0 {
        out.push_str(&format!("{secs}s"));
    }
    out.trim_end().to_string()
}
