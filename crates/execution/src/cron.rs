//! Five-field cron expressions for the poll cadence.
//!
//! Format: `minute hour day month weekday`. Each field accepts `*`, `*/n`,
//! `a`, `a-b`, `a-b/n` and comma-separated lists of those. Weekday 0 is
//! Sunday; 7 is accepted as Sunday too.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, DurationRound, Timelike};
use tasksched_core::Time;

/// Cron parse errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CronError {
    /// Wrong number of fields
    #[error("cron expression must have 5 fields, got {0}")]
    FieldCount(usize),

    /// A field could not be parsed
    #[error("invalid {field} field '{value}': {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Offending text
        value: String,
        /// What was wrong
        reason: String,
    },
}

#[derive(Debug, Clone, Copy)]
struct FieldBounds {
    name: &'static str,
    min: u32,
    max: u32,
}

const MINUTE: FieldBounds = FieldBounds { name: "minute", min: 0, max: 59 };
const HOUR: FieldBounds = FieldBounds { name: "hour", min: 0, max: 23 };
const DAY: FieldBounds = FieldBounds { name: "day", min: 1, max: 31 };
const MONTH: FieldBounds = FieldBounds { name: "month", min: 1, max: 12 };
const WEEKDAY: FieldBounds = FieldBounds { name: "weekday", min: 0, max: 7 };

/// Upper bound on the search in [`CronExpression::next_after`].
const SEARCH_HORIZON_DAYS: i64 = 366;

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    weekdays: u64,
}

impl CronExpression {
    /// Parse an expression.
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(CronError::FieldCount(parts.len()));
        }

        let mut weekdays = parse_field(parts[4], WEEKDAY)?;
        // 7 is Sunday
        if weekdays & (1 << 7) != 0 {
            weekdays = (weekdays & !(1 << 7)) | 1;
        }

        Ok(Self {
            source: parts.join(" "),
            minutes: parse_field(parts[0], MINUTE)?,
            hours: parse_field(parts[1], HOUR)?,
            days: parse_field(parts[2], DAY)?,
            months: parse_field(parts[3], MONTH)?,
            weekdays,
        })
    }

    /// Whether the expression fires at the minute containing `time`.
    pub fn matches(&self, time: &Time) -> bool {
        bit(self.minutes, time.minute())
            && bit(self.hours, time.hour())
            && bit(self.days, time.day())
            && bit(self.months, time.month())
            && bit(self.weekdays, time.weekday().num_days_from_sunday())
    }

    /// First matching minute boundary strictly after `after`.
    ///
    /// Returns `None` if nothing matches within a year (e.g. `0 0 31 2 *`).
    pub fn next_after(&self, after: &Time) -> Option<Time> {
        let minute = Duration::minutes(1);
        let mut candidate = after.duration_trunc(minute).ok()? + minute;
        let horizon = *after + Duration::days(SEARCH_HORIZON_DAYS);

        while candidate <= horizon {
            if !bit(self.months, candidate.month()) {
                candidate = start_of_next_day(candidate)?;
                continue;
            }
            if !bit(self.days, candidate.day())
                || !bit(self.weekdays, candidate.weekday().num_days_from_sunday())
            {
                candidate = start_of_next_day(candidate)?;
                continue;
            }
            if !bit(self.hours, candidate.hour()) {
                candidate = candidate.duration_trunc(Duration::hours(1)).ok()? + Duration::hours(1);
                continue;
            }
            if bit(self.minutes, candidate.minute()) {
                return Some(candidate);
            }
            candidate += minute;
        }
        None
    }
}

impl FromStr for CronExpression {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn bit(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

fn start_of_next_day(time: Time) -> Option<Time> {
    Some(time.duration_trunc(Duration::days(1)).ok()? + Duration::days(1))
}

fn parse_field(text: &str, bounds: FieldBounds) -> Result<u64, CronError> {
    let invalid = |reason: String| CronError::InvalidField {
        field: bounds.name,
        value: text.to_string(),
        reason,
    };

    let mut mask = 0u64;
    for item in text.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| invalid(format!("bad step '{}'", step)))?;
                if step == 0 {
                    return Err(invalid("step must be positive".to_string()));
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (start, end) = if range == "*" {
            (bounds.min, bounds.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (number(a, bounds).map_err(invalid)?, number(b, bounds).map_err(invalid)?)
        } else {
            let value = number(range, bounds).map_err(invalid)?;
            // `a/n` runs from a to the end of the range
            if step > 1 { (value, bounds.max) } else { (value, value) }
        };
        if start > end {
            return Err(invalid(format!("range {}-{} is reversed", start, end)));
        }

        for value in (start..=end).step_by(step as usize) {
            mask |= 1 << value;
        }
    }
    Ok(mask)
}

fn number(text: &str, bounds: FieldBounds) -> Result<u32, String> {
    let value: u32 = text.parse().map_err(|_| format!("'{}' is not a number", text))?;
    if value < bounds.min || value > bounds.max {
        return Err(format!("{} is outside {}-{}", value, bounds.min, bounds.max));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Time {
        chrono::Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_every_minute() {
        let cron = CronExpression::parse("*/1 * * * *").unwrap();
        assert_eq!(cron.next_after(&at(2026, 1, 1, 10, 0, 30)), Some(at(2026, 1, 1, 10, 1, 0)));
        assert_eq!(cron.next_after(&at(2026, 1, 1, 10, 0, 0)), Some(at(2026, 1, 1, 10, 1, 0)));
    }

    #[test]
    fn test_step_and_range() {
        let cron = CronExpression::parse("*/15 9-17 * * 1-5").unwrap();
        // Saturday 2026-01-03 → Monday 09:00
        assert_eq!(cron.next_after(&at(2026, 1, 3, 12, 0, 0)), Some(at(2026, 1, 5, 9, 0, 0)));
        assert_eq!(cron.next_after(&at(2026, 1, 5, 9, 7, 0)), Some(at(2026, 1, 5, 9, 15, 0)));
        assert_eq!(cron.next_after(&at(2026, 1, 5, 17, 45, 0)), Some(at(2026, 1, 6, 9, 0, 0)));
    }

    #[test]
    fn test_lists_and_stepped_ranges() {
        let cron = CronExpression::parse("0,30 0-12/6 * * *").unwrap();
        assert!(cron.matches(&at(2026, 1, 1, 6, 30, 0)));
        assert!(cron.matches(&at(2026, 1, 1, 12, 0, 0)));
        assert!(!cron.matches(&at(2026, 1, 1, 7, 0, 0)));
        assert!(!cron.matches(&at(2026, 1, 1, 18, 0, 0)));
    }

    #[test]
    fn test_step_wider_than_range() {
        let cron = CronExpression::parse("1-59/4294967295 * * * *").unwrap();
        assert!(cron.matches(&at(2026, 1, 1, 8, 1, 0)));
        assert!(!cron.matches(&at(2026, 1, 1, 8, 2, 0)));
        assert_eq!(cron.next_after(&at(2026, 1, 1, 8, 1, 0)), Some(at(2026, 1, 1, 9, 1, 0)));

        let cron = CronExpression::parse("50/4294967290 * * * *").unwrap();
        assert!(cron.matches(&at(2026, 1, 1, 8, 50, 0)));
        assert!(!cron.matches(&at(2026, 1, 1, 8, 51, 0)));
    }

    #[test]
    fn test_sunday_as_seven() {
        let cron = CronExpression::parse("0 0 * * 7").unwrap();
        // 2026-01-04 is a Sunday
        assert!(cron.matches(&at(2026, 1, 4, 0, 0, 0)));
    }

    #[test]
    fn test_impossible_date() {
        let cron = CronExpression::parse("0 0 31 2 *").unwrap();
        assert_eq!(cron.next_after(&at(2026, 1, 1, 0, 0, 0)), None);
    }

    #[test]
    fn test_rejects_invalid() {
        assert_eq!(CronExpression::parse("* * * *"), Err(CronError::FieldCount(4)));
        assert!(matches!(
            CronExpression::parse("60 * * * *"),
            Err(CronError::InvalidField { field: "minute", .. })
        ));
        assert!(CronExpression::parse("*/0 * * * *").is_err());
        assert!(CronExpression::parse("5-1 * * * *").is_err());
        assert!(CronExpression::parse("* * 0 * *").is_err());
        assert!(CronExpression::parse("a * * * *").is_err());
    }

    #[test]
    fn test_display_normalises_whitespace() {
        let cron: CronExpression = "*/5   *  * * *".parse().unwrap();
        assert_eq!(cron.to_string(), "*/5 * * * *");
    }
}
