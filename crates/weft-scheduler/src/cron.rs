//! Cron expression parsing and validation.
//!
//! Expressions follow the `cron` crate's seconds-first grammar. Classic
//! five-field crontab strings are accepted too: a `0` seconds field is
//! prepended before parsing, so `0 9 * * *` and `0 0 9 * * *` describe the
//! same daily 9am firing.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{Result, SchedulerError};

/// Whether `expression` is a valid cron expression.
///
/// Pure and total on string input.
pub fn is_cron_expression_valid(expression: &str) -> bool {
    parse(expression).is_ok()
}

/// Parse `expression` into a [`Schedule`], normalizing five-field strings.
pub fn parse(expression: &str) -> Result<Schedule> {
    Schedule::from_str(&normalize(expression)).map_err(|e| SchedulerError::InvalidCron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// The next firing time of `expression` strictly after `after`.
pub fn next_occurrence(expression: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let schedule = parse(expression)?;
    Ok(schedule.after(&after).next())
}

/// Prepend a seconds field to classic five-field crontab strings.
fn normalize(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_valid_six_field() {
        assert!(is_cron_expression_valid("0 0 9 * * *"));
        assert!(is_cron_expression_valid("*/30 * * * * *"));
        assert!(is_cron_expression_valid("0 15 10 * * Mon-Fri"));
    }

    #[test]
    fn test_valid_five_field_is_normalized() {
        assert!(is_cron_expression_valid("0 9 * * *"));
        assert!(is_cron_expression_valid("*/5 * * * *"));
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(!is_cron_expression_valid(""));
        assert!(!is_cron_expression_valid("not a cron"));
        assert!(!is_cron_expression_valid("99 * * * * *"));
        assert!(!is_cron_expression_valid("* * *"));
    }

    #[test]
    fn test_total_on_arbitrary_input() {
        // Never panics, whatever the input.
        for junk in ["\0", "🦀", "0 0 9 * * * * * *", "   ", "-1 2 3 4 5"] {
            let _ = is_cron_expression_valid(junk);
        }
    }

    #[test]
    fn test_next_occurrence() {
        let after = Utc.with_ymd_and_hms(2026, 8, 1, 8, 0, 0).unwrap();
        let next = next_occurrence("0 0 9 * * *", after).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_next_occurrence_invalid_expression() {
        let after = Utc::now();
        assert!(next_occurrence("bogus", after).is_err());
    }
}
