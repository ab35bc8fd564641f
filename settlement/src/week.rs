//! Billing week arithmetic
//!
//! The week closes at a fixed weekday and time of day (Friday 23:59:00 by
//! default). A settlement period starts at midnight of the configured start
//! day and its label spans from that date to the closing day.

use crate::{config::WeekConfig, Error, Result};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Seconds in one week
pub const WEEK_SECONDS: u64 = 7 * 86_400;

/// Date format used in period labels and reports
pub const DATE_FORMAT: &str = "%m-%d-%Y";

/// Parsed billing week convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekBoundary {
    start_day: Weekday,
    end_day: Weekday,
    end_time: NaiveTime,
}

impl Default for WeekBoundary {
    fn default() -> Self {
        Self {
            start_day: Weekday::Sat,
            end_day: Weekday::Fri,
            end_time: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or_default(),
        }
    }
}

impl WeekBoundary {
    /// Create from parsed parts
    pub fn new(start_day: Weekday, end_day: Weekday, end_time: NaiveTime) -> Self {
        Self {
            start_day,
            end_day,
            end_time,
        }
    }

    /// Parse weekday and time strings
    pub fn from_config(config: &WeekConfig) -> Result<Self> {
        Ok(Self::new(
            parse_weekday(&config.start_day)?,
            parse_weekday(&config.end_day)?,
            parse_time(&config.end_time)?,
        ))
    }

    /// Seconds until the week next closes; zero when `now` is exactly the
    /// closing instant and `u64::MAX` when no later close is representable
    pub fn seconds_until_boundary(&self, now: NaiveDateTime) -> u64 {
        self.next_boundary(now)
            .map_or(u64::MAX, |boundary| (boundary - now).num_seconds().max(0) as u64)
    }

    /// Closing instant at or after `now`, if representable
    pub fn next_boundary(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let days_ahead = days_between(now.weekday(), self.end_day) as u64;
        let boundary = now
            .date()
            .checked_add_days(Days::new(days_ahead))?
            .and_time(self.end_time);
        if boundary < now {
            boundary.checked_add_days(Days::new(7))
        } else {
            Some(boundary)
        }
    }

    /// Days from the first to the last day of a billing week
    pub fn week_length_days(&self) -> i64 {
        days_between(self.start_day, self.end_day)
    }

    /// First day of the billing week containing `at`
    pub fn period_start(&self, at: NaiveDateTime) -> NaiveDate {
        at.date()
            .checked_sub_days(Days::new(days_between(self.start_day, at.weekday()) as u64))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the billing week containing `at`
    pub fn period_end(&self, at: NaiveDateTime) -> NaiveDate {
        self.period_start(at)
            .checked_add_days(Days::new(self.week_length_days() as u64))
            .unwrap_or(NaiveDate::MAX)
    }

    /// `"MM-DD-YYYY to MM-DD-YYYY"` label for the week containing `at`
    pub fn period_label(&self, at: NaiveDateTime) -> String {
        date_range(self.period_start(at), self.period_end(at))
    }
}

/// `"MM-DD-YYYY to MM-DD-YYYY"`
pub fn date_range(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} to {}", start.format(DATE_FORMAT), end.format(DATE_FORMAT))
}

/// Days to move forward from `from` to reach `to` (0..=6)
fn days_between(from: Weekday, to: Weekday) -> i64 {
    (to.num_days_from_monday() as i64 - from.num_days_from_monday() as i64).rem_euclid(7)
}

fn parse_weekday(s: &str) -> Result<Weekday> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| Error::Config(format!("Invalid weekday '{}'", s)))
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M"))
        .map_err(|e| Error::Config(format!("Invalid time format '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_seconds_until_boundary_thursday() {
        let week = WeekBoundary::default();
        // 2015-12-03 is a Thursday
        let thursday = at(2015, 12, 3, 10, 0, 0);
        assert_eq!(week.seconds_until_boundary(thursday), 86_400 + 13 * 3600 + 59 * 60);
    }

    #[test]
    fn test_zero_at_boundary() {
        let week = WeekBoundary::default();
        let friday = at(2015, 12, 4, 23, 59, 0);
        assert_eq!(week.seconds_until_boundary(friday), 0);
        assert_eq!(week.next_boundary(friday), Some(friday));
    }

    #[test]
    fn test_just_after_boundary_wraps_to_next_week() {
        let week = WeekBoundary::default();
        let after = at(2015, 12, 4, 23, 59, 1);
        assert_eq!(week.seconds_until_boundary(after), WEEK_SECONDS - 1);
    }

    #[test]
    fn test_no_representable_boundary() {
        let week = WeekBoundary::default();
        let end = NaiveDateTime::MAX;
        match week.next_boundary(end) {
            Some(boundary) => assert!(boundary >= end),
            None => assert_eq!(week.seconds_until_boundary(end), u64::MAX),
        }
    }

    #[test]
    fn test_period_label() {
        let week = WeekBoundary::default();

        // Saturday through Friday
        assert_eq!(week.period_label(at(2015, 12, 3, 10, 0, 0)), "11-28-2015 to 12-04-2015");
        assert_eq!(week.period_label(at(2015, 11, 28, 0, 0, 0)), "11-28-2015 to 12-04-2015");
        assert_eq!(week.period_label(at(2015, 12, 4, 23, 59, 0)), "11-28-2015 to 12-04-2015");
        assert_eq!(week.period_label(at(2015, 12, 5, 0, 0, 0)), "12-05-2015 to 12-11-2015");
    }

    #[test]
    fn test_from_config() {
        let config = WeekConfig {
            start_day: "Monday".to_string(),
            end_day: "sun".to_string(),
            end_time: "18:30".to_string(),
        };
        let week = WeekBoundary::from_config(&config).unwrap();
        assert_eq!(week.week_length_days(), 6);

        // Sunday 2015-12-06 at noon
        assert_eq!(week.seconds_until_boundary(at(2015, 12, 6, 12, 0, 0)), 6 * 3600 + 30 * 60);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = WeekConfig::default();
        config.end_day = "Caturday".to_string();
        assert!(matches!(WeekBoundary::from_config(&config), Err(Error::Config(_))));

        let mut config = WeekConfig::default();
        config.end_time = "25:00:00".to_string();
        assert!(matches!(WeekBoundary::from_config(&config), Err(Error::Config(_))));
    }
}
