//! Numeric and text limits
//!
//! Totals are capped before they are reported: a provider can never be shown
//! with more than `max_consultations` consultations or more than
//! `max_weekly_fee` owed for one week. Clamping is total and monotonic.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configured caps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum consultations reported per provider per week
    pub max_consultations: u32,

    /// Maximum fee total reported per provider per week
    pub max_weekly_fee: Decimal,

    /// Maximum length (characters) of a record's comments
    pub max_comment_len: usize,

    /// How far (seconds) a provider clock may run ahead of the global clock
    pub max_time_zone_offset_secs: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_consultations: 999,
            max_weekly_fee: Decimal::new(9_999_999, 2), // 99999.99
            max_comment_len: 100,
            max_time_zone_offset_secs: 93_600, // 26 hours
        }
    }
}

impl Limits {
    /// Clamp a consultation count to the configured cap
    pub fn clamp_consultations(&self, count: u32) -> u32 {
        clamp_count(count, self.max_consultations)
    }

    /// Clamp a weekly fee total to the configured cap
    pub fn clamp_weekly_fee(&self, total: Decimal) -> Decimal {
        clamp_amount(total, self.max_weekly_fee)
    }

    /// Truncate comments to the configured length
    pub fn truncate_comments(&self, comments: &str) -> String {
        comments.chars().take(self.max_comment_len).collect()
    }

    /// Check that `clock` is at or ahead of `reference` by at most the
    /// configured time-zone offset
    pub fn is_within_time_zone(&self, clock: NaiveDateTime, reference: NaiveDateTime) -> bool {
        let diff = (clock - reference).num_seconds();
        (0..=self.max_time_zone_offset_secs).contains(&diff)
    }
}

/// `min(x, cap)` for counts
pub fn clamp_count(x: u32, cap: u32) -> u32 {
    x.min(cap)
}

/// `min(x, cap)` for amounts
pub fn clamp_amount(x: Decimal, cap: Decimal) -> Decimal {
    if x > cap {
        cap
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_clamp_count() {
        assert_eq!(clamp_count(0, 999), 0);
        assert_eq!(clamp_count(999, 999), 999);
        assert_eq!(clamp_count(1000, 999), 999);
    }

    #[test]
    fn test_clamp_amount() {
        let cap = Decimal::new(9_999_999, 2);
        assert_eq!(clamp_amount(Decimal::new(3000, 2), cap), Decimal::new(3000, 2));
        assert_eq!(clamp_amount(Decimal::new(10_005_000, 2), cap), cap);
    }

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.clamp_consultations(1000), 999);
        assert_eq!(
            limits.clamp_weekly_fee(Decimal::new(10_005_000, 2)).to_string(),
            "99999.99"
        );
    }

    #[test]
    fn test_truncate_comments() {
        let limits = Limits {
            max_comment_len: 5,
            ..Default::default()
        };
        assert_eq!(limits.truncate_comments("abcdefgh"), "abcde");
        assert_eq!(limits.truncate_comments("abc"), "abc");
    }

    #[test]
    fn test_time_zone_window() {
        let limits = Limits::default();
        let reference = NaiveDate::from_ymd_opt(2015, 12, 3)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        assert!(limits.is_within_time_zone(reference, reference));
        assert!(limits.is_within_time_zone(reference + chrono::Duration::hours(26), reference));
        assert!(!limits.is_within_time_zone(reference + chrono::Duration::seconds(93_601), reference));
        assert!(!limits.is_within_time_zone(reference - chrono::Duration::seconds(1), reference));
    }
}
