//! Validity windows and clocks
//!
//! Plans, policies, tariffs and business rules are all valid between two
//! calendar dates, either of which may be open. The engine reads "today"
//! from an injected [`Clock`] so calculations can be replayed in tests.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid window: start {start} must not be after end {end}")]
    InvalidWindow {
        start: String,
        end: String,
    },

    #[error("Date {0} is out of the supported range")]
    OutOfRange(String),
}

/// A date window with inclusive, optional bounds
///
/// `from: None` means "since forever" and `to: None` means open-ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// First day the window applies (inclusive)
    pub from: Option<NaiveDate>,
    /// Last day the window applies (inclusive)
    pub to: Option<NaiveDate>,
}

impl ValidityWindow {
    /// Creates a window, rejecting `from > to`
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, TemporalError> {
        if let (Some(start), Some(end)) = (from, to) {
            if start > end {
                return Err(TemporalError::InvalidWindow {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        Ok(Self { from, to })
    }

    /// A window with neither bound
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A window starting on `from` with no end
    pub fn starting(from: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    /// A window with both bounds
    pub fn between(from: NaiveDate, to: NaiveDate) -> Result<Self, TemporalError> {
        Self::new(Some(from), Some(to))
    }

    /// Returns true if `date` falls inside the window
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |start| date >= start) && self.to.map_or(true, |end| date <= end)
    }

    /// Returns true if the window has no end date
    pub fn is_open_ended(&self) -> bool {
        self.to.is_none()
    }
}

/// Source of the current date and time
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date (UTC)
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Freezes the clock at midnight UTC of `date`
    pub fn at_date(date: NaiveDate) -> Self {
        Self(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Adds whole days to a date
pub fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate, TemporalError> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| TemporalError::OutOfRange(date.to_string()))
}

/// Age in whole calendar years as `reference.year - birth.year`
pub fn years_between(birth: NaiveDate, reference: NaiveDate) -> i32 {
    reference.year() - birth.year()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let window = ValidityWindow::between(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
        assert!(window.contains(date(2024, 1, 1)));
        assert!(window.contains(date(2024, 12, 31)));
        assert!(!window.contains(date(2023, 12, 31)));
        assert!(!window.contains(date(2025, 1, 1)));
    }

    #[test]
    fn test_open_bounds() {
        assert!(ValidityWindow::unbounded().contains(date(1900, 1, 1)));
        let window = ValidityWindow::starting(date(2024, 3, 1));
        assert!(window.is_open_ended());
        assert!(window.contains(date(2099, 1, 1)));
        assert!(!window.contains(date(2024, 2, 29)));
    }

    #[test]
    fn test_inverted_window_rejected() {
        let result = ValidityWindow::between(date(2024, 6, 1), date(2024, 1, 1));
        assert!(matches!(result, Err(TemporalError::InvalidWindow { .. })));
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::at_date(date(2024, 6, 15));
        assert_eq!(clock.today(), date(2024, 6, 15));
    }

    #[test]
    fn test_years_between() {
        assert_eq!(years_between(date(1980, 12, 31), date(2024, 1, 1)), 44);
    }
}
