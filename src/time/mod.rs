//! Time module for the clock engine
//!
//! Simulation times are [`Timestamp`]s: UTC milliseconds since the Unix epoch
//! as `f64`, which covers the far past and future the clock can be wound to.
//! Datasets key their samples by calendar day with a fixed width `YYYYMMDD`
//! string, handled here by [`DateKey`].

mod virtual_clock;

pub use virtual_clock::VirtualClock;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Utc};

use crate::constants::DAY_MS;
use crate::{ClockError, Result};

/// UTC milliseconds since 1970-01-01T00:00:00Z
pub type Timestamp = f64;

/// `num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A calendar day (UTC) as used to key dataset samples
///
/// The textual form is exactly eight digits, `YYYYMMDD`, so only years
/// 0 through 9999 can be keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateKey(NaiveDate);

impl DateKey {
    /// Key for a calendar date, if it is representable in eight digits
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        if !(0..=9999).contains(&year) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day).map(DateKey)
    }

    /// Key of the UTC day containing `timestamp`
    pub fn from_timestamp(timestamp: Timestamp) -> Option<Self> {
        let date = day_containing(timestamp)?;
        if !(0..=9999).contains(&date.year()) {
            return None;
        }
        Some(DateKey(date))
    }

    /// Days since 1970-01-01
    pub fn day_number(&self) -> i64 {
        i64::from(self.0.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
    }

    /// Timestamp of UTC midnight starting this day
    pub fn midnight(&self) -> Timestamp {
        self.day_number() as f64 * DAY_MS
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

impl FromStr for DateKey {
    type Err = ClockError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ClockError::InvalidDateKey(s.to_string()));
        }

        // All ASCII digits, so the slices are on char boundaries and parse
        let field = |range: std::ops::Range<usize>| -> Result<u32> {
            s[range]
                .parse::<u32>()
                .map_err(|_| ClockError::InvalidDateKey(s.to_string()))
        };
        let year = field(0..4)? as i32;
        let month = field(4..6)?;
        let day = field(6..8)?;

        DateKey::from_ymd(year, month, day).ok_or_else(|| ClockError::InvalidDateKey(s.to_string()))
    }
}

/// Format the UTC day containing `timestamp` as a `YYYYMMDD` key
pub fn date_to_key(timestamp: Timestamp) -> Option<String> {
    DateKey::from_timestamp(timestamp).map(|key| key.to_string())
}

/// Parse a `YYYYMMDD` key into the timestamp of that day's UTC midnight
pub fn key_to_date(key: &str) -> Result<Timestamp> {
    key.parse::<DateKey>().map(|key| key.midnight())
}

/// The UTC calendar day containing `timestamp`
fn day_containing(timestamp: Timestamp) -> Option<NaiveDate> {
    if !timestamp.is_finite() {
        return None;
    }
    let days = (timestamp / DAY_MS).floor();
    if days.abs() > f64::from(i32::MAX / 2) {
        return None;
    }
    NaiveDate::from_num_days_from_ce_opt(days as i32 + UNIX_EPOCH_DAYS_FROM_CE)
}

/// UTC calendar year of `timestamp`
pub fn utc_year(timestamp: Timestamp) -> Option<i32> {
    day_containing(timestamp).map(|date| date.year())
}

/// Seconds elapsed since UTC midnight of the day containing `timestamp`
pub fn seconds_of_day(timestamp: Timestamp) -> Option<f64> {
    if !timestamp.is_finite() {
        return None;
    }
    Some(timestamp.rem_euclid(DAY_MS) / 1000.0)
}

/// Parse a user supplied UTC date or date-time
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM` and `YYYY-MM-DDTHH:MM:SS`
/// (a space may replace the `T`).
pub fn parse_datetime(input: &str) -> Result<Timestamp> {
    let input = input.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(dt.and_utc().timestamp_millis() as f64);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let days = date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE;
        return Ok(f64::from(days) * DAY_MS);
    }

    Err(ClockError::ConfigError(format!(
        "cannot parse {:?} as a UTC date or date-time",
        input
    )))
}

/// Format a timestamp as an ISO 8601 UTC date-time for display
pub fn format_timestamp(timestamp: Timestamp) -> String {
    match chrono::DateTime::from_timestamp_millis(timestamp as i64) {
        Some(dt) if timestamp.is_finite() => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        _ => format!("{} ms", timestamp),
    }
}

/// Source of real (wall clock) time for the tick loop
pub trait WallClock {
    /// Current wall time
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp_millis() as f64
    }
}

/// Wall clock that only moves when told to
///
/// Clones share the same time, so a test can keep one handle while the
/// clock context owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Timestamp>>,
}

impl ManualClock {
    /// Create a manual clock reading `now`
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    /// Set the time
    pub fn set(&self, now: Timestamp) {
        self.now.set(now);
    }

    /// Move the time forward by `millis`
    pub fn advance(&self, millis: f64) {
        self.now.set(self.now.get() + millis);
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}
