//! Mission-local calendar rules.
//!
//! Every decision about "which calendar day is this" goes through this
//! module. A [`Day`] is a plain calendar date in the mission's timezone; it is
//! persisted as that date's 00:00 in UTC representation, which keeps day
//! equality a pure date comparison regardless of offsets or DST.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::mission_config::MissionAttendanceConfig;
use crate::types::Timestamp;

/// Format used for day keys and holiday entries.
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Day
// ---------------------------------------------------------------------------

/// A mission-local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Day(NaiveDate);

impl Day {
    pub fn from_date(date: NaiveDate) -> Self {
        Day(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The day as stored: its date at 00:00 UTC.
    pub fn as_instant(&self) -> Timestamp {
        Utc.from_utc_datetime(&self.0.and_time(NaiveTime::MIN))
    }

    /// Inverse of [`Day::as_instant`] for values read back from storage.
    pub fn from_stored_instant(instant: Timestamp) -> Self {
        Day(instant.date_naive())
    }

    /// Weekday number with Sunday = 0 … Saturday = 6.
    pub fn weekday_number(&self) -> u8 {
        self.0.weekday().num_days_from_sunday() as u8
    }

    pub fn next(&self) -> Option<Day> {
        self.0.succ_opt().map(Day)
    }
}

impl std::fmt::Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Project an instant onto the calendar date it falls on in `tz`.
pub fn to_local_midnight(instant: Timestamp, tz: Tz) -> Day {
    Day(instant.with_timezone(&tz).date_naive())
}

/// Render a day as `YYYY-MM-DD`.
pub fn day_key(day: Day) -> String {
    day.to_string()
}

/// Parse a strict `YYYY-MM-DD` key.
pub fn parse_day_key(key: &str) -> Result<Day, String> {
    let trimmed = key.trim();
    if trimmed.len() != 10 {
        return Err(format!("Invalid date key '{key}'. Expected YYYY-MM-DD"));
    }
    NaiveDate::parse_from_str(trimmed, DAY_KEY_FORMAT)
        .map(Day)
        .map_err(|_| format!("Invalid date key '{key}'. Expected YYYY-MM-DD"))
}

/// A caller-supplied date: an ISO string or epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DayInput {
    EpochMillis(i64),
    Text(String),
}

impl DayInput {
    /// Interpret an untyped value such as a query-string parameter. Integers
    /// are epoch milliseconds; anything else is text.
    pub fn from_query(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(ms) => DayInput::EpochMillis(ms),
            Err(_) => DayInput::Text(raw.to_string()),
        }
    }
}

/// Normalize a caller-supplied date to a mission-local day.
///
/// Accepted forms:
/// - RFC 3339 instant (`2025-01-06T03:00:00Z`, `2025-01-06T09:00:00+06:00`)
/// - naive local date-time (`2025-01-06T09:00:00`), read as wall-clock time in `tz`
/// - bare local date (`2025-01-06`)
/// - integer epoch milliseconds
pub fn parse_day_input(input: &DayInput, tz: Tz) -> Result<Day, String> {
    match input {
        DayInput::EpochMillis(ms) => DateTime::from_timestamp_millis(*ms)
            .map(|instant| to_local_midnight(instant, tz))
            .ok_or_else(|| format!("Timestamp {ms} is out of range")),
        DayInput::Text(raw) => {
            let raw = raw.trim();
            if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
                return Ok(to_local_midnight(instant.with_timezone(&Utc), tz));
            }
            for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                    return Ok(Day(naive.date()));
                }
            }
            parse_day_key(raw).map_err(|_| {
                format!("Invalid date '{raw}'. Expected an ISO instant, YYYY-MM-DD, or epoch milliseconds")
            })
        }
    }
}

/// Resolve an optional caller date, defaulting to the local day of `now`.
pub fn resolve_day(input: Option<&DayInput>, now: Timestamp, tz: Tz) -> Result<Day, String> {
    match input {
        Some(input) => parse_day_input(input, tz),
        None => Ok(to_local_midnight(now, tz)),
    }
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// A day is eligible when its weekday is a working day and it is not a holiday.
pub fn is_eligible_day(day: Day, config: &MissionAttendanceConfig) -> bool {
    config.working_days.contains(&day.weekday_number()) && !config.holidays.contains(&day_key(day))
}

/// Count eligible days in the inclusive range `[start, end]`.
///
/// Returns 0 when `start > end`.
pub fn count_eligible_days(start: Day, end: Day, config: &MissionAttendanceConfig) -> u32 {
    if start > end {
        return 0;
    }
    start
        .date()
        .iter_days()
        .take_while(|d| *d <= end.date())
        .filter(|d| is_eligible_day(Day(*d), config))
        .count() as u32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
