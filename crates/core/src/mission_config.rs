//! Per-mission attendance configuration.
//!
//! Timezone, working days, holidays, and the excused-day rate policy. A
//! mission without stored configuration uses [`MissionAttendanceConfig::default`].

use std::collections::BTreeSet;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::{day_key, parse_day_key};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Timezone applied when a mission has none configured.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Dhaka;

/// Monday through Friday (Sunday = 0).
pub const DEFAULT_WORKING_DAYS: [u8; 5] = [1, 2, 3, 4, 5];

/// Maximum number of holiday entries on a single mission.
pub const MAX_HOLIDAYS: usize = 1_000;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Effective attendance configuration for a mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionAttendanceConfig {
    pub timezone: Tz,
    pub working_days: BTreeSet<u8>,
    /// Zone-local `YYYY-MM-DD` keys.
    pub holidays: BTreeSet<String>,
    pub exclude_excused_from_rate: bool,
}

impl Default for MissionAttendanceConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            working_days: DEFAULT_WORKING_DAYS.into_iter().collect(),
            holidays: BTreeSet::new(),
            exclude_excused_from_rate: false,
        }
    }
}

/// Raw, unvalidated configuration as supplied by a caller or read from storage.
///
/// Missing fields fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MissionAttendanceConfigInput {
    pub timezone: Option<String>,
    pub working_days: Option<Vec<i32>>,
    pub holidays: Option<Vec<String>>,
    pub exclude_excused_from_rate: Option<bool>,
}

impl MissionAttendanceConfig {
    /// Validate raw input into an effective configuration.
    pub fn from_input(input: &MissionAttendanceConfigInput) -> Result<Self, String> {
        let defaults = Self::default();

        let timezone = match input.timezone.as_deref().map(str::trim) {
            None | Some("") => defaults.timezone,
            Some(name) => parse_timezone(name)?,
        };

        let working_days = match &input.working_days {
            None => defaults.working_days,
            Some(days) => validate_working_days(days)?,
        };

        let holidays = match &input.holidays {
            None => defaults.holidays,
            Some(keys) => validate_holidays(keys)?,
        };

        Ok(Self {
            timezone,
            working_days,
            holidays,
            exclude_excused_from_rate: input
                .exclude_excused_from_rate
                .unwrap_or(defaults.exclude_excused_from_rate),
        })
    }
}

// ---------------------------------------------------------------------------
// Validation functions
// ---------------------------------------------------------------------------

/// Parse an IANA zone name such as `Asia/Dhaka`.
pub fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.parse::<Tz>()
        .map_err(|_| format!("Unknown timezone '{name}'. Expected an IANA zone name"))
}

/// Working days must be a non-empty set of weekday numbers in `0..=6`.
pub fn validate_working_days(days: &[i32]) -> Result<BTreeSet<u8>, String> {
    if days.is_empty() {
        return Err("working_days must contain at least one weekday".to_string());
    }
    days.iter()
        .map(|d| match u8::try_from(*d) {
            Ok(v) if v <= 6 => Ok(v),
            _ => Err(format!("Invalid weekday {d}. Must be between 0 (Sunday) and 6 (Saturday)")),
        })
        .collect()
}

/// Holidays must be well-formed `YYYY-MM-DD` keys. Duplicates collapse.
pub fn validate_holidays(keys: &[String]) -> Result<BTreeSet<String>, String> {
    if keys.len() > MAX_HOLIDAYS {
        return Err(format!("holidays exceeds maximum of {MAX_HOLIDAYS} entries"));
    }
    keys.iter()
        .map(|k| parse_day_key(k).map(day_key))
        .collect()
}
