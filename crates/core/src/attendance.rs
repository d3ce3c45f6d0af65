//! Attendance ledger types.
//!
//! One [`AttendanceLog`] exists per (mission, student, calendar day). Records
//! are written only through [`crate::marking::MarkingService`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calendar::Day;
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Maximum length of free-form notes on a log entry.
pub const MAX_NOTES_LENGTH: usize = 2_000;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Excused,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 3] = [Self::Present, Self::Absent, Self::Excused];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Excused => "excused",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("Invalid status '{s}'. Must be one of: present, absent, excused"))
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Who produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceSource {
    Student,
    Mentor,
    Admin,
    System,
}

impl AttendanceSource {
    pub const ALL: [AttendanceSource; 4] = [Self::Student, Self::Mentor, Self::Admin, Self::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Mentor => "mentor",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }

    /// Default source for a caller acting under `role`.
    pub fn for_role(role: &str) -> Option<Self> {
        match role {
            crate::roles::ROLE_STUDENT => Some(Self::Student),
            crate::roles::ROLE_MENTOR => Some(Self::Mentor),
            crate::roles::ROLE_ADMIN => Some(Self::Admin),
            _ => None,
        }
    }
}

impl FromStr for AttendanceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or_else(|| {
            format!("Invalid source '{s}'. Must be one of: student, mentor, admin, system")
        })
    }
}

impl fmt::Display for AttendanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A stored attendance entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceLog {
    pub id: DbId,
    pub mission_id: DbId,
    pub student_id: DbId,
    pub mentorship_group_id: Option<DbId>,
    pub date: Day,
    pub status: AttendanceStatus,
    pub source: AttendanceSource,
    pub notes: Option<String>,
    pub marked_by: Option<DbId>,
    pub answers: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The fields written by an upsert. Everything except the key is overwritten
/// on conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertAttendanceLog {
    pub mission_id: DbId,
    pub student_id: DbId,
    pub date: Day,
    pub mentorship_group_id: Option<DbId>,
    pub status: AttendanceStatus,
    pub source: AttendanceSource,
    pub notes: Option<String>,
    pub marked_by: Option<DbId>,
    pub answers: Option<serde_json::Value>,
}

/// Filter for paging through raw log rows of a mission.
#[derive(Debug, Clone, Default)]
pub struct AttendanceLogFilter {
    pub from: Option<Day>,
    pub to: Option<Day>,
    pub student_id: Option<DbId>,
    /// Restricts to the given students; set when filtering by group.
    pub student_ids: Option<Vec<DbId>>,
    pub limit: i64,
    pub offset: i64,
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

pub const DEFAULT_LOG_PAGE_SIZE: i64 = 100;
pub const MAX_LOG_PAGE_SIZE: i64 = 500;

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LOG_PAGE_SIZE).clamp(1, MAX_LOG_PAGE_SIZE)
}

pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

// ---------------------------------------------------------------------------
// Validation functions
// ---------------------------------------------------------------------------

pub fn validate_notes(notes: &str) -> Result<(), String> {
    if notes.chars().count() > MAX_NOTES_LENGTH {
        return Err(format!("notes exceeds maximum length of {MAX_NOTES_LENGTH} characters"));
    }
    Ok(())
}

/// Answers are stored verbatim but must be a JSON object keyed by question key.
pub fn validate_answers(answers: &serde_json::Value) -> Result<(), String> {
    if answers.is_object() {
        Ok(())
    } else {
        Err("answers must be a JSON object keyed by question key".to_string())
    }
}

/// Blank notes are stored as absent.
pub fn normalize_notes(notes: Option<String>) -> Result<Option<String>, CoreError> {
    match notes {
        None => Ok(None),
        Some(n) => {
            let trimmed = n.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            validate_notes(trimmed).map_err(CoreError::Validation)?;
            Ok(Some(trimmed.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in AttendanceStatus::ALL {
            assert_eq!(status.as_str().parse::<AttendanceStatus>().unwrap(), status);
        }
    }

    #[test]
    fn status_rejects_unknown_and_case_variants() {
        assert!("late".parse::<AttendanceStatus>().is_err());
        assert!("Present".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(AttendanceStatus::Excused).unwrap(), "excused");
        let parsed: AttendanceStatus = serde_json::from_value(serde_json::json!("absent")).unwrap();
        assert_eq!(parsed, AttendanceStatus::Absent);
    }

    #[test]
    fn source_for_role() {
        assert_eq!(AttendanceSource::for_role("student"), Some(AttendanceSource::Student));
        assert_eq!(AttendanceSource::for_role("mentor"), Some(AttendanceSource::Mentor));
        assert_eq!(AttendanceSource::for_role("admin"), Some(AttendanceSource::Admin));
        assert_eq!(AttendanceSource::for_role("guest"), None);
    }

    #[test]
    fn source_rejects_unknown() {
        let err = "robot".parse::<AttendanceSource>().unwrap_err();
        assert!(err.contains("system"));
    }

    #[test]
    fn clamps_pagination() {
        assert_eq!(clamp_limit(None), DEFAULT_LOG_PAGE_SIZE);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LOG_PAGE_SIZE);
        assert_eq!(clamp_offset(Some(-5)), 0);
        assert_eq!(clamp_offset(Some(20)), 20);
    }

    #[test]
    fn answers_must_be_object() {
        assert!(validate_answers(&serde_json::json!({"mood": "good"})).is_ok());
        assert!(validate_answers(&serde_json::json!(["good"])).is_err());
        assert!(validate_answers(&serde_json::json!("good")).is_err());
    }

    #[test]
    fn blank_notes_are_dropped() {
        assert_eq!(normalize_notes(Some("   ".into())).unwrap(), None);
        assert_eq!(normalize_notes(Some(" late bus ".into())).unwrap(), Some("late bus".into()));
    }

    #[test]
    fn oversized_notes_rejected() {
        let long = "x".repeat(MAX_NOTES_LENGTH + 1);
        assert!(normalize_notes(Some(long)).is_err());
    }
}
