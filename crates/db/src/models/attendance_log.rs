//! Attendance ledger rows.

use mission_core::attendance::AttendanceLog;
use mission_core::calendar::Day;
use mission_core::error::CoreError;
use mission_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `attendance_logs` table.
///
/// `status` and `source` are stored as their lowercase names; `date` is the
/// calendar day at 00:00 UTC.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttendanceLogRow {
    pub id: DbId,
    pub mission_id: DbId,
    pub student_id: DbId,
    pub mentorship_group_id: Option<DbId>,
    pub date: Timestamp,
    pub status: String,
    pub source: String,
    pub notes: Option<String>,
    pub marked_by: Option<DbId>,
    pub answers: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<AttendanceLogRow> for AttendanceLog {
    type Error = CoreError;

    fn try_from(row: AttendanceLogRow) -> Result<Self, Self::Error> {
        Ok(AttendanceLog {
            status: row.status.parse().map_err(CoreError::Internal)?,
            source: row.source.parse().map_err(CoreError::Internal)?,
            id: row.id,
            mission_id: row.mission_id,
            student_id: row.student_id,
            mentorship_group_id: row.mentorship_group_id,
            date: Day::from_stored_instant(row.date),
            notes: row.notes,
            marked_by: row.marked_by,
            answers: row.answers,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
