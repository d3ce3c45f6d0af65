//! Attendance form rows.

use mission_core::attendance_form::{AttendanceForm, FormQuestion};
use mission_core::types::{DbId, Timestamp};
use sqlx::FromRow;
use sqlx::types::Json;

/// A row from the `attendance_forms` table. Questions live in a JSONB array.
#[derive(Debug, Clone, FromRow)]
pub struct AttendanceFormRow {
    pub id: DbId,
    pub mission_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub active: bool,
    pub questions: Json<Vec<FormQuestion>>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<AttendanceFormRow> for AttendanceForm {
    fn from(row: AttendanceFormRow) -> Self {
        AttendanceForm {
            id: row.id,
            mission_id: row.mission_id,
            title: row.title,
            description: row.description,
            active: row.active,
            questions: row.questions.0,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
