//! Enrollment and mentorship group rows.

use mission_core::roster::Enrollment;
use mission_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `mission_enrollments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EnrollmentRow {
    pub mission_id: DbId,
    pub student_id: DbId,
    pub started_at: Timestamp,
    pub mentorship_group_id: Option<DbId>,
    pub created_at: Timestamp,
}

impl From<EnrollmentRow> for Enrollment {
    fn from(row: EnrollmentRow) -> Self {
        Enrollment {
            mission_id: row.mission_id,
            student_id: row.student_id,
            started_at: row.started_at,
            mentorship_group_id: row.mentorship_group_id,
        }
    }
}

/// DTO for enrolling a student.
#[derive(Debug, Clone)]
pub struct CreateEnrollment {
    pub mission_id: DbId,
    pub student_id: DbId,
    pub started_at: Timestamp,
    pub mentorship_group_id: Option<DbId>,
}

/// A row from the `mentorship_groups` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MentorshipGroup {
    pub id: DbId,
    pub mission_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}
