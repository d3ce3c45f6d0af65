//! Repository for the `attendance_logs` table.

use mission_core::attendance::{AttendanceLogFilter, UpsertAttendanceLog};
use mission_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::attendance_log::AttendanceLogRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, mission_id, student_id, mentorship_group_id, date, status, source, \
    notes, marked_by, answers, created_at, updated_at";

/// Provides the ledger's write path and range reads.
pub struct AttendanceLogRepo;

impl AttendanceLogRepo {
    /// Insert a row or overwrite the one with the same
    /// `(mission_id, student_id, date)`. The existing id and `created_at`
    /// survive an overwrite; `new_id` is used only on insert.
    pub async fn upsert(
        pool: &PgPool,
        new_id: &str,
        input: &UpsertAttendanceLog,
    ) -> Result<AttendanceLogRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO attendance_logs
                (id, mission_id, student_id, mentorship_group_id, date, status, source,
                 notes, marked_by, answers)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT ON CONSTRAINT uq_attendance_logs_mission_student_date DO UPDATE SET
                mentorship_group_id = EXCLUDED.mentorship_group_id,
                status = EXCLUDED.status,
                source = EXCLUDED.source,
                notes = EXCLUDED.notes,
                marked_by = EXCLUDED.marked_by,
                answers = EXCLUDED.answers,
                updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceLogRow>(&query)
            .bind(new_id)
            .bind(&input.mission_id)
            .bind(&input.student_id)
            .bind(&input.mentorship_group_id)
            .bind(input.date.as_instant())
            .bind(input.status.as_str())
            .bind(input.source.as_str())
            .bind(&input.notes)
            .bind(&input.marked_by)
            .bind(&input.answers)
            .fetch_one(pool)
            .await
    }

    /// Rows for one student with `from <= date <= to`, oldest first.
    pub async fn list_for_student(
        pool: &PgPool,
        mission_id: &str,
        student_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<AttendanceLogRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM attendance_logs
             WHERE mission_id = $1 AND student_id = $2 AND date >= $3 AND date <= $4
             ORDER BY date ASC"
        );
        sqlx::query_as::<_, AttendanceLogRow>(&query)
            .bind(mission_id)
            .bind(student_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    /// A page of a mission's rows ordered by date then student.
    /// Unset filter fields match everything.
    pub async fn list_page(
        pool: &PgPool,
        mission_id: &str,
        filter: &AttendanceLogFilter,
    ) -> Result<Vec<AttendanceLogRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM attendance_logs
             WHERE mission_id = $1
               AND ($2::timestamptz IS NULL OR date >= $2)
               AND ($3::timestamptz IS NULL OR date <= $3)
               AND ($4::text IS NULL OR student_id = $4)
               AND ($5::text[] IS NULL OR student_id = ANY($5))
             ORDER BY date ASC, student_id ASC
             LIMIT $6 OFFSET $7"
        );
        sqlx::query_as::<_, AttendanceLogRow>(&query)
            .bind(mission_id)
            .bind(filter.from.map(|d| d.as_instant()))
            .bind(filter.to.map(|d| d.as_instant()))
            .bind(&filter.student_id)
            .bind(&filter.student_ids)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(pool)
            .await
    }

    /// Total rows for a mission.
    pub async fn count_for_mission(pool: &PgPool, mission_id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM attendance_logs WHERE mission_id = $1")
            .bind(mission_id)
            .fetch_one(pool)
            .await
    }
}
