//! Repository for the `attendance_forms` table.

use mission_core::attendance_form::{AttendanceFormChanges, NewAttendanceForm};
use mission_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::attendance_form::AttendanceFormRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, mission_id, title, description, active, questions, created_by, created_at, updated_at";

/// Result of [`AttendanceFormRepo::activate`].
#[derive(Debug)]
pub enum FormActivation {
    Activated(AttendanceFormRow),
    NotFound,
    /// Another form of the same mission is active.
    Blocked { active_form_id: DbId },
}

/// Provides CRUD and the single-active transition for attendance forms.
pub struct AttendanceFormRepo;

impl AttendanceFormRepo {
    /// Insert a new, inactive form.
    pub async fn create(
        pool: &PgPool,
        id: &str,
        input: &NewAttendanceForm,
    ) -> Result<AttendanceFormRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO attendance_forms (id, mission_id, title, description, questions, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceFormRow>(&query)
            .bind(id)
            .bind(&input.mission_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(Json(&input.questions))
            .bind(&input.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: &str,
    ) -> Result<Option<AttendanceFormRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM attendance_forms WHERE id = $1");
        sqlx::query_as::<_, AttendanceFormRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Forms of a mission, oldest first.
    pub async fn list_by_mission(
        pool: &PgPool,
        mission_id: &str,
    ) -> Result<Vec<AttendanceFormRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM attendance_forms
             WHERE mission_id = $1
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, AttendanceFormRow>(&query)
            .bind(mission_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_active(
        pool: &PgPool,
        mission_id: &str,
    ) -> Result<Option<AttendanceFormRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM attendance_forms WHERE mission_id = $1 AND active"
        );
        sqlx::query_as::<_, AttendanceFormRow>(&query)
            .bind(mission_id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a partial update. An empty description clears it.
    pub async fn update(
        pool: &PgPool,
        id: &str,
        changes: &AttendanceFormChanges,
    ) -> Result<Option<AttendanceFormRow>, sqlx::Error> {
        let query = format!(
            "UPDATE attendance_forms SET
                title = COALESCE($2, title),
                description = CASE WHEN $3::text IS NULL THEN description ELSE NULLIF($3, '') END,
                questions = COALESCE($4, questions)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceFormRow>(&query)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.description)
            .bind(changes.questions.as_ref().map(Json))
            .fetch_optional(pool)
            .await
    }

    /// Delete a form. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM attendance_forms WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a form active unless a sibling form is already active.
    ///
    /// Runs in one transaction holding the mission row lock, so concurrent
    /// activations within a mission are serialized. The partial unique index
    /// `uq_attendance_forms_one_active` backs this up.
    pub async fn activate(pool: &PgPool, id: &str) -> Result<FormActivation, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let mission_id: Option<DbId> =
            sqlx::query_scalar("SELECT mission_id FROM attendance_forms WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(mission_id) = mission_id else {
            return Ok(FormActivation::NotFound);
        };

        sqlx::query("SELECT id FROM missions WHERE id = $1 FOR UPDATE")
            .bind(&mission_id)
            .execute(&mut *tx)
            .await?;

        let other: Option<DbId> = sqlx::query_scalar(
            "SELECT id FROM attendance_forms
             WHERE mission_id = $1 AND active AND id <> $2",
        )
        .bind(&mission_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(active_form_id) = other {
            return Ok(FormActivation::Blocked { active_form_id });
        }

        let query = format!(
            "UPDATE attendance_forms SET active = true
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, AttendanceFormRow>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(FormActivation::Activated(row))
    }

    /// Clear the active flag. Returns `None` if the form does not exist.
    pub async fn deactivate(
        pool: &PgPool,
        id: &str,
    ) -> Result<Option<AttendanceFormRow>, sqlx::Error> {
        let query = format!(
            "UPDATE attendance_forms SET active = false
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceFormRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
