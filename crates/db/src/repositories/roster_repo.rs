//! Repository for enrollments and mentorship groups.

use mission_core::types::DbId;
use sqlx::PgPool;

use crate::models::roster::{CreateEnrollment, EnrollmentRow, MentorshipGroup};

const ENROLLMENT_COLUMNS: &str =
    "mission_id, student_id, started_at, mentorship_group_id, created_at";

const GROUP_COLUMNS: &str = "id, mission_id, name, created_at";

/// Provides roster reads for the attendance engines plus the writes used to
/// seed them.
pub struct RosterRepo;

impl RosterRepo {
    /// Enroll a student, or move an existing enrollment's start and group.
    pub async fn enroll(
        pool: &PgPool,
        input: &CreateEnrollment,
    ) -> Result<EnrollmentRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO mission_enrollments (mission_id, student_id, started_at, mentorship_group_id)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (mission_id, student_id) DO UPDATE SET
                started_at = EXCLUDED.started_at,
                mentorship_group_id = EXCLUDED.mentorship_group_id
             RETURNING {ENROLLMENT_COLUMNS}"
        );
        sqlx::query_as::<_, EnrollmentRow>(&query)
            .bind(&input.mission_id)
            .bind(&input.student_id)
            .bind(input.started_at)
            .bind(&input.mentorship_group_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_enrollment(
        pool: &PgPool,
        mission_id: &str,
        student_id: &str,
    ) -> Result<Option<EnrollmentRow>, sqlx::Error> {
        let query = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM mission_enrollments
             WHERE mission_id = $1 AND student_id = $2"
        );
        sqlx::query_as::<_, EnrollmentRow>(&query)
            .bind(mission_id)
            .bind(student_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create_group(
        pool: &PgPool,
        id: &str,
        mission_id: &str,
        name: &str,
    ) -> Result<MentorshipGroup, sqlx::Error> {
        let query = format!(
            "INSERT INTO mentorship_groups (id, mission_id, name)
             VALUES ($1, $2, $3)
             RETURNING {GROUP_COLUMNS}"
        );
        sqlx::query_as::<_, MentorshipGroup>(&query)
            .bind(id)
            .bind(mission_id)
            .bind(name)
            .fetch_one(pool)
            .await
    }

    /// Find a group, scoped to its mission.
    pub async fn find_group(
        pool: &PgPool,
        mission_id: &str,
        group_id: &str,
    ) -> Result<Option<MentorshipGroup>, sqlx::Error> {
        let query = format!(
            "SELECT {GROUP_COLUMNS} FROM mentorship_groups WHERE id = $1 AND mission_id = $2"
        );
        sqlx::query_as::<_, MentorshipGroup>(&query)
            .bind(group_id)
            .bind(mission_id)
            .fetch_optional(pool)
            .await
    }

    /// Add a member. Re-adding is a no-op.
    pub async fn add_member(
        pool: &PgPool,
        group_id: &str,
        student_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO mentorship_group_members (group_id, student_id)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(group_id)
        .bind(student_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Member ids in the order they joined.
    pub async fn list_member_ids(
        pool: &PgPool,
        group_id: &str,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT student_id FROM mentorship_group_members
             WHERE group_id = $1
             ORDER BY added_at ASC, student_id ASC",
        )
        .bind(group_id)
        .fetch_all(pool)
        .await
    }
}
