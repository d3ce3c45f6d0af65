//! Repository for the `missions` and `mission_attendance_configs` tables.

use mission_core::mission_config::MissionAttendanceConfig;
use sqlx::PgPool;

use crate::models::mission::{CreateMission, Mission, MissionAttendanceConfigRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, created_at, updated_at";

const CONFIG_COLUMNS: &str =
    "mission_id, timezone, working_days, holidays, exclude_excused_from_rate";

/// Provides mission lookup and attendance config persistence.
pub struct MissionRepo;

impl MissionRepo {
    pub async fn create(
        pool: &PgPool,
        id: &str,
        input: &CreateMission,
    ) -> Result<Mission, sqlx::Error> {
        let query = format!(
            "INSERT INTO missions (id, name) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Mission>(&query)
            .bind(id)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM missions WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// The stored config row, if one was ever saved.
    pub async fn find_config(
        pool: &PgPool,
        mission_id: &str,
    ) -> Result<Option<MissionAttendanceConfigRow>, sqlx::Error> {
        let query = format!(
            "SELECT {CONFIG_COLUMNS} FROM mission_attendance_configs WHERE mission_id = $1"
        );
        sqlx::query_as::<_, MissionAttendanceConfigRow>(&query)
            .bind(mission_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace a mission's config.
    pub async fn upsert_config(
        pool: &PgPool,
        mission_id: &str,
        config: &MissionAttendanceConfig,
    ) -> Result<MissionAttendanceConfigRow, sqlx::Error> {
        let working_days: Vec<i32> = config.working_days.iter().map(|d| *d as i32).collect();
        let holidays: Vec<String> = config.holidays.iter().cloned().collect();

        let query = format!(
            "INSERT INTO mission_attendance_configs
                (mission_id, timezone, working_days, holidays, exclude_excused_from_rate)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (mission_id) DO UPDATE SET
                timezone = EXCLUDED.timezone,
                working_days = EXCLUDED.working_days,
                holidays = EXCLUDED.holidays,
                exclude_excused_from_rate = EXCLUDED.exclude_excused_from_rate
             RETURNING {CONFIG_COLUMNS}"
        );
        sqlx::query_as::<_, MissionAttendanceConfigRow>(&query)
            .bind(mission_id)
            .bind(config.timezone.name())
            .bind(&working_days)
            .bind(&holidays)
            .bind(config.exclude_excused_from_rate)
            .fetch_one(pool)
            .await
    }
}
