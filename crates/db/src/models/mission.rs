//! Mission and mission attendance config rows.

use mission_core::error::CoreError;
use mission_core::mission_config::{MissionAttendanceConfig, MissionAttendanceConfigInput};
use mission_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `missions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Mission {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a mission.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMission {
    pub name: String,
}

/// A row from the `mission_attendance_configs` table.
#[derive(Debug, Clone, FromRow)]
pub struct MissionAttendanceConfigRow {
    pub mission_id: DbId,
    pub timezone: String,
    pub working_days: Vec<i32>,
    pub holidays: Vec<String>,
    pub exclude_excused_from_rate: bool,
}

impl TryFrom<MissionAttendanceConfigRow> for MissionAttendanceConfig {
    type Error = CoreError;

    /// Stored rows go through the same validation as API input; a row that
    /// fails it is corrupt.
    fn try_from(row: MissionAttendanceConfigRow) -> Result<Self, Self::Error> {
        MissionAttendanceConfig::from_input(&MissionAttendanceConfigInput {
            timezone: Some(row.timezone),
            working_days: Some(row.working_days),
            holidays: Some(row.holidays),
            exclude_excused_from_rate: Some(row.exclude_excused_from_rate),
        })
        .map_err(|e| {
            CoreError::Internal(format!(
                "Stored attendance config for mission {} is invalid: {e}",
                row.mission_id
            ))
        })
    }
}
