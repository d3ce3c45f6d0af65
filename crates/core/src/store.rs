//! Storage and collaborator seams used by the attendance services.
//!
//! `mission-db` implements these against PostgreSQL; [`crate::memory`]
//! implements them in process.

use async_trait::async_trait;

use crate::attendance::{AttendanceLog, AttendanceLogFilter, UpsertAttendanceLog};
use crate::attendance_form::{AttendanceForm, AttendanceFormChanges, NewAttendanceForm};
use crate::calendar::Day;
use crate::error::CoreError;
use crate::mission_config::MissionAttendanceConfig;
use crate::roster::Enrollment;
use crate::types::DbId;

/// The attendance ledger.
#[async_trait]
pub trait AttendanceLogStore: Send + Sync {
    /// Insert or overwrite the row keyed by `(mission_id, student_id, date)`.
    async fn upsert_log(&self, input: &UpsertAttendanceLog) -> Result<AttendanceLog, CoreError>;

    /// Rows for one student with `from <= date <= to`, ascending by date.
    async fn list_student_logs(
        &self,
        mission_id: &str,
        student_id: &str,
        from: Day,
        to: Day,
    ) -> Result<Vec<AttendanceLog>, CoreError>;

    /// A page of rows for a mission, ordered by date then student.
    async fn list_mission_logs(
        &self,
        mission_id: &str,
        filter: &AttendanceLogFilter,
    ) -> Result<Vec<AttendanceLog>, CoreError>;
}

/// Result of the guarded activation transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    Activated(AttendanceForm),
    NotFound,
    /// Another form of the same mission is already active.
    Conflict { active_form_id: DbId },
}

#[async_trait]
pub trait AttendanceFormStore: Send + Sync {
    async fn create_form(&self, input: &NewAttendanceForm) -> Result<AttendanceForm, CoreError>;

    async fn find_form(&self, id: &str) -> Result<Option<AttendanceForm>, CoreError>;

    async fn list_forms(&self, mission_id: &str) -> Result<Vec<AttendanceForm>, CoreError>;

    async fn find_active_form(&self, mission_id: &str)
        -> Result<Option<AttendanceForm>, CoreError>;

    async fn update_form(
        &self,
        id: &str,
        changes: &AttendanceFormChanges,
    ) -> Result<Option<AttendanceForm>, CoreError>;

    async fn delete_form(&self, id: &str) -> Result<bool, CoreError>;

    /// Set `active = true` unless another form of the same mission is active.
    /// Activating an already-active form succeeds.
    async fn activate_form(&self, id: &str) -> Result<ActivationOutcome, CoreError>;

    async fn deactivate_form(&self, id: &str) -> Result<Option<AttendanceForm>, CoreError>;
}

/// Mission roster collaborator.
#[async_trait]
pub trait RosterDirectory: Send + Sync {
    async fn enrollment(
        &self,
        mission_id: &str,
        student_id: &str,
    ) -> Result<Option<Enrollment>, CoreError>;

    /// Current member ids of a group, or `None` if the group does not exist
    /// in this mission.
    async fn group_members(
        &self,
        mission_id: &str,
        group_id: &str,
    ) -> Result<Option<Vec<DbId>>, CoreError>;
}

/// Mission configuration collaborator.
#[async_trait]
pub trait MissionConfigSource: Send + Sync {
    /// Effective config, or `None` if the mission does not exist. A mission
    /// without stored config yields the defaults.
    async fn attendance_config(
        &self,
        mission_id: &str,
    ) -> Result<Option<MissionAttendanceConfig>, CoreError>;

    /// Replace a mission's config. `None` if the mission does not exist.
    async fn save_attendance_config(
        &self,
        mission_id: &str,
        config: &MissionAttendanceConfig,
    ) -> Result<Option<MissionAttendanceConfig>, CoreError>;
}

/// Everything the attendance services need from a backend.
pub trait AttendanceBackend:
    AttendanceLogStore + AttendanceFormStore + RosterDirectory + MissionConfigSource
{
}

impl<T> AttendanceBackend for T where
    T: AttendanceLogStore + AttendanceFormStore + RosterDirectory + MissionConfigSource
{
}
