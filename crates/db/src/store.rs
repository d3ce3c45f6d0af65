//! [`PgStore`]: the `mission_core::store` traits over PostgreSQL.

use async_trait::async_trait;
use mission_core::attendance::{AttendanceLog, AttendanceLogFilter, UpsertAttendanceLog};
use mission_core::attendance_form::{AttendanceForm, AttendanceFormChanges, NewAttendanceForm};
use mission_core::calendar::Day;
use mission_core::error::CoreError;
use mission_core::mission_config::MissionAttendanceConfig;
use mission_core::object_id::new_object_id;
use mission_core::roster::Enrollment;
use mission_core::store::{
    ActivationOutcome, AttendanceFormStore, AttendanceLogStore, MissionConfigSource,
    RosterDirectory,
};
use mission_core::types::DbId;

use crate::repositories::attendance_form_repo::FormActivation;
use crate::repositories::{AttendanceFormRepo, AttendanceLogRepo, MissionRepo, RosterRepo};
use crate::DbPool;

/// Cheaply cloneable; holds only the pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map a sqlx error onto the domain error at the trait boundary.
///
/// Violations of `uq_*` constraints become [`CoreError::Conflict`]; anything
/// else is logged and reported as internal.
pub fn map_db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                return CoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ));
            }
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal(err.to_string())
}

#[async_trait]
impl AttendanceLogStore for PgStore {
    async fn upsert_log(&self, input: &UpsertAttendanceLog) -> Result<AttendanceLog, CoreError> {
        let row = AttendanceLogRepo::upsert(&self.pool, &new_object_id(), input)
            .await
            .map_err(map_db_error)?;
        row.try_into()
    }

    async fn list_student_logs(
        &self,
        mission_id: &str,
        student_id: &str,
        from: Day,
        to: Day,
    ) -> Result<Vec<AttendanceLog>, CoreError> {
        let rows = AttendanceLogRepo::list_for_student(
            &self.pool,
            mission_id,
            student_id,
            from.as_instant(),
            to.as_instant(),
        )
        .await
        .map_err(map_db_error)?;
        rows.into_iter().map(AttendanceLog::try_from).collect()
    }

    async fn list_mission_logs(
        &self,
        mission_id: &str,
        filter: &AttendanceLogFilter,
    ) -> Result<Vec<AttendanceLog>, CoreError> {
        let rows = AttendanceLogRepo::list_page(&self.pool, mission_id, filter)
            .await
            .map_err(map_db_error)?;
        rows.into_iter().map(AttendanceLog::try_from).collect()
    }
}

#[async_trait]
impl AttendanceFormStore for PgStore {
    async fn create_form(&self, input: &NewAttendanceForm) -> Result<AttendanceForm, CoreError> {
        let row = AttendanceFormRepo::create(&self.pool, &new_object_id(), input)
            .await
            .map_err(map_db_error)?;
        Ok(row.into())
    }

    async fn find_form(&self, id: &str) -> Result<Option<AttendanceForm>, CoreError> {
        let row = AttendanceFormRepo::find_by_id(&self.pool, id)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn list_forms(&self, mission_id: &str) -> Result<Vec<AttendanceForm>, CoreError> {
        let rows = AttendanceFormRepo::list_by_mission(&self.pool, mission_id)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_active_form(
        &self,
        mission_id: &str,
    ) -> Result<Option<AttendanceForm>, CoreError> {
        let row = AttendanceFormRepo::find_active(&self.pool, mission_id)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn update_form(
        &self,
        id: &str,
        changes: &AttendanceFormChanges,
    ) -> Result<Option<AttendanceForm>, CoreError> {
        let row = AttendanceFormRepo::update(&self.pool, id, changes)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn delete_form(&self, id: &str) -> Result<bool, CoreError> {
        AttendanceFormRepo::delete(&self.pool, id)
            .await
            .map_err(map_db_error)
    }

    async fn activate_form(&self, id: &str) -> Result<ActivationOutcome, CoreError> {
        let outcome = AttendanceFormRepo::activate(&self.pool, id)
            .await
            .map_err(map_db_error)?;
        Ok(match outcome {
            FormActivation::Activated(row) => ActivationOutcome::Activated(row.into()),
            FormActivation::NotFound => ActivationOutcome::NotFound,
            FormActivation::Blocked { active_form_id } => {
                ActivationOutcome::Conflict { active_form_id }
            }
        })
    }

    async fn deactivate_form(&self, id: &str) -> Result<Option<AttendanceForm>, CoreError> {
        let row = AttendanceFormRepo::deactivate(&self.pool, id)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl RosterDirectory for PgStore {
    async fn enrollment(
        &self,
        mission_id: &str,
        student_id: &str,
    ) -> Result<Option<Enrollment>, CoreError> {
        let row = RosterRepo::find_enrollment(&self.pool, mission_id, student_id)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn group_members(
        &self,
        mission_id: &str,
        group_id: &str,
    ) -> Result<Option<Vec<DbId>>, CoreError> {
        let group = RosterRepo::find_group(&self.pool, mission_id, group_id)
            .await
            .map_err(map_db_error)?;
        if group.is_none() {
            return Ok(None);
        }
        let members = RosterRepo::list_member_ids(&self.pool, group_id)
            .await
            .map_err(map_db_error)?;
        Ok(Some(members))
    }
}

#[async_trait]
impl MissionConfigSource for PgStore {
    async fn attendance_config(
        &self,
        mission_id: &str,
    ) -> Result<Option<MissionAttendanceConfig>, CoreError> {
        if !MissionRepo::exists(&self.pool, mission_id)
            .await
            .map_err(map_db_error)?
        {
            return Ok(None);
        }
        let row = MissionRepo::find_config(&self.pool, mission_id)
            .await
            .map_err(map_db_error)?;
        match row {
            Some(row) => Ok(Some(row.try_into()?)),
            None => Ok(Some(MissionAttendanceConfig::default())),
        }
    }

    async fn save_attendance_config(
        &self,
        mission_id: &str,
        config: &MissionAttendanceConfig,
    ) -> Result<Option<MissionAttendanceConfig>, CoreError> {
        if !MissionRepo::exists(&self.pool, mission_id)
            .await
            .map_err(map_db_error)?
        {
            return Ok(None);
        }
        let row = MissionRepo::upsert_config(&self.pool, mission_id, config)
            .await
            .map_err(map_db_error)?;
        Ok(Some(row.try_into()?))
    }
}
