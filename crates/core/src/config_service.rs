//! Read and replace a mission's attendance configuration.

use crate::error::CoreError;
use crate::mission_config::{MissionAttendanceConfig, MissionAttendanceConfigInput};
use crate::object_id::normalize_object_id;
use crate::store::MissionConfigSource;

pub struct MissionConfigService<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> MissionConfigService<'a, S>
where
    S: MissionConfigSource + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Stored config, or the defaults when the mission has none.
    pub async fn get(&self, mission_id: &str) -> Result<MissionAttendanceConfig, CoreError> {
        let mission_id = normalize_object_id("mission_id", mission_id).map_err(CoreError::Validation)?;
        let config = self.store.attendance_config(&mission_id).await?;
        config.ok_or(CoreError::NotFound {
            entity: "Mission",
            id: mission_id,
        })
    }

    /// Validate and replace. Omitted fields take their defaults.
    pub async fn replace(
        &self,
        mission_id: &str,
        input: &MissionAttendanceConfigInput,
    ) -> Result<MissionAttendanceConfig, CoreError> {
        let mission_id = normalize_object_id("mission_id", mission_id).map_err(CoreError::Validation)?;
        let config = MissionAttendanceConfig::from_input(input).map_err(CoreError::Validation)?;

        let saved = self.store.save_attendance_config(&mission_id, &config).await?;
        let saved = saved.ok_or(CoreError::NotFound {
            entity: "Mission",
            id: mission_id.clone(),
        })?;

        tracing::info!(
            mission_id = %mission_id,
            timezone = %saved.timezone.name(),
            working_days = ?saved.working_days,
            holidays = saved.holidays.len(),
            "Mission attendance config saved"
        );
        Ok(saved)
    }
}
