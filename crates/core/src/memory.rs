//! In-process backend.
//!
//! Implements every store trait over maps behind one `tokio::sync::RwLock`,
//! which serialises writers. Used by the service tests and for running the
//! engines without a database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::attendance::{AttendanceLog, AttendanceLogFilter, UpsertAttendanceLog};
use crate::attendance_form::{AttendanceForm, AttendanceFormChanges, NewAttendanceForm};
use crate::calendar::Day;
use crate::error::CoreError;
use crate::mission_config::MissionAttendanceConfig;
use crate::object_id::new_object_id;
use crate::roster::Enrollment;
use crate::store::{
    ActivationOutcome, AttendanceFormStore, AttendanceLogStore, MissionConfigSource,
    RosterDirectory,
};
use crate::types::{DbId, Timestamp};

type LogKey = (DbId, DbId, Day);

#[derive(Default)]
struct State {
    /// Mission id to stored config; `None` means defaults apply.
    missions: HashMap<DbId, Option<MissionAttendanceConfig>>,
    enrollments: HashMap<(DbId, DbId), Enrollment>,
    groups: HashMap<(DbId, DbId), Vec<DbId>>,
    logs: HashMap<LogKey, AttendanceLog>,
    /// Insertion order doubles as creation order.
    forms: Vec<AttendanceForm>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- seeding ------------------------------------------------------------

    pub async fn add_mission(&self, mission_id: &str, config: Option<MissionAttendanceConfig>) {
        self.state
            .write()
            .await
            .missions
            .insert(mission_id.to_string(), config);
    }

    pub async fn enroll(
        &self,
        mission_id: &str,
        student_id: &str,
        started_at: Timestamp,
        mentorship_group_id: Option<&str>,
    ) {
        let enrollment = Enrollment {
            mission_id: mission_id.to_string(),
            student_id: student_id.to_string(),
            started_at,
            mentorship_group_id: mentorship_group_id.map(str::to_string),
        };
        self.state
            .write()
            .await
            .enrollments
            .insert((mission_id.to_string(), student_id.to_string()), enrollment);
    }

    /// Create or replace a group's member list.
    pub async fn add_group(&self, mission_id: &str, group_id: &str, members: &[&str]) {
        self.state.write().await.groups.insert(
            (mission_id.to_string(), group_id.to_string()),
            members.iter().map(|m| m.to_string()).collect(),
        );
    }

    pub async fn log_count(&self) -> usize {
        self.state.read().await.logs.len()
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[async_trait]
impl AttendanceLogStore for InMemoryStore {
    async fn upsert_log(&self, input: &UpsertAttendanceLog) -> Result<AttendanceLog, CoreError> {
        let now = Utc::now();
        let key = (input.mission_id.clone(), input.student_id.clone(), input.date);
        let mut state = self.state.write().await;

        let record = state
            .logs
            .entry(key)
            .and_modify(|existing| {
                existing.mentorship_group_id = input.mentorship_group_id.clone();
                existing.status = input.status;
                existing.source = input.source;
                existing.notes = input.notes.clone();
                existing.marked_by = input.marked_by.clone();
                existing.answers = input.answers.clone();
                existing.updated_at = now;
            })
            .or_insert_with(|| AttendanceLog {
                id: new_object_id(),
                mission_id: input.mission_id.clone(),
                student_id: input.student_id.clone(),
                mentorship_group_id: input.mentorship_group_id.clone(),
                date: input.date,
                status: input.status,
                source: input.source,
                notes: input.notes.clone(),
                marked_by: input.marked_by.clone(),
                answers: input.answers.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn list_student_logs(
        &self,
        mission_id: &str,
        student_id: &str,
        from: Day,
        to: Day,
    ) -> Result<Vec<AttendanceLog>, CoreError> {
        let state = self.state.read().await;
        let mut logs: Vec<AttendanceLog> = state
            .logs
            .values()
            .filter(|l| l.mission_id == mission_id && l.student_id == student_id)
            .filter(|l| l.date >= from && l.date <= to)
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.date);
        Ok(logs)
    }

    async fn list_mission_logs(
        &self,
        mission_id: &str,
        filter: &AttendanceLogFilter,
    ) -> Result<Vec<AttendanceLog>, CoreError> {
        let state = self.state.read().await;
        let mut logs: Vec<&AttendanceLog> = state
            .logs
            .values()
            .filter(|l| l.mission_id == mission_id)
            .filter(|l| filter.from.map_or(true, |from| l.date >= from))
            .filter(|l| filter.to.map_or(true, |to| l.date <= to))
            .filter(|l| filter.student_id.as_ref().map_or(true, |s| &l.student_id == s))
            .filter(|l| {
                filter
                    .student_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&l.student_id))
            })
            .collect();
        logs.sort_by(|a, b| (a.date, &a.student_id).cmp(&(b.date, &b.student_id)));

        Ok(logs
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Forms
// ---------------------------------------------------------------------------

#[async_trait]
impl AttendanceFormStore for InMemoryStore {
    async fn create_form(&self, input: &NewAttendanceForm) -> Result<AttendanceForm, CoreError> {
        let now = Utc::now();
        let form = AttendanceForm {
            id: new_object_id(),
            mission_id: input.mission_id.clone(),
            title: input.title.clone(),
            description: input.description.clone(),
            active: false,
            questions: input.questions.clone(),
            created_by: input.created_by.clone(),
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.forms.push(form.clone());
        Ok(form)
    }

    async fn find_form(&self, id: &str) -> Result<Option<AttendanceForm>, CoreError> {
        let state = self.state.read().await;
        Ok(state.forms.iter().find(|f| f.id == id).cloned())
    }

    async fn list_forms(&self, mission_id: &str) -> Result<Vec<AttendanceForm>, CoreError> {
        let state = self.state.read().await;
        Ok(state
            .forms
            .iter()
            .filter(|f| f.mission_id == mission_id)
            .cloned()
            .collect())
    }

    async fn find_active_form(
        &self,
        mission_id: &str,
    ) -> Result<Option<AttendanceForm>, CoreError> {
        let state = self.state.read().await;
        Ok(state
            .forms
            .iter()
            .find(|f| f.mission_id == mission_id && f.active)
            .cloned())
    }

    async fn update_form(
        &self,
        id: &str,
        changes: &AttendanceFormChanges,
    ) -> Result<Option<AttendanceForm>, CoreError> {
        let mut state = self.state.write().await;
        let Some(form) = state.forms.iter_mut().find(|f| f.id == id) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            form.title = title.clone();
        }
        if let Some(description) = &changes.description {
            form.description = (!description.is_empty()).then(|| description.clone());
        }
        if let Some(questions) = &changes.questions {
            form.questions = questions.clone();
        }
        form.updated_at = Utc::now();
        Ok(Some(form.clone()))
    }

    async fn delete_form(&self, id: &str) -> Result<bool, CoreError> {
        let mut state = self.state.write().await;
        let before = state.forms.len();
        state.forms.retain(|f| f.id != id);
        Ok(state.forms.len() != before)
    }

    async fn activate_form(&self, id: &str) -> Result<ActivationOutcome, CoreError> {
        let mut state = self.state.write().await;
        let Some(mission_id) = state
            .forms
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.mission_id.clone())
        else {
            return Ok(ActivationOutcome::NotFound);
        };

        if let Some(other) = state
            .forms
            .iter()
            .find(|f| f.mission_id == mission_id && f.active && f.id != id)
        {
            return Ok(ActivationOutcome::Conflict {
                active_form_id: other.id.clone(),
            });
        }

        let now = Utc::now();
        match state.forms.iter_mut().find(|f| f.id == id) {
            Some(form) => {
                if !form.active {
                    form.active = true;
                    form.updated_at = now;
                }
                Ok(ActivationOutcome::Activated(form.clone()))
            }
            None => Ok(ActivationOutcome::NotFound),
        }
    }

    async fn deactivate_form(&self, id: &str) -> Result<Option<AttendanceForm>, CoreError> {
        let mut state = self.state.write().await;
        Ok(state.forms.iter_mut().find(|f| f.id == id).map(|form| {
            if form.active {
                form.active = false;
                form.updated_at = Utc::now();
            }
            form.clone()
        }))
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

#[async_trait]
impl RosterDirectory for InMemoryStore {
    async fn enrollment(
        &self,
        mission_id: &str,
        student_id: &str,
    ) -> Result<Option<Enrollment>, CoreError> {
        let state = self.state.read().await;
        Ok(state
            .enrollments
            .get(&(mission_id.to_string(), student_id.to_string()))
            .cloned())
    }

    async fn group_members(
        &self,
        mission_id: &str,
        group_id: &str,
    ) -> Result<Option<Vec<DbId>>, CoreError> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .get(&(mission_id.to_string(), group_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl MissionConfigSource for InMemoryStore {
    async fn attendance_config(
        &self,
        mission_id: &str,
    ) -> Result<Option<MissionAttendanceConfig>, CoreError> {
        let state = self.state.read().await;
        Ok(state
            .missions
            .get(mission_id)
            .map(|stored| stored.clone().unwrap_or_default()))
    }

    async fn save_attendance_config(
        &self,
        mission_id: &str,
        config: &MissionAttendanceConfig,
    ) -> Result<Option<MissionAttendanceConfig>, CoreError> {
        let mut state = self.state.write().await;
        Ok(state.missions.get_mut(mission_id).map(|stored| {
            *stored = Some(config.clone());
            config.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{AttendanceSource, AttendanceStatus};
    use crate::calendar::parse_day_key;

    const MISSION: &str = "65a1b2c3d4e5f60718293a00";
    const ALICE: &str = "65a1b2c3d4e5f60718293a01";

    fn upsert(date: &str, status: AttendanceStatus) -> UpsertAttendanceLog {
        UpsertAttendanceLog {
            mission_id: MISSION.into(),
            student_id: ALICE.into(),
            date: parse_day_key(date).unwrap(),
            mentorship_group_id: None,
            status,
            source: AttendanceSource::System,
            notes: None,
            marked_by: None,
            answers: None,
        }
    }

    #[tokio::test]
    async fn upsert_keeps_id_and_created_at() {
        let store = InMemoryStore::new();
        let first = store.upsert_log(&upsert("2025-01-06", AttendanceStatus::Absent)).await.unwrap();
        let second = store.upsert_log(&upsert("2025-01-06", AttendanceStatus::Present)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.status, AttendanceStatus::Present);
        assert_eq!(store.log_count().await, 1);
    }

    #[tokio::test]
    async fn student_logs_are_ascending_and_bounded() {
        let store = InMemoryStore::new();
        for d in ["2025-01-08", "2025-01-06", "2025-01-10"] {
            store.upsert_log(&upsert(d, AttendanceStatus::Present)).await.unwrap();
        }
        let logs = store
            .list_student_logs(
                MISSION,
                ALICE,
                parse_day_key("2025-01-06").unwrap(),
                parse_day_key("2025-01-08").unwrap(),
            )
            .await
            .unwrap();
        let days: Vec<_> = logs.iter().map(|l| l.date.to_string()).collect();
        assert_eq!(days, vec!["2025-01-06", "2025-01-08"]);
    }

    #[tokio::test]
    async fn unknown_mission_has_no_config() {
        let store = InMemoryStore::new();
        assert!(store.attendance_config(MISSION).await.unwrap().is_none());
        assert!(store
            .save_attendance_config(MISSION, &MissionAttendanceConfig::default())
            .await
            .unwrap()
            .is_none());
    }
}
