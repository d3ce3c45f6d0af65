//! Attendance form lifecycle: create, edit, delete, and the single-active
//! transition.

use crate::attendance_form::{
    normalize_questions, validate_form_description, validate_form_title, AttendanceForm,
    AttendanceFormChanges, FormQuestionInput, NewAttendanceForm,
};
use crate::error::CoreError;
use crate::object_id::normalize_object_id;
use crate::store::{ActivationOutcome, AttendanceFormStore, MissionConfigSource};
use crate::types::DbId;

/// Caller input for a new form.
#[derive(Debug, Clone)]
pub struct CreateAttendanceForm {
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<FormQuestionInput>,
}

/// Caller input for a partial form update.
#[derive(Debug, Clone, Default)]
pub struct UpdateAttendanceForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub questions: Option<Vec<FormQuestionInput>>,
}

pub struct FormService<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> FormService<'a, S>
where
    S: AttendanceFormStore + MissionConfigSource + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        mission_id: &str,
        input: CreateAttendanceForm,
        created_by: Option<&str>,
    ) -> Result<AttendanceForm, CoreError> {
        let mission_id = normalize_object_id("mission_id", mission_id).map_err(CoreError::Validation)?;
        let created_by = created_by
            .map(|id| normalize_object_id("created_by", id))
            .transpose()
            .map_err(CoreError::Validation)?;

        let title = validate_form_title(&input.title).map_err(CoreError::Validation)?;
        let description = normalize_description(input.description)?;
        let questions = normalize_questions(&input.questions).map_err(CoreError::Validation)?;

        self.ensure_mission(&mission_id).await?;

        let form = self
            .store
            .create_form(&NewAttendanceForm {
                mission_id,
                title,
                description,
                questions,
                created_by,
            })
            .await?;

        tracing::info!(
            form_id = %form.id,
            mission_id = %form.mission_id,
            questions = form.questions.len(),
            "Attendance form created"
        );
        Ok(form)
    }

    pub async fn get(&self, id: &str) -> Result<AttendanceForm, CoreError> {
        let id = normalize_form_id(id)?;
        let form = self.store.find_form(&id).await?;
        form.ok_or(CoreError::NotFound {
            entity: "AttendanceForm",
            id,
        })
    }

    pub async fn list(&self, mission_id: &str) -> Result<Vec<AttendanceForm>, CoreError> {
        let mission_id = normalize_object_id("mission_id", mission_id).map_err(CoreError::Validation)?;
        self.ensure_mission(&mission_id).await?;
        self.store.list_forms(&mission_id).await
    }

    /// The mission's active form, if any.
    pub async fn active(&self, mission_id: &str) -> Result<Option<AttendanceForm>, CoreError> {
        let mission_id = normalize_object_id("mission_id", mission_id).map_err(CoreError::Validation)?;
        self.ensure_mission(&mission_id).await?;
        self.store.find_active_form(&mission_id).await
    }

    /// Apply a partial update. Stored answers on existing logs are untouched.
    pub async fn update(
        &self,
        id: &str,
        input: UpdateAttendanceForm,
    ) -> Result<AttendanceForm, CoreError> {
        let id = normalize_form_id(id)?;
        let changes = AttendanceFormChanges {
            title: input
                .title
                .as_deref()
                .map(validate_form_title)
                .transpose()
                .map_err(CoreError::Validation)?,
            description: match input.description {
                // An explicit blank clears the description.
                Some(d) => Some(normalize_description(Some(d))?.unwrap_or_default()),
                None => None,
            },
            questions: input
                .questions
                .as_deref()
                .map(normalize_questions)
                .transpose()
                .map_err(CoreError::Validation)?,
        };

        let updated = self.store.update_form(&id, &changes).await?;
        let form = updated.ok_or(CoreError::NotFound {
            entity: "AttendanceForm",
            id,
        })?;

        tracing::info!(form_id = %form.id, mission_id = %form.mission_id, "Attendance form updated");
        Ok(form)
    }

    pub async fn delete(&self, id: &str) -> Result<(), CoreError> {
        let id = normalize_form_id(id)?;
        if !self.store.delete_form(&id).await? {
            return Err(CoreError::NotFound {
                entity: "AttendanceForm",
                id,
            });
        }
        tracing::info!(form_id = %id, "Attendance form deleted");
        Ok(())
    }

    /// Make a form its mission's active form.
    ///
    /// Re-activating the active form is a no-op success.
    pub async fn activate(&self, id: &str) -> Result<AttendanceForm, CoreError> {
        let id = normalize_form_id(id)?;
        match self.store.activate_form(&id).await? {
            ActivationOutcome::Activated(form) => {
                tracing::info!(
                    form_id = %form.id,
                    mission_id = %form.mission_id,
                    "Attendance form activated"
                );
                Ok(form)
            }
            ActivationOutcome::NotFound => Err(CoreError::NotFound {
                entity: "AttendanceForm",
                id,
            }),
            ActivationOutcome::Conflict { active_form_id } => Err(CoreError::Conflict(format!(
                "Attendance form {active_form_id} is already active for this mission"
            ))),
        }
    }

    pub async fn deactivate(&self, id: &str) -> Result<AttendanceForm, CoreError> {
        let id = normalize_form_id(id)?;
        let deactivated = self.store.deactivate_form(&id).await?;
        let form = deactivated.ok_or(CoreError::NotFound {
            entity: "AttendanceForm",
            id,
        })?;
        tracing::info!(form_id = %form.id, "Attendance form deactivated");
        Ok(form)
    }

    async fn ensure_mission(&self, mission_id: &str) -> Result<(), CoreError> {
        match self.store.attendance_config(mission_id).await? {
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound {
                entity: "Mission",
                id: mission_id.to_string(),
            }),
        }
    }
}

fn normalize_form_id(id: &str) -> Result<DbId, CoreError> {
    normalize_object_id("form_id", id).map_err(CoreError::Validation)
}

fn normalize_description(description: Option<String>) -> Result<Option<String>, CoreError> {
    match description.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(d) => {
            validate_form_description(d).map_err(CoreError::Validation)?;
            Ok(Some(d.to_string()))
        }
    }
}
