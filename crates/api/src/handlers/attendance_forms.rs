//! Handlers for attendance form management.
//!
//! Authoring is staff-only; any authenticated user may read a form or the
//! mission's active form.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use mission_core::attendance_form::FormQuestionInput;
use mission_core::form_service::{CreateAttendanceForm, FormService, UpdateAttendanceForm};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::rbac::{RequireAuth, RequireStaff};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFormRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub questions: Vec<FormQuestionInput>,
}

impl From<CreateFormRequest> for CreateAttendanceForm {
    fn from(req: CreateFormRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            questions: req.questions,
        }
    }
}

/// Partial update. An empty `description` clears it.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFormRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub questions: Option<Vec<FormQuestionInput>>,
}

impl From<UpdateFormRequest> for UpdateAttendanceForm {
    fn from(req: UpdateFormRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            questions: req.questions,
        }
    }
}

/// GET /api/v1/missions/{mission_id}/attendance/forms
pub async fn list_forms(
    RequireStaff(_user): RequireStaff,
    State(state): State<AppState>,
    Path(mission_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let forms = FormService::new(&state.store).list(&mission_id).await?;
    Ok(Json(DataResponse { data: forms }))
}

/// POST /api/v1/missions/{mission_id}/attendance/forms
///
/// New forms start inactive.
pub async fn create_form(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(mission_id): Path<String>,
    Json(input): Json<CreateFormRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let form = FormService::new(&state.store)
        .create(&mission_id, input.into(), Some(user.user_id.as_str()))
        .await?;

    tracing::info!(
        form_id = %form.id,
        mission_id = %form.mission_id,
        user_id = %user.user_id,
        "Attendance form created via API",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: form })))
}

/// GET /api/v1/missions/{mission_id}/attendance/forms/active
///
/// Returns 204 when the mission has no active form.
pub async fn get_active_form(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(mission_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let active = FormService::new(&state.store).active(&mission_id).await?;

    match active {
        Some(form) => Ok(Json(DataResponse { data: form }).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// GET /api/v1/attendance/forms/{id}
pub async fn get_form(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let form = FormService::new(&state.store).get(&id).await?;
    Ok(Json(DataResponse { data: form }))
}

/// PUT /api/v1/attendance/forms/{id}
pub async fn update_form(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateFormRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let form = FormService::new(&state.store).update(&id, input.into()).await?;

    tracing::info!(form_id = %form.id, user_id = %user.user_id, "Attendance form updated via API");

    Ok(Json(DataResponse { data: form }))
}

/// DELETE /api/v1/attendance/forms/{id}
///
/// Existing log answers are left untouched.
pub async fn delete_form(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    FormService::new(&state.store).delete(&id).await?;

    tracing::info!(form_id = %id, user_id = %user.user_id, "Attendance form deleted via API");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/attendance/forms/{id}/activate
///
/// 409 if another form of the same mission is already active.
pub async fn activate_form(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let form = FormService::new(&state.store).activate(&id).await?;

    tracing::info!(
        form_id = %form.id,
        mission_id = %form.mission_id,
        user_id = %user.user_id,
        "Attendance form activated via API",
    );

    Ok(Json(DataResponse { data: form }))
}

/// POST /api/v1/attendance/forms/{id}/deactivate
pub async fn deactivate_form(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let form = FormService::new(&state.store).deactivate(&id).await?;

    tracing::info!(form_id = %form.id, user_id = %user.user_id, "Attendance form deactivated via API");

    Ok(Json(DataResponse { data: form }))
}
