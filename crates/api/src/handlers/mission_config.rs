//! Handlers for a mission's attendance configuration.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use mission_core::config_service::MissionConfigService;
use mission_core::mission_config::MissionAttendanceConfigInput;

use crate::error::AppResult;
use crate::middleware::rbac::{RequireAdmin, RequireAuth};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/missions/{mission_id}/attendance/config
///
/// The effective config; defaults when none has been saved.
pub async fn get_config(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(mission_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let config = MissionConfigService::new(&state.store).get(&mission_id).await?;
    Ok(Json(DataResponse { data: config }))
}

/// PUT /api/v1/missions/{mission_id}/attendance/config
///
/// Replace the config. Omitted fields revert to their defaults.
pub async fn replace_config(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(mission_id): Path<String>,
    Json(input): Json<MissionAttendanceConfigInput>,
) -> AppResult<impl IntoResponse> {
    let config = MissionConfigService::new(&state.store)
        .replace(&mission_id, &input)
        .await?;

    tracing::info!(mission_id = %mission_id, user_id = %admin.user_id, "Mission attendance config replaced via API");

    Ok(Json(DataResponse { data: config }))
}
