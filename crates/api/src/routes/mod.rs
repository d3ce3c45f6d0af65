pub mod attendance;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /missions/{mission_id}/attendance/config                 get, replace (admin)
/// /missions/{mission_id}/attendance/forms                  list, create (staff)
/// /missions/{mission_id}/attendance/forms/active           active form (auth)
/// /missions/{mission_id}/attendance/mark                   mark one (auth)
/// /missions/{mission_id}/attendance/bulk                   bulk mark (staff)
/// /missions/{mission_id}/attendance/logs                   raw log page (staff)
/// /missions/{mission_id}/attendance/summary                roster summary (staff)
/// /missions/{mission_id}/attendance/summary/{student_id}   student summary (self or staff)
///
/// /attendance/forms/{id}                                   get, update, delete
/// /attendance/forms/{id}/activate                          activate (POST)
/// /attendance/forms/{id}/deactivate                        deactivate (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest(
            "/missions/{mission_id}/attendance",
            attendance::mission_router(),
        )
        .nest("/attendance/forms", attendance::forms_router())
}
