//! Route definitions for mission attendance.
//!
//! - `mission_router()` for routes scoped to one mission, mounted at
//!   `/missions/{mission_id}/attendance`
//! - `forms_router()` for form routes addressed by form id, mounted at
//!   `/attendance/forms`

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{attendance, attendance_forms, mission_config};
use crate::state::AppState;

/// Mission-scoped attendance routes.
///
/// ```text
/// GET  /config                  -> get_config
/// PUT  /config                  -> replace_config
/// GET  /forms                   -> list_forms
/// POST /forms                   -> create_form
/// GET  /forms/active            -> get_active_form
/// POST /mark                    -> mark_attendance
/// POST /bulk                    -> bulk_mark_attendance
/// GET  /logs                    -> list_logs
/// GET  /summary                 -> get_roster_summary
/// GET  /summary/{student_id}    -> get_student_summary
/// ```
pub fn mission_router() -> Router<AppState> {
    Router::new()
        .route(
            "/config",
            get(mission_config::get_config).put(mission_config::replace_config),
        )
        .route(
            "/forms",
            get(attendance_forms::list_forms).post(attendance_forms::create_form),
        )
        .route("/forms/active", get(attendance_forms::get_active_form))
        .route("/mark", post(attendance::mark_attendance))
        .route("/bulk", post(attendance::bulk_mark_attendance))
        .route("/logs", get(attendance::list_logs))
        .route("/summary", get(attendance::get_roster_summary))
        .route("/summary/{student_id}", get(attendance::get_student_summary))
}

/// Form routes addressed by form id.
///
/// ```text
/// GET    /{id}              -> get_form
/// PUT    /{id}              -> update_form
/// DELETE /{id}              -> delete_form
/// POST   /{id}/activate     -> activate_form
/// POST   /{id}/deactivate   -> deactivate_form
/// ```
pub fn forms_router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(attendance_forms::get_form)
                .put(attendance_forms::update_form)
                .delete(attendance_forms::delete_form),
        )
        .route("/{id}/activate", post(attendance_forms::activate_form))
        .route("/{id}/deactivate", post(attendance_forms::deactivate_form))
}
