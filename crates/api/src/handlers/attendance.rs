//! Handlers for marking attendance and reading the ledger.
//!
//! Marking is open to any authenticated user, but students may only mark
//! themselves and only with source `student`. Bulk marking, raw log pages and
//! roster summaries are staff-only.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use mission_core::attendance::{AttendanceSource, AttendanceStatus};
use mission_core::calendar::DayInput;
use mission_core::error::CoreError;
use mission_core::marking::{BulkMarkAttendance, MarkAttendance, MarkingService};
use mission_core::object_id::normalize_object_id;
use mission_core::roster::RosterSelector;
use mission_core::summary::{LogQuery, SummaryEngine};
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireAuth, RequireStaff};
use crate::query::split_id_list;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Body of `POST /missions/{mission_id}/attendance/mark`.
#[derive(Debug, Deserialize, Validate)]
pub struct MarkAttendanceRequest {
    /// Defaults to the caller.
    pub student_id: Option<String>,
    /// ISO date, RFC 3339 instant or epoch millis. Defaults to today.
    pub date: Option<DayInput>,
    #[validate(length(min = 1, max = 16))]
    pub status: String,
    /// Defaults to the caller's role.
    pub source: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub answers: Option<serde_json::Value>,
    pub mentorship_group_id: Option<String>,
}

/// Body of `POST /missions/{mission_id}/attendance/bulk`.
///
/// `mentorship_group_id` takes precedence over `student_ids`.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkMarkRequest {
    pub mentorship_group_id: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub student_ids: Option<Vec<String>>,
    pub date: Option<DayInput>,
    #[validate(length(min = 1, max = 16))]
    pub status: String,
    pub source: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Query of `GET /missions/{mission_id}/attendance/logs`.
#[derive(Debug, Default, Deserialize)]
pub struct LogsParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub student_id: Option<String>,
    pub group_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query of `GET /missions/{mission_id}/attendance/summary`.
#[derive(Debug, Default, Deserialize)]
pub struct RosterSummaryParams {
    pub group_id: Option<String>,
    /// Comma-separated student ids.
    pub student_ids: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_status(raw: &str) -> AppResult<AttendanceStatus> {
    raw.parse()
        .map_err(|msg: String| AppError::Core(CoreError::Validation(msg)))
}

/// Explicit source if given, otherwise the one implied by the caller's role.
fn resolve_source(user: &AuthUser, requested: Option<&str>) -> AppResult<AttendanceSource> {
    match requested {
        Some(raw) => raw
            .parse()
            .map_err(|msg: String| AppError::Core(CoreError::Validation(msg))),
        None => AttendanceSource::for_role(&user.role).ok_or_else(|| {
            AppError::Core(CoreError::Forbidden(format!(
                "Role '{}' cannot record attendance",
                user.role
            )))
        }),
    }
}

/// Resolve the target student of a single mark and enforce self-marking rules.
fn resolve_mark_target(
    user: &AuthUser,
    student_id: Option<&str>,
    source: AttendanceSource,
) -> AppResult<String> {
    let student_id = match student_id {
        Some(raw) => normalize_object_id("student_id", raw).map_err(CoreError::Validation)?,
        None => user.user_id.clone(),
    };

    if !user.is_staff() {
        if student_id != user.user_id {
            return Err(AppError::Core(CoreError::Forbidden(
                "Students may only mark their own attendance".into(),
            )));
        }
        if source != AttendanceSource::Student {
            return Err(AppError::Core(CoreError::Forbidden(
                "Students may only record attendance with source 'student'".into(),
            )));
        }
    }
    Ok(student_id)
}

// ---------------------------------------------------------------------------
// Marking
// ---------------------------------------------------------------------------

/// POST /api/v1/missions/{mission_id}/attendance/mark
///
/// Create or overwrite one student's entry for a day.
pub async fn mark_attendance(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(mission_id): Path<String>,
    Json(input): Json<MarkAttendanceRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let status = parse_status(&input.status)?;
    let source = resolve_source(&user, input.source.as_deref())?;
    let student_id = resolve_mark_target(&user, input.student_id.as_deref(), source)?;

    let req = MarkAttendance {
        mission_id,
        student_id,
        date: input.date,
        status,
        source,
        marked_by: Some(user.user_id.clone()),
        notes: input.notes,
        answers: input.answers,
        mentorship_group_id: input.mentorship_group_id,
    };
    let log = MarkingService::new(&state.store)
        .mark_one(req, chrono::Utc::now())
        .await?;

    tracing::info!(
        user_id = %user.user_id,
        mission_id = %log.mission_id,
        student_id = %log.student_id,
        date = %log.date,
        status = %log.status,
        "Attendance marked via API",
    );

    Ok(Json(DataResponse { data: log }))
}

/// POST /api/v1/missions/{mission_id}/attendance/bulk
///
/// Mark a group or explicit list of students. Per-student failures are
/// reported in the body; the call itself succeeds once the roster resolves.
pub async fn bulk_mark_attendance(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(mission_id): Path<String>,
    Json(input): Json<BulkMarkRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let status = parse_status(&input.status)?;
    let source = resolve_source(&user, input.source.as_deref())?;
    let roster = RosterSelector::from_parts(
        input.mentorship_group_id.as_deref(),
        input.student_ids.as_deref(),
    )
    .map_err(CoreError::Validation)?;

    let req = BulkMarkAttendance {
        mission_id,
        roster,
        date: input.date,
        status,
        source,
        marked_by: Some(user.user_id.clone()),
        notes: input.notes,
    };
    let result = MarkingService::new(&state.store)
        .with_bulk_concurrency(state.config.bulk_mark_concurrency)
        .mark_bulk(req, chrono::Utc::now())
        .await?;

    tracing::info!(
        user_id = %user.user_id,
        date = %result.date,
        succeeded = result.succeeded,
        failed = result.failed,
        "Bulk attendance marked via API",
    );

    Ok(Json(DataResponse { data: result }))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/missions/{mission_id}/attendance/logs
///
/// Page through raw ledger rows, ordered by day then student id.
pub async fn list_logs(
    RequireStaff(_user): RequireStaff,
    State(state): State<AppState>,
    Path(mission_id): Path<String>,
    Query(params): Query<LogsParams>,
) -> AppResult<impl IntoResponse> {
    let query = LogQuery {
        from: params.from.as_deref().map(DayInput::from_query),
        to: params.to.as_deref().map(DayInput::from_query),
        student_id: params.student_id,
        group_id: params.group_id,
        limit: params.limit,
        offset: params.offset,
    };
    let logs = SummaryEngine::new(&state.store)
        .list_logs(&mission_id, query)
        .await?;

    Ok(Json(DataResponse { data: logs }))
}

/// GET /api/v1/missions/{mission_id}/attendance/summary/{student_id}
///
/// Summary for one student as of now. Students may only read their own.
pub async fn get_student_summary(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path((mission_id, student_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let student_id =
        normalize_object_id("student_id", &student_id).map_err(CoreError::Validation)?;
    if !user.is_staff() && student_id != user.user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Students may only view their own attendance".into(),
        )));
    }

    let summary = SummaryEngine::new(&state.store)
        .summarize_student(&mission_id, &student_id, chrono::Utc::now())
        .await?;

    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/missions/{mission_id}/attendance/summary?group_id=|student_ids=
///
/// Per-student summaries plus roster totals.
pub async fn get_roster_summary(
    RequireStaff(_user): RequireStaff,
    State(state): State<AppState>,
    Path(mission_id): Path<String>,
    Query(params): Query<RosterSummaryParams>,
) -> AppResult<impl IntoResponse> {
    let student_ids = params.student_ids.as_deref().map(split_id_list);
    let roster = RosterSelector::from_parts(params.group_id.as_deref(), student_ids.as_deref())
        .map_err(CoreError::Validation)?;

    let summary = SummaryEngine::new(&state.store)
        .summarize_roster(&mission_id, &roster, chrono::Utc::now())
        .await?;

    Ok(Json(DataResponse { data: summary }))
}
