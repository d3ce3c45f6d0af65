//! The single write path for attendance status.
//!
//! Every write is an upsert keyed by `(mission_id, student_id, day)`, so
//! repeating a mark (or a whole bulk batch) is safe. Bulk marking validates
//! the request up front, then applies one independent upsert per student and
//! reports each student's outcome instead of failing the batch.

use futures::stream::{self, StreamExt};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::attendance::{
    normalize_notes, validate_answers, AttendanceLog, AttendanceSource, AttendanceStatus,
    UpsertAttendanceLog,
};
use crate::calendar::{resolve_day, to_local_midnight, Day, DayInput};
use crate::error::CoreError;
use crate::mission_config::MissionAttendanceConfig;
use crate::object_id::normalize_object_id;
use crate::roster::RosterSelector;
use crate::store::{AttendanceLogStore, MissionConfigSource, RosterDirectory};
use crate::types::{DbId, Timestamp};

/// Default number of concurrent upserts during a bulk mark.
pub const DEFAULT_BULK_CONCURRENCY: usize = 8;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Mark one student for one day.
#[derive(Debug, Clone)]
pub struct MarkAttendance {
    pub mission_id: DbId,
    pub student_id: DbId,
    /// Defaults to the mission-local day of `now`.
    pub date: Option<DayInput>,
    pub status: AttendanceStatus,
    pub source: AttendanceSource,
    pub marked_by: Option<DbId>,
    pub notes: Option<String>,
    pub answers: Option<serde_json::Value>,
    /// Defaults to the student's enrollment group.
    pub mentorship_group_id: Option<DbId>,
}

/// Mark a roster for one day.
#[derive(Debug, Clone)]
pub struct BulkMarkAttendance {
    pub mission_id: DbId,
    pub roster: RosterSelector,
    pub date: Option<DayInput>,
    pub status: AttendanceStatus,
    pub source: AttendanceSource,
    pub marked_by: Option<DbId>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Bulk results
// ---------------------------------------------------------------------------

/// Outcome for one student in a bulk mark.
#[derive(Debug)]
pub struct BulkMarkOutcome {
    pub student_id: DbId,
    pub result: Result<AttendanceLog, CoreError>,
}

impl BulkMarkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Serialized as `{ student_id, ok, record? , error?: { code, message } }`.
impl Serialize for BulkMarkOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("BulkMarkOutcome", 3)?;
        s.serialize_field("student_id", &self.student_id)?;
        s.serialize_field("ok", &self.result.is_ok())?;
        match &self.result {
            Ok(record) => s.serialize_field("record", record)?,
            Err(err) => s.serialize_field(
                "error",
                &serde_json::json!({ "code": err.code(), "message": err.to_string() }),
            )?,
        }
        s.end()
    }
}

#[derive(Debug, Serialize)]
pub struct BulkMarkResult {
    pub date: Day,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkMarkOutcome>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Fields shared by every row written in one marking call.
struct WriteTemplate<'r> {
    mission_id: &'r str,
    day: Day,
    status: AttendanceStatus,
    source: AttendanceSource,
    marked_by: Option<&'r DbId>,
    notes: Option<&'r String>,
    answers: Option<&'r serde_json::Value>,
}

pub struct MarkingService<'a, S: ?Sized> {
    store: &'a S,
    bulk_concurrency: usize,
}

impl<'a, S> MarkingService<'a, S>
where
    S: AttendanceLogStore + RosterDirectory + MissionConfigSource + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
        }
    }

    pub fn with_bulk_concurrency(mut self, concurrency: usize) -> Self {
        self.bulk_concurrency = concurrency.max(1);
        self
    }

    /// Mark one student. Fails the whole call on any error.
    pub async fn mark_one(
        &self,
        req: MarkAttendance,
        now: Timestamp,
    ) -> Result<AttendanceLog, CoreError> {
        let mission_id = normalize_object_id("mission_id", &req.mission_id).map_err(CoreError::Validation)?;
        let student_id = normalize_object_id("student_id", &req.student_id).map_err(CoreError::Validation)?;
        let marked_by = normalize_optional_id("marked_by", req.marked_by.as_deref())?;
        let group_id = normalize_optional_id("mentorship_group_id", req.mentorship_group_id.as_deref())?;
        let notes = normalize_notes(req.notes)?;
        if let Some(answers) = &req.answers {
            validate_answers(answers).map_err(CoreError::Validation)?;
        }

        let config = self.load_config(&mission_id).await?;
        let day = resolve_day(req.date.as_ref(), now, config.timezone).map_err(CoreError::Validation)?;
        ensure_not_future(day, now, &config)?;

        let template = WriteTemplate {
            mission_id: &mission_id,
            day,
            status: req.status,
            source: req.source,
            marked_by: marked_by.as_ref(),
            notes: notes.as_ref(),
            answers: req.answers.as_ref(),
        };
        self.write_for_student(&config, &template, &student_id, group_id.as_deref())
            .await
    }

    /// Mark every student of a roster.
    ///
    /// Malformed input, an unknown mission or group, and an empty roster are
    /// rejected before any write. After that, per-student failures are
    /// reported in the result and never abort the batch.
    pub async fn mark_bulk(
        &self,
        req: BulkMarkAttendance,
        now: Timestamp,
    ) -> Result<BulkMarkResult, CoreError> {
        let mission_id = normalize_object_id("mission_id", &req.mission_id).map_err(CoreError::Validation)?;
        let marked_by = normalize_optional_id("marked_by", req.marked_by.as_deref())?;
        let notes = normalize_notes(req.notes)?;

        let config = self.load_config(&mission_id).await?;
        let day = resolve_day(req.date.as_ref(), now, config.timezone).map_err(CoreError::Validation)?;
        ensure_not_future(day, now, &config)?;

        let roster = match &req.roster {
            RosterSelector::Students(ids) => ids.clone(),
            RosterSelector::Group(group_id) => self
                .store
                .group_members(&mission_id, group_id)
                .await?
                .ok_or_else(|| CoreError::NotFound {
                    entity: "MentorshipGroup",
                    id: group_id.clone(),
                })?,
        };
        if roster.is_empty() {
            return Err(CoreError::Validation("Roster is empty".to_string()));
        }

        let template = WriteTemplate {
            mission_id: &mission_id,
            day,
            status: req.status,
            source: req.source,
            marked_by: marked_by.as_ref(),
            notes: notes.as_ref(),
            answers: None,
        };
        let group_id = req.roster.group_id();

        let mut indexed: Vec<(usize, BulkMarkOutcome)> = stream::iter(roster.into_iter().enumerate())
            .map(|(index, student_id)| {
                let config = &config;
                let template = &template;
                async move {
                    let result = self
                        .write_for_student(config, template, &student_id, group_id)
                        .await;
                    if let Err(err) = &result {
                        tracing::warn!(
                            mission_id = %template.mission_id,
                            student_id = %student_id,
                            code = err.code(),
                            error = %err,
                            "Bulk attendance item rejected"
                        );
                    }
                    (index, BulkMarkOutcome { student_id, result })
                }
            })
            .buffer_unordered(self.bulk_concurrency)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);

        let results: Vec<BulkMarkOutcome> = indexed.into_iter().map(|(_, o)| o).collect();
        let succeeded = results.iter().filter(|o| o.is_ok()).count();
        let failed = results.len() - succeeded;

        tracing::info!(
            mission_id = %mission_id,
            day = %day,
            status = %req.status,
            succeeded,
            failed,
            "Bulk attendance marked"
        );

        Ok(BulkMarkResult {
            date: day,
            succeeded,
            failed,
            results,
        })
    }

    async fn load_config(&self, mission_id: &str) -> Result<MissionAttendanceConfig, CoreError> {
        self.store
            .attendance_config(mission_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "Mission",
                id: mission_id.to_string(),
            })
    }

    /// Eligibility check plus upsert for one student.
    async fn write_for_student(
        &self,
        config: &MissionAttendanceConfig,
        template: &WriteTemplate<'_>,
        student_id: &str,
        group_id: Option<&str>,
    ) -> Result<AttendanceLog, CoreError> {
        let enrollment = self
            .store
            .enrollment(template.mission_id, student_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "Enrollment",
                id: student_id.to_string(),
            })?;

        let start = to_local_midnight(enrollment.started_at, config.timezone);
        if template.day < start {
            return Err(CoreError::OutOfRange(format!(
                "{} is before enrollment start {} for student {student_id}",
                template.day, start
            )));
        }

        let input = UpsertAttendanceLog {
            mission_id: template.mission_id.to_string(),
            student_id: student_id.to_string(),
            date: template.day,
            mentorship_group_id: group_id
                .map(str::to_string)
                .or(enrollment.mentorship_group_id),
            status: template.status,
            source: template.source,
            notes: template.notes.cloned(),
            marked_by: template.marked_by.cloned(),
            answers: template.answers.cloned(),
        };
        let record = self.store.upsert_log(&input).await?;

        tracing::info!(
            mission_id = %record.mission_id,
            student_id = %record.student_id,
            day = %record.date,
            status = %record.status,
            source = %record.source,
            "Attendance marked"
        );
        Ok(record)
    }
}

/// Days after today in the mission's zone cannot be marked yet.
fn ensure_not_future(
    day: Day,
    now: Timestamp,
    config: &MissionAttendanceConfig,
) -> Result<(), CoreError> {
    let today = to_local_midnight(now, config.timezone);
    if day > today {
        return Err(CoreError::OutOfRange(format!(
            "{day} is after today ({today}) in the mission's timezone"
        )));
    }
    Ok(())
}

fn normalize_optional_id(field: &str, id: Option<&str>) -> Result<Option<DbId>, CoreError> {
    id.map(|v| normalize_object_id(field, v))
        .transpose()
        .map_err(CoreError::Validation)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::parse_day_key;
    use crate::memory::InMemoryStore;
    use assert_matches::assert_matches;
    use chrono::{DateTime, Utc};

    const MISSION: &str = "65a1b2c3d4e5f60718293a00";
    const GROUP: &str = "65a1b2c3d4e5f60718293aaa";
    const ALICE: &str = "65a1b2c3d4e5f60718293a01";
    const BOB: &str = "65a1b2c3d4e5f60718293a02";
    const CARA: &str = "65a1b2c3d4e5f60718293a03";
    const MENTOR: &str = "65a1b2c3d4e5f60718293b01";

    fn instant(raw: &str) -> Timestamp {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.add_mission(MISSION, None).await;
        store
            .enroll(MISSION, ALICE, instant("2025-01-05T04:00:00Z"), Some(GROUP))
            .await;
        store
            .enroll(MISSION, BOB, instant("2025-01-05T04:00:00Z"), Some(GROUP))
            .await;
        // Starts 2025-01-07 in Asia/Dhaka.
        store
            .enroll(MISSION, CARA, instant("2025-01-06T20:00:00Z"), Some(GROUP))
            .await;
        store
            .add_group(MISSION, GROUP, &[ALICE, BOB, CARA])
            .await;
        store
    }

    fn mark(student: &str, date: &str, status: AttendanceStatus) -> MarkAttendance {
        MarkAttendance {
            mission_id: MISSION.to_string(),
            student_id: student.to_string(),
            date: Some(DayInput::Text(date.to_string())),
            status,
            source: AttendanceSource::Mentor,
            marked_by: Some(MENTOR.to_string()),
            notes: None,
            answers: None,
            mentorship_group_id: None,
        }
    }

    fn bulk(date: &str, status: AttendanceStatus) -> BulkMarkAttendance {
        BulkMarkAttendance {
            mission_id: MISSION.to_string(),
            roster: RosterSelector::Group(GROUP.to_string()),
            date: Some(DayInput::Text(date.to_string())),
            status,
            source: AttendanceSource::Mentor,
            marked_by: Some(MENTOR.to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn mark_one_writes_normalized_day() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);
        let mut req = mark(ALICE, "2025-01-06T19:00:00Z", AttendanceStatus::Present);
        req.answers = Some(serde_json::json!({"mood": "focused"}));

        let record = svc.mark_one(req, Utc::now()).await.unwrap();
        assert_eq!(record.date, parse_day_key("2025-01-07").unwrap());
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.mentorship_group_id.as_deref(), Some(GROUP));
        assert_eq!(record.marked_by.as_deref(), Some(MENTOR));
        assert_eq!(record.answers, Some(serde_json::json!({"mood": "focused"})));
    }

    #[tokio::test]
    async fn remarking_overwrites_same_row() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);

        let first = svc
            .mark_one(mark(ALICE, "2025-01-06", AttendanceStatus::Absent), Utc::now())
            .await
            .unwrap();
        let mut again = mark(ALICE, "2025-01-06T10:00:00+06:00", AttendanceStatus::Excused);
        again.notes = Some("doctor's note".into());
        let second = svc.mark_one(again, Utc::now()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, AttendanceStatus::Excused);
        assert_eq!(second.notes.as_deref(), Some("doctor's note"));
        assert_eq!(store.log_count().await, 1);
    }

    #[tokio::test]
    async fn future_day_is_out_of_range() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);
        let now = instant("2025-01-08T06:00:00Z");

        let err = svc
            .mark_one(mark(ALICE, "2030-06-03", AttendanceStatus::Present), now)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::OutOfRange(_));

        let err = svc
            .mark_one(mark(ALICE, "2025-01-09", AttendanceStatus::Present), now)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::OutOfRange(_));

        let err = svc
            .mark_bulk(bulk("2025-01-09", AttendanceStatus::Absent), now)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::OutOfRange(_));
        assert_eq!(store.log_count().await, 0);

        svc.mark_one(mark(ALICE, "2025-01-08", AttendanceStatus::Present), now)
            .await
            .unwrap();
        assert_eq!(store.log_count().await, 1);
    }

    #[tokio::test]
    async fn default_date_is_today_in_mission_zone() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);
        let mut req = mark(ALICE, "", AttendanceStatus::Present);
        req.date = None;

        let record = svc
            .mark_one(req, instant("2025-01-08T22:00:00Z"))
            .await
            .unwrap();
        assert_eq!(record.date, parse_day_key("2025-01-09").unwrap());
    }

    #[tokio::test]
    async fn before_enrollment_is_out_of_range_and_writes_nothing() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);

        let err = svc
            .mark_one(mark(CARA, "2025-01-06", AttendanceStatus::Present), Utc::now())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::OutOfRange(_));
        assert_eq!(store.log_count().await, 0);
    }

    #[tokio::test]
    async fn enrollment_start_day_is_markable() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);
        assert!(svc
            .mark_one(mark(CARA, "2025-01-07", AttendanceStatus::Present), Utc::now())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn unknown_mission_is_not_found() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);
        let mut req = mark(ALICE, "2025-01-06", AttendanceStatus::Present);
        req.mission_id = "ffffffffffffffffffffffff".into();

        let err = svc.mark_one(req, Utc::now()).await.unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "Mission", .. });
    }

    #[tokio::test]
    async fn unenrolled_student_is_not_found() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);
        let err = svc
            .mark_one(
                mark("0000000000000000000000ff", "2025-01-06", AttendanceStatus::Present),
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "Enrollment", .. });
    }

    #[tokio::test]
    async fn malformed_input_is_validation_error() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);

        let err = svc
            .mark_one(mark("nope", "2025-01-06", AttendanceStatus::Present), Utc::now())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));

        let err = svc
            .mark_one(mark(ALICE, "not-a-date", AttendanceStatus::Present), Utc::now())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));

        let mut req = mark(ALICE, "2025-01-06", AttendanceStatus::Present);
        req.answers = Some(serde_json::json!([1, 2]));
        let err = svc.mark_one(req, Utc::now()).await.unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
        assert_eq!(store.log_count().await, 0);
    }

    #[tokio::test]
    async fn bulk_reports_partial_failure() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);

        let result = svc
            .mark_bulk(bulk("2025-01-06", AttendanceStatus::Absent), Utc::now())
            .await
            .unwrap();

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(store.log_count().await, 2);

        let cara = result.results.iter().find(|o| o.student_id == CARA).unwrap();
        assert_matches!(cara.result, Err(CoreError::OutOfRange(_)));

        let json = serde_json::to_value(cara).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["code"], "OUT_OF_RANGE");

        let alice = result.results.iter().find(|o| o.student_id == ALICE).unwrap();
        let json = serde_json::to_value(alice).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["record"]["status"], "absent");
    }

    #[tokio::test]
    async fn bulk_results_follow_roster_order() {
        let store = seeded().await;
        let svc = MarkingService::new(&store).with_bulk_concurrency(3);
        let result = svc
            .mark_bulk(bulk("2025-01-08", AttendanceStatus::Present), Utc::now())
            .await
            .unwrap();
        let ids: Vec<_> = result.results.iter().map(|o| o.student_id.as_str()).collect();
        assert_eq!(ids, vec![ALICE, BOB, CARA]);
        assert_eq!(result.succeeded, 3);
    }

    #[tokio::test]
    async fn bulk_is_safe_to_retry() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);
        svc.mark_bulk(bulk("2025-01-08", AttendanceStatus::Absent), Utc::now())
            .await
            .unwrap();
        svc.mark_bulk(bulk("2025-01-08", AttendanceStatus::Present), Utc::now())
            .await
            .unwrap();

        assert_eq!(store.log_count().await, 3);
        let logs = store
            .list_student_logs(
                MISSION,
                BOB,
                parse_day_key("2025-01-01").unwrap(),
                parse_day_key("2025-01-31").unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn bulk_by_explicit_list() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);
        let mut req = bulk("2025-01-06", AttendanceStatus::Excused);
        req.roster = RosterSelector::Students(vec![BOB.to_string(), "0000000000000000000000ff".to_string()]);

        let result = svc.mark_bulk(req, Utc::now()).await.unwrap();
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert_matches!(
            result.results[1].result,
            Err(CoreError::NotFound { entity: "Enrollment", .. })
        );
        // Explicit lists carry no group selector; the enrollment's group is used.
        let record = result.results[0].result.as_ref().unwrap();
        assert_eq!(record.mentorship_group_id.as_deref(), Some(GROUP));
    }

    #[tokio::test]
    async fn bulk_unknown_group_fails_before_writes() {
        let store = seeded().await;
        let svc = MarkingService::new(&store);
        let mut req = bulk("2025-01-06", AttendanceStatus::Present);
        req.roster = RosterSelector::Group("65a1b2c3d4e5f60718293abc".to_string());

        let err = svc.mark_bulk(req, Utc::now()).await.unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "MentorshipGroup", .. });
        assert_eq!(store.log_count().await, 0);
    }

    #[tokio::test]
    async fn bulk_empty_group_is_validation_error() {
        let store = seeded().await;
        let empty = "65a1b2c3d4e5f60718293abd";
        store.add_group(MISSION, empty, &[]).await;
        let svc = MarkingService::new(&store);
        let mut req = bulk("2025-01-06", AttendanceStatus::Present);
        req.roster = RosterSelector::Group(empty.to_string());

        let err = svc.mark_bulk(req, Utc::now()).await.unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }
}
