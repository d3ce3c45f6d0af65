//! Derived attendance metrics.
//!
//! Summaries are computed on demand from the ledger and the mission's
//! calendar rules; nothing here writes.

use serde::Serialize;

use crate::attendance::{
    clamp_limit, clamp_offset, AttendanceLog, AttendanceLogFilter, AttendanceStatus,
};
use crate::calendar::{count_eligible_days, parse_day_input, to_local_midnight, Day, DayInput};
use crate::error::CoreError;
use crate::mission_config::MissionAttendanceConfig;
use crate::object_id::normalize_object_id;
use crate::roster::RosterSelector;
use crate::store::{AttendanceLogStore, MissionConfigSource, RosterDirectory};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub student_id: DbId,
    pub eligible_days: u32,
    pub presents: u32,
    pub absents: u32,
    pub excused: u32,
    /// Whole percent, floored, in `0..=100`.
    pub attendance_rate: u32,
    pub streak_present_days: u32,
    /// The normalized enrollment start day.
    pub started_at: Day,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RosterTotals {
    pub students: u32,
    pub eligible_days: u32,
    pub presents: u32,
    pub absents: u32,
    pub excused: u32,
    /// Floored mean of the per-student rates.
    pub average_attendance_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterSummary {
    pub summaries: Vec<AttendanceSummary>,
    /// Roster members with no enrollment in the mission.
    pub not_enrolled: Vec<DbId>,
    pub totals: RosterTotals,
}

// ---------------------------------------------------------------------------
// Pure computation
// ---------------------------------------------------------------------------

/// `floor(presents * 100 / max(1, eligible - excused?))`, capped at 100.
pub fn attendance_rate(
    presents: u32,
    eligible_days: u32,
    excused: u32,
    exclude_excused: bool,
) -> u32 {
    let removed = if exclude_excused { excused } else { 0 };
    let denominator = eligible_days.saturating_sub(removed).max(1) as u64;
    let rate = (presents as u64 * 100) / denominator;
    rate.min(100) as u32
}

/// Count trailing `present` entries, newest first. Unlogged days are not
/// represented in `statuses` and therefore never break a streak.
pub fn present_streak<'a, I>(statuses_oldest_first: I) -> u32
where
    I: DoubleEndedIterator<Item = &'a AttendanceStatus>,
{
    statuses_oldest_first
        .rev()
        .take_while(|s| **s == AttendanceStatus::Present)
        .count() as u32
}

/// Summarize one student over `[start, end]`.
///
/// `logs` must be ascending by date; rows outside the window are ignored.
pub fn compute_summary(
    student_id: &str,
    start: Day,
    end: Day,
    logs: &[AttendanceLog],
    config: &MissionAttendanceConfig,
) -> AttendanceSummary {
    let statuses: Vec<AttendanceStatus> = logs
        .iter()
        .filter(|l| l.date >= start && l.date <= end)
        .map(|l| l.status)
        .collect();

    let (mut presents, mut absents, mut excused) = (0u32, 0u32, 0u32);
    for status in &statuses {
        match status {
            AttendanceStatus::Present => presents += 1,
            AttendanceStatus::Absent => absents += 1,
            AttendanceStatus::Excused => excused += 1,
        }
    }

    let eligible_days = count_eligible_days(start, end, config);

    AttendanceSummary {
        student_id: student_id.to_string(),
        eligible_days,
        presents,
        absents,
        excused,
        attendance_rate: attendance_rate(
            presents,
            eligible_days,
            excused,
            config.exclude_excused_from_rate,
        ),
        streak_present_days: present_streak(statuses.iter()),
        started_at: start,
    }
}

pub fn roster_totals(summaries: &[AttendanceSummary]) -> RosterTotals {
    let mut totals = RosterTotals {
        students: summaries.len() as u32,
        ..Default::default()
    };
    let mut rate_sum = 0u64;
    for s in summaries {
        totals.eligible_days += s.eligible_days;
        totals.presents += s.presents;
        totals.absents += s.absents;
        totals.excused += s.excused;
        rate_sum += s.attendance_rate as u64;
    }
    if !summaries.is_empty() {
        totals.average_attendance_rate = (rate_sum / summaries.len() as u64) as u32;
    }
    totals
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Read-side queries over the ledger.
pub struct SummaryEngine<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> SummaryEngine<'a, S>
where
    S: AttendanceLogStore + RosterDirectory + MissionConfigSource + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Summary for one student as of `now`.
    pub async fn summarize_student(
        &self,
        mission_id: &str,
        student_id: &str,
        now: Timestamp,
    ) -> Result<AttendanceSummary, CoreError> {
        let mission_id = normalize_object_id("mission_id", mission_id).map_err(CoreError::Validation)?;
        let student_id = normalize_object_id("student_id", student_id).map_err(CoreError::Validation)?;
        let config = self.load_config(&mission_id).await?;

        let summary = self
            .summarize_enrolled(&config, &mission_id, &student_id, now)
            .await?;
        summary.ok_or(CoreError::NotFound {
            entity: "Enrollment",
            id: student_id,
        })
    }

    /// Summaries for every student of a group or explicit list.
    pub async fn summarize_roster(
        &self,
        mission_id: &str,
        roster: &RosterSelector,
        now: Timestamp,
    ) -> Result<RosterSummary, CoreError> {
        let mission_id = normalize_object_id("mission_id", mission_id).map_err(CoreError::Validation)?;
        let config = self.load_config(&mission_id).await?;

        let students = match roster {
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

        let mut summaries = Vec::with_capacity(students.len());
        let mut not_enrolled = Vec::new();
        for student_id in students {
            match self
                .summarize_enrolled(&config, &mission_id, &student_id, now)
                .await?
            {
                Some(summary) => summaries.push(summary),
                None => not_enrolled.push(student_id),
            }
        }

        let totals = roster_totals(&summaries);
        Ok(RosterSummary {
            summaries,
            not_enrolled,
            totals,
        })
    }

    /// A page of raw ledger rows for a mission.
    ///
    /// Filtering by group resolves the group's current members.
    pub async fn list_logs(
        &self,
        mission_id: &str,
        query: LogQuery,
    ) -> Result<Vec<AttendanceLog>, CoreError> {
        let mission_id = normalize_object_id("mission_id", mission_id).map_err(CoreError::Validation)?;
        let config = self.load_config(&mission_id).await?;

        let from = query
            .from
            .as_ref()
            .map(|d| parse_day_input(d, config.timezone))
            .transpose()
            .map_err(CoreError::Validation)?;
        let to = query
            .to
            .as_ref()
            .map(|d| parse_day_input(d, config.timezone))
            .transpose()
            .map_err(CoreError::Validation)?;

        let student_id = query
            .student_id
            .as_deref()
            .map(|id| normalize_object_id("student_id", id))
            .transpose()
            .map_err(CoreError::Validation)?;

        let student_ids = match query.group_id.as_deref() {
            None => None,
            Some(raw) => {
                let group_id = normalize_object_id("group_id", raw).map_err(CoreError::Validation)?;
                let members = self.store.group_members(&mission_id, &group_id).await?;
                Some(members.ok_or(CoreError::NotFound {
                    entity: "MentorshipGroup",
                    id: group_id,
                })?)
            }
        };

        let filter = AttendanceLogFilter {
            from,
            to,
            student_id,
            student_ids,
            limit: clamp_limit(query.limit),
            offset: clamp_offset(query.offset),
        };
        self.store.list_mission_logs(&mission_id, &filter).await
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

    async fn summarize_enrolled(
        &self,
        config: &MissionAttendanceConfig,
        mission_id: &str,
        student_id: &str,
        now: Timestamp,
    ) -> Result<Option<AttendanceSummary>, CoreError> {
        let Some(enrollment) = self.store.enrollment(mission_id, student_id).await? else {
            return Ok(None);
        };

        let start = to_local_midnight(enrollment.started_at, config.timezone);
        let end = to_local_midnight(now, config.timezone);
        let logs = if start <= end {
            self.store
                .list_student_logs(mission_id, student_id, start, end)
                .await?
        } else {
            Vec::new()
        };

        Ok(Some(compute_summary(student_id, start, end, &logs, config)))
    }
}

/// Raw-row query parameters, unvalidated.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub from: Option<DayInput>,
    pub to: Option<DayInput>,
    pub student_id: Option<String>,
    pub group_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::AttendanceSource;
    use crate::calendar::parse_day_key;
    use crate::marking::{MarkAttendance, MarkingService};
    use crate::memory::InMemoryStore;
    use crate::mission_config::MissionAttendanceConfigInput;
    use assert_matches::assert_matches;
    use chrono::{DateTime, Utc};

    const MISSION: &str = "65a1b2c3d4e5f60718293a00";
    const GROUP: &str = "65a1b2c3d4e5f60718293aaa";
    const ALICE: &str = "65a1b2c3d4e5f60718293a01";
    const BOB: &str = "65a1b2c3d4e5f60718293a02";

    fn instant(raw: &str) -> Timestamp {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn day(key: &str) -> Day {
        parse_day_key(key).unwrap()
    }

    fn log(date: &str, status: AttendanceStatus) -> AttendanceLog {
        AttendanceLog {
            id: crate::object_id::new_object_id(),
            mission_id: MISSION.into(),
            student_id: ALICE.into(),
            mentorship_group_id: None,
            date: day(date),
            status,
            source: AttendanceSource::Mentor,
            notes: None,
            marked_by: None,
            answers: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn config_with_holidays(holidays: &[&str]) -> MissionAttendanceConfig {
        MissionAttendanceConfig::from_input(&MissionAttendanceConfigInput {
            holidays: Some(holidays.iter().map(|h| h.to_string()).collect()),
            ..Default::default()
        })
        .unwrap()
    }

    async fn mark_days(store: &InMemoryStore, student: &str, days: &[&str], status: AttendanceStatus) {
        let svc = MarkingService::new(store);
        for d in days {
            svc.mark_one(
                MarkAttendance {
                    mission_id: MISSION.into(),
                    student_id: student.into(),
                    date: Some(DayInput::Text(d.to_string())),
                    status,
                    source: AttendanceSource::Mentor,
                    marked_by: None,
                    notes: None,
                    answers: None,
                    mentorship_group_id: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        }
    }

    // -- pure helpers --------------------------------------------------------

    #[test]
    fn rate_floors_instead_of_rounding() {
        assert_eq!(attendance_rate(2, 3, 0, false), 66);
    }

    #[test]
    fn rate_excludes_excused_when_configured() {
        assert_eq!(attendance_rate(6, 10, 2, true), 75);
        assert_eq!(attendance_rate(6, 10, 2, false), 60);
    }

    #[test]
    fn rate_denominator_floors_at_one() {
        assert_eq!(attendance_rate(0, 0, 0, false), 0);
        assert_eq!(attendance_rate(1, 0, 0, false), 100);
        assert_eq!(attendance_rate(0, 2, 5, true), 0);
    }

    #[test]
    fn rate_stays_within_bounds() {
        for presents in 0..15 {
            for eligible in 0..15 {
                for excused in 0..5 {
                    for exclude in [true, false] {
                        let rate = attendance_rate(presents, eligible, excused, exclude);
                        assert!(rate <= 100, "{presents}/{eligible}/{excused} -> {rate}");
                    }
                }
            }
        }
    }

    #[test]
    fn streak_counts_trailing_presents() {
        use AttendanceStatus::*;
        assert_eq!(present_streak([Present, Absent, Present, Present].iter()), 2);
        assert_eq!(present_streak([Present, Present].iter()), 2);
        assert_eq!(present_streak([Present, Excused].iter()), 0);
        assert_eq!(present_streak(Vec::<AttendanceStatus>::new().iter()), 0);
    }

    #[test]
    fn unlogged_gaps_do_not_break_streak() {
        let logs = vec![
            log("2025-01-06", AttendanceStatus::Present),
            // 2025-01-07 never logged
            log("2025-01-08", AttendanceStatus::Present),
        ];
        let summary = compute_summary(
            ALICE,
            day("2025-01-05"),
            day("2025-01-12"),
            &logs,
            &MissionAttendanceConfig::default(),
        );
        assert_eq!(summary.streak_present_days, 2);
        assert_eq!(summary.eligible_days, 5);
        assert_eq!(summary.attendance_rate, 40);
    }

    #[test]
    fn excused_scenario_rate() {
        let mut cfg = MissionAttendanceConfig::default();
        cfg.exclude_excused_from_rate = true;
        // Mon 2025-01-06 .. Fri 2025-01-17: ten working days.
        let statuses = [
            ("2025-01-06", AttendanceStatus::Present),
            ("2025-01-07", AttendanceStatus::Present),
            ("2025-01-08", AttendanceStatus::Absent),
            ("2025-01-09", AttendanceStatus::Excused),
            ("2025-01-10", AttendanceStatus::Present),
            ("2025-01-13", AttendanceStatus::Present),
            ("2025-01-14", AttendanceStatus::Absent),
            ("2025-01-15", AttendanceStatus::Excused),
            ("2025-01-16", AttendanceStatus::Present),
            ("2025-01-17", AttendanceStatus::Present),
        ];
        let logs: Vec<_> = statuses.iter().map(|(d, s)| log(d, *s)).collect();
        let summary = compute_summary(ALICE, day("2025-01-06"), day("2025-01-17"), &logs, &cfg);
        assert_eq!(summary.eligible_days, 10);
        assert_eq!(summary.presents, 6);
        assert_eq!(summary.excused, 2);
        assert_eq!(summary.absents, 2);
        assert_eq!(summary.attendance_rate, 75);
        assert_eq!(summary.streak_present_days, 2);
    }

    #[test]
    fn rows_outside_window_are_ignored() {
        let logs = vec![
            log("2025-01-03", AttendanceStatus::Absent),
            log("2025-01-06", AttendanceStatus::Present),
        ];
        let summary = compute_summary(
            ALICE,
            day("2025-01-05"),
            day("2025-01-06"),
            &logs,
            &MissionAttendanceConfig::default(),
        );
        assert_eq!(summary.absents, 0);
        assert_eq!(summary.presents, 1);
    }

    // -- engine --------------------------------------------------------------

    async fn week_store(config: Option<MissionAttendanceConfig>) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.add_mission(MISSION, config).await;
        // Sunday 2025-01-05 in Asia/Dhaka.
        store
            .enroll(MISSION, ALICE, instant("2025-01-05T03:00:00Z"), Some(GROUP))
            .await;
        store
            .enroll(MISSION, BOB, instant("2025-01-05T03:00:00Z"), Some(GROUP))
            .await;
        store.add_group(MISSION, GROUP, &[ALICE, BOB]).await;
        store
    }

    #[tokio::test]
    async fn full_working_week_scenario() {
        let store = week_store(None).await;
        mark_days(
            &store,
            ALICE,
            &["2025-01-06", "2025-01-07", "2025-01-08", "2025-01-09", "2025-01-10"],
            AttendanceStatus::Present,
        )
        .await;

        let engine = SummaryEngine::new(&store);
        let summary = engine
            .summarize_student(MISSION, ALICE, instant("2025-01-12T06:00:00Z"))
            .await
            .unwrap();

        assert_eq!(summary.eligible_days, 5);
        assert_eq!(summary.presents, 5);
        assert_eq!(summary.absents, 0);
        assert_eq!(summary.excused, 0);
        assert_eq!(summary.attendance_rate, 100);
        assert_eq!(summary.streak_present_days, 5);
        assert_eq!(summary.started_at, day("2025-01-05"));
    }

    #[tokio::test]
    async fn holiday_week_scenario() {
        let store = week_store(Some(config_with_holidays(&["2025-01-08"]))).await;
        mark_days(
            &store,
            ALICE,
            &["2025-01-06", "2025-01-07", "2025-01-09", "2025-01-10"],
            AttendanceStatus::Present,
        )
        .await;

        let summary = SummaryEngine::new(&store)
            .summarize_student(MISSION, ALICE, instant("2025-01-12T06:00:00Z"))
            .await
            .unwrap();

        assert_eq!(summary.eligible_days, 4);
        assert_eq!(summary.presents, 4);
        assert_eq!(summary.attendance_rate, 100);
    }

    #[tokio::test]
    async fn started_today_on_weekend_has_zero_rate() {
        let store = week_store(None).await;
        let summary = SummaryEngine::new(&store)
            .summarize_student(MISSION, ALICE, instant("2025-01-05T10:00:00Z"))
            .await
            .unwrap();
        assert_eq!(summary.eligible_days, 0);
        assert_eq!(summary.attendance_rate, 0);
    }

    #[tokio::test]
    async fn future_start_yields_empty_summary() {
        let store = week_store(None).await;
        let summary = SummaryEngine::new(&store)
            .summarize_student(MISSION, ALICE, instant("2025-01-01T10:00:00Z"))
            .await
            .unwrap();
        assert_eq!(summary.eligible_days, 0);
        assert_eq!(summary.presents, 0);
    }

    #[tokio::test]
    async fn unknown_student_is_not_found() {
        let store = week_store(None).await;
        let err = SummaryEngine::new(&store)
            .summarize_student(MISSION, "0000000000000000000000ff", Utc::now())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "Enrollment", .. });
    }

    #[tokio::test]
    async fn roster_summary_aggregates() {
        let store = week_store(None).await;
        mark_days(&store, ALICE, &["2025-01-06", "2025-01-07"], AttendanceStatus::Present).await;
        mark_days(&store, BOB, &["2025-01-06"], AttendanceStatus::Absent).await;

        let engine = SummaryEngine::new(&store);
        let roster = engine
            .summarize_roster(
                MISSION,
                &RosterSelector::Group(GROUP.into()),
                instant("2025-01-07T12:00:00Z"),
            )
            .await
            .unwrap();

        assert_eq!(roster.summaries.len(), 2);
        assert_eq!(roster.totals.students, 2);
        assert_eq!(roster.totals.presents, 2);
        assert_eq!(roster.totals.absents, 1);
        // Alice 2/2 = 100, Bob 0/2 = 0.
        assert_eq!(roster.totals.average_attendance_rate, 50);
        assert!(roster.not_enrolled.is_empty());
    }

    #[tokio::test]
    async fn roster_summary_reports_unenrolled() {
        let store = week_store(None).await;
        let stranger = "0000000000000000000000ff".to_string();
        let roster = SummaryEngine::new(&store)
            .summarize_roster(
                MISSION,
                &RosterSelector::Students(vec![ALICE.into(), stranger.clone()]),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(roster.summaries.len(), 1);
        assert_eq!(roster.not_enrolled, vec![stranger]);
    }

    #[tokio::test]
    async fn list_logs_filters_and_pages() {
        let store = week_store(None).await;
        mark_days(
            &store,
            ALICE,
            &["2025-01-06", "2025-01-07", "2025-01-08"],
            AttendanceStatus::Present,
        )
        .await;
        mark_days(&store, BOB, &["2025-01-07"], AttendanceStatus::Absent).await;

        let engine = SummaryEngine::new(&store);

        let all = engine.list_logs(MISSION, LogQuery::default()).await.unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].date <= w[1].date));

        let ranged = engine
            .list_logs(
                MISSION,
                LogQuery {
                    from: Some(DayInput::Text("2025-01-07".into())),
                    to: Some(DayInput::Text("2025-01-07".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(ranged.len(), 2);

        let bob_only = engine
            .list_logs(
                MISSION,
                LogQuery {
                    student_id: Some(BOB.into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(bob_only.len(), 1);

        let page = engine
            .list_logs(
                MISSION,
                LogQuery {
                    limit: Some(2),
                    offset: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[1].date, day("2025-01-08"));
    }

    #[tokio::test]
    async fn list_logs_by_unknown_group_is_not_found() {
        let store = week_store(None).await;
        let err = SummaryEngine::new(&store)
            .list_logs(
                MISSION,
                LogQuery {
                    group_id: Some("65a1b2c3d4e5f60718293abc".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "MentorshipGroup", .. });
    }
}
