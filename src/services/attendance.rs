//! Attendance service
//!
//! Each employee has at most one record per company-local work day, and that
//! record carries the day's session state:
//!
//! ```text
//! NotCheckedIn -> CheckedIn <-> OnBreak -> CheckedOut
//! ```
//!
//! Times come from the injected [`Clock`] so the server is the only source of
//! truth. Sessions left open for longer than the policy allows are closed by
//! [`AttendanceService::auto_checkout_sweep`], which `main` runs on an
//! interval.

use crate::cache::MemoryCache;
use crate::config::AttendancePolicy;
use crate::db::repositories::{AttendanceRepository, EmployeeRepository, LeaveRepository};
use crate::models::{
    Attendance, AttendanceFilter, AttendanceStatus, AttendanceSummary, LeaveFilter, LeaveStatus,
    ListParams, NotificationKind, PagedResult, SessionState, SessionStatus, UpdateAttendanceInput,
    User,
};
use crate::services::access;
use crate::services::clock::Clock;
use crate::services::error::{OrNotFound, ServiceError, ServiceResult};
use crate::services::notification::NotificationService;
use crate::services::report::invalidate_dashboard;
use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use std::collections::HashSet;
use std::sync::Arc;

/// Whether a check-in at the given local time is late
pub fn is_late_at(policy: &AttendancePolicy, local_check_in: NaiveTime) -> bool {
    local_check_in > policy.shift_start + Duration::minutes(policy.grace_minutes)
}

/// Final status of a finished day.
///
/// Rules apply in order: overtime, half day, early departure, late, present.
pub fn classify_attendance(
    policy: &AttendancePolicy,
    worked_minutes: i64,
    is_late: bool,
    local_check_out: NaiveTime,
) -> AttendanceStatus {
    if worked_minutes >= policy.standard_minutes + policy.overtime_threshold_minutes {
        AttendanceStatus::Overtime
    } else if worked_minutes < policy.half_day_minutes {
        AttendanceStatus::HalfDay
    } else if local_check_out < policy.shift_end {
        AttendanceStatus::EarlyDeparture
    } else if is_late {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// Minutes worked beyond the standard day
pub fn overtime_minutes(policy: &AttendancePolicy, worked_minutes: i64) -> i64 {
    (worked_minutes - policy.standard_minutes).max(0)
}

fn working_status(record: &Attendance) -> AttendanceStatus {
    if record.is_late {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

fn append_note(notes: Option<String>, line: &str) -> Option<String> {
    match notes {
        Some(existing) if !existing.trim().is_empty() => Some(format!("{}\n{}", existing, line)),
        _ => Some(line.to_string()),
    }
}

pub struct AttendanceService {
    repo: Arc<dyn AttendanceRepository>,
    employee_repo: Arc<dyn EmployeeRepository>,
    leave_repo: Arc<dyn LeaveRepository>,
    notifications: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
    policy: AttendancePolicy,
    cache: Arc<MemoryCache>,
}

impl AttendanceService {
    pub fn new(
        repo: Arc<dyn AttendanceRepository>,
        employee_repo: Arc<dyn EmployeeRepository>,
        leave_repo: Arc<dyn LeaveRepository>,
        notifications: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
        policy: AttendancePolicy,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            repo,
            employee_repo,
            leave_repo,
            notifications,
            clock,
            policy,
            cache,
        }
    }

    pub fn policy(&self) -> &AttendancePolicy {
        &self.policy
    }

    /// Company-local calendar day of an instant
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.policy.offset).date_naive()
    }

    fn local_time(&self, at: DateTime<Utc>) -> NaiveTime {
        at.with_timezone(&self.policy.offset).time()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(self.clock.now())
    }

    pub async fn check_in(&self, employee_id: i64) -> ServiceResult<Attendance> {
        let employee = self
            .employee_repo
            .get_by_id(employee_id)
            .await
            .context("Failed to get employee")?
            .or_not_found("Employee", employee_id)?;
        if !employee.is_active() {
            return Err(ServiceError::invalid_state("Terminated employees cannot check in"));
        }

        let now = self.clock.now();
        let today = self.local_date(now);
        if let Some(open) = self.open_record(employee_id).await? {
            if open.work_date != today {
                return Err(ServiceError::invalid_state(format!(
                    "The session started on {} is still open",
                    open.work_date
                )));
            }
        }

        let is_late = is_late_at(&self.policy, self.local_time(now));
        let status = if is_late {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        };

        let existing = self
            .repo
            .get_for_day(employee_id, today)
            .await
            .context("Failed to get today's attendance")?;
        let record = match existing {
            Some(mut absent) if absent.status == AttendanceStatus::Absent && absent.check_in_at.is_none() => {
                absent.check_in_at = Some(now);
                absent.is_late = is_late;
                absent.status = status;
                self.repo.update(&absent).await.context("Failed to record check-in")?
            }
            Some(_) => return Err(ServiceError::conflict("Already checked in today")),
            None => {
                let record = Attendance {
                    id: 0,
                    employee_id,
                    work_date: today,
                    check_in_at: Some(now),
                    check_out_at: None,
                    break_started_at: None,
                    break_minutes: 0,
                    worked_minutes: 0,
                    is_late,
                    status,
                    auto_checked_out: false,
                    notes: None,
                    created_at: now,
                    updated_at: now,
                };
                self.repo.create(&record).await.context("Failed to record check-in")?
            }
        };

        tracing::info!(employee_id, late = is_late, "Checked in");
        invalidate_dashboard(&self.cache).await;
        Ok(record)
    }

    pub async fn start_break(&self, employee_id: i64) -> ServiceResult<Attendance> {
        let mut record = self.require_state(employee_id, &[SessionState::CheckedIn]).await?;
        record.break_started_at = Some(self.clock.now());
        record.status = AttendanceStatus::OnBreak;
        let record = self.repo.update(&record).await.context("Failed to start break")?;
        tracing::info!(employee_id, "Break started");
        Ok(record)
    }

    pub async fn end_break(&self, employee_id: i64) -> ServiceResult<Attendance> {
        let mut record = self.require_state(employee_id, &[SessionState::OnBreak]).await?;
        Self::close_break(&mut record, self.clock.now());
        record.status = working_status(&record);
        let record = self.repo.update(&record).await.context("Failed to end break")?;
        tracing::info!(employee_id, break_minutes = record.break_minutes, "Break ended");
        Ok(record)
    }

    pub async fn check_out(&self, employee_id: i64) -> ServiceResult<Attendance> {
        let record = self
            .require_state(employee_id, &[SessionState::CheckedIn, SessionState::OnBreak])
            .await?;
        let record = self.finish(record, self.clock.now(), false).await?;
        tracing::info!(
            employee_id,
            worked_minutes = record.worked_minutes,
            status = %record.status,
            "Checked out"
        );
        invalidate_dashboard(&self.cache).await;
        Ok(record)
    }

    /// Live state of the employee's current session
    pub async fn session_status(&self, employee_id: i64) -> ServiceResult<SessionStatus> {
        let now = self.clock.now();
        let record = self.current_record(employee_id).await?;
        let state = record
            .as_ref()
            .map(|r| r.state())
            .unwrap_or(SessionState::NotCheckedIn);

        let (worked_minutes, break_minutes, minutes_until_auto_checkout) = match &record {
            Some(r) if matches!(state, SessionState::CheckedIn | SessionState::OnBreak) => {
                let running_break = r
                    .break_started_at
                    .map(|s| (now - s).num_minutes().max(0))
                    .unwrap_or(0);
                let remaining = r
                    .check_in_at
                    .map(|c| (self.policy.max_session_minutes - (now - c).num_minutes()).max(0));
                (r.worked_minutes_at(now), r.break_minutes + running_break, remaining)
            }
            Some(r) => (r.worked_minutes, r.break_minutes, None),
            None => (0, 0, None),
        };

        Ok(SessionStatus {
            state,
            work_date: record
                .as_ref()
                .map(|r| r.work_date)
                .unwrap_or_else(|| self.local_date(now)),
            server_time: now,
            record,
            worked_minutes,
            break_minutes,
            minutes_until_auto_checkout,
        })
    }

    /// Close every session open for at least the maximum session length.
    ///
    /// The check-out is placed at `check_in + max_session`, not at `now`.
    pub async fn auto_checkout_sweep(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let max = Duration::minutes(self.policy.max_session_minutes);
        let open = self.repo.list_open().await.context("Failed to list open sessions")?;

        let mut closed = 0;
        for record in open {
            let Some(check_in) = record.check_in_at else {
                continue;
            };
            if now - check_in < max {
                continue;
            }
            let employee_id = record.employee_id;
            let record = match self.finish(record, check_in + max, true).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(employee_id, "Auto-checkout failed: {}", e);
                    continue;
                }
            };
            closed += 1;

            tracing::info!(employee_id, work_date = %record.work_date, "Session closed automatically");
            self.notifications
                .notify_employee(
                    employee_id,
                    NotificationKind::AutoCheckout,
                    "Automatically checked out",
                    &format!(
                        "Your session on {} was closed after {} hours.",
                        record.work_date,
                        self.policy.max_session_minutes / 60
                    ),
                    Some("/attendance"),
                )
                .await;
        }

        if closed > 0 {
            invalidate_dashboard(&self.cache).await;
        }
        Ok(closed)
    }

    /// Record `ABSENT` for active employees with neither a record nor
    /// approved leave on `date`. Weekends are not work days and mark nobody.
    pub async fn mark_absences(&self, date: NaiveDate) -> ServiceResult<Vec<Attendance>> {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            tracing::info!(%date, "Skipping absence marking on a weekend");
            return Ok(Vec::new());
        }
        let employees = self
            .employee_repo
            .list_active()
            .await
            .context("Failed to list employees")?;
        let on_leave: HashSet<i64> = self
            .leave_repo
            .list_all(&LeaveFilter {
                status: Some(LeaveStatus::Approved),
                from: Some(date),
                to: Some(date),
                ..Default::default()
            })
            .await
            .context("Failed to list approved leave")?
            .into_iter()
            .map(|l| l.employee_id)
            .collect();
        let recorded: HashSet<i64> = self
            .repo
            .list_range(&AttendanceFilter {
                from: Some(date),
                to: Some(date),
                ..Default::default()
            })
            .await
            .context("Failed to list attendance")?
            .into_iter()
            .map(|r| r.employee_id)
            .collect();

        let now = self.clock.now();
        let mut created = Vec::new();
        for employee in employees {
            if employee.hire_date > date || on_leave.contains(&employee.id) || recorded.contains(&employee.id) {
                continue;
            }
            let record = Attendance {
                id: 0,
                employee_id: employee.id,
                work_date: date,
                check_in_at: None,
                check_out_at: None,
                break_started_at: None,
                break_minutes: 0,
                worked_minutes: 0,
                is_late: false,
                status: AttendanceStatus::Absent,
                auto_checked_out: false,
                notes: None,
                created_at: now,
                updated_at: now,
            };
            created.push(self.repo.create(&record).await.context("Failed to record absence")?);
        }

        tracing::info!(date = %date, count = created.len(), "Absences recorded");
        if !created.is_empty() {
            invalidate_dashboard(&self.cache).await;
        }
        Ok(created)
    }

    /// Records visible to the caller.
    ///
    /// HR sees everyone. Others see themselves, or a report when they name
    /// one in the filter.
    pub async fn list(
        &self,
        user: &User,
        mut filter: AttendanceFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Attendance>> {
        filter.employee_id = self.scope(user, filter.employee_id).await?;
        let (items, total) = self
            .repo
            .list(&filter, params)
            .await
            .context("Failed to list attendance")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// The caller's own records
    pub async fn history(
        &self,
        user: &User,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Attendance>> {
        let employee_id = access::linked_employee(user)?;
        let filter = AttendanceFilter {
            employee_id: Some(employee_id),
            from,
            to,
            status: None,
        };
        let (items, total) = self
            .repo
            .list(&filter, params)
            .await
            .context("Failed to list attendance")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Attendance> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get attendance")?
            .or_not_found("Attendance record", id)
    }

    /// HR correction of a record
    pub async fn update(&self, id: i64, input: UpdateAttendanceInput) -> ServiceResult<Attendance> {
        let mut record = self.get(id).await?;

        if let Some(check_in) = input.check_in_at {
            record.check_in_at = Some(check_in);
        }
        if let Some(check_out) = input.check_out_at {
            record.check_out_at = Some(check_out);
            record.break_started_at = None;
        }
        if let Some(break_minutes) = input.break_minutes {
            if break_minutes < 0 {
                return Err(ServiceError::validation("Break minutes cannot be negative"));
            }
            record.break_minutes = break_minutes;
        }
        if let Some(notes) = input.notes {
            record.notes = Some(notes).filter(|n| !n.trim().is_empty());
        }

        if let (Some(check_in), Some(check_out)) = (record.check_in_at, record.check_out_at) {
            if check_out < check_in {
                return Err(ServiceError::validation("Check-out cannot precede check-in"));
            }
            record.is_late = is_late_at(&self.policy, self.local_time(check_in));
            record.worked_minutes = record.worked_minutes_at(check_out);
            if input.status.is_none() {
                record.status = classify_attendance(
                    &self.policy,
                    record.worked_minutes,
                    record.is_late,
                    self.local_time(check_out),
                );
            }
        }
        if let Some(status) = input.status {
            record.status = status;
        }

        let record = self.repo.update(&record).await.context("Failed to update attendance")?;
        tracing::info!(attendance_id = id, status = %record.status, "Attendance corrected");
        invalidate_dashboard(&self.cache).await;
        Ok(record)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.get(id).await?;
        self.repo.delete(id).await.context("Failed to delete attendance")?;
        invalidate_dashboard(&self.cache).await;
        Ok(())
    }

    /// Totals over a date range, for one employee or everyone
    pub async fn summary(
        &self,
        user: &User,
        employee_id: Option<i64>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> ServiceResult<AttendanceSummary> {
        let employee_id = self.scope(user, employee_id).await?;
        let records = self
            .repo
            .list_range(&AttendanceFilter {
                employee_id,
                from,
                to,
                status: None,
            })
            .await
            .context("Failed to list attendance")?;

        let mut summary = AttendanceSummary {
            from,
            to,
            ..Default::default()
        };
        for record in &records {
            summary.days_recorded += 1;
            *summary.by_status.entry(record.status.to_string()).or_insert(0) += 1;
            summary.total_worked_minutes += record.worked_minutes;
            summary.overtime_minutes += overtime_minutes(&self.policy, record.worked_minutes);
            if record.is_late {
                summary.late_count += 1;
            }
        }
        Ok(summary)
    }

    /// Restrict a requested employee to what the caller may see
    async fn scope(&self, user: &User, requested: Option<i64>) -> ServiceResult<Option<i64>> {
        if user.is_hr() {
            return Ok(requested);
        }
        match requested {
            Some(id) => {
                let employee = self
                    .employee_repo
                    .get_by_id(id)
                    .await
                    .context("Failed to get employee")?
                    .or_not_found("Employee", id)?;
                access::require_view(user, &employee)?;
                Ok(Some(id))
            }
            None => Ok(Some(access::linked_employee(user)?)),
        }
    }

    async fn open_record(&self, employee_id: i64) -> ServiceResult<Option<Attendance>> {
        Ok(self
            .repo
            .list_open()
            .await
            .context("Failed to list open sessions")?
            .into_iter()
            .filter(|r| r.employee_id == employee_id)
            .max_by_key(|r| r.work_date))
    }

    /// Today's record, or an earlier session that is still open
    async fn current_record(&self, employee_id: i64) -> ServiceResult<Option<Attendance>> {
        if let Some(open) = self.open_record(employee_id).await? {
            return Ok(Some(open));
        }
        Ok(self
            .repo
            .get_for_day(employee_id, self.today())
            .await
            .context("Failed to get today's attendance")?)
    }

    async fn require_state(&self, employee_id: i64, allowed: &[SessionState]) -> ServiceResult<Attendance> {
        let record = self.current_record(employee_id).await?;
        let state = record
            .as_ref()
            .map(|r| r.state())
            .unwrap_or(SessionState::NotCheckedIn);
        match record {
            Some(record) if allowed.contains(&state) => Ok(record),
            _ => Err(ServiceError::invalid_state(match state {
                SessionState::NotCheckedIn => "Not checked in",
                SessionState::CheckedIn => "Not on a break",
                SessionState::OnBreak => "Currently on a break",
                SessionState::CheckedOut => "Already checked out",
            })),
        }
    }

    fn close_break(record: &mut Attendance, at: DateTime<Utc>) {
        if let Some(started) = record.break_started_at.take() {
            record.break_minutes += (at - started).num_minutes().max(0);
        }
    }

    async fn finish(&self, mut record: Attendance, at: DateTime<Utc>, automatic: bool) -> ServiceResult<Attendance> {
        Self::close_break(&mut record, at);
        record.check_out_at = Some(at);
        record.worked_minutes = record.worked_minutes_at(at);
        record.status = classify_attendance(
            &self.policy,
            record.worked_minutes,
            record.is_late,
            self.local_time(at),
        );
        if automatic {
            record.auto_checked_out = true;
            record.notes = append_note(
                record.notes.take(),
                &format!(
                    "Automatically checked out after {} hours",
                    self.policy.max_session_minutes / 60
                ),
            );
        }
        Ok(self.repo.update(&record).await.context("Failed to record check-out")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttendanceConfig;
    use crate::db::repositories::test_support::{insert_employee, insert_user, setup_pool};
    use crate::db::repositories::{
        NotificationRepository, SqlxAttendanceRepository, SqlxEmployeeRepository,
        SqlxLeaveRepository, SqlxNotificationRepository, SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::{LeaveRequest, LeaveType, UserRole};
    use crate::services::clock::ManualClock;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn policy() -> AttendancePolicy {
        AttendancePolicy::from_config(&AttendanceConfig::default()).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    /// Monday 2024-03-04 at the given UTC time
    fn monday(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    struct Fixture {
        pool: DynDatabasePool,
        clock: Arc<ManualClock>,
        service: AttendanceService,
    }

    async fn fixture(at: DateTime<Utc>) -> Fixture {
        let pool = setup_pool().await;
        let clock = Arc::new(ManualClock::new(at));
        let notifications = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
        ));
        let service = AttendanceService::new(
            SqlxAttendanceRepository::boxed(pool.clone()),
            SqlxEmployeeRepository::boxed(pool.clone()),
            SqlxLeaveRepository::boxed(pool.clone()),
            notifications,
            clock.clone(),
            policy(),
            Arc::new(MemoryCache::new()),
        );
        Fixture { pool, clock, service }
    }

    #[test]
    fn test_late_after_grace() {
        let p = policy();
        assert!(!is_late_at(&p, t(9, 0)));
        assert!(!is_late_at(&p, t(9, 15)));
        assert!(is_late_at(&p, t(9, 16)));
    }

    #[test]
    fn test_classification_order() {
        let p = policy();
        assert_eq!(classify_attendance(&p, 510, true, t(12, 0)), AttendanceStatus::Overtime);
        assert_eq!(classify_attendance(&p, 239, false, t(18, 0)), AttendanceStatus::HalfDay);
        assert_eq!(classify_attendance(&p, 400, false, t(16, 0)), AttendanceStatus::EarlyDeparture);
        assert_eq!(classify_attendance(&p, 480, true, t(17, 30)), AttendanceStatus::Late);
        assert_eq!(classify_attendance(&p, 480, false, t(17, 0)), AttendanceStatus::Present);
    }

    proptest! {
        #[test]
        fn classification_is_a_finished_day_status(
            worked in 0i64..1000,
            late in any::<bool>(),
            minute in 0u32..1440,
        ) {
            let p = policy();
            let out = t(minute / 60, minute % 60);
            let status = classify_attendance(&p, worked, late, out);
            prop_assert!(!matches!(status, AttendanceStatus::Absent | AttendanceStatus::OnBreak));
            if worked >= p.standard_minutes + p.overtime_threshold_minutes {
                prop_assert_eq!(status, AttendanceStatus::Overtime);
            } else if worked < p.half_day_minutes {
                prop_assert_eq!(status, AttendanceStatus::HalfDay);
            }
            if status == AttendanceStatus::Late {
                prop_assert!(late);
            }
        }
    }

    #[tokio::test]
    async fn test_full_day() {
        let f = fixture(monday(8, 55)).await;
        let ada = insert_employee(&f.pool, "Ada", "Lovelace").await;

        let record = f.service.check_in(ada.id).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert!(!record.is_late);

        f.clock.set(monday(12, 0));
        let record = f.service.start_break(ada.id).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::OnBreak);

        f.clock.set(monday(12, 45));
        let record = f.service.end_break(ada.id).await.unwrap();
        assert_eq!(record.break_minutes, 45);
        assert_eq!(record.status, AttendanceStatus::Present);

        f.clock.set(monday(17, 40));
        let record = f.service.check_out(ada.id).await.unwrap();
        assert_eq!(record.worked_minutes, 480);
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.state(), SessionState::CheckedOut);
    }

    #[tokio::test]
    async fn test_illegal_transitions() {
        let f = fixture(monday(9, 30)).await;
        let ada = insert_employee(&f.pool, "Ada", "Lovelace").await;

        assert!(matches!(f.service.start_break(ada.id).await, Err(ServiceError::InvalidState(_))));
        assert!(matches!(f.service.end_break(ada.id).await, Err(ServiceError::InvalidState(_))));
        assert!(matches!(f.service.check_out(ada.id).await, Err(ServiceError::InvalidState(_))));

        let record = f.service.check_in(ada.id).await.unwrap();
        assert!(record.is_late);
        assert_eq!(record.status, AttendanceStatus::Late);
        assert!(matches!(f.service.check_in(ada.id).await, Err(ServiceError::Conflict(_))));
        assert!(matches!(f.service.end_break(ada.id).await, Err(ServiceError::InvalidState(_))));

        f.service.start_break(ada.id).await.unwrap();
        assert!(matches!(f.service.start_break(ada.id).await, Err(ServiceError::InvalidState(_))));
        let record = f.service.end_break(ada.id).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Late);

        f.service.check_out(ada.id).await.unwrap();
        assert!(matches!(f.service.check_out(ada.id).await, Err(ServiceError::InvalidState(_))));
        assert!(matches!(f.service.start_break(ada.id).await, Err(ServiceError::InvalidState(_))));
        assert!(matches!(f.service.check_in(ada.id).await, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_check_out_closes_open_break() {
        let f = fixture(monday(9, 0)).await;
        let ada = insert_employee(&f.pool, "Ada", "Lovelace").await;
        f.service.check_in(ada.id).await.unwrap();

        f.clock.set(monday(12, 0));
        f.service.start_break(ada.id).await.unwrap();
        f.clock.set(monday(12, 30));
        let record = f.service.check_out(ada.id).await.unwrap();
        assert_eq!(record.break_minutes, 30);
        assert_eq!(record.worked_minutes, 180);
        assert_eq!(record.status, AttendanceStatus::HalfDay);
        assert!(record.break_started_at.is_none());
    }

    #[tokio::test]
    async fn test_session_status() {
        let f = fixture(monday(9, 0)).await;
        let ada = insert_employee(&f.pool, "Ada", "Lovelace").await;

        let status = f.service.session_status(ada.id).await.unwrap();
        assert_eq!(status.state, SessionState::NotCheckedIn);
        assert!(status.record.is_none());

        f.service.check_in(ada.id).await.unwrap();
        f.clock.set(monday(11, 0));
        f.service.start_break(ada.id).await.unwrap();
        f.clock.set(monday(11, 20));

        let status = f.service.session_status(ada.id).await.unwrap();
        assert_eq!(status.state, SessionState::OnBreak);
        assert_eq!(status.worked_minutes, 120);
        assert_eq!(status.break_minutes, 20);
        assert_eq!(status.minutes_until_auto_checkout, Some(12 * 60 - 140));
    }

    #[tokio::test]
    async fn test_auto_checkout_caps_session() {
        let f = fixture(monday(8, 0)).await;
        let ada = insert_employee(&f.pool, "Ada", "Lovelace").await;
        let grace = insert_employee(&f.pool, "Grace", "Hopper").await;
        let user = insert_user(&f.pool, "ada", UserRole::Employee, Some(ada.id)).await;
        f.service.check_in(ada.id).await.unwrap();
        f.clock.set(monday(15, 0));
        f.service.check_in(grace.id).await.unwrap();

        assert_eq!(f.service.auto_checkout_sweep(monday(19, 59)).await.unwrap(), 0);

        let now = monday(22, 30);
        assert_eq!(f.service.auto_checkout_sweep(now).await.unwrap(), 1);

        let record = f
            .service
            .session_status(ada.id)
            .await
            .unwrap()
            .record
            .unwrap();
        assert!(record.auto_checked_out);
        assert_eq!(record.check_out_at, Some(monday(20, 0)));
        assert_eq!(record.worked_minutes, 720);
        assert_eq!(record.status, AttendanceStatus::Overtime);
        assert!(record.notes.unwrap().contains("Automatically checked out"));

        let unread = SqlxNotificationRepository::new(f.pool.clone())
            .unread_count(user.id)
            .await
            .unwrap();
        assert_eq!(unread, 1);

        let grace_status = f.service.session_status(grace.id).await.unwrap();
        assert_eq!(grace_status.state, SessionState::CheckedIn);
    }

    /// Refuses to update records of one employee
    struct StuckUpdates {
        inner: SqlxAttendanceRepository,
        employee_id: i64,
    }

    #[async_trait::async_trait]
    impl AttendanceRepository for StuckUpdates {
        async fn create(&self, record: &Attendance) -> anyhow::Result<Attendance> {
            self.inner.create(record).await
        }
        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Attendance>> {
            self.inner.get_by_id(id).await
        }
        async fn get_for_day(&self, employee_id: i64, work_date: NaiveDate) -> anyhow::Result<Option<Attendance>> {
            self.inner.get_for_day(employee_id, work_date).await
        }
        async fn update(&self, record: &Attendance) -> anyhow::Result<Attendance> {
            if record.employee_id == self.employee_id {
                anyhow::bail!("database is locked");
            }
            self.inner.update(record).await
        }
        async fn delete(&self, id: i64) -> anyhow::Result<()> {
            self.inner.delete(id).await
        }
        async fn list(&self, filter: &AttendanceFilter, params: &ListParams) -> anyhow::Result<(Vec<Attendance>, i64)> {
            self.inner.list(filter, params).await
        }
        async fn list_range(&self, filter: &AttendanceFilter) -> anyhow::Result<Vec<Attendance>> {
            self.inner.list_range(filter).await
        }
        async fn list_open(&self) -> anyhow::Result<Vec<Attendance>> {
            self.inner.list_open().await
        }
    }

    #[tokio::test]
    async fn test_auto_checkout_continues_past_failed_record() {
        let f = fixture(monday(8, 0)).await;
        let ada = insert_employee(&f.pool, "Ada", "Lovelace").await;
        let grace = insert_employee(&f.pool, "Grace", "Hopper").await;
        f.service.check_in(ada.id).await.unwrap();
        f.service.check_in(grace.id).await.unwrap();

        let service = AttendanceService::new(
            Arc::new(StuckUpdates {
                inner: SqlxAttendanceRepository::new(f.pool.clone()),
                employee_id: ada.id,
            }),
            SqlxEmployeeRepository::boxed(f.pool.clone()),
            SqlxLeaveRepository::boxed(f.pool.clone()),
            Arc::new(NotificationService::new(
                SqlxNotificationRepository::boxed(f.pool.clone()),
                SqlxUserRepository::boxed(f.pool.clone()),
            )),
            f.clock.clone(),
            policy(),
            Arc::new(MemoryCache::new()),
        );

        assert_eq!(service.auto_checkout_sweep(monday(22, 0)).await.unwrap(), 1);
        let ada_status = f.service.session_status(ada.id).await.unwrap();
        assert_eq!(ada_status.state, SessionState::CheckedIn);
        let grace_record = f.service.session_status(grace.id).await.unwrap().record.unwrap();
        assert!(grace_record.auto_checked_out);
    }

    #[tokio::test]
    async fn test_absent_record_is_replaced_by_check_in() {
        let f = fixture(monday(9, 5)).await;
        let ada = insert_employee(&f.pool, "Ada", "Lovelace").await;

        let absences = f.service.mark_absences(f.service.today()).await.unwrap();
        assert_eq!(absences.len(), 1);

        let record = f.service.check_in(ada.id).await.unwrap();
        assert_eq!(record.id, absences[0].id);
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn test_mark_absences_skips_leave_and_recorded() {
        let f = fixture(monday(9, 0)).await;
        let present = insert_employee(&f.pool, "Ada", "Lovelace").await;
        let on_leave = insert_employee(&f.pool, "Grace", "Hopper").await;
        let missing = insert_employee(&f.pool, "Alan", "Turing").await;
        f.service.check_in(present.id).await.unwrap();

        let day = f.service.today();
        SqlxLeaveRepository::new(f.pool.clone())
            .create(&LeaveRequest {
                id: 0,
                employee_id: on_leave.id,
                leave_type: LeaveType::Annual,
                start_date: day,
                end_date: day,
                days: 1,
                reason: None,
                handover_document: None,
                status: LeaveStatus::Approved,
                reviewed_by: None,
                review_comment: None,
                reviewed_at: None,
                created_at: monday(9, 0),
                updated_at: monday(9, 0),
            })
            .await
            .unwrap();

        let absences = f.service.mark_absences(day).await.unwrap();
        assert_eq!(absences.len(), 1);
        assert_eq!(absences[0].employee_id, missing.id);

        // Running it twice adds nothing
        assert!(f.service.mark_absences(day).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_absences_skips_weekends() {
        let f = fixture(monday(9, 0)).await;
        insert_employee(&f.pool, "Ada", "Lovelace").await;

        let saturday = f.service.today() + Duration::days(5);
        assert!(f.service.mark_absences(saturday).await.unwrap().is_empty());
        assert!(f
            .service
            .mark_absences(saturday + Duration::days(1))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            f.service
                .mark_absences(saturday + Duration::days(2))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_correction_recomputes() {
        let f = fixture(monday(9, 0)).await;
        let ada = insert_employee(&f.pool, "Ada", "Lovelace").await;
        let record = f.service.check_in(ada.id).await.unwrap();

        let corrected = f
            .service
            .update(
                record.id,
                UpdateAttendanceInput {
                    check_out_at: Some(monday(18, 0)),
                    break_minutes: Some(30),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(corrected.worked_minutes, 510);
        assert_eq!(corrected.status, AttendanceStatus::Overtime);

        let backwards = f
            .service
            .update(
                record.id,
                UpdateAttendanceInput {
                    check_out_at: Some(monday(8, 0)),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(backwards, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_summary_and_scope() {
        let f = fixture(monday(9, 0)).await;
        let ada = insert_employee(&f.pool, "Ada", "Lovelace").await;
        let grace = insert_employee(&f.pool, "Grace", "Hopper").await;
        f.service.check_in(ada.id).await.unwrap();
        f.service.check_in(grace.id).await.unwrap();
        f.clock.set(monday(18, 0));
        f.service.check_out(ada.id).await.unwrap();

        let hr = insert_user(&f.pool, "hr", UserRole::Hr, None).await;
        let summary = f.service.summary(&hr, None, None, None).await.unwrap();
        assert_eq!(summary.days_recorded, 2);
        assert_eq!(summary.total_worked_minutes, 540);
        assert_eq!(summary.overtime_minutes, 60);
        assert_eq!(summary.by_status.get("OVERTIME"), Some(&1));

        let ada_user = insert_user(&f.pool, "ada", UserRole::Employee, Some(ada.id)).await;
        let own = f.service.summary(&ada_user, None, None, None).await.unwrap();
        assert_eq!(own.days_recorded, 1);
        assert!(matches!(
            f.service.summary(&ada_user, Some(grace.id), None, None).await,
            Err(ServiceError::Forbidden(_))
        ));

        let page = f
            .service
            .list(&ada_user, AttendanceFilter::default(), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        let history = f
            .service
            .history(&ada_user, None, None, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(history.items[0].employee_id, ada.id);
    }

    #[tokio::test]
    async fn test_local_day_uses_offset() {
        let mut config = AttendanceConfig::default();
        config.utc_offset_minutes = 120;
        let mut f = fixture(Utc.with_ymd_and_hms(2024, 3, 3, 23, 30, 0).unwrap()).await;
        f.service.policy = AttendancePolicy::from_config(&config).unwrap();
        assert_eq!(f.service.today(), NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }
}
