//! Reports and the dashboard summary
//!
//! A generated report is a snapshot: its payload is computed once and
//! stored as `{ "columns": [...], "rows": [{...}], "totals": {...} }`, so
//! later edits to attendance or payroll do not change it.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{
    ApplicationRepository, AttendanceRepository, DepartmentRepository, EmployeeRepository,
    InterviewRepository, JobRepository, LeaveRepository, NewReport, ReportRepository,
    SalaryRepository,
};
use crate::models::{
    ApplicationFilter, ApplicationStatus, AttendanceFilter, AttendanceStatus, Employee,
    EmployeeFilter, EmployeeStatus, InterviewFilter, InterviewStatus, JobFilter, JobStatus,
    LeaveFilter, LeaveStatus, LeaveType, ListParams, PagedResult, Report, ReportType,
    SalaryFilter, SalaryStatus, User,
};
use crate::services::clock::Clock;
use crate::services::csv;
use crate::services::error::{OrNotFound, ServiceError, ServiceResult};
use crate::services::leave::business_days;
use anyhow::Context;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

pub const DASHBOARD_CACHE_KEY: &str = "dashboard:summary";

/// Window of the "upcoming interviews" figure
const UPCOMING_INTERVIEW_DAYS: i64 = 7;

/// Longest window a single report may cover
const MAX_REPORT_DAYS: i64 = 366;

/// Drop the cached dashboard after a write that changes its figures
pub(crate) async fn invalidate_dashboard(cache: &MemoryCache) {
    if let Err(e) = cache.delete(DASHBOARD_CACHE_KEY).await {
        tracing::warn!("Failed to invalidate dashboard cache: {}", e);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateReportInput {
    pub report_type: ReportType,
    pub from: NaiveDate,
    /// Inclusive
    pub to: NaiveDate,
    #[serde(default)]
    pub department_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub active_employees: i64,
    pub present_today: i64,
    pub on_leave_today: i64,
    pub pending_leave_requests: i64,
    pub open_jobs: i64,
    pub upcoming_interviews: i64,
    pub generated_at: DateTime<Utc>,
}

/// Table under construction
struct Table {
    columns: &'static [&'static str],
    rows: Vec<Map<String, Value>>,
    totals: Map<String, Value>,
}

impl Table {
    fn new(columns: &'static [&'static str]) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            totals: Map::new(),
        }
    }

    fn push(&mut self, values: Vec<Value>) {
        let row = self
            .columns
            .iter()
            .map(|c| c.to_string())
            .zip(values)
            .collect();
        self.rows.push(row);
    }

    /// Sum the numeric columns into `totals`
    fn total(mut self, columns: &[&str]) -> Self {
        for column in columns {
            let sum: f64 = self
                .rows
                .iter()
                .filter_map(|r| r.get(*column).and_then(Value::as_f64))
                .sum();
            let value = if self.rows.iter().all(|r| r.get(*column).map_or(true, Value::is_i64)) {
                json!(sum as i64)
            } else {
                json!(round2(sum))
            };
            self.totals.insert(column.to_string(), value);
        }
        self
    }

    fn into_value(self) -> Value {
        json!({
            "columns": self.columns,
            "rows": self.rows,
            "totals": self.totals,
        })
    }
}

pub struct ReportService {
    repo: Arc<dyn ReportRepository>,
    employee_repo: Arc<dyn EmployeeRepository>,
    department_repo: Arc<dyn DepartmentRepository>,
    attendance_repo: Arc<dyn AttendanceRepository>,
    leave_repo: Arc<dyn LeaveRepository>,
    salary_repo: Arc<dyn SalaryRepository>,
    job_repo: Arc<dyn JobRepository>,
    application_repo: Arc<dyn ApplicationRepository>,
    interview_repo: Arc<dyn InterviewRepository>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    cache: Arc<MemoryCache>,
}

impl ReportService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn ReportRepository>,
        employee_repo: Arc<dyn EmployeeRepository>,
        department_repo: Arc<dyn DepartmentRepository>,
        attendance_repo: Arc<dyn AttendanceRepository>,
        leave_repo: Arc<dyn LeaveRepository>,
        salary_repo: Arc<dyn SalaryRepository>,
        job_repo: Arc<dyn JobRepository>,
        application_repo: Arc<dyn ApplicationRepository>,
        interview_repo: Arc<dyn InterviewRepository>,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            repo,
            employee_repo,
            department_repo,
            attendance_repo,
            leave_repo,
            salary_repo,
            job_repo,
            application_repo,
            interview_repo,
            clock,
            offset,
            cache,
        }
    }

    /// Compute a report and store it
    pub async fn generate(&self, user: &User, input: GenerateReportInput) -> ServiceResult<Report> {
        if input.to < input.from {
            return Err(ServiceError::validation("The report must end on or after its start date"));
        }
        if (input.to - input.from).num_days() >= MAX_REPORT_DAYS {
            return Err(ServiceError::validation(format!(
                "A report can cover at most {} days",
                MAX_REPORT_DAYS
            )));
        }
        let department = match input.department_id {
            Some(id) => Some(
                self.department_repo
                    .get_by_id(id)
                    .await
                    .context("Failed to get department")?
                    .ok_or_else(|| ServiceError::validation(format!("Department {} does not exist", id)))?,
            ),
            None => None,
        };

        let table = match input.report_type {
            ReportType::AttendanceSummary => self.attendance_summary(&input).await?,
            ReportType::LeaveSummary => self.leave_summary(&input).await?,
            ReportType::Headcount => self.headcount(&input).await?,
            ReportType::PayrollSummary => self.payroll_summary(&input).await?,
            ReportType::RecruitmentPipeline => self.recruitment_pipeline(&input).await?,
        };

        let mut title = format!("{} {} to {}", input.report_type.title(), input.from, input.to);
        if let Some(department) = &department {
            title.push_str(&format!(" ({})", department.name));
        }
        let report = self
            .repo
            .create(&NewReport {
                report_type: input.report_type,
                title,
                parameters: json!({
                    "from": input.from,
                    "to": input.to,
                    "department_id": input.department_id,
                }),
                data: table.into_value(),
                generated_by: Some(user.id),
            })
            .await
            .context("Failed to store report")?;

        tracing::info!(report_id = report.id, report_type = %report.report_type, "Report generated");
        Ok(report)
    }

    pub async fn list(
        &self,
        report_type: Option<ReportType>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Report>> {
        let (items, total) = self
            .repo
            .list(report_type, params)
            .await
            .context("Failed to list reports")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Report> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get report")?
            .or_not_found("Report", id)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.get(id).await?;
        self.repo.delete(id).await.context("Failed to delete report")?;
        Ok(())
    }

    /// Render a stored report's rows as CSV
    pub async fn export_csv(&self, id: i64) -> ServiceResult<(String, String)> {
        let report = self.get(id).await?;
        let filename = format!("{}-{}.csv", report.report_type, report.id);
        Ok((filename, report_csv(&report.data)))
    }

    /// Figures for the landing page, cached for the configured TTL
    pub async fn dashboard(&self) -> ServiceResult<DashboardSummary> {
        match self.cache.get::<DashboardSummary>(DASHBOARD_CACHE_KEY).await {
            Ok(Some(summary)) => return Ok(summary),
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to read dashboard cache: {}", e),
        }

        let summary = self.compute_dashboard().await?;
        if let Err(e) = self
            .cache
            .set(DASHBOARD_CACHE_KEY, &summary, self.cache.default_ttl())
            .await
        {
            tracing::warn!("Failed to cache dashboard: {}", e);
        }
        Ok(summary)
    }

    async fn compute_dashboard(&self) -> ServiceResult<DashboardSummary> {
        let now = self.clock.now();
        let today = now.with_timezone(&self.offset).date_naive();

        let active_employees = self
            .employee_repo
            .count_by_status()
            .await
            .context("Failed to count employees")?
            .into_iter()
            .filter(|(status, _)| *status == EmployeeStatus::Active)
            .map(|(_, count)| count)
            .sum();

        let present_today = self
            .attendance_repo
            .list_range(&AttendanceFilter {
                from: Some(today),
                to: Some(today),
                ..Default::default()
            })
            .await
            .context("Failed to list attendance")?
            .iter()
            .filter(|r| r.check_in_at.is_some())
            .count() as i64;

        let on_leave_today = self
            .leave_repo
            .list_all(&LeaveFilter {
                status: Some(LeaveStatus::Approved),
                from: Some(today),
                to: Some(today),
                ..Default::default()
            })
            .await
            .context("Failed to list leave")?
            .iter()
            .map(|l| l.employee_id)
            .collect::<HashSet<_>>()
            .len() as i64;

        let pending_leave_requests = self
            .leave_repo
            .count_pending()
            .await
            .context("Failed to count pending leave")?;

        let open_jobs = self
            .job_repo
            .list(&JobFilter {
                status: Some(JobStatus::Open),
                ..Default::default()
            })
            .await
            .context("Failed to list jobs")?
            .len() as i64;

        let upcoming_interviews = self
            .interview_repo
            .list(&InterviewFilter {
                status: Some(InterviewStatus::Scheduled),
                from: Some(now),
                to: Some(now + Duration::days(UPCOMING_INTERVIEW_DAYS)),
                ..Default::default()
            })
            .await
            .context("Failed to list interviews")?
            .len() as i64;

        Ok(DashboardSummary {
            active_employees,
            present_today,
            on_leave_today,
            pending_leave_requests,
            open_jobs,
            upcoming_interviews,
            generated_at: now,
        })
    }

    /// Employees in scope, keyed by id, in code order
    async fn employees(&self, department_id: Option<i64>) -> ServiceResult<BTreeMap<i64, Employee>> {
        let employees = self
            .employee_repo
            .list_all(&EmployeeFilter {
                department_id,
                ..Default::default()
            })
            .await
            .context("Failed to list employees")?;
        Ok(employees.into_iter().map(|e| (e.id, e)).collect())
    }

    async fn attendance_summary(&self, input: &GenerateReportInput) -> ServiceResult<Table> {
        let employees = self.employees(input.department_id).await?;
        let records = self
            .attendance_repo
            .list_range(&AttendanceFilter {
                from: Some(input.from),
                to: Some(input.to),
                ..Default::default()
            })
            .await
            .context("Failed to list attendance")?;

        #[derive(Default)]
        struct Tally {
            present: i64,
            late: i64,
            absent: i64,
            half_day: i64,
            overtime: i64,
            worked_minutes: i64,
        }
        let mut tallies: HashMap<i64, Tally> = HashMap::new();
        for record in records.iter().filter(|r| employees.contains_key(&r.employee_id)) {
            let tally = tallies.entry(record.employee_id).or_default();
            match record.status {
                AttendanceStatus::Absent => tally.absent += 1,
                AttendanceStatus::HalfDay => {
                    tally.present += 1;
                    tally.half_day += 1;
                }
                AttendanceStatus::Overtime => {
                    tally.present += 1;
                    tally.overtime += 1;
                }
                _ => tally.present += 1,
            }
            if record.is_late {
                tally.late += 1;
            }
            tally.worked_minutes += record.worked_minutes;
        }

        let mut table = Table::new(&[
            "employee_code",
            "employee",
            "days_present",
            "days_late",
            "days_absent",
            "half_days",
            "overtime_days",
            "worked_hours",
        ]);
        for employee in employees.values() {
            let Some(t) = tallies.get(&employee.id) else {
                continue;
            };
            table.push(vec![
                json!(employee.employee_code),
                json!(employee.full_name()),
                json!(t.present),
                json!(t.late),
                json!(t.absent),
                json!(t.half_day),
                json!(t.overtime),
                json!(round2(t.worked_minutes as f64 / 60.0)),
            ]);
        }
        Ok(table.total(&[
            "days_present",
            "days_late",
            "days_absent",
            "half_days",
            "overtime_days",
            "worked_hours",
        ]))
    }

    /// Approved business days inside the window, per type, plus pending requests
    async fn leave_summary(&self, input: &GenerateReportInput) -> ServiceResult<Table> {
        let employees = self.employees(input.department_id).await?;
        let requests = self
            .leave_repo
            .list_all(&LeaveFilter {
                from: Some(input.from),
                to: Some(input.to),
                ..Default::default()
            })
            .await
            .context("Failed to list leave")?;

        let mut days: HashMap<i64, HashMap<LeaveType, i64>> = HashMap::new();
        let mut pending: HashMap<i64, i64> = HashMap::new();
        for request in requests.iter().filter(|r| employees.contains_key(&r.employee_id)) {
            match request.status {
                LeaveStatus::Approved => {
                    let start = request.start_date.max(input.from);
                    let end = request.end_date.min(input.to);
                    *days
                        .entry(request.employee_id)
                        .or_default()
                        .entry(request.leave_type)
                        .or_default() += business_days(start, end);
                }
                LeaveStatus::Pending => *pending.entry(request.employee_id).or_default() += 1,
                LeaveStatus::Declined => {}
            }
        }

        let mut table = Table::new(&[
            "employee_code",
            "employee",
            "annual",
            "sick",
            "personal",
            "unpaid",
            "parental",
            "total_days",
            "pending_requests",
        ]);
        let types = [
            LeaveType::Annual,
            LeaveType::Sick,
            LeaveType::Personal,
            LeaveType::Unpaid,
            LeaveType::Parental,
        ];
        for employee in employees.values() {
            let taken = days.get(&employee.id);
            let waiting = pending.get(&employee.id).copied().unwrap_or(0);
            if taken.is_none() && waiting == 0 {
                continue;
            }
            let per_type: Vec<i64> = types
                .iter()
                .map(|t| taken.and_then(|d| d.get(t)).copied().unwrap_or(0))
                .collect();
            let mut row = vec![json!(employee.employee_code), json!(employee.full_name())];
            row.extend(per_type.iter().map(|d| json!(d)));
            row.push(json!(per_type.iter().sum::<i64>()));
            row.push(json!(waiting));
            table.push(row);
        }
        Ok(table.total(&[
            "annual",
            "sick",
            "personal",
            "unpaid",
            "parental",
            "total_days",
            "pending_requests",
        ]))
    }

    /// Current staff per department, with hires during the window
    async fn headcount(&self, input: &GenerateReportInput) -> ServiceResult<Table> {
        let employees = self.employees(input.department_id).await?;
        let departments: HashMap<i64, String> = self
            .department_repo
            .list_with_counts()
            .await
            .context("Failed to list departments")?
            .into_iter()
            .map(|d| (d.department.id, d.department.name))
            .collect();

        #[derive(Default)]
        struct Count {
            active: i64,
            on_leave: i64,
            terminated: i64,
            hired: i64,
        }
        let mut counts: BTreeMap<String, Count> = BTreeMap::new();
        for employee in employees.values() {
            let name = employee
                .department_id
                .and_then(|id| departments.get(&id).cloned())
                .unwrap_or_else(|| "Unassigned".to_string());
            let count = counts.entry(name).or_default();
            match employee.status {
                EmployeeStatus::Active => count.active += 1,
                EmployeeStatus::OnLeave => count.on_leave += 1,
                EmployeeStatus::Terminated => count.terminated += 1,
            }
            if (input.from..=input.to).contains(&employee.hire_date) {
                count.hired += 1;
            }
        }

        let mut table = Table::new(&[
            "department",
            "active",
            "on_leave",
            "terminated",
            "headcount",
            "hired_in_period",
        ]);
        for (name, c) in counts {
            table.push(vec![
                json!(name),
                json!(c.active),
                json!(c.on_leave),
                json!(c.terminated),
                json!(c.active + c.on_leave),
                json!(c.hired),
            ]);
        }
        Ok(table.total(&["active", "on_leave", "terminated", "headcount", "hired_in_period"]))
    }

    /// Payslips per pay month touched by the window
    async fn payroll_summary(&self, input: &GenerateReportInput) -> ServiceResult<Table> {
        let employees = self.employees(input.department_id).await?;
        let first = input.from.format("%Y-%m").to_string();
        let last = input.to.format("%Y-%m").to_string();
        let slips = self
            .salary_repo
            .list_all(&SalaryFilter::default())
            .await
            .context("Failed to list payslips")?;

        #[derive(Default)]
        struct Period {
            payslips: i64,
            paid: i64,
            base: f64,
            overtime: f64,
            bonus: f64,
            deductions: f64,
            net: f64,
        }
        let mut periods: BTreeMap<String, Period> = BTreeMap::new();
        for slip in slips.iter().filter(|s| {
            employees.contains_key(&s.employee_id)
                && s.period.as_str() >= first.as_str()
                && s.period.as_str() <= last.as_str()
        }) {
            let p = periods.entry(slip.period.clone()).or_default();
            p.payslips += 1;
            if slip.status == SalaryStatus::Paid {
                p.paid += 1;
            }
            p.base += slip.base_amount;
            p.overtime += slip.overtime_pay;
            p.bonus += slip.bonus;
            p.deductions += slip.deductions;
            p.net += slip.net_pay;
        }

        let mut table = Table::new(&[
            "period",
            "payslips",
            "paid",
            "base_amount",
            "overtime_pay",
            "bonus",
            "deductions",
            "net_pay",
        ]);
        for (period, p) in periods {
            table.push(vec![
                json!(period),
                json!(p.payslips),
                json!(p.paid),
                json!(round2(p.base)),
                json!(round2(p.overtime)),
                json!(round2(p.bonus)),
                json!(round2(p.deductions)),
                json!(round2(p.net)),
            ]);
        }
        Ok(table.total(&[
            "payslips",
            "paid",
            "base_amount",
            "overtime_pay",
            "bonus",
            "deductions",
            "net_pay",
        ]))
    }

    /// Applications received during the window, by job and stage
    async fn recruitment_pipeline(&self, input: &GenerateReportInput) -> ServiceResult<Table> {
        let jobs = self
            .job_repo
            .list(&JobFilter {
                department_id: input.department_id,
                ..Default::default()
            })
            .await
            .context("Failed to list jobs")?;
        let applications = self
            .application_repo
            .list(&ApplicationFilter::default())
            .await
            .context("Failed to list applications")?;

        let stages = [
            ApplicationStatus::Applied,
            ApplicationStatus::Screening,
            ApplicationStatus::Interview,
            ApplicationStatus::Offer,
            ApplicationStatus::Hired,
            ApplicationStatus::Rejected,
            ApplicationStatus::Withdrawn,
        ];
        let mut table = Table::new(&[
            "job",
            "status",
            "openings",
            "applied",
            "screening",
            "interview",
            "offer",
            "hired",
            "rejected",
            "withdrawn",
            "total",
        ]);
        for job in &jobs {
            let received: Vec<_> = applications
                .iter()
                .filter(|a| a.job_id == job.id)
                .filter(|a| {
                    let day = a.created_at.with_timezone(&self.offset).date_naive();
                    (input.from..=input.to).contains(&day)
                })
                .collect();
            if received.is_empty() && job.status != JobStatus::Open {
                continue;
            }
            let mut row = vec![json!(job.title), json!(job.status.as_str()), json!(job.openings)];
            row.extend(
                stages
                    .iter()
                    .map(|s| json!(received.iter().filter(|a| a.status == *s).count() as i64)),
            );
            row.push(json!(received.len() as i64));
            table.push(row);
        }
        Ok(table.total(&[
            "openings",
            "applied",
            "screening",
            "interview",
            "offer",
            "hired",
            "rejected",
            "withdrawn",
            "total",
        ]))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Flatten a report payload's `rows` into CSV under its `columns`
pub fn report_csv(data: &Value) -> String {
    let columns: Vec<String> = data
        .get("columns")
        .and_then(Value::as_array)
        .map(|cols| cols.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let rows = data
        .get("rows")
        .and_then(Value::as_array)
        .map(|rows| rows.as_slice())
        .unwrap_or_default();

    csv::to_csv(
        &columns,
        rows.iter().map(|row| {
            columns
                .iter()
                .map(|c| cell(row.get(c).unwrap_or(&Value::Null)))
                .collect::<Vec<_>>()
        }),
    )
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_employee, insert_user, setup_pool};
    use crate::db::repositories::{
        SqlxApplicationRepository, SqlxAttendanceRepository, SqlxDepartmentRepository,
        SqlxEmployeeRepository, SqlxInterviewRepository, SqlxJobRepository, SqlxLeaveRepository,
        SqlxReportRepository, SqlxSalaryRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::{Attendance, LeaveRequest, UserRole};
    use crate::services::clock::ManualClock;
    use chrono::TimeZone;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn service(pool: &DynDatabasePool, cache: Arc<MemoryCache>) -> ReportService {
        ReportService::new(
            SqlxReportRepository::boxed(pool.clone()),
            SqlxEmployeeRepository::boxed(pool.clone()),
            SqlxDepartmentRepository::boxed(pool.clone()),
            SqlxAttendanceRepository::boxed(pool.clone()),
            SqlxLeaveRepository::boxed(pool.clone()),
            SqlxSalaryRepository::boxed(pool.clone()),
            SqlxJobRepository::boxed(pool.clone()),
            SqlxApplicationRepository::boxed(pool.clone()),
            SqlxInterviewRepository::boxed(pool.clone()),
            Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap())),
            FixedOffset::east_opt(0).unwrap(),
            cache,
        )
    }

    fn day_record(employee_id: i64, day: NaiveDate, status: AttendanceStatus, late: bool, worked: i64) -> Attendance {
        let check_in = day.and_hms_opt(9, 0, 0).unwrap().and_utc();
        Attendance {
            id: 0,
            employee_id,
            work_date: day,
            check_in_at: (status != AttendanceStatus::Absent).then_some(check_in),
            check_out_at: (status != AttendanceStatus::Absent).then(|| check_in + Duration::minutes(worked)),
            break_started_at: None,
            break_minutes: 0,
            worked_minutes: worked,
            is_late: late,
            status,
            auto_checked_out: false,
            notes: None,
            created_at: check_in,
            updated_at: check_in,
        }
    }

    fn leave(employee_id: i64, leave_type: LeaveType, start: NaiveDate, end: NaiveDate, status: LeaveStatus) -> LeaveRequest {
        LeaveRequest {
            id: 0,
            employee_id,
            leave_type,
            start_date: start,
            end_date: end,
            days: business_days(start, end),
            reason: None,
            handover_document: None,
            status,
            reviewed_by: None,
            review_comment: None,
            reviewed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn input(report_type: ReportType) -> GenerateReportInput {
        GenerateReportInput {
            report_type,
            from: d(3, 1),
            to: d(3, 31),
            department_id: None,
        }
    }

    #[tokio::test]
    async fn test_attendance_summary() {
        let pool = setup_pool().await;
        let hr = insert_user(&pool, "hr", UserRole::Hr, None).await;
        let ada = insert_employee(&pool, "Ada", "Lovelace").await;
        let attendance = SqlxAttendanceRepository::new(pool.clone());
        attendance
            .create(&day_record(ada.id, d(3, 4), AttendanceStatus::Present, false, 480))
            .await
            .unwrap();
        attendance
            .create(&day_record(ada.id, d(3, 5), AttendanceStatus::Late, true, 450))
            .await
            .unwrap();
        attendance
            .create(&day_record(ada.id, d(3, 6), AttendanceStatus::Absent, false, 0))
            .await
            .unwrap();
        // Outside the window
        attendance
            .create(&day_record(ada.id, d(4, 1), AttendanceStatus::Present, false, 480))
            .await
            .unwrap();

        let service = service(&pool, Arc::new(MemoryCache::new()));
        let report = service
            .generate(&hr, input(ReportType::AttendanceSummary))
            .await
            .unwrap();
        assert_eq!(report.title, "Attendance summary 2024-03-01 to 2024-03-31");
        assert_eq!(report.generated_by, Some(hr.id));
        let row = &report.data["rows"][0];
        assert_eq!(row["employee"], "Ada Lovelace");
        assert_eq!(row["days_present"], 2);
        assert_eq!(row["days_late"], 1);
        assert_eq!(row["days_absent"], 1);
        assert_eq!(row["worked_hours"], 15.5);
        assert_eq!(report.data["totals"]["days_present"], 2);
    }

    #[tokio::test]
    async fn test_leave_summary_clips_to_window() {
        let pool = setup_pool().await;
        let hr = insert_user(&pool, "hr", UserRole::Hr, None).await;
        let ada = insert_employee(&pool, "Ada", "Lovelace").await;
        let leaves = SqlxLeaveRepository::new(pool.clone());
        // Thu 28 Mar to Wed 3 Apr: two business days fall in March
        leaves
            .create(&leave(ada.id, LeaveType::Annual, d(3, 28), d(4, 3), LeaveStatus::Approved))
            .await
            .unwrap();
        leaves
            .create(&leave(ada.id, LeaveType::Sick, d(3, 11), d(3, 11), LeaveStatus::Approved))
            .await
            .unwrap();
        leaves
            .create(&leave(ada.id, LeaveType::Annual, d(3, 18), d(3, 19), LeaveStatus::Pending))
            .await
            .unwrap();
        leaves
            .create(&leave(ada.id, LeaveType::Annual, d(3, 20), d(3, 20), LeaveStatus::Declined))
            .await
            .unwrap();

        let service = service(&pool, Arc::new(MemoryCache::new()));
        let report = service.generate(&hr, input(ReportType::LeaveSummary)).await.unwrap();
        let row = &report.data["rows"][0];
        assert_eq!(row["annual"], 2);
        assert_eq!(row["sick"], 1);
        assert_eq!(row["total_days"], 3);
        assert_eq!(row["pending_requests"], 1);
    }

    #[tokio::test]
    async fn test_headcount_and_csv_export() {
        let pool = setup_pool().await;
        let hr = insert_user(&pool, "hr", UserRole::Hr, None).await;
        insert_employee(&pool, "Ada", "Lovelace").await;
        insert_employee(&pool, "Grace", "Hopper").await;

        let service = service(&pool, Arc::new(MemoryCache::new()));
        let report = service.generate(&hr, input(ReportType::Headcount)).await.unwrap();
        assert_eq!(report.data["rows"][0]["department"], "Unassigned");
        assert_eq!(report.data["rows"][0]["headcount"], 2);
        assert_eq!(report.data["totals"]["active"], 2);

        let (filename, csv) = service.export_csv(report.id).await.unwrap();
        assert_eq!(filename, format!("headcount-{}.csv", report.id));
        assert_eq!(
            csv,
            "department,active,on_leave,terminated,headcount,hired_in_period\r\nUnassigned,2,0,0,2,0\r\n"
        );
    }

    #[tokio::test]
    async fn test_generate_validates_window() {
        let pool = setup_pool().await;
        let hr = insert_user(&pool, "hr", UserRole::Hr, None).await;
        let service = service(&pool, Arc::new(MemoryCache::new()));

        let mut backwards = input(ReportType::Headcount);
        backwards.from = d(4, 1);
        assert!(matches!(service.generate(&hr, backwards).await, Err(ServiceError::Validation(_))));

        let mut unknown_department = input(ReportType::Headcount);
        unknown_department.department_id = Some(99);
        assert!(matches!(
            service.generate(&hr, unknown_department).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_get_delete() {
        let pool = setup_pool().await;
        let hr = insert_user(&pool, "hr", UserRole::Hr, None).await;
        let service = service(&pool, Arc::new(MemoryCache::new()));
        let report = service.generate(&hr, input(ReportType::PayrollSummary)).await.unwrap();

        let page = service
            .list(Some(ReportType::PayrollSummary), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(service.get(report.id).await.unwrap().title, report.title);

        service.delete(report.id).await.unwrap();
        assert!(matches!(service.get(report.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dashboard_is_cached_until_invalidated() {
        let pool = setup_pool().await;
        let ada = insert_employee(&pool, "Ada", "Lovelace").await;
        let cache = Arc::new(MemoryCache::new());
        let service = service(&pool, cache.clone());

        let first = service.dashboard().await.unwrap();
        assert_eq!(first.active_employees, 1);
        assert_eq!(first.present_today, 0);

        SqlxAttendanceRepository::new(pool.clone())
            .create(&day_record(ada.id, d(3, 5), AttendanceStatus::Present, false, 0))
            .await
            .unwrap();
        assert_eq!(service.dashboard().await.unwrap().present_today, 0);

        invalidate_dashboard(&cache).await;
        assert_eq!(service.dashboard().await.unwrap().present_today, 1);
    }

    #[test]
    fn test_report_csv_quotes_and_blanks() {
        let data = json!({
            "columns": ["employee", "note"],
            "rows": [{"employee": "Lovelace, Ada", "note": null}],
            "totals": {}
        });
        assert_eq!(report_csv(&data), "employee,note\r\n\"Lovelace, Ada\",\r\n");
    }
}
