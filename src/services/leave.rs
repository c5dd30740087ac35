//! Leave service
//!
//! Requests are counted in business days (Monday to Friday). Annual and sick
//! leave are capped per calendar year by the `leave` config section; the
//! other types have no cap.

use crate::cache::MemoryCache;
use crate::config::LeaveConfig;
use crate::db::repositories::leave::overlap_filter;
use crate::db::repositories::{EmployeeRepository, LeaveRepository};
use crate::models::{
    CreateLeaveInput, Employee, EmployeeStatus, LeaveBalance, LeaveFilter, LeaveRequest,
    LeaveStatus, LeaveType, ListParams, NotificationKind, PagedResult, User,
};
use crate::services::access;
use crate::services::clock::Clock;
use crate::services::email::{templates, EmailService};
use crate::services::error::{OrNotFound, ServiceError, ServiceResult};
use crate::services::notification::NotificationService;
use crate::services::report::invalidate_dashboard;
use crate::services::validation;
use anyhow::Context;
use chrono::{Datelike, FixedOffset, NaiveDate, Weekday};
use std::collections::HashSet;
use std::sync::Arc;

/// Weekdays between `start` and `end`, both inclusive
pub fn business_days(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return 0;
    }
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as i64
}

/// Yearly cap for a leave type, if it has one
pub fn allowance(config: &LeaveConfig, leave_type: LeaveType) -> Option<i64> {
    match leave_type {
        LeaveType::Annual => Some(config.annual_allowance_days),
        LeaveType::Sick => Some(config.sick_allowance_days),
        LeaveType::Personal | LeaveType::Unpaid | LeaveType::Parental => None,
    }
}

fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

fn paginate<T>(items: Vec<T>, params: &ListParams) -> PagedResult<T> {
    let total = items.len() as i64;
    let page = items
        .into_iter()
        .skip(params.offset() as usize)
        .take(params.limit() as usize)
        .collect();
    PagedResult::new(page, total, params)
}

pub struct LeaveService {
    repo: Arc<dyn LeaveRepository>,
    employee_repo: Arc<dyn EmployeeRepository>,
    notifications: Arc<NotificationService>,
    email: Arc<EmailService>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    config: LeaveConfig,
    cache: Arc<MemoryCache>,
}

impl LeaveService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn LeaveRepository>,
        employee_repo: Arc<dyn EmployeeRepository>,
        notifications: Arc<NotificationService>,
        email: Arc<EmailService>,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
        config: LeaveConfig,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            repo,
            employee_repo,
            notifications,
            email,
            clock,
            offset,
            config,
            cache,
        }
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.offset).date_naive()
    }

    /// File a leave request for the caller, or for anyone when HR files it
    pub async fn request(&self, user: &User, input: CreateLeaveInput) -> ServiceResult<LeaveRequest> {
        let employee_id = match input.employee_id {
            Some(id) if user.is_hr() => id,
            Some(id) if !user.is_employee(id) => {
                return Err(ServiceError::forbidden("Only HR can file leave for someone else"))
            }
            _ => access::linked_employee(user)?,
        };
        let employee = self.employee(employee_id).await?;
        if !employee.is_active() {
            return Err(ServiceError::invalid_state("Terminated employees cannot request leave"));
        }

        if input.end_date < input.start_date {
            return Err(ServiceError::validation("End date cannot be before the start date"));
        }
        let days = business_days(input.start_date, input.end_date);
        if days < 1 {
            return Err(ServiceError::validation("Leave must include at least one working day"));
        }

        let overlapping = self
            .repo
            .list_all(&overlap_filter(employee_id, input.start_date, input.end_date))
            .await
            .context("Failed to check overlapping leave")?
            .into_iter()
            .any(|l| l.status != LeaveStatus::Declined);
        if overlapping {
            return Err(ServiceError::conflict("Overlaps an existing leave request"));
        }

        if let Some(cap) = allowance(&self.config, input.leave_type) {
            let taken = self
                .taken_in_year(employee_id, input.leave_type, input.start_date.year())
                .await?;
            if taken + days > cap {
                return Err(ServiceError::validation(format!(
                    "Requested {} days but only {} {} days remain this year",
                    days,
                    (cap - taken).max(0),
                    input.leave_type
                )));
            }
        }

        let now = self.clock.now();
        let request = LeaveRequest {
            id: 0,
            employee_id,
            leave_type: input.leave_type,
            start_date: input.start_date,
            end_date: input.end_date,
            days,
            reason: validation::optional(input.reason),
            handover_document: validation::optional(input.handover_document),
            status: LeaveStatus::Pending,
            reviewed_by: None,
            review_comment: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        };
        let request = self.repo.create(&request).await.context("Failed to create leave request")?;
        tracing::info!(leave_id = request.id, employee_id, days, "Leave requested");

        if let Some(manager_id) = employee.manager_id {
            let link = format!("/leave/{}", request.id);
            self.notifications
                .notify_employee(
                    manager_id,
                    NotificationKind::LeaveRequested,
                    "Leave request to review",
                    &format!(
                        "{} requested {} days of {} leave from {} to {}",
                        employee.full_name(),
                        days,
                        request.leave_type,
                        request.start_date,
                        request.end_date
                    ),
                    Some(&link),
                )
                .await;
            if let Ok(Some(manager)) = self.employee_repo.get_by_id(manager_id).await {
                self.email.send_in_background(
                    manager.email,
                    templates::leave_submitted(&employee.full_name(), &request),
                );
            }
        }

        invalidate_dashboard(&self.cache).await;
        Ok(request)
    }

    pub async fn approve(&self, user: &User, id: i64, comment: Option<String>) -> ServiceResult<LeaveRequest> {
        self.decide(user, id, LeaveStatus::Approved, comment).await
    }

    pub async fn decline(&self, user: &User, id: i64, comment: Option<String>) -> ServiceResult<LeaveRequest> {
        self.decide(user, id, LeaveStatus::Declined, comment).await
    }

    async fn decide(
        &self,
        user: &User,
        id: i64,
        decision: LeaveStatus,
        comment: Option<String>,
    ) -> ServiceResult<LeaveRequest> {
        let mut request = self.find(id).await?;
        if request.status != LeaveStatus::Pending {
            return Err(ServiceError::invalid_state(format!(
                "Leave request is already {}",
                request.status
            )));
        }
        let employee = self.employee(request.employee_id).await?;
        if user.is_employee(employee.id) {
            return Err(ServiceError::forbidden("You cannot decide your own leave request"));
        }
        access::require_manage(user, &employee)?;

        request.status = decision;
        request.reviewed_by = Some(user.id);
        request.review_comment = validation::optional(comment);
        request.reviewed_at = Some(self.clock.now());
        let request = self.repo.update(&request).await.context("Failed to update leave request")?;
        tracing::info!(leave_id = id, reviewer = user.id, status = %decision, "Leave decided");

        if decision == LeaveStatus::Approved
            && request.covers(self.today())
            && employee.status == EmployeeStatus::Active
        {
            let mut employee = employee.clone();
            employee.status = EmployeeStatus::OnLeave;
            self.employee_repo
                .update(&employee)
                .await
                .context("Failed to set employee on leave")?;
        }

        let link = format!("/leave/{}", request.id);
        self.notifications
            .notify_employee(
                employee.id,
                NotificationKind::LeaveDecided,
                &format!("Leave {}", request.status.as_str().to_lowercase()),
                &format!(
                    "Your {} leave from {} to {} was {}",
                    request.leave_type,
                    request.start_date,
                    request.end_date,
                    request.status.as_str().to_lowercase()
                ),
                Some(&link),
            )
            .await;
        self.email
            .send_in_background(employee.email.clone(), templates::leave_decided(&request));

        invalidate_dashboard(&self.cache).await;
        Ok(request)
    }

    /// Bring employee statuses in line with approved leave for today:
    /// `active` employees on approved leave become `on_leave`, and `on_leave`
    /// employees with no approved leave covering today return to `active`.
    ///
    /// Returns how many employees changed. A failing record is logged and
    /// skipped.
    pub async fn sync_leave_status(&self) -> ServiceResult<usize> {
        let today = self.today();
        let on_leave: HashSet<i64> = self
            .repo
            .list_all(&LeaveFilter {
                status: Some(LeaveStatus::Approved),
                from: Some(today),
                to: Some(today),
                ..Default::default()
            })
            .await
            .context("Failed to list approved leave")?
            .into_iter()
            .filter(|r| r.covers(today))
            .map(|r| r.employee_id)
            .collect();
        let employees = self
            .employee_repo
            .list_active()
            .await
            .context("Failed to list employees")?;

        let mut changed = 0;
        for mut employee in employees {
            let status = match (employee.status, on_leave.contains(&employee.id)) {
                (EmployeeStatus::Active, true) => EmployeeStatus::OnLeave,
                (EmployeeStatus::OnLeave, false) => EmployeeStatus::Active,
                _ => continue,
            };
            employee.status = status;
            if let Err(e) = self.employee_repo.update(&employee).await {
                tracing::warn!(employee_id = employee.id, "Failed to update leave status: {}", e);
                continue;
            }
            tracing::info!(employee_id = employee.id, status = %status, "Leave status updated");
            changed += 1;
        }
        if changed > 0 {
            invalidate_dashboard(&self.cache).await;
        }
        Ok(changed)
    }

    /// Withdraw one of the caller's pending requests
    pub async fn cancel(&self, user: &User, id: i64) -> ServiceResult<()> {
        let request = self.find(id).await?;
        if !user.is_employee(request.employee_id) {
            return Err(ServiceError::forbidden("Only the requester can cancel a leave request"));
        }
        if request.status != LeaveStatus::Pending {
            return Err(ServiceError::invalid_state("Only pending requests can be cancelled"));
        }
        self.repo.delete(id).await.context("Failed to delete leave request")?;
        tracing::info!(leave_id = id, "Leave request cancelled");
        invalidate_dashboard(&self.cache).await;
        Ok(())
    }

    pub async fn get(&self, user: &User, id: i64) -> ServiceResult<LeaveRequest> {
        let request = self.find(id).await?;
        if !user.is_hr() {
            let employee = self.employee(request.employee_id).await?;
            access::require_view(user, &employee)?;
        }
        Ok(request)
    }

    /// Requests visible to the caller.
    ///
    /// Without an employee filter HR sees everything, managers see their own
    /// and their direct reports' requests, and everyone else sees their own.
    pub async fn list(
        &self,
        user: &User,
        mut filter: LeaveFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<LeaveRequest>> {
        if !user.is_hr() {
            match filter.employee_id {
                Some(id) => {
                    let employee = self.employee(id).await?;
                    access::require_view(user, &employee)?;
                }
                None if user.is_manager() => {
                    let visible = access::visible_employees(self.employee_repo.as_ref(), user)
                        .await?
                        .unwrap_or_default();
                    let items = self
                        .repo
                        .list_all(&filter)
                        .await
                        .context("Failed to list leave requests")?
                        .into_iter()
                        .filter(|l| visible.contains(&l.employee_id))
                        .collect();
                    return Ok(paginate(items, params));
                }
                None => filter.employee_id = Some(access::linked_employee(user)?),
            }
        }

        let (items, total) = self
            .repo
            .list(&filter, params)
            .await
            .context("Failed to list leave requests")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn mine(&self, user: &User, params: &ListParams) -> ServiceResult<PagedResult<LeaveRequest>> {
        let filter = LeaveFilter {
            employee_id: Some(access::linked_employee(user)?),
            ..Default::default()
        };
        let (items, total) = self
            .repo
            .list(&filter, params)
            .await
            .context("Failed to list leave requests")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Used, pending and remaining days per leave type for a calendar year
    pub async fn balance(
        &self,
        user: &User,
        employee_id: Option<i64>,
        year: Option<i32>,
    ) -> ServiceResult<Vec<LeaveBalance>> {
        let employee_id = match employee_id {
            Some(id) => {
                let employee = self.employee(id).await?;
                access::require_view(user, &employee)?;
                id
            }
            None => access::linked_employee(user)?,
        };
        let year = year.unwrap_or_else(|| self.today().year());
        let requests = self.in_year(employee_id, None, year).await?;

        Ok(LeaveType::ALL
            .iter()
            .map(|&leave_type| {
                let days_with = |status: LeaveStatus| -> i64 {
                    requests
                        .iter()
                        .filter(|l| l.leave_type == leave_type && l.status == status)
                        .map(|l| l.days)
                        .sum()
                };
                let used = days_with(LeaveStatus::Approved);
                let pending = days_with(LeaveStatus::Pending);
                let allowance = allowance(&self.config, leave_type);
                LeaveBalance {
                    leave_type,
                    allowance,
                    used,
                    pending,
                    remaining: allowance.map(|a| a - used - pending),
                }
            })
            .collect())
    }

    async fn taken_in_year(&self, employee_id: i64, leave_type: LeaveType, year: i32) -> ServiceResult<i64> {
        Ok(self
            .in_year(employee_id, Some(leave_type), year)
            .await?
            .iter()
            .filter(|l| l.status != LeaveStatus::Declined)
            .map(|l| l.days)
            .sum())
    }

    async fn in_year(
        &self,
        employee_id: i64,
        leave_type: Option<LeaveType>,
        year: i32,
    ) -> ServiceResult<Vec<LeaveRequest>> {
        let (from, to) = year_bounds(year)
            .ok_or_else(|| ServiceError::validation(format!("Invalid year {}", year)))?;
        Ok(self
            .repo
            .list_all(&LeaveFilter {
                employee_id: Some(employee_id),
                leave_type,
                from: Some(from),
                to: Some(to),
                ..Default::default()
            })
            .await
            .context("Failed to list leave requests")?
            .into_iter()
            .filter(|l| l.start_date.year() == year)
            .collect())
    }

    async fn find(&self, id: i64) -> ServiceResult<LeaveRequest> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get leave request")?
            .or_not_found("Leave request", id)
    }

    async fn employee(&self, id: i64) -> ServiceResult<Employee> {
        self.employee_repo
            .get_by_id(id)
            .await
            .context("Failed to get employee")?
            .or_not_found("Employee", id)
    }
}
