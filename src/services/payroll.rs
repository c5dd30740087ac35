//! Payroll service
//!
//! A payslip is generated per employee and month. Overtime comes from the
//! month's attendance: every minute worked beyond the standard day, paid at
//! the hourly rate times the configured multiplier.

use crate::config::{AttendancePolicy, PayrollConfig};
use crate::db::is_unique_violation;
use crate::db::repositories::{AttendanceRepository, EmployeeRepository, SalaryRepository};
use crate::models::{
    round_cents, AttendanceFilter, Employee, ListParams, NotificationKind, PagedResult, Salary,
    SalaryFilter, SalaryStatus, UpdateSalaryInput, User,
};
use crate::services::access;
use crate::services::attendance::overtime_minutes;
use crate::services::clock::Clock;
use crate::services::email::{templates, EmailService};
use crate::services::error::{OrNotFound, ServiceError, ServiceResult};
use crate::services::notification::NotificationService;
use crate::services::validation;
use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

/// First and last day of a `YYYY-MM` period
pub fn period_bounds(period: &str) -> Option<(NaiveDate, NaiveDate)> {
    if !validation::is_valid_period(period) {
        return None;
    }
    let (year, month) = period.split_once('-')?;
    let first = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

pub fn hourly_rate(base_salary: f64, monthly_hours: f64) -> f64 {
    if monthly_hours <= 0.0 {
        return 0.0;
    }
    base_salary / monthly_hours
}

/// Overtime hours (2 dp) and pay (cents) for a month's overtime minutes
pub fn overtime_pay(base_salary: f64, overtime_minutes: i64, config: &PayrollConfig) -> (f64, f64) {
    let hours = round_cents(overtime_minutes as f64 / 60.0);
    let pay = round_cents(hours * hourly_rate(base_salary, config.monthly_hours) * config.overtime_multiplier);
    (hours, pay)
}

fn check_amount(field: &str, amount: f64) -> ServiceResult<f64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ServiceError::validation(format!("{} must be zero or more", field)));
    }
    Ok(round_cents(amount))
}

pub struct PayrollService {
    repo: Arc<dyn SalaryRepository>,
    employee_repo: Arc<dyn EmployeeRepository>,
    attendance_repo: Arc<dyn AttendanceRepository>,
    notifications: Arc<NotificationService>,
    email: Arc<EmailService>,
    clock: Arc<dyn Clock>,
    policy: AttendancePolicy,
    config: PayrollConfig,
}

impl PayrollService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn SalaryRepository>,
        employee_repo: Arc<dyn EmployeeRepository>,
        attendance_repo: Arc<dyn AttendanceRepository>,
        notifications: Arc<NotificationService>,
        email: Arc<EmailService>,
        clock: Arc<dyn Clock>,
        policy: AttendancePolicy,
        config: PayrollConfig,
    ) -> Self {
        Self {
            repo,
            employee_repo,
            attendance_repo,
            notifications,
            email,
            clock,
            policy,
            config,
        }
    }

    /// Overtime minutes recorded for an employee in a month
    pub async fn overtime_minutes(&self, employee_id: i64, period: &str) -> ServiceResult<i64> {
        let (from, to) = period_bounds(period)
            .ok_or_else(|| ServiceError::validation(format!("Invalid period '{}', expected YYYY-MM", period)))?;
        let records = self
            .attendance_repo
            .list_range(&AttendanceFilter {
                employee_id: Some(employee_id),
                from: Some(from),
                to: Some(to),
                status: None,
            })
            .await
            .context("Failed to list attendance")?;
        Ok(records
            .iter()
            .map(|r| overtime_minutes(&self.policy, r.worked_minutes))
            .sum())
    }

    /// Draft payslips for every active employee who has none for `period`.
    ///
    /// Returns only the records created by this call.
    pub async fn generate(&self, period: &str) -> ServiceResult<Vec<Salary>> {
        let period = period.trim();
        if period_bounds(period).is_none() {
            return Err(ServiceError::validation(format!(
                "Invalid period '{}', expected YYYY-MM",
                period
            )));
        }
        let employees = self
            .employee_repo
            .list_active()
            .await
            .context("Failed to list employees")?;

        let mut created = Vec::new();
        for employee in employees {
            if self
                .repo
                .get_by_period(employee.id, period)
                .await
                .context("Failed to check existing payslip")?
                .is_some()
            {
                continue;
            }
            let salary = self.draft(&employee, period).await?;
            match self.repo.create(&salary).await {
                Ok(s) => created.push(s),
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.context("Failed to create payslip").into()),
            }
        }

        tracing::info!(period, count = created.len(), "Payroll generated");
        Ok(created)
    }

    async fn draft(&self, employee: &Employee, period: &str) -> ServiceResult<Salary> {
        let minutes = self.overtime_minutes(employee.id, period).await?;
        let (overtime_hours, overtime_pay) = overtime_pay(employee.base_salary, minutes, &self.config);
        let now = self.clock.now();
        let mut salary = Salary {
            id: 0,
            employee_id: employee.id,
            period: period.to_string(),
            base_amount: round_cents(employee.base_salary),
            overtime_hours,
            overtime_pay,
            bonus: 0.0,
            deductions: 0.0,
            net_pay: 0.0,
            status: SalaryStatus::Draft,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        salary.recompute_net();
        Ok(salary)
    }

    /// Adjust bonus and deductions on a draft
    pub async fn update(&self, id: i64, input: UpdateSalaryInput) -> ServiceResult<Salary> {
        let mut salary = self.draft_salary(id).await?;
        if let Some(bonus) = input.bonus {
            salary.bonus = check_amount("Bonus", bonus)?;
        }
        if let Some(deductions) = input.deductions {
            salary.deductions = check_amount("Deductions", deductions)?;
        }
        salary.recompute_net();
        Ok(self.repo.update(&salary).await.context("Failed to update payslip")?)
    }

    pub async fn mark_paid(&self, id: i64) -> ServiceResult<Salary> {
        let mut salary = self.draft_salary(id).await?;
        salary.status = SalaryStatus::Paid;
        salary.paid_at = Some(self.clock.now());
        let salary = self.repo.update(&salary).await.context("Failed to mark payslip paid")?;
        tracing::info!(salary_id = id, employee_id = salary.employee_id, "Payslip paid");

        self.notifications
            .notify_employee(
                salary.employee_id,
                NotificationKind::PayslipIssued,
                "Payslip issued",
                &format!("Your payslip for {} is available: {:.2}", salary.period, salary.net_pay),
                Some(&format!("/salary/{}", salary.id)),
            )
            .await;
        if let Ok(Some(employee)) = self.employee_repo.get_by_id(salary.employee_id).await {
            self.email.send_in_background(
                employee.email,
                templates::payslip_issued(&salary.period, salary.net_pay),
            );
        }
        Ok(salary)
    }

    pub async fn list(&self, filter: &SalaryFilter, params: &ListParams) -> ServiceResult<PagedResult<Salary>> {
        let (items, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list payslips")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// A payslip, visible to HR and its employee
    pub async fn get(&self, user: &User, id: i64) -> ServiceResult<Salary> {
        let salary = self.find(id).await?;
        if !user.is_hr() && !user.is_employee(salary.employee_id) {
            return Err(ServiceError::not_found("Payslip", id));
        }
        Ok(salary)
    }

    pub async fn mine(&self, user: &User, params: &ListParams) -> ServiceResult<PagedResult<Salary>> {
        let filter = SalaryFilter {
            employee_id: Some(access::linked_employee(user)?),
            ..Default::default()
        };
        self.list(&filter, params).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.draft_salary(id).await?;
        self.repo.delete(id).await.context("Failed to delete payslip")?;
        Ok(())
    }

    async fn draft_salary(&self, id: i64) -> ServiceResult<Salary> {
        let salary = self.find(id).await?;
        if salary.status != SalaryStatus::Draft {
            return Err(ServiceError::invalid_state("Paid payslips cannot be changed"));
        }
        Ok(salary)
    }

    async fn find(&self, id: i64) -> ServiceResult<Salary> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get payslip")?
            .or_not_found("Payslip", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttendanceConfig, SmtpConfig};
    use crate::db::repositories::test_support::{insert_employee, insert_user, setup_pool};
    use crate::db::repositories::{
        SqlxAttendanceRepository, SqlxEmployeeRepository, SqlxNotificationRepository,
        SqlxSalaryRepository, SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::{Attendance, AttendanceStatus, EmployeeStatus, UserRole};
    use crate::services::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn service(pool: &DynDatabasePool) -> PayrollService {
        PayrollService::new(
            SqlxSalaryRepository::boxed(pool.clone()),
            SqlxEmployeeRepository::boxed(pool.clone()),
            SqlxAttendanceRepository::boxed(pool.clone()),
            Arc::new(NotificationService::new(
                SqlxNotificationRepository::boxed(pool.clone()),
                SqlxUserRepository::boxed(pool.clone()),
            )),
            Arc::new(EmailService::new(SmtpConfig::default())),
            Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap())),
            AttendancePolicy::from_config(&AttendanceConfig::default()).unwrap(),
            PayrollConfig::default(),
        )
    }

    async fn worked(pool: &DynDatabasePool, employee_id: i64, day: u32, minutes: i64) {
        let at = Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap();
        SqlxAttendanceRepository::new(pool.clone())
            .create(&Attendance {
                id: 0,
                employee_id,
                work_date: at.date_naive(),
                check_in_at: Some(at),
                check_out_at: Some(at + chrono::Duration::minutes(minutes)),
                break_started_at: None,
                break_minutes: 0,
                worked_minutes: minutes,
                is_late: false,
                status: AttendanceStatus::Present,
                auto_checked_out: false,
                notes: None,
                created_at: at,
                updated_at: at,
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_period_bounds() {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        assert_eq!(period_bounds("2024-02"), Some((d(2, 1), d(2, 29))));
        assert_eq!(
            period_bounds("2023-12"),
            Some((
                NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
            ))
        );
        assert_eq!(period_bounds("2024-13"), None);
        assert_eq!(period_bounds("March"), None);
    }

    #[test]
    fn test_overtime_pay() {
        // 3200 / 160 = 20 per hour, 1.5x
        let (hours, pay) = overtime_pay(3200.0, 90, &PayrollConfig::default());
        assert_eq!(hours, 1.5);
        assert_eq!(pay, 45.0);
        assert_eq!(overtime_pay(3200.0, 0, &PayrollConfig::default()), (0.0, 0.0));
    }

    proptest! {
        #[test]
        fn net_pay_is_sum_of_parts_in_cents(
            base in 0u32..1_000_000,
            overtime in 0u32..100_000,
            bonus in 0u32..100_000,
            deductions in 0u32..100_000,
        ) {
            let cents = |c: u32| c as f64 / 100.0;
            let now = Utc::now();
            let mut s = Salary {
                id: 0,
                employee_id: 1,
                period: "2024-03".to_string(),
                base_amount: cents(base),
                overtime_hours: 0.0,
                overtime_pay: cents(overtime),
                bonus: cents(bonus),
                deductions: cents(deductions),
                net_pay: 0.0,
                status: SalaryStatus::Draft,
                paid_at: None,
                created_at: now,
                updated_at: now,
            };
            s.recompute_net();
            let expected = base as i64 + overtime as i64 + bonus as i64 - deductions as i64;
            prop_assert_eq!((s.net_pay * 100.0).round() as i64, expected);
        }
    }

    #[tokio::test]
    async fn test_generate_with_overtime() {
        let pool = setup_pool().await;
        let service = service(&pool);
        let ada = insert_employee(&pool, "Ada", "Lovelace").await;
        let grace = insert_employee(&pool, "Grace", "Hopper").await;
        let mut gone = insert_employee(&pool, "Alan", "Turing").await;
        gone.status = EmployeeStatus::Terminated;
        SqlxEmployeeRepository::new(pool.clone()).update(&gone).await.unwrap();

        // 60 + 30 minutes over the 480 minute day, and one short day
        worked(&pool, ada.id, 4, 540).await;
        worked(&pool, ada.id, 5, 510).await;
        worked(&pool, ada.id, 6, 300).await;

        let created = service.generate("2024-03").await.unwrap();
        assert_eq!(created.len(), 2);

        let slip = created.iter().find(|s| s.employee_id == ada.id).unwrap();
        assert_eq!(slip.base_amount, 3200.0);
        assert_eq!(slip.overtime_hours, 1.5);
        assert_eq!(slip.overtime_pay, 45.0);
        assert_eq!(slip.net_pay, 3245.0);
        assert_eq!(slip.status, SalaryStatus::Draft);

        let other = created.iter().find(|s| s.employee_id == grace.id).unwrap();
        assert_eq!(other.overtime_pay, 0.0);

        // A second run leaves existing payslips alone
        assert!(service.generate("2024-03").await.unwrap().is_empty());
        assert!(matches!(service.generate("2024-3").await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_adjust_and_pay() {
        let pool = setup_pool().await;
        let service = service(&pool);
        let ada = insert_employee(&pool, "Ada", "Lovelace").await;
        let ada_user = insert_user(&pool, "ada", UserRole::Employee, Some(ada.id)).await;
        let other = insert_user(&pool, "bob", UserRole::Employee, None).await;

        let slip = service.generate("2024-03").await.unwrap().remove(0);
        let slip = service
            .update(
                slip.id,
                UpdateSalaryInput {
                    bonus: Some(250.5),
                    deductions: Some(100.25),
                },
            )
            .await
            .unwrap();
        assert_eq!(slip.net_pay, 3350.25);
        assert!(matches!(
            service
                .update(
                    slip.id,
                    UpdateSalaryInput {
                        bonus: Some(-1.0),
                        ..Default::default()
                    }
                )
                .await,
            Err(ServiceError::Validation(_))
        ));

        let paid = service.mark_paid(slip.id).await.unwrap();
        assert_eq!(paid.status, SalaryStatus::Paid);
        assert!(paid.paid_at.is_some());
        assert!(matches!(service.mark_paid(slip.id).await, Err(ServiceError::InvalidState(_))));
        assert!(matches!(service.delete(slip.id).await, Err(ServiceError::InvalidState(_))));

        assert_eq!(service.mine(&ada_user, &ListParams::default()).await.unwrap().total, 1);
        assert_eq!(service.get(&ada_user, slip.id).await.unwrap().id, slip.id);
        assert!(matches!(service.get(&other, slip.id).await, Err(ServiceError::NotFound(_))));
    }
}
