//! Salary (payslip) repository

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{ListParams, Salary, SalaryFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const SALARY_COLUMNS: &str = "id, employee_id, period, base_amount, overtime_hours, overtime_pay, \
     bonus, deductions, net_pay, status, paid_at, created_at, updated_at";

const SALARY_FILTER: &str = "(? IS NULL OR period = ?) \
     AND (? IS NULL OR employee_id = ?) \
     AND (? IS NULL OR status = ?)";

macro_rules! salary_from_row {
    ($row:expr) => {
        Salary {
            id: $row.get("id"),
            employee_id: $row.get("employee_id"),
            period: $row.get("period"),
            base_amount: $row.get("base_amount"),
            overtime_hours: $row.get("overtime_hours"),
            overtime_pay: $row.get("overtime_pay"),
            bonus: $row.get("bonus"),
            deductions: $row.get("deductions"),
            net_pay: $row.get("net_pay"),
            status: parse_column($row.get("status"), "status")?,
            paid_at: $row.get("paid_at"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

macro_rules! bind_salary_filter {
    ($query:expr, $filter:expr) => {{
        let period = $filter.period.as_deref();
        let status = $filter.status.map(|s| s.as_str());
        $query
            .bind(period)
            .bind(period)
            .bind($filter.employee_id)
            .bind($filter.employee_id)
            .bind(status)
            .bind(status)
    }};
}

#[async_trait]
pub trait SalaryRepository: Send + Sync {
    async fn create(&self, salary: &Salary) -> Result<Salary>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Salary>>;

    /// Payslip of an employee for a `YYYY-MM` period
    async fn get_by_period(&self, employee_id: i64, period: &str) -> Result<Option<Salary>>;

    async fn update(&self, salary: &Salary) -> Result<Salary>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Newest periods first
    async fn list(&self, filter: &SalaryFilter, params: &ListParams) -> Result<(Vec<Salary>, i64)>;

    async fn list_all(&self, filter: &SalaryFilter) -> Result<Vec<Salary>>;
}

pub struct SqlxSalaryRepository {
    pool: DynDatabasePool,
}

impl SqlxSalaryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SalaryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SalaryRepository for SqlxSalaryRepository {
    async fn create(&self, salary: &Salary) -> Result<Salary> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO salaries (employee_id, period, base_amount, overtime_hours, overtime_pay, bonus,
                    deductions, net_pay, status, paid_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(salary.employee_id)
            .bind(&salary.period)
            .bind(salary.base_amount)
            .bind(salary.overtime_hours)
            .bind(salary.overtime_pay)
            .bind(salary.bonus)
            .bind(salary.deductions)
            .bind(salary.net_pay)
            .bind(salary.status.as_str())
            .bind(salary.paid_at)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create salary")?
            .inserted_id()
        });

        Ok(Salary {
            id,
            created_at: now,
            updated_at: now,
            ..salary.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Salary>> {
        let sql = format!("SELECT {} FROM salaries WHERE id = ?", SALARY_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get salary")?;
            match row {
                Some(row) => Ok(Some(salary_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_period(&self, employee_id: i64, period: &str) -> Result<Option<Salary>> {
        let sql = format!(
            "SELECT {} FROM salaries WHERE employee_id = ? AND period = ?",
            SALARY_COLUMNS
        );
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(employee_id)
                .bind(period)
                .fetch_optional(pool)
                .await
                .context("Failed to get salary by period")?;
            match row {
                Some(row) => Ok(Some(salary_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn update(&self, salary: &Salary) -> Result<Salary> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                UPDATE salaries
                SET base_amount = ?, overtime_hours = ?, overtime_pay = ?, bonus = ?, deductions = ?,
                    net_pay = ?, status = ?, paid_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(salary.base_amount)
            .bind(salary.overtime_hours)
            .bind(salary.overtime_pay)
            .bind(salary.bonus)
            .bind(salary.deductions)
            .bind(salary.net_pay)
            .bind(salary.status.as_str())
            .bind(salary.paid_at)
            .bind(now)
            .bind(salary.id)
            .execute(pool)
            .await
            .context("Failed to update salary")?;
        });

        Ok(Salary {
            updated_at: now,
            ..salary.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM salaries WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete salary")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &SalaryFilter, params: &ListParams) -> Result<(Vec<Salary>, i64)> {
        let sql = format!(
            "SELECT {} FROM salaries WHERE {} ORDER BY period DESC, employee_id ASC LIMIT ? OFFSET ?",
            SALARY_COLUMNS, SALARY_FILTER
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM salaries WHERE {}", SALARY_FILTER);

        with_pool!(self.pool, pool => {
            let rows = bind_salary_filter!(sqlx::query(&sql), filter)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list salaries")?;
            let total: i64 = bind_salary_filter!(sqlx::query(&count_sql), filter)
                .fetch_one(pool)
                .await
                .context("Failed to count salaries")?
                .get("count");

            let mut salaries = Vec::with_capacity(rows.len());
            for row in rows {
                salaries.push(salary_from_row!(row));
            }
            Ok((salaries, total))
        })
    }

    async fn list_all(&self, filter: &SalaryFilter) -> Result<Vec<Salary>> {
        let sql = format!(
            "SELECT {} FROM salaries WHERE {} ORDER BY period ASC, employee_id ASC",
            SALARY_COLUMNS, SALARY_FILTER
        );
        with_pool!(self.pool, pool => {
            let rows = bind_salary_filter!(sqlx::query(&sql), filter)
                .fetch_all(pool)
                .await
                .context("Failed to list salaries")?;
            let mut salaries = Vec::with_capacity(rows.len());
            for row in rows {
                salaries.push(salary_from_row!(row));
            }
            Ok(salaries)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_employee, setup_pool};
    use crate::models::SalaryStatus;

    fn payslip(employee_id: i64, period: &str) -> Salary {
        let now = Utc::now();
        let mut salary = Salary {
            id: 0,
            employee_id,
            period: period.to_string(),
            base_amount: 3200.0,
            overtime_hours: 0.0,
            overtime_pay: 0.0,
            bonus: 0.0,
            deductions: 0.0,
            net_pay: 0.0,
            status: SalaryStatus::Draft,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        salary.recompute_net();
        salary
    }

    #[tokio::test]
    async fn test_one_payslip_per_period() {
        let pool = setup_pool().await;
        let employee = insert_employee(&pool, "Ada", "Lovelace").await;
        let repo = SqlxSalaryRepository::new(pool);

        repo.create(&payslip(employee.id, "2024-03")).await.unwrap();
        let err = repo.create(&payslip(employee.id, "2024-03")).await.unwrap_err();
        assert!(crate::db::is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_mark_paid_and_filter() {
        let pool = setup_pool().await;
        let ada = insert_employee(&pool, "Ada", "Lovelace").await;
        let alan = insert_employee(&pool, "Alan", "Turing").await;
        let repo = SqlxSalaryRepository::new(pool);

        let mut march = repo.create(&payslip(ada.id, "2024-03")).await.unwrap();
        repo.create(&payslip(alan.id, "2024-03")).await.unwrap();
        repo.create(&payslip(ada.id, "2024-04")).await.unwrap();

        march.bonus = 150.0;
        march.recompute_net();
        march.status = SalaryStatus::Paid;
        march.paid_at = Some(Utc::now());
        repo.update(&march).await.unwrap();

        let found = repo.get_by_period(ada.id, "2024-03").await.unwrap().unwrap();
        assert_eq!(found.net_pay, 3350.0);
        assert_eq!(found.status, SalaryStatus::Paid);

        let filter = SalaryFilter {
            period: Some("2024-03".to_string()),
            ..Default::default()
        };
        let (rows, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].employee_id, ada.id);

        let filter = SalaryFilter {
            employee_id: Some(ada.id),
            ..Default::default()
        };
        let periods: Vec<_> = repo
            .list_all(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.period)
            .collect();
        assert_eq!(periods, vec!["2024-03", "2024-04"]);
    }
}
