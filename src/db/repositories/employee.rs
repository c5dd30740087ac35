//! Employee repository

use crate::db::{parse_column, DynDatabasePool, LastInsertId};
use crate::models::{parse_employee_code, Employee, EmployeeFilter, EmployeeStatus, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::Row;
use std::sync::Arc;

use super::like_pattern;

const EMPLOYEE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, phone, position, \
     department_id, manager_id, hire_date, status, base_salary, created_at, updated_at";

/// Shared WHERE clause for filtered listings. Every predicate is disabled by
/// binding NULL, so the bind order is fixed.
const EMPLOYEE_FILTER: &str = "(? IS NULL OR department_id = ?) \
     AND (? IS NULL OR status = ?) \
     AND (? IS NULL OR first_name LIKE ? OR last_name LIKE ? OR email LIKE ? OR employee_code LIKE ?)";

macro_rules! employee_from_row {
    ($row:expr) => {
        Employee {
            id: $row.get("id"),
            employee_code: $row.get("employee_code"),
            first_name: $row.get("first_name"),
            last_name: $row.get("last_name"),
            email: $row.get("email"),
            phone: $row.get("phone"),
            position: $row.get("position"),
            department_id: $row.get("department_id"),
            manager_id: $row.get("manager_id"),
            hire_date: $row.get("hire_date"),
            status: parse_column($row.get("status"), "status")?,
            base_salary: $row.get("base_salary"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

macro_rules! bind_employee_filter {
    ($query:expr, $filter:expr, $search:expr) => {{
        let status = $filter.status.map(|s| s.as_str());
        $query
            .bind($filter.department_id)
            .bind($filter.department_id)
            .bind(status)
            .bind(status)
            .bind($search)
            .bind($search)
            .bind($search)
            .bind($search)
            .bind($search)
    }};
}

/// Column values for a new employee row
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position: String,
    pub department_id: Option<i64>,
    pub manager_id: Option<i64>,
    pub hire_date: NaiveDate,
    pub status: EmployeeStatus,
    pub base_salary: f64,
}

#[async_trait]
pub trait EmployeeRepository: Send + Sync {
    async fn create(&self, employee: &NewEmployee) -> Result<Employee>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Employee>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<Employee>>;

    /// Paged listing honouring the filter's sort column and direction
    async fn list(&self, filter: &EmployeeFilter, params: &ListParams) -> Result<(Vec<Employee>, i64)>;

    /// Every matching employee, for exports and reports
    async fn list_all(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>>;

    /// Employees that are not terminated, ordered by id
    async fn list_active(&self) -> Result<Vec<Employee>>;

    /// Direct reports of a manager
    async fn list_by_manager(&self, manager_id: i64) -> Result<Vec<Employee>>;

    async fn update(&self, employee: &Employee) -> Result<Employee>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Number following the highest `EMP-` code in use
    async fn next_code_number(&self) -> Result<i64>;

    async fn count_by_status(&self) -> Result<Vec<(EmployeeStatus, i64)>>;
}

pub struct SqlxEmployeeRepository {
    pool: DynDatabasePool,
}

impl SqlxEmployeeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EmployeeRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_where(&self, clause: &str, value: i64) -> Result<Vec<Employee>> {
        let sql = format!(
            "SELECT {} FROM employees WHERE {} ORDER BY id",
            EMPLOYEE_COLUMNS, clause
        );
        with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .bind(value)
                .fetch_all(pool)
                .await
                .context("Failed to list employees")?;
            let mut employees = Vec::with_capacity(rows.len());
            for row in rows {
                employees.push(employee_from_row!(row));
            }
            Ok(employees)
        })
    }
}

#[async_trait]
impl EmployeeRepository for SqlxEmployeeRepository {
    async fn create(&self, employee: &NewEmployee) -> Result<Employee> {
        let now = Utc::now();
        let id = with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                INSERT INTO employees (employee_code, first_name, last_name, email, phone, position,
                    department_id, manager_id, hire_date, status, base_salary, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&employee.employee_code)
            .bind(&employee.first_name)
            .bind(&employee.last_name)
            .bind(&employee.email)
            .bind(&employee.phone)
            .bind(&employee.position)
            .bind(employee.department_id)
            .bind(employee.manager_id)
            .bind(employee.hire_date)
            .bind(employee.status.as_str())
            .bind(employee.base_salary)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create employee")?
            .inserted_id()
        });

        Ok(Employee {
            id,
            employee_code: employee.employee_code.clone(),
            first_name: employee.first_name.clone(),
            last_name: employee.last_name.clone(),
            email: employee.email.clone(),
            phone: employee.phone.clone(),
            position: employee.position.clone(),
            department_id: employee.department_id,
            manager_id: employee.manager_id,
            hire_date: employee.hire_date,
            status: employee.status,
            base_salary: employee.base_salary,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Employee>> {
        let sql = format!("SELECT {} FROM employees WHERE id = ?", EMPLOYEE_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get employee")?;
            match row {
                Some(row) => Ok(Some(employee_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Employee>> {
        let sql = format!("SELECT {} FROM employees WHERE email = ?", EMPLOYEE_COLUMNS);
        with_pool!(self.pool, pool => {
            let row = sqlx::query(&sql)
                .bind(email)
                .fetch_optional(pool)
                .await
                .context("Failed to get employee by email")?;
            match row {
                Some(row) => Ok(Some(employee_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self, filter: &EmployeeFilter, params: &ListParams) -> Result<(Vec<Employee>, i64)> {
        let search = like_pattern(filter.search.as_deref());
        let sql = format!(
            "SELECT {} FROM employees WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            EMPLOYEE_COLUMNS,
            EMPLOYEE_FILTER,
            filter.sort.order_by(filter.order)
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM employees WHERE {}", EMPLOYEE_FILTER);

        with_pool!(self.pool, pool => {
            let rows = bind_employee_filter!(sqlx::query(&sql), filter, &search)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list employees")?;
            let total: i64 = bind_employee_filter!(sqlx::query(&count_sql), filter, &search)
                .fetch_one(pool)
                .await
                .context("Failed to count employees")?
                .get("count");

            let mut employees = Vec::with_capacity(rows.len());
            for row in rows {
                employees.push(employee_from_row!(row));
            }
            Ok((employees, total))
        })
    }

    async fn list_all(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>> {
        let search = like_pattern(filter.search.as_deref());
        let sql = format!(
            "SELECT {} FROM employees WHERE {} ORDER BY {}",
            EMPLOYEE_COLUMNS,
            EMPLOYEE_FILTER,
            filter.sort.order_by(filter.order)
        );
        with_pool!(self.pool, pool => {
            let rows = bind_employee_filter!(sqlx::query(&sql), filter, &search)
                .fetch_all(pool)
                .await
                .context("Failed to list employees")?;
            let mut employees = Vec::with_capacity(rows.len());
            for row in rows {
                employees.push(employee_from_row!(row));
            }
            Ok(employees)
        })
    }

    async fn list_active(&self) -> Result<Vec<Employee>> {
        let sql = format!(
            "SELECT {} FROM employees WHERE status <> 'terminated' ORDER BY id",
            EMPLOYEE_COLUMNS
        );
        with_pool!(self.pool, pool => {
            let rows = sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list active employees")?;
            let mut employees = Vec::with_capacity(rows.len());
            for row in rows {
                employees.push(employee_from_row!(row));
            }
            Ok(employees)
        })
    }

    async fn list_by_manager(&self, manager_id: i64) -> Result<Vec<Employee>> {
        self.fetch_where("manager_id = ?", manager_id).await
    }

    async fn update(&self, employee: &Employee) -> Result<Employee> {
        let now = Utc::now();
        with_pool!(self.pool, pool => {
            sqlx::query(
                r#"
                UPDATE employees
                SET first_name = ?, last_name = ?, email = ?, phone = ?, position = ?,
                    department_id = ?, manager_id = ?, hire_date = ?, status = ?, base_salary = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&employee.first_name)
            .bind(&employee.last_name)
            .bind(&employee.email)
            .bind(&employee.phone)
            .bind(&employee.position)
            .bind(employee.department_id)
            .bind(employee.manager_id)
            .bind(employee.hire_date)
            .bind(employee.status.as_str())
            .bind(employee.base_salary)
            .bind(now)
            .bind(employee.id)
            .execute(pool)
            .await
            .context("Failed to update employee")?;
        });

        self.get_by_id(employee.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Employee not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, pool => {
            sqlx::query("DELETE FROM employees WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete employee")?;
        });
        Ok(())
    }

    async fn next_code_number(&self) -> Result<i64> {
        let codes: Vec<String> = with_pool!(self.pool, pool => {
            sqlx::query("SELECT employee_code FROM employees")
                .fetch_all(pool)
                .await
                .context("Failed to read employee codes")?
                .iter()
                .map(|row| row.get("employee_code"))
                .collect()
        });

        let max = codes
            .iter()
            .filter_map(|code| parse_employee_code(code))
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    async fn count_by_status(&self) -> Result<Vec<(EmployeeStatus, i64)>> {
        with_pool!(self.pool, pool => {
            let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM employees GROUP BY status")
                .fetch_all(pool)
                .await
                .context("Failed to count employees by status")?;
            let mut counts = Vec::with_capacity(rows.len());
            for row in rows {
                let status: EmployeeStatus = parse_column(row.get("status"), "status")?;
                counts.push((status, row.get::<i64, _>("count")));
            }
            Ok(counts)
        })
    }
}
