//! Employee service
//!
//! Employee records, codes, status changes and the CSV export.

use crate::db::is_unique_violation;
use crate::db::repositories::{
    DepartmentRepository, EmployeeRepository, NewEmployee, SessionRepository, UserRepository,
};
use crate::models::{
    employee_code, CreateEmployeeInput, Employee, EmployeeFilter, EmployeeStatus, ListParams,
    PagedResult, UpdateEmployeeInput, User, UserStatus,
};
use crate::services::access;
use crate::services::csv::to_csv;
use crate::services::error::{OrNotFound, ServiceError, ServiceResult};
use crate::services::validation;
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;

const EXPORT_HEADERS: [&str; 11] = [
    "employee_code",
    "first_name",
    "last_name",
    "email",
    "phone",
    "position",
    "department",
    "manager_code",
    "hire_date",
    "status",
    "base_salary",
];

pub struct EmployeeService {
    repo: Arc<dyn EmployeeRepository>,
    department_repo: Arc<dyn DepartmentRepository>,
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
}

impl EmployeeService {
    pub fn new(
        repo: Arc<dyn EmployeeRepository>,
        department_repo: Arc<dyn DepartmentRepository>,
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            repo,
            department_repo,
            user_repo,
            session_repo,
        }
    }

    /// Create an employee with the next free `EMP-` code
    pub async fn create(&self, input: CreateEmployeeInput) -> ServiceResult<Employee> {
        let first_name = validation::required("First name", &input.first_name)?;
        let last_name = validation::required("Last name", &input.last_name)?;
        let position = validation::required("Position", &input.position)?;
        let email = validation::email(&input.email)?;
        let phone = validation::phone(input.phone)?;
        check_salary(input.base_salary)?;
        self.ensure_email_free(&email, None).await?;
        if let Some(department_id) = input.department_id {
            self.ensure_department(department_id).await?;
        }
        if let Some(manager_id) = input.manager_id {
            self.ensure_manager(manager_id).await?;
        }

        let n = self
            .repo
            .next_code_number()
            .await
            .context("Failed to allocate employee code")?;
        let new = NewEmployee {
            employee_code: employee_code(n),
            first_name,
            last_name,
            email,
            phone,
            position,
            department_id: input.department_id,
            manager_id: input.manager_id,
            hire_date: input.hire_date,
            status: EmployeeStatus::Active,
            base_salary: input.base_salary,
        };

        let employee = match self.repo.create(&new).await {
            Ok(e) => e,
            Err(e) if is_unique_violation(&e) => {
                return Err(ServiceError::conflict(format!(
                    "Employee code or e-mail already in use: {}",
                    new.email
                )))
            }
            Err(e) => return Err(e.context("Failed to create employee").into()),
        };

        tracing::info!(employee_id = employee.id, code = %employee.employee_code, "Employee created");
        Ok(employee)
    }

    pub async fn list(&self, filter: &EmployeeFilter, params: &ListParams) -> ServiceResult<PagedResult<Employee>> {
        let (items, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list employees")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Employee> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get employee")?
            .or_not_found("Employee", id)
    }

    /// The employee record of the calling user
    pub async fn me(&self, user: &User) -> ServiceResult<Employee> {
        let id = access::linked_employee(user)?;
        self.get(id).await
    }

    pub async fn update(&self, id: i64, input: UpdateEmployeeInput) -> ServiceResult<Employee> {
        let mut employee = self.get(id).await?;

        if let Some(first_name) = input.first_name {
            employee.first_name = validation::required("First name", &first_name)?;
        }
        if let Some(last_name) = input.last_name {
            employee.last_name = validation::required("Last name", &last_name)?;
        }
        if let Some(position) = input.position {
            employee.position = validation::required("Position", &position)?;
        }
        if let Some(email) = input.email {
            let email = validation::email(&email)?;
            self.ensure_email_free(&email, Some(id)).await?;
            employee.email = email;
        }
        if let Some(phone) = input.phone {
            employee.phone = validation::phone(phone)?;
        }
        if let Some(department_id) = input.department_id {
            if let Some(department_id) = department_id {
                self.ensure_department(department_id).await?;
            }
            employee.department_id = department_id;
        }
        if let Some(manager_id) = input.manager_id {
            if let Some(manager_id) = manager_id {
                if manager_id == id {
                    return Err(ServiceError::validation("An employee cannot manage themselves"));
                }
                self.ensure_manager(manager_id).await?;
            }
            employee.manager_id = manager_id;
        }
        if let Some(hire_date) = input.hire_date {
            employee.hire_date = hire_date;
        }
        if let Some(base_salary) = input.base_salary {
            check_salary(base_salary)?;
            employee.base_salary = base_salary;
        }

        Ok(self
            .repo
            .update(&employee)
            .await
            .context("Failed to update employee")?)
    }

    /// Change the employment status.
    ///
    /// Terminating an employee disables the linked account and ends its
    /// sessions.
    pub async fn set_status(&self, id: i64, status: EmployeeStatus) -> ServiceResult<Employee> {
        let mut employee = self.get(id).await?;
        if employee.status == status {
            return Ok(employee);
        }
        employee.status = status;
        let employee = self
            .repo
            .update(&employee)
            .await
            .context("Failed to update employee status")?;

        if status == EmployeeStatus::Terminated {
            self.disable_account(id).await?;
        }
        tracing::info!(employee_id = id, status = %status, "Employee status changed");
        Ok(employee)
    }

    /// Delete the employee and, through the schema, their attendance,
    /// leave, goals, reviews and salaries.
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.get(id).await?;

        let departments = self
            .department_repo
            .list_with_counts()
            .await
            .context("Failed to list departments")?;
        for mut entry in departments {
            if entry.department.head_employee_id == Some(id) {
                entry.department.head_employee_id = None;
                self.department_repo
                    .update(&entry.department)
                    .await
                    .context("Failed to clear department head")?;
            }
        }

        self.repo.delete(id).await.context("Failed to delete employee")?;
        tracing::info!(employee_id = id, "Employee deleted");
        Ok(())
    }

    /// CSV of every employee matching the filter
    pub async fn export_csv(&self, filter: &EmployeeFilter) -> ServiceResult<String> {
        let employees = self
            .repo
            .list_all(filter)
            .await
            .context("Failed to list employees")?;
        let departments: HashMap<i64, String> = self
            .department_repo
            .list_with_counts()
            .await
            .context("Failed to list departments")?
            .into_iter()
            .map(|d| (d.department.id, d.department.name))
            .collect();
        let codes: HashMap<i64, String> = employees
            .iter()
            .map(|e| (e.id, e.employee_code.clone()))
            .collect();

        let mut rows = Vec::with_capacity(employees.len());
        for e in &employees {
            let manager_code = match e.manager_id {
                Some(m) => match codes.get(&m) {
                    Some(code) => code.clone(),
                    None => self.get(m).await.map(|m| m.employee_code).unwrap_or_default(),
                },
                None => String::new(),
            };
            rows.push(vec![
                e.employee_code.clone(),
                e.first_name.clone(),
                e.last_name.clone(),
                e.email.clone(),
                e.phone.clone().unwrap_or_default(),
                e.position.clone(),
                e.department_id
                    .and_then(|d| departments.get(&d).cloned())
                    .unwrap_or_default(),
                manager_code,
                e.hire_date.to_string(),
                e.status.to_string(),
                format!("{:.2}", e.base_salary),
            ]);
        }

        Ok(to_csv(&EXPORT_HEADERS, rows))
    }

    async fn disable_account(&self, employee_id: i64) -> ServiceResult<()> {
        let Some(mut user) = self
            .user_repo
            .get_by_employee_id(employee_id)
            .await
            .context("Failed to get linked account")?
        else {
            return Ok(());
        };
        if user.status != UserStatus::Disabled {
            user.status = UserStatus::Disabled;
            self.user_repo
                .update(&user)
                .await
                .context("Failed to disable account")?;
        }
        self.session_repo
            .delete_by_user(user.id)
            .await
            .context("Failed to delete sessions")?;
        tracing::info!(employee_id, user_id = user.id, "Account disabled after termination");
        Ok(())
    }

    async fn ensure_email_free(&self, email: &str, except: Option<i64>) -> ServiceResult<()> {
        match self
            .repo
            .get_by_email(email)
            .await
            .context("Failed to check e-mail")?
        {
            Some(other) if Some(other.id) != except => Err(ServiceError::conflict(format!(
                "E-mail {} belongs to {}",
                email, other.employee_code
            ))),
            _ => Ok(()),
        }
    }

    async fn ensure_department(&self, id: i64) -> ServiceResult<()> {
        if self
            .department_repo
            .get_by_id(id)
            .await
            .context("Failed to get department")?
            .is_none()
        {
            return Err(ServiceError::validation(format!("Department {} does not exist", id)));
        }
        Ok(())
    }

    async fn ensure_manager(&self, id: i64) -> ServiceResult<()> {
        match self.repo.get_by_id(id).await.context("Failed to get manager")? {
            Some(m) if m.is_active() => Ok(()),
            Some(_) => Err(ServiceError::validation(format!("Manager {} is terminated", id))),
            None => Err(ServiceError::validation(format!("Manager {} does not exist", id))),
        }
    }
}

fn check_salary(amount: f64) -> ServiceResult<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ServiceError::validation("Base salary must be zero or more"));
    }
    Ok(())
}
