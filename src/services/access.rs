//! Record-level permission checks
//!
//! Routes already enforce the coarse role; these helpers answer questions
//! that need the record, such as "is this the caller's direct report".

use crate::db::repositories::EmployeeRepository;
use crate::models::{Employee, User};
use crate::services::error::{ServiceError, ServiceResult};
use anyhow::Context;
use std::collections::HashSet;

/// The employee record behind the caller's account
pub fn linked_employee(user: &User) -> ServiceResult<i64> {
    user.employee_id.ok_or_else(|| {
        ServiceError::NotFound("No employee record is linked to this account".to_string())
    })
}

/// The caller is the employee's direct manager
pub fn is_manager_of(user: &User, employee: &Employee) -> bool {
    user.employee_id.is_some() && employee.manager_id == user.employee_id
}

/// HR staff, or the employee's direct manager
pub fn can_manage(user: &User, employee: &Employee) -> bool {
    user.is_hr() || (user.is_manager() && is_manager_of(user, employee))
}

/// Self, HR, or the direct manager
pub fn can_view(user: &User, employee: &Employee) -> bool {
    user.is_employee(employee.id) || can_manage(user, employee)
}

pub fn require_hr(user: &User) -> ServiceResult<()> {
    if !user.is_hr() {
        return Err(ServiceError::forbidden("HR or administrator role required"));
    }
    Ok(())
}

pub fn require_view(user: &User, employee: &Employee) -> ServiceResult<()> {
    if !can_view(user, employee) {
        return Err(ServiceError::forbidden("You cannot access this employee's records"));
    }
    Ok(())
}

pub fn require_manage(user: &User, employee: &Employee) -> ServiceResult<()> {
    if !can_manage(user, employee) {
        return Err(ServiceError::forbidden("Only HR or the employee's manager can do this"));
    }
    Ok(())
}

/// Employees whose records the caller may list; `None` means everyone.
///
/// Managers see themselves and their direct reports, everyone else only
/// themselves.
pub async fn visible_employees(
    employee_repo: &dyn EmployeeRepository,
    user: &User,
) -> ServiceResult<Option<HashSet<i64>>> {
    if user.is_hr() {
        return Ok(None);
    }
    let me = linked_employee(user)?;
    let mut ids = HashSet::from([me]);
    if user.is_manager() {
        ids.extend(
            employee_repo
                .list_by_manager(me)
                .await
                .context("Failed to list direct reports")?
                .into_iter()
                .map(|e| e.id),
        );
    }
    Ok(Some(ids))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{EmployeeStatus, UserRole};
    use chrono::{NaiveDate, Utc};

    pub(crate) fn employee(id: i64, manager_id: Option<i64>) -> Employee {
        let now = Utc::now();
        Employee {
            id,
            employee_code: format!("EMP-{:04}", id),
            first_name: "Test".to_string(),
            last_name: format!("Person{}", id),
            email: format!("person{}@example.com", id),
            phone: None,
            position: "Engineer".to_string(),
            department_id: None,
            manager_id,
            hire_date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            status: EmployeeStatus::Active,
            base_salary: 4000.0,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn user(role: UserRole, employee_id: Option<i64>) -> User {
        let mut user = User::new("u".to_string(), "u@example.com".to_string(), String::new(), role);
        user.id = 1;
        user.employee_id = employee_id;
        user
    }

    #[test]
    fn test_manager_relationship() {
        let report = employee(2, Some(1));
        let stranger = employee(3, Some(9));
        let manager = user(UserRole::Manager, Some(1));

        assert!(can_manage(&manager, &report));
        assert!(!can_manage(&manager, &stranger));
        assert!(require_manage(&manager, &stranger).is_err());
    }

    #[test]
    fn test_employee_role_cannot_manage_even_as_listed_manager() {
        let report = employee(2, Some(1));
        let plain = user(UserRole::Employee, Some(1));
        assert!(!can_manage(&plain, &report));
    }

    #[test]
    fn test_unlinked_manager_is_not_manager_of_unmanaged_staff() {
        let unmanaged = employee(2, None);
        let manager = user(UserRole::Manager, None);
        assert!(!is_manager_of(&manager, &unmanaged));
    }

    #[test]
    fn test_view_rules() {
        let me = employee(5, None);
        assert!(can_view(&user(UserRole::Employee, Some(5)), &me));
        assert!(!can_view(&user(UserRole::Employee, Some(6)), &me));
        assert!(can_view(&user(UserRole::Hr, None), &me));
        assert!(require_hr(&user(UserRole::Manager, None)).is_err());
        assert!(linked_employee(&user(UserRole::Admin, None)).is_err());
    }
}
