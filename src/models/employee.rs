//! Employee model
//!
//! Employees are the people HR manages. An employee may exist without a login
//! account; attendance, leave, goals, reviews and salaries all hang off the
//! employee id.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::SortOrder;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    /// Human-readable code such as `EMP-0042` (unique)
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    /// Work e-mail (unique)
    pub email: String,
    pub phone: Option<String>,
    pub position: String,
    pub department_id: Option<i64>,
    /// Direct manager
    pub manager_id: Option<i64>,
    pub hire_date: NaiveDate,
    pub status: EmployeeStatus,
    /// Monthly base salary
    pub base_salary: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status != EmployeeStatus::Terminated
    }
}

string_enum! {
    #[derive(Default)]
    pub enum EmployeeStatus {
        #[default]
        Active => "active",
        OnLeave => "on_leave",
        Terminated => "terminated",
    }
}

/// Format the code for the n-th employee
pub fn employee_code(n: i64) -> String {
    format!("EMP-{:04}", n)
}

/// Numeric part of an employee code, if it has the `EMP-` shape
pub fn parse_employee_code(code: &str) -> Option<i64> {
    code.strip_prefix("EMP-")?.parse().ok()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmployeeInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub position: String,
    #[serde(default)]
    pub department_id: Option<i64>,
    #[serde(default)]
    pub manager_id: Option<i64>,
    pub hire_date: NaiveDate,
    #[serde(default)]
    pub base_salary: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEmployeeInput {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, with = "super::user::double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default, with = "super::user::double_option")]
    pub department_id: Option<Option<i64>>,
    #[serde(default, with = "super::user::double_option")]
    pub manager_id: Option<Option<i64>>,
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
    #[serde(default)]
    pub base_salary: Option<f64>,
}

string_enum! {
    /// Sortable employee columns
    #[derive(Default)]
    pub enum EmployeeSort {
        #[default]
        Name => "name",
        HireDate => "hire_date",
        CreatedAt => "created_at",
        Position => "position",
    }
}

impl EmployeeSort {
    /// ORDER BY expression (without direction)
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            EmployeeSort::Name => &["last_name", "first_name"],
            EmployeeSort::HireDate => &["hire_date"],
            EmployeeSort::CreatedAt => &["created_at"],
            EmployeeSort::Position => &["position"],
        }
    }

    pub fn order_by(&self, order: SortOrder) -> String {
        self.columns()
            .iter()
            .map(|c| format!("{} {}", c, order.sql()))
            .chain(std::iter::once("id ASC".to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Filters for listing employees
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeFilter {
    #[serde(default)]
    pub department_id: Option<i64>,
    #[serde(default)]
    pub status: Option<EmployeeStatus>,
    /// Matches names, e-mail and employee code
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: EmployeeSort,
    #[serde(default)]
    pub order: SortOrder,
}
