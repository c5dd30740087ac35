//! Department model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    /// Unique display name
    pub name: String,
    pub description: Option<String>,
    /// Employee heading the department
    pub head_employee_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Department together with its current headcount
#[derive(Debug, Clone, Serialize)]
pub struct DepartmentWithCount {
    #[serde(flatten)]
    pub department: Department,
    pub employee_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDepartmentInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub head_employee_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDepartmentInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "super::user::double_option")]
    pub head_employee_id: Option<Option<i64>>,
}
