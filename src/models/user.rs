//! User model
//!
//! A user is a login account. Accounts are optionally linked to an
//! [`Employee`](super::Employee) record; self-service features (attendance,
//! leave, payslips) work through that link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity representing a login account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    /// Linked employee record, if any
    pub employee_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// The password must already be hashed with `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            role,
            status: UserStatus::Active,
            employee_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// HR staff or administrator
    pub fn is_hr(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Hr)
    }

    /// Manager, HR staff or administrator
    pub fn is_manager(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Hr | UserRole::Manager)
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Whether this user owns the given employee record
    pub fn is_employee(&self, employee_id: i64) -> bool {
        self.employee_id == Some(employee_id)
    }
}

string_enum! {
    /// User role for authorization.
    ///
    /// - Admin: everything, including user management
    /// - Hr: employee records, payroll, recruitment, all approvals
    /// - Manager: approvals and reviews for direct reports, reports
    /// - Employee: self-service only
    #[derive(Default)]
    pub enum UserRole {
        Admin => "admin",
        Hr => "hr",
        Manager => "manager",
        #[default]
        Employee => "employee",
    }
}

string_enum! {
    /// Account state; disabled accounts cannot log in.
    #[derive(Default)]
    pub enum UserStatus {
        #[default]
        Active => "active",
        Disabled => "disabled",
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    /// Defaults to Employee
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub employee_id: Option<i64>,
}

/// Input for updating a user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub status: Option<UserStatus>,
    /// `Some(None)` unlinks the employee record
    #[serde(default, with = "double_option")]
    pub employee_id: Option<Option<i64>>,
}

/// Distinguishes an absent field from an explicit `null`.
pub(crate) mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
