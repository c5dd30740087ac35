//! Data models
//!
//! Database entities, their status enums and the input/filter types the
//! services accept. Status enums are stored as plain strings; each one
//! round-trips through `Display`/`FromStr` and serialises as the same text.

/// Declare a string-backed status enum with `Display`, `FromStr` and serde
/// impls that all use the given text. Parsing is case-insensitive.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok($name::$variant);
                    }
                )+
                Err(anyhow::anyhow!("Invalid {}: {}", stringify!($name), s))
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

mod application;
mod attendance;
mod candidate;
mod common;
mod department;
mod employee;
mod goal;
mod interview;
mod job;
mod leave;
mod notification;
mod report;
mod review;
mod salary;
mod session;
mod user;

pub use application::{Application, ApplicationDetail, ApplicationFilter, ApplicationStatus};
pub use attendance::{
    Attendance, AttendanceFilter, AttendanceStatus, AttendanceSummary, SessionState,
    SessionStatus, UpdateAttendanceInput,
};
pub use candidate::{Candidate, CreateCandidateInput, UpdateCandidateInput};
pub use common::{ListParams, PagedResult, SortOrder};
pub use department::{CreateDepartmentInput, Department, DepartmentWithCount, UpdateDepartmentInput};
pub use employee::{
    employee_code, parse_employee_code, CreateEmployeeInput, Employee, EmployeeFilter, EmployeeSort, EmployeeStatus,
    UpdateEmployeeInput,
};
pub use goal::{CreateGoalInput, Goal, GoalFilter, GoalStatus, UpdateGoalInput};
pub use interview::{
    CreateInterviewInput, Interview, InterviewFilter, InterviewStatus, UpdateInterviewInput,
};
pub use job::{CreateJobInput, EmploymentType, Job, JobFilter, JobStatus, UpdateJobInput};
pub use leave::{
    CreateLeaveInput, LeaveBalance, LeaveFilter, LeaveRequest, LeaveStatus, LeaveType,
};
pub use notification::{Notification, NotificationKind};
pub use report::{Report, ReportType};
pub use review::{
    CreateReviewInput, PerformanceReview, ReviewFilter, ReviewStatus, UpdateReviewInput,
};
pub use salary::{round_cents, Salary, SalaryFilter, SalaryStatus, UpdateSalaryInput};
pub use session::{LoginLog, PasswordReset, Session};
pub use user::{CreateUserInput, UpdateUserInput, User, UserRole, UserStatus};
