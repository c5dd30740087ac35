//! Database repositories
//!
//! One repository per table. Each exposes a trait used by the services and
//! a `Sqlx*Repository` implementation that runs on SQLite or MySQL.

pub mod application;
pub mod attendance;
pub mod candidate;
pub mod department;
pub mod employee;
pub mod goal;
pub mod interview;
pub mod job;
pub mod leave;
pub mod login_log;
pub mod notification;
pub mod password_reset;
pub mod report;
pub mod review;
pub mod salary;
pub mod session;
pub mod user;

pub use application::{ApplicationRepository, SqlxApplicationRepository};
pub use attendance::{AttendanceRepository, SqlxAttendanceRepository};
pub use candidate::{CandidateRepository, SqlxCandidateRepository};
pub use department::{DepartmentRepository, SqlxDepartmentRepository};
pub use employee::{EmployeeRepository, NewEmployee, SqlxEmployeeRepository};
pub use goal::{GoalRepository, SqlxGoalRepository};
pub use interview::{InterviewRepository, SqlxInterviewRepository};
pub use job::{JobRepository, SqlxJobRepository};
pub use leave::{LeaveRepository, SqlxLeaveRepository};
pub use login_log::{LoginLogRepository, NewLoginLog, SqlxLoginLogRepository};
pub use notification::{NewNotification, NotificationRepository, SqlxNotificationRepository};
pub use password_reset::{PasswordResetRepository, SqlxPasswordResetRepository};
pub use report::{NewReport, ReportRepository, SqlxReportRepository};
pub use review::{ReviewRepository, SqlxReviewRepository};
pub use salary::{SalaryRepository, SqlxSalaryRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// `%term%` pattern for LIKE searches; blank terms disable the filter
pub(crate) fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", t))
}
