//! Services layer - Business logic
//!
//! Each service owns the rules for one area of the HR system and talks to
//! the database only through repository traits. Services are responsible for:
//! - Validating input and enforcing role-based access
//! - Moving records through their status lifecycles
//! - Sending notifications and e-mails as side effects
//! - Keeping the dashboard cache fresh

pub mod access;
pub mod attendance;
pub mod clock;
pub mod csv;
pub mod department;
pub mod email;
pub mod employee;
pub mod error;
pub mod leave;
pub mod notification;
pub mod password;
pub mod payroll;
pub mod performance;
pub mod rate_limiter;
pub mod recruitment;
pub mod report;
pub mod upload;
pub mod user;
pub mod validation;

pub use attendance::AttendanceService;
pub use clock::{Clock, ClockService};
pub use department::DepartmentService;
pub use email::EmailService;
pub use employee::EmployeeService;
pub use error::{ServiceError, ServiceResult};
pub use leave::LeaveService;
pub use notification::NotificationService;
pub use password::{hash_password, verify_password};
pub use payroll::PayrollService;
pub use performance::PerformanceService;
pub use rate_limiter::LoginRateLimiter;
pub use recruitment::RecruitmentService;
pub use report::{DashboardSummary, ReportService};
pub use upload::UploadService;
pub use user::{LoginContext, LoginInput, RegisterInput, UserService, UserServiceError};
