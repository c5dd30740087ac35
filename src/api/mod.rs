//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api`. Handlers are thin: they pull the
//! caller out of the request, enforce the coarse role for the route and
//! hand over to a service.
//!
//! - Auth, user management
//! - Departments and employees
//! - Attendance, leave, goals and reviews, payroll
//! - Recruitment (jobs, candidates, applications, interviews, careers page)
//! - Reports and dashboard, notifications, uploads
//! - Server time and health

pub mod attendance;
pub mod auth;
pub mod common;
pub mod departments;
pub mod employees;
pub mod leave;
pub mod middleware;
pub mod notifications;
pub mod performance;
pub mod recruitment;
pub mod reports;
pub mod salary;
pub mod system;
pub mod upload;
pub mod users;


use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::create_cache;
use crate::config::{AttendancePolicy, Config};
use crate::db::repositories::{
    SqlxApplicationRepository, SqlxAttendanceRepository, SqlxCandidateRepository, SqlxDepartmentRepository,
    SqlxEmployeeRepository, SqlxGoalRepository, SqlxInterviewRepository, SqlxJobRepository,
    SqlxLeaveRepository, SqlxLoginLogRepository, SqlxNotificationRepository, SqlxPasswordResetRepository,
    SqlxReportRepository, SqlxReviewRepository, SqlxSalaryRepository, SqlxSessionRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    AttendanceService, Clock, ClockService, DepartmentService, EmailService, EmployeeService, LeaveService,
    LoginRateLimiter, NotificationService, PayrollService, PerformanceService, RecruitmentService,
    ReportService, UploadService, UserService,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

/// Room for multipart framing on top of the largest accepted file
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Wire repositories and services together.
///
/// Returns the state plus the rate limiter so the caller can schedule its
/// cleanup.
pub fn build_state(pool: DynDatabasePool, config: &Config) -> Result<(AppState, Arc<LoginRateLimiter>)> {
    let policy = AttendancePolicy::from_config(&config.attendance).context("Invalid attendance policy")?;
    let offset = policy.offset;
    let cache = create_cache(&config.cache);
    let clock = Arc::new(ClockService::new(&config.clock)?);
    let now: Arc<dyn Clock> = clock.clone();

    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let employee_repo = SqlxEmployeeRepository::boxed(pool.clone());
    let department_repo = SqlxDepartmentRepository::boxed(pool.clone());
    let attendance_repo = SqlxAttendanceRepository::boxed(pool.clone());
    let leave_repo = SqlxLeaveRepository::boxed(pool.clone());
    let salary_repo = SqlxSalaryRepository::boxed(pool.clone());
    let job_repo = SqlxJobRepository::boxed(pool.clone());
    let application_repo = SqlxApplicationRepository::boxed(pool.clone());
    let interview_repo = SqlxInterviewRepository::boxed(pool.clone());

    let rate_limiter = Arc::new(LoginRateLimiter::new());
    let email = Arc::new(EmailService::new(config.smtp.clone()));
    let uploads = Arc::new(UploadService::new(config.upload.clone()));
    let notifications = Arc::new(NotificationService::new(
        SqlxNotificationRepository::boxed(pool.clone()),
        user_repo.clone(),
    ));

    let user_service = Arc::new(
        UserService::new(
            user_repo.clone(),
            session_repo.clone(),
            SqlxPasswordResetRepository::boxed(pool.clone()),
            SqlxLoginLogRepository::boxed(pool.clone()),
            employee_repo.clone(),
            rate_limiter.clone(),
            email.clone(),
        )
        .with_session_expiration(config.session.expiration_days),
    );
    let department_service = Arc::new(DepartmentService::new(department_repo.clone(), employee_repo.clone()));
    let employee_service = Arc::new(EmployeeService::new(
        employee_repo.clone(),
        department_repo.clone(),
        user_repo,
        session_repo,
    ));
    let attendance_service = Arc::new(AttendanceService::new(
        attendance_repo.clone(),
        employee_repo.clone(),
        leave_repo.clone(),
        notifications.clone(),
        now.clone(),
        policy.clone(),
        cache.clone(),
    ));
    let leave_service = Arc::new(LeaveService::new(
        leave_repo.clone(),
        employee_repo.clone(),
        notifications.clone(),
        email.clone(),
        now.clone(),
        offset,
        config.leave.clone(),
        cache.clone(),
    ));
    let performance_service = Arc::new(PerformanceService::new(
        SqlxGoalRepository::boxed(pool.clone()),
        SqlxReviewRepository::boxed(pool.clone()),
        employee_repo.clone(),
        notifications.clone(),
        email.clone(),
        now.clone(),
    ));
    let payroll_service = Arc::new(PayrollService::new(
        salary_repo.clone(),
        employee_repo.clone(),
        attendance_repo.clone(),
        notifications.clone(),
        email.clone(),
        now.clone(),
        policy,
        config.payroll.clone(),
    ));
    let recruitment_service = Arc::new(RecruitmentService::new(
        job_repo.clone(),
        SqlxCandidateRepository::boxed(pool.clone()),
        application_repo.clone(),
        interview_repo.clone(),
        department_repo.clone(),
        employee_repo.clone(),
        employee_service.clone(),
        notifications.clone(),
        email,
        uploads.clone(),
        now.clone(),
        offset,
        cache.clone(),
    ));
    let report_service = Arc::new(ReportService::new(
        SqlxReportRepository::boxed(pool.clone()),
        employee_repo,
        department_repo,
        attendance_repo,
        leave_repo,
        salary_repo,
        job_repo,
        application_repo,
        interview_repo,
        now,
        offset,
        cache,
    ));

    let state = AppState {
        pool,
        user_service,
        department_service,
        employee_service,
        attendance_service,
        leave_service,
        performance_service,
        payroll_service,
        recruitment_service,
        report_service,
        notification_service: notifications,
        upload_service: uploads,
        clock,
        request_stats: Arc::new(RequestStats::new()),
        session_days: config.session.expiration_days.max(1),
        trust_proxy_headers: config.server.trust_proxy_headers,
    };
    Ok((state, rate_limiter))
}

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Everything below needs a session; role checks happen per handler
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/users", users::router())
        .nest("/departments", departments::router())
        .nest("/employees", employees::router())
        .nest("/attendance", attendance::router())
        .nest("/leave", leave::router())
        .nest("/goals", performance::goals_router())
        .nest("/reviews", performance::reviews_router())
        .nest("/salary", salary::router())
        .nest("/jobs", recruitment::jobs_router())
        .nest("/candidates", recruitment::candidates_router())
        .nest("/applications", recruitment::applications_router())
        .nest("/interviews", recruitment::interviews_router())
        .nest("/reports", reports::router())
        .nest("/notifications", notifications::router())
        .nest("/uploads", upload::router())
        .route_layer(axum_middleware::from_fn_with_state(state, middleware::require_auth));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/careers", recruitment::careers_router())
        .merge(system::router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Result<Router> {
    // Cookie auth needs credentials, which rules out a wildcard origin
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let body_limit = state.upload_service.config().max_file_size as usize + BODY_LIMIT_SLACK;

    Ok(Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Outermost, so every request is counted
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state))
}
