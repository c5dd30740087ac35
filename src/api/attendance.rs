//! Attendance API endpoints
//!
//! Self-service session control works on the employee linked to the
//! current user. Corrections and absence marking need HR.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::common::{DateRangeQuery, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, HrUser};
use crate::models::{
    Attendance, AttendanceFilter, AttendanceSummary, PagedResult, SessionStatus, UpdateAttendanceInput,
};
use crate::services::access;

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    #[serde(default)]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AbsencesQuery {
    /// Defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/check-in", post(check_in))
        .route("/check-out", post(check_out))
        .route("/break/start", post(start_break))
        .route("/break/end", post(end_break))
        .route("/status", get(status))
        .route("/history", get(history))
        .route("/summary", get(summary))
        .route("/absences", post(mark_absences))
        .route("/{id}", get(get_one).put(update).delete(delete))
}

async fn check_in(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<(StatusCode, Json<Attendance>), ApiError> {
    let employee_id = access::linked_employee(&user)?;
    let record = state.attendance_service.check_in(employee_id).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn start_break(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Attendance>, ApiError> {
    let employee_id = access::linked_employee(&user)?;
    Ok(Json(state.attendance_service.start_break(employee_id).await?))
}

async fn end_break(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Attendance>, ApiError> {
    let employee_id = access::linked_employee(&user)?;
    Ok(Json(state.attendance_service.end_break(employee_id).await?))
}

async fn check_out(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Attendance>, ApiError> {
    let employee_id = access::linked_employee(&user)?;
    Ok(Json(state.attendance_service.check_out(employee_id).await?))
}

async fn status(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<SessionStatus>, ApiError> {
    let employee_id = access::linked_employee(&user)?;
    Ok(Json(state.attendance_service.session_status(employee_id).await?))
}

async fn history(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(range): Query<DateRangeQuery>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Attendance>>, ApiError> {
    Ok(Json(
        state
            .attendance_service
            .history(&user, range.from, range.to, &page.params())
            .await?,
    ))
}

async fn summary(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<AttendanceSummary>, ApiError> {
    Ok(Json(
        state
            .attendance_service
            .summary(&user, query.employee_id, query.from, query.to)
            .await?,
    ))
}

async fn mark_absences(
    State(state): State<AppState>,
    _hr: HrUser,
    Query(query): Query<AbsencesQuery>,
) -> Result<Json<Vec<Attendance>>, ApiError> {
    let date = query.date.unwrap_or_else(|| state.attendance_service.today());
    Ok(Json(state.attendance_service.mark_absences(date).await?))
}

async fn list(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(filter): Query<AttendanceFilter>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Attendance>>, ApiError> {
    Ok(Json(state.attendance_service.list(&user, filter, &page.params()).await?))
}

async fn get_one(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Attendance>, ApiError> {
    let record = state.attendance_service.get(id).await?;
    if !user.is_hr() && !user.is_employee(record.employee_id) {
        let employee = state.employee_service.get(record.employee_id).await?;
        access::require_view(&user, &employee)?;
    }
    Ok(Json(record))
}

async fn update(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateAttendanceInput>,
) -> Result<Json<Attendance>, ApiError> {
    Ok(Json(state.attendance_service.update(id, input).await?))
}

async fn delete(State(state): State<AppState>, _hr: HrUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.attendance_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
