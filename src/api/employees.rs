//! Employee API endpoints
//!
//! - GET /api/employees - Filtered, sorted, paged list
//! - GET /api/employees/me - Record linked to the current user
//! - GET /api/employees/export - CSV of the filtered list (HR)
//! - POST /api/employees - Create (HR)
//! - GET/PUT/DELETE /api/employees/{id}
//! - PUT /api/employees/{id}/status - Activate, put on leave or terminate (HR)

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, HrUser};
use crate::models::{
    CreateEmployeeInput, Employee, EmployeeFilter, EmployeeStatus, PagedResult, UpdateEmployeeInput,
};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: EmployeeStatus,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/me", get(me))
        .route("/export", get(export))
        .route("/{id}", get(get_one).put(update).delete(delete))
        .route("/{id}/status", put(set_status))
}

async fn list(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(filter): Query<EmployeeFilter>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Employee>>, ApiError> {
    Ok(Json(state.employee_service.list(&filter, &page.params()).await?))
}

async fn me(State(state): State<AppState>, AuthenticatedUser(user): AuthenticatedUser) -> Result<Json<Employee>, ApiError> {
    Ok(Json(state.employee_service.me(&user).await?))
}

async fn export(
    State(state): State<AppState>,
    _hr: HrUser,
    Query(filter): Query<EmployeeFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let csv = state.employee_service.export_csv(&filter).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"employees.csv\""),
        ],
        csv,
    ))
}

async fn get_one(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Employee>, ApiError> {
    Ok(Json(state.employee_service.get(id).await?))
}

async fn create(
    State(state): State<AppState>,
    _hr: HrUser,
    Json(input): Json<CreateEmployeeInput>,
) -> Result<(StatusCode, Json<Employee>), ApiError> {
    let employee = state.employee_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

async fn update(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateEmployeeInput>,
) -> Result<Json<Employee>, ApiError> {
    Ok(Json(state.employee_service.update(id, input).await?))
}

async fn set_status(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Employee>, ApiError> {
    Ok(Json(state.employee_service.set_status(id, body.status).await?))
}

async fn delete(State(state): State<AppState>, _hr: HrUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.employee_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
