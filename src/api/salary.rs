//! Payroll API endpoints
//!
//! - POST /api/salary/generate - Draft payslips for a `YYYY-MM` period (HR)
//! - GET /api/salary - List (HR)
//! - GET /api/salary/mine - Own payslips
//! - GET/PUT/DELETE /api/salary/{id}
//! - POST /api/salary/{id}/pay - Mark paid (HR)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, HrUser};
use crate::models::{PagedResult, Salary, SalaryFilter, UpdateSalaryInput};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub period: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/generate", post(generate))
        .route("/mine", get(mine))
        .route("/{id}", get(get_one).put(update).delete(delete))
        .route("/{id}/pay", post(mark_paid))
}

async fn generate(
    State(state): State<AppState>,
    _hr: HrUser,
    Json(body): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<Vec<Salary>>), ApiError> {
    let created = state.payroll_service.generate(&body.period).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list(
    State(state): State<AppState>,
    _hr: HrUser,
    Query(filter): Query<SalaryFilter>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Salary>>, ApiError> {
    Ok(Json(state.payroll_service.list(&filter, &page.params()).await?))
}

async fn mine(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Salary>>, ApiError> {
    Ok(Json(state.payroll_service.mine(&user, &page.params()).await?))
}

async fn get_one(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Salary>, ApiError> {
    Ok(Json(state.payroll_service.get(&user, id).await?))
}

async fn update(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateSalaryInput>,
) -> Result<Json<Salary>, ApiError> {
    Ok(Json(state.payroll_service.update(id, input).await?))
}

async fn mark_paid(State(state): State<AppState>, _hr: HrUser, Path(id): Path<i64>) -> Result<Json<Salary>, ApiError> {
    Ok(Json(state.payroll_service.mark_paid(id).await?))
}

async fn delete(State(state): State<AppState>, _hr: HrUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.payroll_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
