//! Leave API endpoints
//!
//! - POST /api/leave - Request leave (own, or for an employee when HR)
//! - GET /api/leave - Requests visible to the caller
//! - GET /api/leave/mine, GET /api/leave/balance
//! - GET/DELETE /api/leave/{id} - Delete cancels a pending request
//! - POST /api/leave/{id}/approve, POST /api/leave/{id}/decline

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, ManagerUser};
use crate::models::{CreateLeaveInput, LeaveBalance, LeaveFilter, LeaveRequest, PagedResult};

#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BalanceQuery {
    #[serde(default)]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub year: Option<i32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(request))
        .route("/mine", get(mine))
        .route("/balance", get(balance))
        .route("/{id}", get(get_one).delete(cancel))
        .route("/{id}/approve", post(approve))
        .route("/{id}/decline", post(decline))
}

async fn request(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<CreateLeaveInput>,
) -> Result<(StatusCode, Json<LeaveRequest>), ApiError> {
    let leave = state.leave_service.request(&user, input).await?;
    Ok((StatusCode::CREATED, Json(leave)))
}

async fn list(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(filter): Query<LeaveFilter>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<LeaveRequest>>, ApiError> {
    Ok(Json(state.leave_service.list(&user, filter, &page.params()).await?))
}

async fn mine(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<LeaveRequest>>, ApiError> {
    Ok(Json(state.leave_service.mine(&user, &page.params()).await?))
}

async fn balance(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<Vec<LeaveBalance>>, ApiError> {
    Ok(Json(
        state
            .leave_service
            .balance(&user, query.employee_id, query.year)
            .await?,
    ))
}

async fn get_one(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LeaveRequest>, ApiError> {
    Ok(Json(state.leave_service.get(&user, id).await?))
}

async fn cancel(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.leave_service.cancel(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve(
    State(state): State<AppState>,
    ManagerUser(user): ManagerUser,
    Path(id): Path<i64>,
    Json(body): Json<DecisionRequest>,
) -> Result<Json<LeaveRequest>, ApiError> {
    Ok(Json(state.leave_service.approve(&user, id, body.comment).await?))
}

async fn decline(
    State(state): State<AppState>,
    ManagerUser(user): ManagerUser,
    Path(id): Path<i64>,
    Json(body): Json<DecisionRequest>,
) -> Result<Json<LeaveRequest>, ApiError> {
    Ok(Json(state.leave_service.decline(&user, id, body.comment).await?))
}
