//! User management API endpoints (administrators only)
//!
//! - GET /api/users - List accounts
//! - POST /api/users - Create an account
//! - PUT /api/users/{id} - Change role, status or employee link
//! - DELETE /api/users/{id} - Delete an account
//! - GET /api/users/login-logs - Login audit trail

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, put},
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{require_admin, ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateUserInput, LoginLog, PagedResult, UpdateUserInput, User};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/login-logs", get(login_logs))
        .route("/{id}", put(update_user).delete(delete_user))
        .route_layer(middleware::from_fn(require_admin))
}

async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<User>>, ApiError> {
    Ok(Json(state.user_service.list_users(&page.params()).await?))
}

async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.user_service.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(acting): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateUserInput>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.update_user(acting.id, id, input).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(acting): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete_user(acting.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn login_logs(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<LoginLog>>, ApiError> {
    Ok(Json(state.user_service.login_logs(&page.params()).await?))
}
