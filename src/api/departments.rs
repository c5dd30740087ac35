//! Department API endpoints
//!
//! Reads are open to every signed-in user; writes need HR.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, HrUser};
use crate::models::{CreateDepartmentInput, Department, DepartmentWithCount, UpdateDepartmentInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).put(update).delete(delete))
}

async fn list(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<DepartmentWithCount>>, ApiError> {
    Ok(Json(state.department_service.list().await?))
}

async fn get_one(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Department>, ApiError> {
    Ok(Json(state.department_service.get(id).await?))
}

async fn create(
    State(state): State<AppState>,
    _hr: HrUser,
    Json(input): Json<CreateDepartmentInput>,
) -> Result<(StatusCode, Json<Department>), ApiError> {
    let department = state.department_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(department)))
}

async fn update(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateDepartmentInput>,
) -> Result<Json<Department>, ApiError> {
    Ok(Json(state.department_service.update(id, input).await?))
}

async fn delete(State(state): State<AppState>, _hr: HrUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.department_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
