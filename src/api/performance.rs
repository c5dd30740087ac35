//! Goal and review API endpoints
//!
//! Ownership and reporting-line checks happen in `PerformanceService`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, ManagerUser};
use crate::models::{
    CreateGoalInput, CreateReviewInput, Goal, GoalFilter, PerformanceReview, ReviewFilter,
    UpdateGoalInput, UpdateReviewInput,
};

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress: i64,
}

pub fn goals_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_goals).post(create_goal))
        .route("/{id}", get(get_goal).put(update_goal).delete(delete_goal))
        .route("/{id}/progress", put(update_progress))
        .route("/{id}/cancel", post(cancel_goal))
}

pub fn reviews_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reviews).post(create_review))
        .route("/{id}", get(get_review).put(update_review).delete(delete_review))
        .route("/{id}/submit", post(submit_review))
        .route("/{id}/acknowledge", post(acknowledge_review))
}

// Goals

async fn list_goals(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(filter): Query<GoalFilter>,
) -> Result<Json<Vec<Goal>>, ApiError> {
    Ok(Json(state.performance_service.list_goals(&user, filter).await?))
}

async fn create_goal(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<CreateGoalInput>,
) -> Result<(StatusCode, Json<Goal>), ApiError> {
    let goal = state.performance_service.create_goal(&user, input).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

async fn get_goal(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Goal>, ApiError> {
    Ok(Json(state.performance_service.get_goal(&user, id).await?))
}

async fn update_goal(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateGoalInput>,
) -> Result<Json<Goal>, ApiError> {
    Ok(Json(state.performance_service.update_goal(&user, id, input).await?))
}

async fn update_progress(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ProgressRequest>,
) -> Result<Json<Goal>, ApiError> {
    Ok(Json(
        state
            .performance_service
            .update_progress(&user, id, body.progress)
            .await?,
    ))
}

async fn cancel_goal(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Goal>, ApiError> {
    Ok(Json(state.performance_service.cancel_goal(&user, id).await?))
}

async fn delete_goal(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.performance_service.delete_goal(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Reviews

async fn list_reviews(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(filter): Query<ReviewFilter>,
) -> Result<Json<Vec<PerformanceReview>>, ApiError> {
    Ok(Json(state.performance_service.list_reviews(&user, filter).await?))
}

async fn create_review(
    State(state): State<AppState>,
    ManagerUser(user): ManagerUser,
    Json(input): Json<CreateReviewInput>,
) -> Result<(StatusCode, Json<PerformanceReview>), ApiError> {
    let review = state.performance_service.create_review(&user, input).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn get_review(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PerformanceReview>, ApiError> {
    Ok(Json(state.performance_service.get_review(&user, id).await?))
}

async fn update_review(
    State(state): State<AppState>,
    ManagerUser(user): ManagerUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateReviewInput>,
) -> Result<Json<PerformanceReview>, ApiError> {
    Ok(Json(state.performance_service.update_review(&user, id, input).await?))
}

async fn submit_review(
    State(state): State<AppState>,
    ManagerUser(user): ManagerUser,
    Path(id): Path<i64>,
) -> Result<Json<PerformanceReview>, ApiError> {
    Ok(Json(state.performance_service.submit_review(&user, id).await?))
}

async fn acknowledge_review(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PerformanceReview>, ApiError> {
    Ok(Json(state.performance_service.acknowledge_review(&user, id).await?))
}

async fn delete_review(
    State(state): State<AppState>,
    ManagerUser(user): ManagerUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.performance_service.delete_review(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
