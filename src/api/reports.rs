//! Report API endpoints (managers, HR and administrators)
//!
//! - GET /api/reports/dashboard - Cached landing-page figures
//! - POST /api/reports - Generate and store a report
//! - GET /api/reports, GET/DELETE /api/reports/{id}
//! - GET /api/reports/{id}/export - CSV download

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, ManagerUser};
use crate::models::{PagedResult, Report, ReportType};
use crate::services::report::GenerateReportInput;
use crate::services::DashboardSummary;

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub report_type: Option<ReportType>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(generate))
        .route("/dashboard", get(dashboard))
        .route("/{id}", get(get_one).delete(delete))
        .route("/{id}/export", get(export))
}

async fn dashboard(State(state): State<AppState>, _user: ManagerUser) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(state.report_service.dashboard().await?))
}

async fn generate(
    State(state): State<AppState>,
    ManagerUser(user): ManagerUser,
    Json(input): Json<GenerateReportInput>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    let report = state.report_service.generate(&user, input).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn list(
    State(state): State<AppState>,
    _user: ManagerUser,
    Query(query): Query<ReportQuery>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Report>>, ApiError> {
    Ok(Json(state.report_service.list(query.report_type, &page.params()).await?))
}

async fn get_one(State(state): State<AppState>, _user: ManagerUser, Path(id): Path<i64>) -> Result<Json<Report>, ApiError> {
    Ok(Json(state.report_service.get(id).await?))
}

async fn delete(State(state): State<AppState>, _user: ManagerUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.report_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export(
    State(state): State<AppState>,
    _user: ManagerUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let (filename, csv) = state.report_service.export_csv(id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        csv,
    ))
}
