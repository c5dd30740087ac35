//! Upload API endpoints
//!
//! - POST /api/uploads - Store a document (multipart field `file`)
//! - GET /api/uploads/{name} - Download a stored document

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::read_multipart;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::upload::{is_bare_name, StoredFile};

/// Build the upload router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upload))
        .route("/{name}", get(download))
}

/// POST /api/uploads
async fn upload(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>), ApiError> {
    let (_, file) = read_multipart(&mut multipart, "file").await?;
    let file = file.ok_or_else(|| ApiError::validation_error("No file provided"))?;

    let stored = state
        .upload_service
        .store(file.file_name.as_deref(), &file.content_type, &file.data)
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/uploads/{name}
async fn download(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_bare_name(&name) {
        return Err(ApiError::validation_error("Invalid file name"));
    }
    let (data, content_type) = state.upload_service.read(&name).await?;
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", name)),
        ],
        data,
    ))
}
