//! Recruitment API endpoints
//!
//! Jobs, candidates, applications and interviews. HR writes; managers may
//! read the pipeline and record feedback on interviews they run. The public
//! careers routes live here too.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{field, read_multipart, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, HrUser, ManagerUser};
use crate::models::{
    Application, ApplicationDetail, ApplicationFilter, ApplicationStatus, Candidate, CreateCandidateInput,
    CreateInterviewInput, CreateJobInput, Interview, InterviewFilter, Job, JobFilter, PagedResult,
    UpdateCandidateInput, UpdateInterviewInput, UpdateJobInput,
};
use crate::services::recruitment::{CareersApplication, HireInput, HireOutcome, ResumeFile};

#[derive(Debug, Default, Deserialize)]
pub struct CandidateQuery {
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub job_id: i64,
    pub candidate_id: i64,
    #[serde(default)]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub feedback: Option<String>,
    pub rating: i64,
}

pub fn jobs_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/{id}", get(get_job).put(update_job).delete(delete_job))
        .route("/{id}/publish", post(publish_job))
        .route("/{id}/close", post(close_job))
}

pub fn candidates_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_candidates).post(create_candidate))
        .route("/{id}", get(get_candidate).put(update_candidate).delete(delete_candidate))
        .route("/{id}/resume", post(attach_resume))
}

pub fn applications_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_applications).post(apply))
        .route("/{id}", get(get_application).delete(delete_application))
        .route("/{id}/status", put(transition))
        .route("/{id}/hire", post(hire))
}

pub fn interviews_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_interviews).post(schedule_interview))
        .route("/{id}", get(get_interview).put(update_interview))
        .route("/{id}/complete", post(complete_interview))
        .route("/{id}/cancel", post(cancel_interview))
        .route("/{id}/no-show", post(mark_no_show))
}

/// Public careers page
pub fn careers_router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_open_jobs))
        .route("/jobs/{id}", get(get_open_job))
        .route("/jobs/{id}/apply", post(careers_apply))
}

// Jobs

async fn list_jobs(
    State(state): State<AppState>,
    _user: ManagerUser,
    Query(filter): Query<JobFilter>,
) -> Result<Json<Vec<Job>>, ApiError> {
    Ok(Json(state.recruitment_service.list_jobs(&filter).await?))
}

async fn create_job(
    State(state): State<AppState>,
    _hr: HrUser,
    Json(input): Json<CreateJobInput>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = state.recruitment_service.create_job(input).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn get_job(State(state): State<AppState>, _user: ManagerUser, Path(id): Path<i64>) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.recruitment_service.get_job(id).await?))
}

async fn update_job(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateJobInput>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.recruitment_service.update_job(id, input).await?))
}

async fn publish_job(State(state): State<AppState>, _hr: HrUser, Path(id): Path<i64>) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.recruitment_service.publish_job(id).await?))
}

async fn close_job(State(state): State<AppState>, _hr: HrUser, Path(id): Path<i64>) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.recruitment_service.close_job(id).await?))
}

async fn delete_job(State(state): State<AppState>, _hr: HrUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.recruitment_service.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Candidates

async fn list_candidates(
    State(state): State<AppState>,
    _user: ManagerUser,
    Query(query): Query<CandidateQuery>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Candidate>>, ApiError> {
    Ok(Json(
        state
            .recruitment_service
            .list_candidates(query.search.as_deref(), &page.params())
            .await?,
    ))
}

async fn create_candidate(
    State(state): State<AppState>,
    _hr: HrUser,
    Json(input): Json<CreateCandidateInput>,
) -> Result<(StatusCode, Json<Candidate>), ApiError> {
    let candidate = state.recruitment_service.create_candidate(input).await?;
    Ok((StatusCode::CREATED, Json(candidate)))
}

async fn get_candidate(
    State(state): State<AppState>,
    _user: ManagerUser,
    Path(id): Path<i64>,
) -> Result<Json<Candidate>, ApiError> {
    Ok(Json(state.recruitment_service.get_candidate(id).await?))
}

async fn update_candidate(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateCandidateInput>,
) -> Result<Json<Candidate>, ApiError> {
    Ok(Json(state.recruitment_service.update_candidate(id, input).await?))
}

async fn delete_candidate(State(state): State<AppState>, _hr: HrUser, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.recruitment_service.delete_candidate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/candidates/{id}/resume - multipart field `file`
async fn attach_resume(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<Candidate>, ApiError> {
    let (_, file) = read_multipart(&mut multipart, "file").await?;
    let file = file.ok_or_else(|| ApiError::validation_error("No file provided"))?;
    let resume = ResumeFile {
        original_name: file.file_name,
        content_type: file.content_type,
        data: file.data,
    };
    Ok(Json(state.recruitment_service.attach_resume(id, resume).await?))
}

// Applications

async fn list_applications(
    State(state): State<AppState>,
    _user: ManagerUser,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Json<Vec<ApplicationDetail>>, ApiError> {
    Ok(Json(state.recruitment_service.list_applications(&filter).await?))
}

async fn apply(
    State(state): State<AppState>,
    _hr: HrUser,
    Json(body): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    let application = state
        .recruitment_service
        .apply(body.job_id, body.candidate_id, body.cover_letter)
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn get_application(
    State(state): State<AppState>,
    _user: ManagerUser,
    Path(id): Path<i64>,
) -> Result<Json<ApplicationDetail>, ApiError> {
    Ok(Json(state.recruitment_service.get_application(id).await?))
}

async fn transition(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Application>, ApiError> {
    Ok(Json(state.recruitment_service.transition(id, body.status).await?))
}

async fn hire(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
    Json(input): Json<HireInput>,
) -> Result<Json<HireOutcome>, ApiError> {
    Ok(Json(state.recruitment_service.hire(id, input).await?))
}

async fn delete_application(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.recruitment_service.delete_application(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Interviews

async fn list_interviews(
    State(state): State<AppState>,
    _user: ManagerUser,
    Query(filter): Query<InterviewFilter>,
) -> Result<Json<Vec<Interview>>, ApiError> {
    Ok(Json(state.recruitment_service.list_interviews(&filter).await?))
}

async fn schedule_interview(
    State(state): State<AppState>,
    _hr: HrUser,
    Json(input): Json<CreateInterviewInput>,
) -> Result<(StatusCode, Json<Interview>), ApiError> {
    let interview = state.recruitment_service.schedule_interview(input).await?;
    Ok((StatusCode::CREATED, Json(interview)))
}

async fn get_interview(
    State(state): State<AppState>,
    _user: ManagerUser,
    Path(id): Path<i64>,
) -> Result<Json<Interview>, ApiError> {
    Ok(Json(state.recruitment_service.get_interview(id).await?))
}

async fn update_interview(
    State(state): State<AppState>,
    _hr: HrUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateInterviewInput>,
) -> Result<Json<Interview>, ApiError> {
    Ok(Json(state.recruitment_service.update_interview(id, input).await?))
}

/// Interviewers may record their own feedback without an HR role
async fn complete_interview(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CompleteRequest>,
) -> Result<Json<Interview>, ApiError> {
    Ok(Json(
        state
            .recruitment_service
            .complete_interview(&user, id, body.feedback, body.rating)
            .await?,
    ))
}

async fn cancel_interview(State(state): State<AppState>, _hr: HrUser, Path(id): Path<i64>) -> Result<Json<Interview>, ApiError> {
    Ok(Json(state.recruitment_service.cancel_interview(id).await?))
}

async fn mark_no_show(State(state): State<AppState>, _hr: HrUser, Path(id): Path<i64>) -> Result<Json<Interview>, ApiError> {
    Ok(Json(state.recruitment_service.mark_no_show(id).await?))
}

// Careers

async fn list_open_jobs(State(state): State<AppState>) -> Result<Json<Vec<Job>>, ApiError> {
    Ok(Json(state.recruitment_service.list_open_jobs().await?))
}

async fn get_open_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.recruitment_service.get_open_job(id).await?))
}

/// POST /api/careers/jobs/{id}/apply
///
/// Multipart form: `first_name`, `last_name`, `email`, optional `phone` and
/// `cover_letter`, optional CV in `resume`.
async fn careers_apply(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    let (fields, file) = read_multipart(&mut multipart, "resume").await?;
    let required = |name: &str| {
        field(&fields, name)
            .map(str::to_string)
            .ok_or_else(|| ApiError::validation_error(format!("{} is required", name)))
    };

    let form = CareersApplication {
        first_name: required("first_name")?,
        last_name: required("last_name")?,
        email: required("email")?,
        phone: field(&fields, "phone").map(str::to_string),
        cover_letter: field(&fields, "cover_letter").map(str::to_string),
    };
    let resume = file.filter(|f| !f.data.is_empty()).map(|f| ResumeFile {
        original_name: f.file_name,
        content_type: f.content_type,
        data: f.data,
    });

    let application = state.recruitment_service.careers_apply(id, form, resume).await?;
    Ok((StatusCode::CREATED, Json(application)))
}
