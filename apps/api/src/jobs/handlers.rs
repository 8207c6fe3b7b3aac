//! Axum route handlers for the job tracker.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::files::models::FileMetadata;
use crate::jobs::models::{
    AnalysisHistory, Job, JobFilters, JobStats, JobStatus, JobType, JobUpdate, NewJob,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

/// Query string for `GET /api/jobs`. Filters combine with AND; `q` searches
/// company, role and location.
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
    #[serde(rename = "type")]
    pub job_type: Option<JobType>,
    pub company: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachResumeRequest {
    pub file_id: Uuid,
}

// ────────────────────────────────────────────────────────────────────────────
// CRUD
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Json<Vec<Job>> {
    let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let filters = JobFilters {
        status: query.status,
        job_type: query.job_type,
        company: query.company,
    };

    let jobs = match q {
        Some(q) if filters == JobFilters::default() => state.jobs.search_jobs(q).await,
        Some(q) => {
            let mut jobs = state.jobs.filter_jobs(&filters).await;
            jobs.retain(|job| job.matches_query(q));
            jobs
        }
        None => state.jobs.filter_jobs(&filters).await,
    };

    Json(jobs)
}

/// POST /api/jobs
///
/// `company` and `role` are required; everything else has a default.
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(new): Json<NewJob>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    if new.company.trim().is_empty() || new.role.trim().is_empty() {
        return Err(AppError::Validation(
            "company and role are required".to_string(),
        ));
    }
    if let Some(file_id) = new.resume_file_id {
        require_file(&state, file_id).await?;
    }

    let job = state.jobs.add_job(new).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    state
        .jobs
        .get_job(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

/// PATCH /api/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<JobUpdate>,
) -> Result<Json<Job>, AppError> {
    let blank = |field: &Option<String>| field.as_deref().is_some_and(|v| v.trim().is_empty());
    if blank(&update.company) || blank(&update.role) {
        return Err(AppError::Validation(
            "company and role cannot be empty".to_string(),
        ));
    }

    Ok(Json(state.jobs.update_job(id, update).await?))
}

/// DELETE /api/jobs/:id
///
/// Any analysis run for the job is cancelled and dropped first.
pub async fn handle_delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.analyses.remove(id);
    state.jobs.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/jobs/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.jobs.update_status(id, request.status).await?))
}

// ────────────────────────────────────────────────────────────────────────────
// Resume attachment and analysis history
// ────────────────────────────────────────────────────────────────────────────

async fn require_file(state: &AppState, file_id: Uuid) -> Result<FileMetadata, AppError> {
    state
        .files
        .get_metadata(file_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("File {file_id} not found")))
}

/// PUT /api/jobs/:id/resume
///
/// Attaches a previously uploaded file as the job's resume.
pub async fn handle_attach_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AttachResumeRequest>,
) -> Result<Json<Job>, AppError> {
    require_file(&state, request.file_id).await?;
    Ok(Json(state.jobs.attach_resume(id, request.file_id).await?))
}

/// DELETE /api/jobs/:id/resume
///
/// Clears the reference only. The file itself stays in the file store.
pub async fn handle_remove_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.jobs.remove_resume(id).await?))
}

/// GET /api/jobs/:id/analyses
pub async fn handle_analysis_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AnalysisHistory>>, AppError> {
    Ok(Json(state.jobs.analysis_history(id).await?))
}

/// DELETE /api/jobs/:id/analyses
pub async fn handle_clear_analysis_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.jobs.clear_analysis_history(id).await?))
}

/// GET /api/jobs/:id/files
pub async fn handle_job_files(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FileMetadata>>, AppError> {
    if state.jobs.get_job(id).await.is_none() {
        return Err(AppError::NotFound(format!("Job {id} not found")));
    }
    Ok(Json(state.files.job_files(id).await))
}

// ────────────────────────────────────────────────────────────────────────────
// Saved filters and statistics
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/jobs/stats
pub async fn handle_stats(State(state): State<AppState>) -> Json<JobStats> {
    Json(state.jobs.stats().await)
}

/// GET /api/jobs/filters
pub async fn handle_get_filters(State(state): State<AppState>) -> Json<JobFilters> {
    Json(state.jobs.filters().await)
}

/// PUT /api/jobs/filters
///
/// Merges the given fields into the saved filters.
pub async fn handle_set_filters(
    State(state): State<AppState>,
    Json(filters): Json<JobFilters>,
) -> Result<Json<JobFilters>, AppError> {
    Ok(Json(state.jobs.set_filters(filters).await?))
}

/// DELETE /api/jobs/filters
pub async fn handle_clear_filters(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.jobs.clear_filters().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/jobs/filtered
pub async fn handle_filtered_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.jobs.filtered_jobs().await)
}
