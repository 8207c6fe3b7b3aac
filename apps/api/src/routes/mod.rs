pub mod chat;
pub mod desktop;
pub mod health;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::errors::AppError;
use crate::files::handlers as files;
use crate::jobs::handlers as jobs;
use crate::state::AppState;

/// DELETE /api/data
///
/// Drops every job, saved filter, stored file and analysis run.
async fn handle_reset(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.analyses.clear();
    state.jobs.reset().await?;
    state.files.clear_all().await?;
    tracing::warn!("All jobs and files were deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // AI
        .route("/api/ai/analyze-resume", post(analysis::handle_analyze_resume))
        .route("/api/ai/extract-text", post(analysis::handle_extract_text))
        .route("/api/ai/status", get(analysis::handle_ai_status))
        .route("/api/ai/parse-job", post(analysis::handle_parse_job))
        .route(
            "/api/ai/extract-keywords",
            post(analysis::handle_extract_keywords),
        )
        .route("/api/ai/suggestions", post(analysis::handle_suggestions))
        .route(
            "/api/ai/company-insights",
            post(analysis::handle_company_insights),
        )
        .route("/api/chat", post(chat::handle_chat))
        // Jobs
        .route(
            "/api/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route("/api/jobs/stats", get(jobs::handle_stats))
        .route(
            "/api/jobs/filters",
            get(jobs::handle_get_filters)
                .put(jobs::handle_set_filters)
                .delete(jobs::handle_clear_filters),
        )
        .route("/api/jobs/filtered", get(jobs::handle_filtered_jobs))
        .route(
            "/api/jobs/:id",
            get(jobs::handle_get_job)
                .patch(jobs::handle_update_job)
                .delete(jobs::handle_delete_job),
        )
        .route("/api/jobs/:id/status", put(jobs::handle_update_status))
        .route(
            "/api/jobs/:id/resume",
            put(jobs::handle_attach_resume).delete(jobs::handle_remove_resume),
        )
        .route(
            "/api/jobs/:id/analyses",
            get(jobs::handle_analysis_history).delete(jobs::handle_clear_analysis_history),
        )
        .route("/api/jobs/:id/files", get(jobs::handle_job_files))
        .route(
            "/api/jobs/:id/analysis",
            post(analysis::handle_start_analysis)
                .get(analysis::handle_analysis_progress)
                .delete(analysis::handle_cancel_analysis),
        )
        .route(
            "/api/jobs/:id/analysis/events",
            get(analysis::handle_analysis_events),
        )
        // Files
        .route("/api/files", post(files::handle_upload))
        .route("/api/files/quota", get(files::handle_quota))
        .route(
            "/api/files/:id",
            get(files::handle_get_file).delete(files::handle_delete_file),
        )
        .route("/api/files/:id/metadata", get(files::handle_get_metadata))
        // Desktop companion placeholders
        .route(
            "/api/electron/context/:job_id",
            get(desktop::handle_interview_context),
        )
        .route("/api/interview/ws", get(desktop::handle_interview_ws))
        .route("/api/data", delete(handle_reset))
        .layer(DefaultBodyLimit::max(files::MAX_UPLOAD_BODY))
        .with_state(state)
}
