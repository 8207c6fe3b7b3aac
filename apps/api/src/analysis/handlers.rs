//! Axum route handlers for the AI endpoints and per-job analysis runs.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{stream, Stream};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::extraction::extract_text;
use crate::analysis::models::{
    AtsAnalysisResult, CategorizedSuggestions, CompanyInsights, ExtractedKeywords,
    KeywordContext, ParsedJobDescription,
};
use crate::analysis::pipeline::AnalysisProgress;
use crate::analysis::prompts::{AtsAnalysisInput, ImprovementSuggestionsInput};
use crate::analysis::service::{
    analyze_resume_for_ats, extract_keywords, generate_company_insights,
    generate_improvement_suggestions, parse_job_description,
};
use crate::errors::AppError;
use crate::llm_client::check_connection;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// `{ "success": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResumeRequest {
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub job_description: String,
    pub company_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResumeData {
    pub ats_result: AtsAnalysisResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTextRequest {
    #[serde(default)]
    pub file_data: String,
    #[serde(default)]
    pub file_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTextResponse {
    pub success: bool,
    pub text: String,
    pub word_count: usize,
}

#[derive(Debug, Serialize)]
pub struct AiStatusResponse {
    pub gemini: bool,
    pub model: String,
    pub chat_configured: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseJobRequest {
    #[serde(default)]
    pub job_description: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtractKeywordsRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub context: KeywordContext,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsRequest {
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub job_description: String,
    pub analysis: AtsAnalysisResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInsightsRequest {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub job_description: String,
}

fn require_text(fields: &[&str], message: &str) -> Result<(), AppError> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Stateless AI endpoints
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/ai/analyze-resume
///
/// Scores a resume against a job description. Missing input is rejected
/// before any model call.
pub async fn handle_analyze_resume(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeResumeRequest>,
) -> Result<Json<DataResponse<AnalyzeResumeData>>, AppError> {
    require_text(
        &[&request.resume_text, &request.job_description],
        "resumeText and jobDescription are required",
    )?;

    let ats_result = analyze_resume_for_ats(
        state.ai.as_ref(),
        &AtsAnalysisInput {
            resume_text: &request.resume_text,
            job_description: &request.job_description,
            company_name: request.company_name.as_deref(),
        },
    )
    .await
    .map_err(|e| AppError::ai("Analysis failed", e))?;

    Ok(DataResponse::ok(AnalyzeResumeData { ats_result }))
}

/// POST /api/ai/extract-text
///
/// PDFs are read by the model (or locally, per `PDF_EXTRACTION`); other
/// types are base64-decoded.
pub async fn handle_extract_text(
    State(state): State<AppState>,
    Json(request): Json<ExtractTextRequest>,
) -> Result<Json<ExtractTextResponse>, AppError> {
    require_text(
        &[&request.file_data, &request.file_type],
        "fileData and fileType are required",
    )?;

    let extracted = extract_text(
        state.ai.as_ref(),
        state.config.pdf_extraction,
        &request.file_data,
        &request.file_type,
    )
    .await
    .map_err(|e| AppError::Extraction(e.to_string()))?;

    Ok(Json(ExtractTextResponse {
        success: true,
        text: extracted.text,
        word_count: extracted.word_count,
    }))
}

/// GET /api/ai/status
pub async fn handle_ai_status(State(state): State<AppState>) -> Json<AiStatusResponse> {
    Json(AiStatusResponse {
        gemini: check_connection(state.ai.as_ref()).await,
        model: state.ai.model().to_string(),
        chat_configured: state.chat.is_some(),
    })
}

/// POST /api/ai/parse-job
pub async fn handle_parse_job(
    State(state): State<AppState>,
    Json(request): Json<ParseJobRequest>,
) -> Result<Json<DataResponse<ParsedJobDescription>>, AppError> {
    require_text(&[&request.job_description], "jobDescription is required")?;

    let parsed = parse_job_description(state.ai.as_ref(), &request.job_description)
        .await
        .map_err(|e| AppError::ai("Job description parsing failed", e))?;

    Ok(DataResponse::ok(parsed))
}

/// POST /api/ai/extract-keywords
pub async fn handle_extract_keywords(
    State(state): State<AppState>,
    Json(request): Json<ExtractKeywordsRequest>,
) -> Result<Json<DataResponse<ExtractedKeywords>>, AppError> {
    require_text(&[&request.text], "text is required")?;

    let keywords = extract_keywords(state.ai.as_ref(), &request.text, request.context)
        .await
        .map_err(|e| AppError::ai("Keyword extraction failed", e))?;

    Ok(DataResponse::ok(keywords))
}

/// POST /api/ai/suggestions
pub async fn handle_suggestions(
    State(state): State<AppState>,
    Json(request): Json<SuggestionsRequest>,
) -> Result<Json<DataResponse<CategorizedSuggestions>>, AppError> {
    require_text(
        &[&request.resume_text, &request.job_description],
        "resumeText and jobDescription are required",
    )?;

    let suggestions = generate_improvement_suggestions(
        state.ai.as_ref(),
        &ImprovementSuggestionsInput {
            resume_text: &request.resume_text,
            job_description: &request.job_description,
            analysis: &request.analysis,
        },
    )
    .await
    .map_err(|e| AppError::ai("Suggestion generation failed", e))?;

    Ok(DataResponse::ok(suggestions))
}

/// POST /api/ai/company-insights
pub async fn handle_company_insights(
    State(state): State<AppState>,
    Json(request): Json<CompanyInsightsRequest>,
) -> Result<Json<DataResponse<CompanyInsights>>, AppError> {
    require_text(
        &[&request.company_name, &request.job_description],
        "companyName and jobDescription are required",
    )?;

    let insights = generate_company_insights(
        state.ai.as_ref(),
        &request.company_name,
        &request.job_description,
    )
    .await
    .map_err(|e| AppError::ai("Company insights generation failed", e))?;

    Ok(DataResponse::ok(insights))
}

// ────────────────────────────────────────────────────────────────────────────
// Per-job analysis runs
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/jobs/:id/analysis
///
/// Starts a background run and returns its initial progress. A run already
/// in flight for the job is cancelled.
pub async fn handle_start_analysis(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<(StatusCode, Json<AnalysisProgress>), AppError> {
    let progress = state
        .analyses
        .start(state.pipeline_deps(), job_id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(progress)))
}

/// GET /api/jobs/:id/analysis
pub async fn handle_analysis_progress(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<AnalysisProgress>, AppError> {
    state
        .analyses
        .progress(job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No analysis run for job {job_id}")))
}

/// DELETE /api/jobs/:id/analysis
pub async fn handle_cancel_analysis(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.analyses.cancel(job_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "No running analysis for job {job_id}"
        )))
    }
}

/// GET /api/jobs/:id/analysis/events
///
/// SSE feed of the current run's progress: the latest snapshot first, then
/// one `progress` event per change. Ends after the terminal stage.
pub async fn handle_analysis_events(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let rx = state
        .analyses
        .subscribe(job_id)
        .ok_or_else(|| AppError::NotFound(format!("No analysis run for job {job_id}")))?;

    let events = stream::unfold(Some((rx, true)), |cursor| async move {
        let (mut rx, first) = cursor?;
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let progress = rx.borrow_and_update().clone();
        let next = (!progress.stage.is_terminal()).then_some((rx, false));
        let event = Event::default()
            .event("progress")
            .json_data(&progress)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Some((Ok(event), next))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
