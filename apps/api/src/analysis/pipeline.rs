//! Analysis orchestrator for stored jobs.
//!
//! Flow: extracting → analyzing → generating → persist → complete | error.
//!
//! Each run is a spawned task registered per job. Progress is published on a
//! `watch` channel; cancellation is a second `watch` flag raced against every
//! stage. Persisting the result is the one step that is never interrupted, so
//! a cancelled run leaves the job untouched. Starting a run for a job that
//! already has one cancels the old run.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::extraction::extract_text;
use crate::analysis::models::{AtsAnalysisResult, CategorizedSuggestions, CompanyInsights};
use crate::analysis::prompts::{AtsAnalysisInput, ImprovementSuggestionsInput};
use crate::analysis::service::{
    analyze_resume_for_ats, generate_company_insights, generate_improvement_suggestions,
};
use crate::config::PdfExtraction;
use crate::files::store::FileStore;
use crate::jobs::store::JobStore;
use crate::llm_client::AiGateway;
use crate::persistence::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStage {
    Extracting,
    Analyzing,
    Generating,
    Complete,
    Error,
    Cancelled,
}

impl AnalysisStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AnalysisStage::Complete | AnalysisStage::Error | AnalysisStage::Cancelled
        )
    }
}

/// What a completed run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub history_id: String,
    pub ats_result: AtsAnalysisResult,
    pub suggestions: CategorizedSuggestions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_insights: Option<CompanyInsights>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisProgress {
    pub run_id: Uuid,
    pub job_id: Uuid,
    pub stage: AnalysisStage,
    /// 0-100
    pub progress: u8,
    pub step_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisOutcome>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisProgress {
    fn started(run_id: Uuid, job_id: Uuid) -> Self {
        let now = Utc::now();
        AnalysisProgress {
            run_id,
            job_id,
            stage: AnalysisStage::Extracting,
            progress: 0,
            step_text: "Starting analysis...".to_string(),
            error: None,
            result: None,
            started_at: now,
            updated_at: now,
        }
    }
}

/// Everything a run needs, cloned out of application state.
#[derive(Clone)]
pub struct PipelineDeps {
    pub ai: Arc<dyn AiGateway>,
    pub jobs: JobStore,
    pub files: FileStore,
    pub pdf_extraction: PdfExtraction,
}

struct RunHandle {
    run_id: Uuid,
    cancel: watch::Sender<bool>,
    progress: watch::Receiver<AnalysisProgress>,
}

/// Active and finished runs, one per job.
#[derive(Clone, Default)]
pub struct AnalysisRegistry {
    runs: Arc<Mutex<HashMap<Uuid, RunHandle>>>,
}

impl AnalysisRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, RunHandle>> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts a run for `job_id`, cancelling any run already in flight for it.
    pub async fn start(
        &self,
        deps: PipelineDeps,
        job_id: Uuid,
    ) -> Result<AnalysisProgress, StoreError> {
        if deps.jobs.get_job(job_id).await.is_none() {
            return Err(StoreError::JobNotFound(job_id));
        }

        let run_id = Uuid::new_v4();
        let initial = AnalysisProgress::started(run_id, job_id);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (progress_tx, progress_rx) = watch::channel(initial.clone());

        let previous = self.lock().insert(
            job_id,
            RunHandle {
                run_id,
                cancel: cancel_tx,
                progress: progress_rx,
            },
        );
        if let Some(previous) = previous {
            if !previous.progress.borrow().stage.is_terminal() {
                info!(
                    "Analysis run {} for job {job_id} superseded by {run_id}",
                    previous.run_id
                );
            }
            let _ = previous.cancel.send(true);
        }

        info!("Starting analysis run {run_id} for job {job_id}");
        tokio::spawn(run(deps, job_id, Reporter(progress_tx), cancel_rx));

        Ok(initial)
    }

    pub fn progress(&self, job_id: Uuid) -> Option<AnalysisProgress> {
        self.lock().get(&job_id).map(|h| h.progress.borrow().clone())
    }

    pub fn subscribe(&self, job_id: Uuid) -> Option<watch::Receiver<AnalysisProgress>> {
        self.lock().get(&job_id).map(|h| h.progress.clone())
    }

    /// Signals the job's run to stop. False when there is nothing running.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        let runs = self.lock();
        match runs.get(&job_id) {
            Some(handle) if !handle.progress.borrow().stage.is_terminal() => {
                info!("Cancelling analysis run {} for job {job_id}", handle.run_id);
                handle.cancel.send(true).is_ok()
            }
            _ => false,
        }
    }

    /// Cancels the job's run if it is still going and forgets it.
    pub fn remove(&self, job_id: Uuid) -> bool {
        let Some(handle) = self.lock().remove(&job_id) else {
            return false;
        };
        if !handle.progress.borrow().stage.is_terminal() {
            info!("Cancelling analysis run {} for removed job {job_id}", handle.run_id);
        }
        let _ = handle.cancel.send(true);
        true
    }

    /// Cancels every run and forgets them all.
    pub fn clear(&self) {
        let runs: Vec<RunHandle> = self.lock().drain().map(|(_, h)| h).collect();
        if !runs.is_empty() {
            info!("Dropping {} analysis run(s)", runs.len());
        }
        for handle in runs {
            let _ = handle.cancel.send(true);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Run
// ────────────────────────────────────────────────────────────────────────────

const MISSING_INPUTS: &str = "Please upload a resume and ensure job description is available.";

enum RunError {
    Cancelled,
    Failed(String),
}

struct Reporter(watch::Sender<AnalysisProgress>);

impl Reporter {
    fn step(&self, stage: AnalysisStage, progress: u8, text: &str) {
        self.0.send_modify(|p| {
            p.stage = stage;
            p.progress = progress;
            p.step_text = text.to_string();
            p.updated_at = Utc::now();
        });
    }

    fn finish(&self, outcome: Result<AnalysisOutcome, RunError>) {
        self.0.send_modify(|p| {
            p.updated_at = Utc::now();
            match outcome {
                Ok(result) => {
                    p.stage = AnalysisStage::Complete;
                    p.progress = 100;
                    p.step_text = "Analysis complete!".to_string();
                    p.result = Some(result);
                }
                Err(RunError::Cancelled) => {
                    p.stage = AnalysisStage::Cancelled;
                    p.step_text = "Analysis cancelled.".to_string();
                }
                Err(RunError::Failed(message)) => {
                    p.stage = AnalysisStage::Error;
                    p.step_text = "Analysis failed. Please try again.".to_string();
                    p.error = Some(message);
                }
            }
        });
    }
}

async fn run(
    deps: PipelineDeps,
    job_id: Uuid,
    reporter: Reporter,
    mut cancel: watch::Receiver<bool>,
) {
    let outcome = execute(&deps, job_id, &reporter, &mut cancel).await;
    match &outcome {
        Ok(result) => info!(
            "Analysis for job {job_id} complete: overall score {}",
            result.ats_result.overall_score
        ),
        Err(RunError::Cancelled) => info!("Analysis for job {job_id} cancelled"),
        Err(RunError::Failed(message)) => warn!("Analysis for job {job_id} failed: {message}"),
    }
    reporter.finish(outcome);
}

async fn execute(
    deps: &PipelineDeps,
    job_id: Uuid,
    reporter: &Reporter,
    cancel: &mut watch::Receiver<bool>,
) -> Result<AnalysisOutcome, RunError> {
    // ── extracting ──
    reporter.step(AnalysisStage::Extracting, 10, "Extracting text from resume...");

    let job = deps
        .jobs
        .get_job(job_id)
        .await
        .ok_or_else(|| RunError::Failed(format!("Job {job_id} not found")))?;
    let description = job
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| RunError::Failed(MISSING_INPUTS.to_string()))?;
    let file_id = job
        .resume_file_id
        .ok_or_else(|| RunError::Failed(MISSING_INPUTS.to_string()))?;
    let file = deps
        .files
        .get_file(file_id)
        .await
        .ok_or_else(|| RunError::Failed(format!("Resume file {file_id} not found")))?;

    reporter.step(AnalysisStage::Extracting, 25, "Processing resume content...");
    let extracted = cancellable(
        cancel,
        extract_text(
            deps.ai.as_ref(),
            deps.pdf_extraction,
            &file.data,
            &file.metadata.mime_type,
        ),
    )
    .await?
    .map_err(|e| RunError::Failed(e.to_string()))?;

    // ── analyzing ──
    reporter.step(AnalysisStage::Analyzing, 50, "Analyzing keywords and content...");
    let company = Some(job.company.trim()).filter(|c| !c.is_empty());
    let ats_result = cancellable(
        cancel,
        analyze_resume_for_ats(
            deps.ai.as_ref(),
            &AtsAnalysisInput {
                resume_text: &extracted.text,
                job_description: description,
                company_name: company,
            },
        ),
    )
    .await?
    .map_err(|e| RunError::Failed(format!("Analysis failed: {e}")))?;
    reporter.step(AnalysisStage::Analyzing, 75, "Calculating ATS scores...");

    // ── generating ──
    reporter.step(
        AnalysisStage::Generating,
        90,
        "Generating improvement suggestions...",
    );
    let suggestions = cancellable(
        cancel,
        generate_improvement_suggestions(
            deps.ai.as_ref(),
            &ImprovementSuggestionsInput {
                resume_text: &extracted.text,
                job_description: description,
                analysis: &ats_result,
            },
        ),
    )
    .await?
    .map_err(|e| RunError::Failed(format!("Suggestion generation failed: {e}")))?;

    let company_insights = match company {
        Some(company) => Some(
            cancellable(
                cancel,
                generate_company_insights(deps.ai.as_ref(), company, description),
            )
            .await?
            .map_err(|e| RunError::Failed(format!("Company insights failed: {e}")))?,
        ),
        None => None,
    };

    // ── persist ── (not interruptible past this check)
    if *cancel.borrow() {
        return Err(RunError::Cancelled);
    }
    let entry = deps
        .jobs
        .save_analysis(job_id, ats_result.clone(), company_insights.clone())
        .await
        .map_err(|e| RunError::Failed(format!("Failed to save analysis: {e}")))?;

    Ok(AnalysisOutcome {
        history_id: entry.id,
        ats_result,
        suggestions,
        company_insights,
    })
}

/// Runs `stage` unless the cancel flag is raised first.
async fn cancellable<T>(
    cancel: &mut watch::Receiver<bool>,
    stage: impl Future<Output = T>,
) -> Result<T, RunError> {
    tokio::select! {
        biased;
        _ = cancelled(cancel) => Err(RunError::Cancelled),
        out = stage => Ok(out),
    }
}

/// Resolves once the flag is true or the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}
