use std::sync::Arc;

use crate::analysis::pipeline::{AnalysisRegistry, PipelineDeps};
use crate::config::Config;
use crate::files::store::FileStore;
use crate::jobs::store::JobStore;
use crate::llm_client::chat::ChatClient;
use crate::llm_client::AiGateway;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub ai: Arc<dyn AiGateway>,
    /// `None` when `OPENAI_API_KEY` is unset; `/api/chat` then answers 503.
    pub chat: Option<ChatClient>,
    pub jobs: JobStore,
    pub files: FileStore,
    pub analyses: AnalysisRegistry,
}

impl AppState {
    pub fn pipeline_deps(&self) -> PipelineDeps {
        PipelineDeps {
            ai: self.ai.clone(),
            jobs: self.jobs.clone(),
            files: self.files.clone(),
            pdf_extraction: self.config.pdf_extraction,
        }
    }
}
