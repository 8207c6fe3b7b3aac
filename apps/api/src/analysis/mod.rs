// Resume analysis: ATS scoring, extraction, and the per-job analysis pipeline.
// All model calls go through llm_client::AiGateway.

pub mod extraction;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod prompts;
pub mod service;
