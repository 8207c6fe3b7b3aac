use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Where the job and file stores mirror their state.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Memory,
    File(PathBuf),
    Redis(String),
}

/// How PDF resumes are turned into text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PdfExtraction {
    /// Send the document to the Gemini multimodal endpoint.
    Ai,
    /// Extract locally with `pdf-extract`.
    Local,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_api_url: String,
    pub openai_api_key: Option<String>,
    pub openai_api_url: String,
    pub storage: StorageBackend,
    pub pdf_extraction: PdfExtraction,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_api_url: std::env::var("GEMINI_API_URL")
                .unwrap_or_else(|_| crate::llm_client::GEMINI_API_URL.to_string()),
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| crate::llm_client::chat::OPENAI_API_URL.to_string()),
            storage: storage_from_env()?,
            pdf_extraction: parse_pdf_extraction(
                &std::env::var("PDF_EXTRACTION").unwrap_or_else(|_| "ai".to_string()),
            )?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn storage_from_env() -> Result<StorageBackend> {
    let kind = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".to_string());
    match kind.to_lowercase().as_str() {
        "memory" => Ok(StorageBackend::Memory),
        "file" => {
            let dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());
            Ok(StorageBackend::File(PathBuf::from(dir)))
        }
        "redis" => Ok(StorageBackend::Redis(require_env("REDIS_URL")?)),
        other => bail!("STORAGE_BACKEND must be one of memory, file, redis (got '{other}')"),
    }
}

fn parse_pdf_extraction(value: &str) -> Result<PdfExtraction> {
    match value.to_lowercase().as_str() {
        "ai" => Ok(PdfExtraction::Ai),
        "local" => Ok(PdfExtraction::Local),
        other => bail!("PDF_EXTRACTION must be 'ai' or 'local' (got '{other}')"),
    }
}
