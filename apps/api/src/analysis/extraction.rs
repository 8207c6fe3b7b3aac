//! Resume text extraction.
//!
//! PDFs go to the model's multimodal endpoint (or `pdf-extract` when
//! configured for local extraction); every other type is base64 text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use tracing::{debug, info};

use crate::analysis::prompts::pdf_extraction_prompt;
use crate::config::PdfExtraction;
use crate::llm_client::{AiGateway, InlineDocument, LlmError, ResponseFormat};

pub const PDF_MIME_TYPE: &str = "application/pdf";
/// Shortest trimmed text accepted as a readable resume.
pub const MIN_TEXT_LENGTH: usize = 10;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to decode file data: {0}")]
    Decode(String),

    #[error("Failed to extract text from PDF: {0}")]
    Pdf(String),

    #[error("Unable to extract meaningful text from the document. Please ensure the file contains readable content.")]
    TooShort,

    #[error(transparent)]
    Ai(#[from] LlmError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    /// Trimmed document text.
    pub text: String,
    pub word_count: usize,
}

/// Drops a `data:<mime>;base64,` prefix if present.
pub fn strip_data_url(data: &str) -> &str {
    if data.starts_with("data:") {
        if let Some((_, payload)) = data.split_once(',') {
            return payload;
        }
    }
    data
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, ExtractionError> {
    STANDARD
        .decode(strip_data_url(data).trim())
        .map_err(|e| ExtractionError::Decode(e.to_string()))
}

/// Extracts plain text from a base64 payload (bare or data URL) of type `file_type`.
pub async fn extract_text(
    gateway: &dyn AiGateway,
    strategy: PdfExtraction,
    file_data: &str,
    file_type: &str,
) -> Result<ExtractedText, ExtractionError> {
    let raw = if file_type == PDF_MIME_TYPE {
        match strategy {
            PdfExtraction::Ai => extract_pdf_with_ai(gateway, file_data).await?,
            PdfExtraction::Local => extract_pdf_locally(file_data).await?,
        }
    } else {
        let bytes = decode_base64(file_data)?;
        String::from_utf8_lossy(&bytes).into_owned()
    };

    let text = raw.trim();
    if text.chars().count() < MIN_TEXT_LENGTH {
        return Err(ExtractionError::TooShort);
    }

    let word_count = text.split_whitespace().count();
    info!("Extracted {} words from {}", word_count, file_type);

    Ok(ExtractedText {
        text: text.to_string(),
        word_count,
    })
}

async fn extract_pdf_with_ai(
    gateway: &dyn AiGateway,
    file_data: &str,
) -> Result<String, ExtractionError> {
    let document = InlineDocument {
        mime_type: PDF_MIME_TYPE,
        data: strip_data_url(file_data).trim(),
    };
    debug!("Sending {} base64 chars of PDF to the model", document.data.len());
    let text = gateway
        .generate_with_document(pdf_extraction_prompt(), document, ResponseFormat::Text)
        .await?;
    Ok(text)
}

async fn extract_pdf_locally(file_data: &str) -> Result<String, ExtractionError> {
    let bytes = decode_base64(file_data)?;
    // pdf-extract is synchronous and CPU-bound.
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ExtractionError::Pdf(format!("extraction task failed: {e}")))?
        .map_err(|e| ExtractionError::Pdf(e.to_string()))
}
