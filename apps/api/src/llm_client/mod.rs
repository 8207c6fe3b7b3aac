//! AI gateway: the single point of entry for all Gemini calls in JobCraft.
//!
//! No other module may call the provider directly. Everything goes through the
//! `AiGateway` trait so handlers and the analysis pipeline can run against a
//! fake in tests.
//!
//! Model: gemini-2.5-flash (hardcoded; it handles both text prompts and PDFs)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod chat;
pub mod prompts;

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// The model used for all Gemini calls.
pub const MODEL: &str = "gemini-2.5-flash";
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(1000);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The model answered, but not with the JSON shape we asked for.
    #[error("Unexpected response shape: {0}")]
    Schema(String),

    #[error("Gave up after {retries} retries")]
    RetriesExhausted { retries: u32 },

    #[error("Model returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// 429 and 5xx are worth another attempt; everything else is final.
    pub fn is_retriable(&self) -> bool {
        matches!(self, LlmError::Api { status, .. } if *status == 429 || *status >= 500)
    }
}

/// Output mode requested from the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseFormat {
    Text,
    Json,
}

/// A base64 document sent alongside the prompt (multimodal input).
#[derive(Debug, Clone, Copy)]
pub struct InlineDocument<'a> {
    pub mime_type: &'a str,
    pub data: &'a str,
}

/// Anything that can turn a prompt into model output.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Identifier recorded in analysis metadata.
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str, format: ResponseFormat) -> Result<String, LlmError>;

    async fn generate_with_document(
        &self,
        prompt: &str,
        document: InlineDocument<'_>,
        format: ResponseFormat,
    ) -> Result<String, LlmError>;
}

/// Calls the model in JSON mode and deserializes the reply.
/// The prompt must instruct the model to return valid JSON.
pub async fn generate_json<T: DeserializeOwned>(
    gateway: &dyn AiGateway,
    prompt: &str,
) -> Result<T, LlmError> {
    let text = gateway.generate(prompt, ResponseFormat::Json).await?;
    parse_json_response(&text)
}

/// Parses model output as `T`, tolerating markdown code fences.
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(LlmError::EmptyContent);
    }
    serde_json::from_str(text).map_err(|e| LlmError::Schema(e.to_string()))
}

/// Sends a trivial prompt; true if the provider answered.
pub async fn check_connection(gateway: &dyn AiGateway) -> bool {
    match gateway.generate("Hello", ResponseFormat::Text).await {
        Ok(_) => true,
        Err(e) => {
            warn!("AI connection check failed: {e}");
            false
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Gemini `generateContent` client with fixed-delay retry on 429 and 5xx.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
        })
    }

    /// Overrides the delay between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, MODEL)
    }

    async fn send(&self, request: &GenerateContentRequest<'_>) -> Result<String, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(
                    "Gemini call attempt {} failed, retrying after {}ms...",
                    attempt,
                    self.retry_delay.as_millis()
                );
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.send_once(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retriable() => {
                    warn!("Gemini returned a transient error: {e}");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(LlmError::RetriesExhausted {
            retries: self.max_retries,
        }))
    }

    async fn send_once(&self, request: &GenerateContentRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Gemini call succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        parsed.text().ok_or(LlmError::EmptyContent)
    }
}

fn generation_config(format: ResponseFormat) -> Option<GenerationConfig> {
    match format {
        ResponseFormat::Text => None,
        ResponseFormat::Json => Some(GenerationConfig {
            response_mime_type: "application/json",
        }),
    }
}

#[async_trait]
impl AiGateway for GeminiClient {
    fn model(&self) -> &str {
        MODEL
    }

    async fn generate(&self, prompt: &str, format: ResponseFormat) -> Result<String, LlmError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part::Text { text: prompt }],
            }],
            generation_config: generation_config(format),
        };
        self.send(&request).await
    }

    async fn generate_with_document(
        &self,
        prompt: &str,
        document: InlineDocument<'_>,
        format: ResponseFormat,
    ) -> Result<String, LlmError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: document.mime_type,
                            data: document.data,
                        },
                    },
                    Part::Text { text: prompt },
                ],
            }],
            generation_config: generation_config(format),
        };
        self.send(&request).await
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gemini_reply(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }],
            "usageMetadata": { "promptTokenCount": 3, "candidatesTokenCount": 5 }
        })
    }

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test-key".to_string(), server.uri())
            .unwrap()
            .with_retry_delay(Duration::ZERO)
    }

    fn endpoint() -> String {
        format!("/models/{MODEL}:generateContent")
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_json_response_reports_schema_error() {
        let result = parse_json_response::<serde_json::Value>("Sure! Here is your analysis");
        assert!(matches!(result, Err(LlmError::Schema(_))));
    }

    #[test]
    fn test_is_retriable_only_for_429_and_5xx() {
        let api = |status| LlmError::Api {
            status,
            message: String::new(),
        };
        assert!(api(429).is_retriable());
        assert!(api(500).is_retriable());
        assert!(api(503).is_retriable());
        assert!(!api(400).is_retriable());
        assert!(!api(403).is_retriable());
        assert!(!LlmError::EmptyContent.is_retriable());
    }

    #[tokio::test]
    async fn test_generate_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(endpoint()))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("hi there")))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server)
            .generate("Hello", ResponseFormat::Text)
            .await
            .unwrap();
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn test_retries_on_503_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(endpoint()))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(endpoint()))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server)
            .generate("Hello", ResponseFormat::Text)
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(endpoint()))
            .respond_with(ResponseTemplate::new(429))
            .expect(u64::from(MAX_RETRIES) + 1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate("Hello", ResponseFormat::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(endpoint()))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate("Hello", ResponseFormat::Text)
            .await
            .unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_json_strips_fences() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(endpoint()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(gemini_reply("```json\n{\"score\": 7}\n```")),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let value: serde_json::Value = generate_json(&client, "score it").await.unwrap();
        assert_eq!(value["score"], 7);
    }

    #[tokio::test]
    async fn test_empty_candidates_is_empty_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(endpoint()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate("Hello", ResponseFormat::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }
}
