//! Streaming chat completions for the `/api/chat` proxy.
//!
//! Requests go to an OpenAI-compatible `/chat/completions` endpoint with
//! `stream: true`; the SSE body is parsed into a stream of content deltas.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use futures::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::LlmError;

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const CHAT_MODEL: &str = "gpt-3.5-turbo";
/// Conversations longer than this are rejected before reaching the provider.
pub const MAX_MESSAGE_COUNT: usize = 20;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

/// Checks a chat payload the way the proxy requires: at least one message,
/// no blank content, at most `MAX_MESSAGE_COUNT` messages.
pub fn validate_messages(messages: &[ChatMessage]) -> Result<(), String> {
    if messages.is_empty() {
        return Err("No valid messages provided".to_string());
    }
    if messages.iter().any(|m| m.content.trim().is_empty()) {
        return Err("Message content cannot be empty".to_string());
    }
    if messages.len() > MAX_MESSAGE_COUNT {
        return Err(format!(
            "Message count exceeds the maximum limit of {MAX_MESSAGE_COUNT}"
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ChatClient {
    pub fn new(api_key: String, base_url: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Starts a streamed completion. Errors before the first byte are returned
    /// directly; errors mid-stream arrive as stream items.
    pub async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        let request = ChatCompletionRequest {
            model: CHAT_MODEL,
            messages,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenAiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(LlmError::Http));

        Ok(decode_sse(body))
    }
}

/// Incremental parser for an OpenAI-style SSE body.
///
/// Bytes are buffered until a full `\n`-terminated line is available, so
/// events and multi-byte characters split across network chunks survive.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Consumes one network chunk and returns the deltas of every line it completed.
    fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, LlmError>> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line[..pos], &mut out);
        }
        out
    }

    /// Flushes a final line the server did not terminate.
    fn finish(&mut self) -> Vec<Result<String, LlmError>> {
        let mut out = Vec::new();
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line, &mut out);
        out
    }

    fn decode_line(&mut self, raw: &[u8], out: &mut Vec<Result<String, LlmError>>) {
        if self.done {
            return;
        }
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(e) => {
                out.push(Err(LlmError::Schema(format!("chat stream is not UTF-8: {e}"))));
                return;
            }
        };
        if line.is_empty() || line.starts_with(':') {
            return;
        }
        // event:, id: and retry: fields carry nothing we use.
        let Some(data) = line.strip_prefix("data:").map(str::trim) else {
            return;
        };
        if data == "[DONE]" {
            self.done = true;
            return;
        }

        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(parsed) => {
                let text: String = parsed
                    .choices
                    .into_iter()
                    .filter_map(|c| c.delta.content)
                    .collect();
                if !text.is_empty() {
                    out.push(Ok(text));
                }
            }
            Err(e) => out.push(Err(LlmError::Schema(format!(
                "unreadable chat stream event: {e}"
            )))),
        }
    }
}

struct SseState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

/// Turns a chunked SSE body into a stream of content deltas.
fn decode_sse<S, B>(body: S) -> TokenStream
where
    S: Stream<Item = Result<B, LlmError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let items = state.decoder.push(chunk.as_ref());
                    state.pending.extend(items);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.finished = true;
                    let items = state.decoder.finish();
                    state.pending.extend(items);
                }
            }
        }
    }))
}
