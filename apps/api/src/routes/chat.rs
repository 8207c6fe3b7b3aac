use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::errors::AppError;
use crate::llm_client::chat::{validate_messages, ChatMessage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// POST /api/chat
///
/// Streams completion text as SSE `data` events. A provider error after the
/// stream has started is sent as a single `error` event and ends the stream.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    validate_messages(&request.messages).map_err(AppError::Validation)?;

    let chat = state
        .chat
        .as_ref()
        .ok_or_else(|| AppError::NotConfigured("Chat is not configured".to_string()))?;

    let tokens = chat
        .stream(&request.messages)
        .await
        .map_err(|e| AppError::ai("Chat completion failed", e))?;

    let events = tokens
        .scan(false, |failed, item| {
            if *failed {
                return futures::future::ready(None);
            }
            let event = match item {
                Ok(text) => Event::default().data(text),
                Err(e) => {
                    tracing::error!("Chat stream failed: {e}");
                    *failed = true;
                    Event::default().event("error").data(e.to_string())
                }
            };
            futures::future::ready(Some(Ok(event)))
        });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
