//! Placeholder endpoints for the desktop interview companion. Neither is
//! backed by real storage or a socket yet.

use axum::{extract::Path, http::header, http::HeaderMap, Json};
use serde::Serialize;

use crate::errors::AppError;

const INTERVIEW_SOCKET_ENDPOINT: &str = "ws://localhost:3001";

#[derive(Debug, Serialize)]
pub struct SocketInfo {
    pub message: &'static str,
    pub endpoint: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ContextJob {
    pub id: String,
    pub role: &'static str,
    pub company: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ContextResume {
    pub text: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewContext {
    pub job: ContextJob,
    pub resume: ContextResume,
    pub prep_docs: Vec<&'static str>,
}

/// GET /api/interview/ws
///
/// 426 unless the request asks for a WebSocket upgrade. Even then no socket
/// is opened; the reply only says where the companion's socket server runs.
pub async fn handle_interview_ws(headers: HeaderMap) -> Result<Json<SocketInfo>, AppError> {
    let wants_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));

    if !wants_websocket {
        return Err(AppError::UpgradeRequired("Expected WebSocket".to_string()));
    }

    Ok(Json(SocketInfo {
        message: "WebSocket endpoint ready",
        endpoint: INTERVIEW_SOCKET_ENDPOINT,
    }))
}

/// GET /api/electron/context/:job_id
///
/// Fixed sample context. Only the job id is echoed back.
pub async fn handle_interview_context(Path(job_id): Path<String>) -> Json<InterviewContext> {
    Json(InterviewContext {
        job: ContextJob {
            id: job_id,
            role: "Software Engineer",
            company: "Google",
            description: "We are looking for a talented Software Engineer to join our team...",
        },
        resume: ContextResume {
            text: "John Doe\nSoftware Engineer with 5 years of experience in React, Node.js...",
        },
        prep_docs: vec![
            "Company Research: Google is known for innovation...",
            "Technical prep: Focus on data structures and algorithms...",
        ],
    })
}
