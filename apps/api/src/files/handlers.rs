//! Axum route handlers for resume file storage.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::files::models::{FileMetadata, FileStorageQuota, FileUpload, StoredFile};
use crate::state::AppState;

/// Request bodies up to this size reach the upload handler. Anything larger is
/// refused by the body limit before validation runs.
pub const MAX_UPLOAD_BODY: usize = 8 * 1024 * 1024;

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {e}"))
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("Invalid {name}: '{value}'")))
}

/// POST /api/files
///
/// Multipart fields: `file` (required), `jobId` and `lastModified` (optional).
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileMetadata>), AppError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut job_id: Option<Uuid> = None;
    let mut last_modified: Option<i64> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or("resume").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                file = Some((name, mime_type, bytes.to_vec()));
            }
            "jobId" => {
                let value = field.text().await.map_err(bad_multipart)?;
                if !value.trim().is_empty() {
                    job_id = Some(parse_field("jobId", &value)?);
                }
            }
            "lastModified" => {
                let value = field.text().await.map_err(bad_multipart)?;
                last_modified = Some(parse_field("lastModified", &value)?);
            }
            _ => {}
        }
    }

    let (name, mime_type, bytes) =
        file.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

    if let Some(job_id) = job_id {
        if state.jobs.get_job(job_id).await.is_none() {
            return Err(AppError::NotFound(format!("Job {job_id} not found")));
        }
    }

    let metadata = state
        .files
        .store_file(FileUpload {
            name,
            mime_type,
            bytes,
            last_modified,
            job_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(metadata)))
}

/// GET /api/files/quota
pub async fn handle_quota(State(state): State<AppState>) -> Json<FileStorageQuota> {
    Json(state.files.quota().await)
}

/// GET /api/files/:id
///
/// Returns the file with `data` as a data URL.
pub async fn handle_get_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredFile>, AppError> {
    state
        .files
        .get_file(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("File {id} not found")))
}

/// GET /api/files/:id/metadata
pub async fn handle_get_metadata(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FileMetadata>, AppError> {
    state
        .files
        .get_metadata(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("File {id} not found")))
}

/// DELETE /api/files/:id
///
/// Jobs that used the file as their resume are detached before the file
/// itself is removed.
pub async fn handle_delete_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.files.get_metadata(id).await.is_none() {
        return Err(AppError::NotFound(format!("File {id} not found")));
    }

    let detached = state.jobs.detach_file_references(id).await?;
    if detached > 0 {
        tracing::info!("Detached file {id} from {detached} job(s)");
    }
    if let Err(e) = state.files.delete_file(id).await {
        tracing::warn!("File {id} detached from jobs but not deleted: {e}");
        return Err(e.into());
    }
    Ok(StatusCode::NO_CONTENT)
}
