//! File store: uploaded resumes keyed by id, mirrored under `jobcraft-files`.
//!
//! Payloads are stored as bare base64 (`compressed = true`); readers get the
//! data URL back. Quota enforcement is advisory: it is checked before each
//! write against the sizes already stored. A failed write is rolled back in
//! memory so the map never runs ahead of its persisted snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::files::models::{
    format_file_size, is_supported_type, FileMetadata, FileStorageQuota, FileUpload,
    FileValidationResult, StoredFile, LARGE_FILE_WARNING_SIZE, MAX_FILE_SIZE,
};
use crate::persistence::{Persistence, StoreError};

pub const FILE_STORAGE_KEY: &str = "jobcraft-files";

type FileMap = HashMap<Uuid, StoredFile>;

/// Checks type, size and emptiness. Large files pass with a warning.
pub fn validate_file(mime_type: &str, size: u64) -> FileValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !is_supported_type(mime_type) {
        errors.push("File type not supported. Please upload PDF, DOC, or DOCX files only.".to_string());
    }
    if size > MAX_FILE_SIZE {
        errors.push(format!(
            "File size too large. Maximum size is {}.",
            format_file_size(MAX_FILE_SIZE)
        ));
    }
    if size == 0 {
        errors.push("File appears to be empty.".to_string());
    }
    if size > LARGE_FILE_WARNING_SIZE {
        warnings.push("Large file detected. Upload may take longer.".to_string());
    }

    FileValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

#[derive(Clone)]
pub struct FileStore {
    files: Arc<Mutex<FileMap>>,
    persistence: Arc<dyn Persistence>,
}

impl FileStore {
    pub async fn load(persistence: Arc<dyn Persistence>) -> Result<Self, StoreError> {
        let files = match persistence.load(FILE_STORAGE_KEY).await? {
            Some(raw) => serde_json::from_str::<FileMap>(&raw).unwrap_or_else(|e| {
                warn!("Ignoring unreadable {FILE_STORAGE_KEY} snapshot: {e}");
                FileMap::new()
            }),
            None => FileMap::new(),
        };

        info!("File store loaded with {} file(s)", files.len());

        Ok(Self {
            files: Arc::new(Mutex::new(files)),
            persistence,
        })
    }

    async fn write(&self, files: &FileMap) -> Result<(), StoreError> {
        let snapshot = serde_json::to_string(files)?;
        self.persistence.save(FILE_STORAGE_KEY, &snapshot).await?;
        Ok(())
    }

    /// Validates, checks the quota, and stores an upload.
    pub async fn store_file(&self, upload: FileUpload) -> Result<FileMetadata, StoreError> {
        let size = upload.bytes.len() as u64;
        let validation = validate_file(&upload.mime_type, size);
        if !validation.is_valid {
            let message = validation.errors.join(", ");
            return Err(if size > MAX_FILE_SIZE && is_supported_type(&upload.mime_type) {
                StoreError::FileTooLarge(message)
            } else {
                StoreError::InvalidFile(message)
            });
        }
        for warning in &validation.warnings {
            warn!("{}: {warning}", upload.name);
        }

        let mut files = self.files.lock().await;

        let available = FileStorageQuota::from_used(used_bytes(&files)).available;
        if available < size {
            return Err(StoreError::QuotaExceeded {
                requested: size,
                available,
            });
        }

        let now = Utc::now();
        let metadata = FileMetadata {
            id: Uuid::new_v4(),
            name: upload.name,
            size,
            mime_type: upload.mime_type,
            last_modified: upload.last_modified.unwrap_or_else(|| now.timestamp_millis()),
            uploaded_at: now,
            job_id: upload.job_id,
        };
        let stored = StoredFile {
            metadata: metadata.clone(),
            data: STANDARD.encode(&upload.bytes),
            compressed: true,
        };

        files.insert(metadata.id, stored);
        if let Err(e) = self.write(&files).await {
            files.remove(&metadata.id);
            return Err(e);
        }

        info!(
            "Stored file {} ({}, {})",
            metadata.id,
            metadata.name,
            format_file_size(metadata.size)
        );
        Ok(metadata)
    }

    /// The stored file with its data URL restored.
    pub async fn get_file(&self, id: Uuid) -> Option<StoredFile> {
        self.files.lock().await.get(&id).map(StoredFile::expanded)
    }

    pub async fn get_metadata(&self, id: Uuid) -> Option<FileMetadata> {
        self.files.lock().await.get(&id).map(|f| f.metadata.clone())
    }

    /// Metadata of every file uploaded for `job_id`, oldest first.
    pub async fn job_files(&self, job_id: Uuid) -> Vec<FileMetadata> {
        let mut files: Vec<FileMetadata> = self
            .files
            .lock()
            .await
            .values()
            .filter(|f| f.metadata.job_id == Some(job_id))
            .map(|f| f.metadata.clone())
            .collect();
        files.sort_by_key(|f| f.uploaded_at);
        files
    }

    /// Removes a file and returns its metadata. Job references are not
    /// touched here; see `JobStore::detach_file_references`.
    pub async fn delete_file(&self, id: Uuid) -> Result<FileMetadata, StoreError> {
        let mut files = self.files.lock().await;
        let removed = files.remove(&id).ok_or(StoreError::FileNotFound(id))?;
        if let Err(e) = self.write(&files).await {
            files.insert(id, removed);
            return Err(e);
        }
        info!("Deleted file {id}");
        Ok(removed.metadata)
    }

    pub async fn quota(&self) -> FileStorageQuota {
        FileStorageQuota::from_used(used_bytes(&*self.files.lock().await))
    }

    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let mut files = self.files.lock().await;
        self.persistence.remove(FILE_STORAGE_KEY).await?;
        files.clear();
        Ok(())
    }
}

fn used_bytes(files: &FileMap) -> u64 {
    files.values().map(|f| f.metadata.size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::models::STORAGE_QUOTA_LIMIT;
    use crate::persistence::MemoryPersistence;

    const PDF: &str = "application/pdf";

    fn upload(bytes: Vec<u8>, job_id: Option<Uuid>) -> FileUpload {
        FileUpload {
            name: "resume.pdf".to_string(),
            mime_type: PDF.to_string(),
            bytes,
            last_modified: Some(1_700_000_000_000),
            job_id,
        }
    }

    async fn store() -> (FileStore, Arc<MemoryPersistence>) {
        let persistence = Arc::new(MemoryPersistence::default());
        let store = FileStore::load(persistence.clone()).await.unwrap();
        (store, persistence)
    }

    #[test]
    fn test_validate_rejects_unsupported_type() {
        let result = validate_file("image/png", 1000);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("PDF, DOC, or DOCX"));
    }

    #[test]
    fn test_validate_size_limits() {
        assert!(validate_file(PDF, MAX_FILE_SIZE).is_valid);
        assert!(!validate_file(PDF, MAX_FILE_SIZE + 1).is_valid);
        assert!(!validate_file(PDF, 0).is_valid);

        let large = validate_file(PDF, 3 * 1024 * 1024);
        assert!(large.is_valid);
        assert_eq!(large.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_store_strips_prefix_and_get_restores_it() {
        let (store, persistence) = store().await;
        let meta = store.store_file(upload(b"%PDF-1.4 hello".to_vec(), None)).await.unwrap();
        assert_eq!(meta.size, 14);

        let raw = persistence.load(FILE_STORAGE_KEY).await.unwrap().unwrap();
        let persisted: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &persisted[meta.id.to_string()];
        assert_eq!(entry["compressed"], true);
        assert!(!entry["data"].as_str().unwrap().starts_with("data:"));

        let file = store.get_file(meta.id).await.unwrap();
        assert!(file.data.starts_with("data:application/pdf;base64,"));
        assert_eq!(file.metadata, meta);
    }

    #[tokio::test]
    async fn test_invalid_upload_is_not_stored() {
        let (store, _) = store().await;
        let mut bad = upload(b"hello".to_vec(), None);
        bad.mime_type = "text/plain".to_string();
        assert!(matches!(store.store_file(bad).await, Err(StoreError::InvalidFile(_))));

        let too_big = upload(vec![0u8; (MAX_FILE_SIZE + 1) as usize], None);
        assert!(matches!(store.store_file(too_big).await, Err(StoreError::FileTooLarge(_))));

        assert_eq!(store.quota().await.used, 0);
    }

    #[tokio::test]
    async fn test_quota_is_checked_before_write() {
        let (store, _) = store().await;
        let chunk = MAX_FILE_SIZE as usize;
        let fits = (STORAGE_QUOTA_LIMIT / MAX_FILE_SIZE) as usize;
        for _ in 0..fits {
            store.store_file(upload(vec![1u8; chunk], None)).await.unwrap();
        }

        let quota = store.quota().await;
        assert_eq!(quota.used, STORAGE_QUOTA_LIMIT);
        assert_eq!(quota.percentage, 100);

        let err = store.store_file(upload(vec![1u8; 10], None)).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { available: 0, .. }));
    }

    #[tokio::test]
    async fn test_job_files_and_delete() {
        let (store, _) = store().await;
        let job_id = Uuid::new_v4();
        let a = store.store_file(upload(b"first file".to_vec(), Some(job_id))).await.unwrap();
        store.store_file(upload(b"unrelated".to_vec(), None)).await.unwrap();

        let files = store.job_files(job_id).await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, a.id);

        let removed = store.delete_file(a.id).await.unwrap();
        assert_eq!(removed.id, a.id);
        assert!(store.get_metadata(a.id).await.is_none());
        assert!(matches!(store.delete_file(a.id).await, Err(StoreError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_clear_all_and_reload() {
        let (store, persistence) = store().await;
        let meta = store.store_file(upload(b"keep me".to_vec(), None)).await.unwrap();

        let reopened = FileStore::load(persistence.clone()).await.unwrap();
        assert!(reopened.get_metadata(meta.id).await.is_some());

        store.clear_all().await.unwrap();
        assert_eq!(store.quota().await.used, 0);
        assert!(persistence.load(FILE_STORAGE_KEY).await.unwrap().is_none());
    }
}
