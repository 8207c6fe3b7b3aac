use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
/// Uploads above this size are accepted with a warning.
pub const LARGE_FILE_WARNING_SIZE: u64 = 2 * 1024 * 1024;
pub const STORAGE_QUOTA_LIMIT: u64 = 50 * 1024 * 1024;

pub const SUPPORTED_FILE_TYPES: [&str; 3] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: Uuid,
    pub name: String,
    /// Decoded payload size in bytes.
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Client-reported modification time, unix millis.
    pub last_modified: i64,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    #[serde(flatten)]
    pub metadata: FileMetadata,
    /// Base64 payload. Bare when `compressed`, a full data URL otherwise.
    pub data: String,
    #[serde(default)]
    pub compressed: bool,
}

impl StoredFile {
    /// Returns the payload as `data:<mime>;base64,<payload>`.
    pub fn data_url(&self) -> String {
        if self.data.starts_with("data:") {
            self.data.clone()
        } else {
            format!("data:{};base64,{}", self.metadata.mime_type, self.data)
        }
    }

    /// Copy with the data URL restored, as handed to readers.
    pub fn expanded(&self) -> StoredFile {
        StoredFile {
            metadata: self.metadata.clone(),
            data: self.data_url(),
            compressed: false,
        }
    }
}

/// An upload as received from the client, before it is stored.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub last_modified: Option<i64>,
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileStorageQuota {
    pub used: u64,
    pub limit: u64,
    pub available: u64,
    /// Rounded share of the limit in use, 0-100.
    pub percentage: u32,
}

impl FileStorageQuota {
    pub fn from_used(used: u64) -> Self {
        FileStorageQuota {
            used,
            limit: STORAGE_QUOTA_LIMIT,
            available: STORAGE_QUOTA_LIMIT.saturating_sub(used),
            percentage: ((used as f64 / STORAGE_QUOTA_LIMIT as f64) * 100.0).round() as u32,
        }
    }
}

pub fn is_supported_type(mime_type: &str) -> bool {
    SUPPORTED_FILE_TYPES.contains(&mime_type)
}

/// Human-readable size: "0 Bytes", "1.5 KB", "5 MB".
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(data: &str) -> StoredFile {
        StoredFile {
            metadata: FileMetadata {
                id: Uuid::new_v4(),
                name: "resume.pdf".to_string(),
                size: 5,
                mime_type: "application/pdf".to_string(),
                last_modified: 0,
                uploaded_at: Utc::now(),
                job_id: None,
            },
            data: data.to_string(),
            compressed: true,
        }
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(MAX_FILE_SIZE), "5 MB");
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
    }

    #[test]
    fn test_data_url_is_restored_once() {
        let file = stored("SGVsbG8=");
        assert_eq!(file.data_url(), "data:application/pdf;base64,SGVsbG8=");
        let expanded = file.expanded();
        assert!(!expanded.compressed);
        assert_eq!(expanded.data_url(), expanded.data);
    }

    #[test]
    fn test_stored_file_json_is_flat() {
        let value = serde_json::to_value(stored("AAAA")).unwrap();
        assert_eq!(value["type"], "application/pdf");
        assert_eq!(value["data"], "AAAA");
        assert!(value.get("metadata").is_none());
        assert!(value.get("uploadedAt").is_some());
    }

    #[test]
    fn test_quota_percentage() {
        let quota = FileStorageQuota::from_used(STORAGE_QUOTA_LIMIT / 4);
        assert_eq!(quota.percentage, 25);
        assert_eq!(quota.available, STORAGE_QUOTA_LIMIT - STORAGE_QUOTA_LIMIT / 4);

        let over = FileStorageQuota::from_used(STORAGE_QUOTA_LIMIT + 1);
        assert_eq!(over.available, 0);
    }
}
