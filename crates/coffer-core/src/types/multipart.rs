//! Multipart upload types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Presigned part URLs handed to a client for one logical upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartUploadInfo {
    /// Must be reused for every part of the same upload
    pub upload_id: String,
    /// Normalized key of the final object
    pub object_name: String,
    pub expires_at: DateTime<Utc>,
    /// One URL per part, ordered by part number
    pub upload_urls: Vec<String>,
}

/// A part already stored by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartInfo {
    pub part_number: i32,
    pub etag: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Part reference sent when completing an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPartRef {
    pub part_number: i32,
    pub etag: String,
}

impl From<&PartInfo> for CompletedPartRef {
    fn from(part: &PartInfo) -> Self {
        Self {
            part_number: part.part_number,
            etag: part.etag.clone(),
        }
    }
}
