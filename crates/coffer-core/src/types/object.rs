//! Bucket and object descriptions returned by the storage client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    /// Common prefix of a non-recursive listing
    pub is_dir: bool,
    pub version_id: Option<String>,
}

impl ObjectInfo {
    /// Directory entry for a common prefix
    pub fn dir(prefix: impl Into<String>) -> Self {
        Self {
            key: prefix.into(),
            size: 0,
            last_modified: None,
            etag: None,
            is_dir: true,
            version_id: None,
        }
    }
}

/// Result of a write (put or multipart completion)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub bucket: String,
    pub key: String,
    pub etag: Option<String>,
    pub version_id: Option<String>,
    pub location: Option<String>,
}

/// One key the server refused to delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFailure {
    pub key: String,
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Byte range and version selection for reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub version_id: Option<String>,
    pub offset: Option<u64>,
    /// Only honored together with `offset`
    pub length: Option<u64>,
}

impl GetOptions {
    /// HTTP `Range` header value, if a range was requested
    pub fn range(&self) -> Option<String> {
        let offset = self.offset?;
        Some(match self.length {
            Some(0) | None => format!("bytes={}-", offset),
            Some(len) => format!("bytes={}-{}", offset, offset.saturating_add(len - 1)),
        })
    }
}
