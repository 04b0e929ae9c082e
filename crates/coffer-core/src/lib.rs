//! Coffer Core Library
//!
//! Configuration, error types, data model and key helpers shared by the
//! Coffer object-storage facade.

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

use std::time::Duration;

pub use config::{CofferConfig, LoggingConfig, StorageProperties};
pub use error::{Error, ErrorKind, Result, ResultExt};

/// Coffer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix of every configuration environment variable
pub const ENV_PREFIX: &str = "COFFER_STORAGE";

/// Object key / URL path separator
pub const URI_DELIMITER: &str = "/";

/// Default S3 region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Content type used when the caller does not supply one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Default expiry of presigned GET URLs (7 days)
pub const DEFAULT_GET_URL_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default expiry of presigned PUT URLs (5 minutes)
pub const DEFAULT_PUT_URL_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// Default expiry of presigned multipart part URLs (10 minutes)
pub const DEFAULT_MULTIPART_URL_EXPIRY: Duration = Duration::from_secs(10 * 60);

/// Default lifetime of a browser POST policy (10 minutes)
pub const DEFAULT_POST_POLICY_EXPIRY: Duration = Duration::from_secs(10 * 60);

/// Longest expiry accepted by SigV4 presigning
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default page size when listing multipart parts
pub const DEFAULT_MAX_PARTS: i32 = 1000;

/// Maximum number of parts in multipart upload
pub const MAX_PARTS: i32 = 10_000;

/// Maximum keys per DeleteObjects request
pub const MAX_DELETE_BATCH: usize = 1000;
