//! Object-store client seam

use async_trait::async_trait;
use bytes::Bytes;
use coffer_core::types::{
    BucketInfo, CompletedPartRef, DeleteFailure, GetOptions, ObjectInfo, PartInfo, PostPolicy,
    WriteResponse,
};
use coffer_core::Result;
use std::collections::HashMap;
use std::time::Duration;

/// Operations the storage service needs from an S3-compatible client
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Endpoint URL requests are sent to
    fn endpoint(&self) -> &str;

    /// Check if bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn make_bucket(&self, bucket: &str) -> Result<()>;

    async fn remove_bucket(&self, bucket: &str) -> Result<()>;

    async fn list_buckets(&self) -> Result<Vec<BucketInfo>>;

    /// Replace the bucket policy with a JSON document
    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()>;

    /// Every object under `prefix`, following continuation tokens.
    /// Non-recursive listings report common prefixes as directory entries.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<ObjectInfo>>;

    async fn get_object(&self, bucket: &str, key: &str, opts: &GetOptions) -> Result<Bytes>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<WriteResponse>;

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Batch delete; keys the server refused are returned, never raised
    async fn remove_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteFailure>>;

    async fn presign_get(&self, bucket: &str, key: &str, expiry: Duration) -> Result<String>;

    async fn presign_put(&self, bucket: &str, key: &str, expiry: Duration) -> Result<String>;

    /// Presigned PUT carrying `uploadId` and `partNumber`
    async fn presign_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expiry: Duration,
    ) -> Result<String>;

    /// Signed form fields for a browser POST upload
    async fn presign_post_policy(&self, policy: &PostPolicy) -> Result<HashMap<String, String>>;

    /// Initiate a multipart upload, returning its upload id
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String>;

    /// Upload one part, returning its ETag
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<String>;

    /// Up to `max_parts` uploaded parts, ascending by part number
    async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        max_parts: i32,
    ) -> Result<Vec<PartInfo>>;

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPartRef],
    ) -> Result<WriteResponse>;

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str)
        -> Result<()>;
}
