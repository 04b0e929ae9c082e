//! Storage service facade
//!
//! Every operation normalizes its arguments, fills in defaults, delegates to
//! the [`ObjectBackend`] and wraps any fault in [`Error::Service`] with a
//! message naming the operation. The cause stays reachable through
//! `source()`, [`Error::kind`] and [`Error::code`].

use crate::backend::ObjectBackend;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use coffer_core::types::{
    BucketInfo, GetOptions, ObjectInfo, PolicyType, PostPolicy, WriteResponse,
};
use coffer_core::utils::{self, content_type, key_prefix, object_key, object_name};
use coffer_core::{
    Error, Result, ResultExt, StorageProperties, DEFAULT_GET_URL_EXPIRY,
    DEFAULT_POST_POLICY_EXPIRY, DEFAULT_PUT_URL_EXPIRY, URI_DELIMITER,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub prefix: Option<String>,
    /// Descend into "directories" instead of reporting common prefixes
    pub recursive: bool,
}

#[derive(Debug, Clone)]
pub struct UrlOptions {
    /// Rewrite the endpoint to the configured public address
    pub replace_address: bool,
    pub expiry: Duration,
}

impl Default for UrlOptions {
    fn default() -> Self {
        Self {
            replace_address: false,
            expiry: DEFAULT_GET_URL_EXPIRY,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Defaults to `application/octet-stream`
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PostFormOptions {
    /// Folder prefix, e.g. `avatars/2024`
    pub path: Option<String>,
    /// Defaults to ten minutes from now
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PresignOptions {
    pub path: Option<String>,
    pub expiry: Duration,
}

impl Default for PresignOptions {
    fn default() -> Self {
        Self {
            path: None,
            expiry: DEFAULT_PUT_URL_EXPIRY,
        }
    }
}

/// Object-storage operations over a shared backend
#[derive(Clone)]
pub struct StorageService {
    pub(crate) backend: Arc<dyn ObjectBackend>,
    pub(crate) properties: StorageProperties,
}

impl StorageService {
    pub fn new(backend: Arc<dyn ObjectBackend>, properties: StorageProperties) -> Self {
        Self {
            backend,
            properties,
        }
    }

    pub fn backend(&self) -> &Arc<dyn ObjectBackend> {
        &self.backend
    }

    pub fn properties(&self) -> &StorageProperties {
        &self.properties
    }

    /// Configured default bucket
    pub fn default_bucket(&self) -> Result<&str> {
        self.properties
            .bucket_name
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| Error::Config("Default bucket name not configured".into()))
    }

    // ------------------------------------------------------------------
    // Buckets
    // ------------------------------------------------------------------

    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.backend
            .bucket_exists(bucket)
            .await
            .context_with(|| format!("Failed to check if bucket exists: {}", bucket))
    }

    /// Create `bucket` unless it already exists
    pub async fn create_bucket(&self, bucket: &str) -> Result<bool> {
        if !self.bucket_exists(bucket).await? {
            self.backend
                .make_bucket(bucket)
                .await
                .context_with(|| format!("Failed to create bucket: {}", bucket))?;
            info!("Created bucket {}", bucket);
        }
        Ok(true)
    }

    pub async fn create_bucket_with_policy(&self, bucket: &str, policy: PolicyType) -> Result<bool> {
        self.create_bucket(bucket).await?;
        self.set_bucket_policy(bucket, policy).await
    }

    pub async fn create_bucket_with_policy_json(&self, bucket: &str, policy: &str) -> Result<bool> {
        self.create_bucket(bucket).await?;
        self.set_bucket_policy_json(bucket, policy).await
    }

    /// Apply a canned policy to an existing bucket
    pub async fn set_bucket_policy(&self, bucket: &str, policy: PolicyType) -> Result<bool> {
        debug!("Applying {} policy to {}", policy, bucket);
        self.set_bucket_policy_json(bucket, &policy.render(bucket)).await
    }

    pub async fn set_bucket_policy_json(&self, bucket: &str, policy: &str) -> Result<bool> {
        if !self.bucket_exists(bucket).await? {
            return Err(Error::NoSuchBucketNamed(bucket.to_string()));
        }

        self.backend
            .set_bucket_policy(bucket, policy)
            .await
            .context_with(|| format!("Failed to set policy on bucket: {}", bucket))?;
        Ok(true)
    }

    pub async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        self.backend
            .list_buckets()
            .await
            .context_with(|| "Failed to list buckets")
    }

    pub async fn get_bucket(&self, bucket: &str) -> Result<Option<BucketInfo>> {
        Ok(self
            .list_buckets()
            .await?
            .into_iter()
            .find(|b| b.name == bucket))
    }

    /// Remove `bucket` if it exists
    pub async fn remove_bucket(&self, bucket: &str) -> Result<bool> {
        if self.bucket_exists(bucket).await? {
            self.backend
                .remove_bucket(bucket)
                .await
                .context_with(|| format!("Failed to remove bucket: {}", bucket))?;
            info!("Removed bucket {}", bucket);
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    pub async fn list_objects(&self, bucket: &str, opts: &ListOptions) -> Result<Vec<ObjectInfo>> {
        self.backend
            .list_objects(bucket, opts.prefix.as_deref(), opts.recursive)
            .await
            .context_with(|| format!("Failed to list objects in bucket: {}", bucket))
    }

    pub async fn get_object(&self, bucket: &str, key: &str, opts: &GetOptions) -> Result<Bytes> {
        let key = object_name(key);
        self.backend
            .get_object(bucket, key, opts)
            .await
            .context_with(|| format!("Failed to get object: {} from bucket: {}", key, bucket))
    }

    /// Presigned GET URL
    pub async fn object_url(&self, bucket: &str, key: &str, opts: &UrlOptions) -> Result<String> {
        let key = object_name(key);
        let url = self
            .backend
            .presign_get(bucket, key, opts.expiry)
            .await
            .context_with(|| format!("Failed to get URL for object: {} in bucket: {}", key, bucket))?;

        Ok(if opts.replace_address {
            self.rewrite_address(&url)
        } else {
            url
        })
    }

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        opts: &PutOptions,
    ) -> Result<WriteResponse> {
        let key = object_name(key);
        let content_type = content_type(opts.content_type.as_deref());
        self.backend
            .put_object(bucket, key, content_type, data.into())
            .await
            .context_with(|| format!("Failed to put object: {} in bucket: {}", key, bucket))
    }

    /// Server-side part upload, returning the part ETag
    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: impl Into<Bytes>,
    ) -> Result<String> {
        let key = object_name(key);
        self.backend
            .upload_part(bucket, key, upload_id, part_number, data.into())
            .await
            .context_with(|| {
                format!(
                    "Failed to upload part {} of object: {} in bucket: {}",
                    part_number, key, bucket
                )
            })
    }

    pub async fn remove_object(&self, bucket: &str, key: &str) -> Result<bool> {
        let key = object_name(key);
        self.backend
            .remove_object(bucket, key)
            .await
            .context_with(|| format!("Failed to remove object: {} from bucket: {}", key, bucket))?;
        Ok(true)
    }

    /// Delete many objects, returning the keys that could not be deleted.
    ///
    /// A failed key never aborts the rest of the batch.
    pub async fn remove_objects<S: AsRef<str>>(&self, bucket: &str, keys: &[S]) -> Result<Vec<String>> {
        let keys: Vec<String> = keys
            .iter()
            .map(|k| object_name(k.as_ref()).to_string())
            .collect();

        let failures = self
            .backend
            .remove_objects(bucket, &keys)
            .await
            .context_with(|| format!("Failed to remove objects from bucket: {}", bucket))?;

        Ok(failures
            .into_iter()
            .map(|f| {
                error!(
                    "Error in deleting object {}:{}, code={}, message={}",
                    bucket,
                    f.key,
                    f.code.as_deref().unwrap_or("-"),
                    f.message.as_deref().unwrap_or("-")
                );
                f.key
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Presigning
    // ------------------------------------------------------------------

    /// Form fields for a browser POST upload of `file_name`.
    ///
    /// Field names come back without dashes (`xamzsignature`), plus `key`
    /// and `host`.
    pub async fn presigned_post_form_data(
        &self,
        bucket: &str,
        file_name: &str,
        opts: &PostFormOptions,
    ) -> Result<HashMap<String, String>> {
        let expires_at = opts
            .expires_at
            .unwrap_or_else(|| utils::expires_at(DEFAULT_POST_POLICY_EXPIRY));
        let key = format!(
            "{}{}{}",
            URI_DELIMITER,
            key_prefix(opts.path.as_deref()),
            file_name
        );

        let mut policy = PostPolicy::new(bucket, expires_at);
        policy.add_equals_condition("key", key.as_str())?;

        let signed = self
            .backend
            .presign_post_policy(&policy)
            .await
            .context_with(|| {
                format!(
                    "Failed to get presigned POST form data for file: {} in bucket: {}",
                    file_name, bucket
                )
            })?;

        let mut fields: HashMap<String, String> = signed
            .into_iter()
            .map(|(k, v)| (k.replace('-', ""), v))
            .collect();
        fields.insert("key".to_string(), key);
        fields.insert(
            "host".to_string(),
            format!("{}{}{}", self.properties.endpoint(), URI_DELIMITER, bucket),
        );
        Ok(fields)
    }

    /// Presigned PUT URL for `key` under the optional path prefix
    pub async fn presigned_put_url(
        &self,
        bucket: &str,
        key: &str,
        opts: &PresignOptions,
    ) -> Result<String> {
        let key = object_key(opts.path.as_deref(), key);
        self.backend
            .presign_put(bucket, &key, opts.expiry)
            .await
            .context_with(|| format!("Failed to get presigned PUT URL for object: {} in bucket: {}", key, bucket))
    }

    // ------------------------------------------------------------------
    // URL helpers
    // ------------------------------------------------------------------

    /// Permanent public URL of an object; the bucket must allow anonymous reads
    pub fn gateway_url(&self, bucket: &str, path: &str) -> String {
        let path = path.strip_prefix(URI_DELIMITER).unwrap_or(path);
        self.rewrite_address(&format!(
            "{}{}{}{}{}",
            self.properties.endpoint(),
            URI_DELIMITER,
            bucket,
            URI_DELIMITER,
            path
        ))
    }

    /// Replace the endpoint with the public address (or itself when unset)
    pub fn rewrite_address(&self, url: &str) -> String {
        utils::rewrite_address(url, self.properties.endpoint(), self.properties.public_address())
    }

    /// Today's `yyyy/MM/dd` folder
    pub fn date_path(&self) -> String {
        utils::date_path()
    }
}
