//! In-process object backend
//!
//! Keeps buckets, objects and multipart uploads in memory behind a
//! `parking_lot::RwLock`. Service errors carry the same codes an S3 server
//! would send (`NoSuchBucket`, `NoSuchKey`, `NoSuchUpload`, ...). Presigned
//! URLs are signed with SigV4 so they look exactly like real ones.

use crate::backend::ObjectBackend;
use crate::provider::ClientSettings;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use coffer_auth::{presign_url, sign_post_policy, PresignRequest, SigningCredentials};
use coffer_core::types::{
    BucketInfo, CompletedPartRef, DeleteFailure, GetOptions, ObjectInfo, PartInfo, PolicyDocument,
    PostPolicy, WriteResponse,
};
use coffer_core::{Error, ErrorKind, Result, URI_DELIMITER};
use coffer_crypto::{md5_hash, multipart_etag};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    etag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StoredBucket {
    created_at: Option<DateTime<Utc>>,
    policy: Option<String>,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Debug, Clone)]
struct StoredPart {
    data: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
struct Upload {
    bucket: String,
    key: String,
    content_type: String,
    parts: BTreeMap<i32, StoredPart>,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, StoredBucket>,
    uploads: HashMap<String, Upload>,
}

pub struct MemoryBackend {
    endpoint: String,
    signing: SigningCredentials,
    state: RwLock<State>,
}

impl MemoryBackend {
    pub fn new(endpoint: impl Into<String>, signing: SigningCredentials) -> Self {
        Self {
            endpoint: endpoint.into(),
            signing,
            state: RwLock::new(State::default()),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self::new(
            &settings.endpoint,
            SigningCredentials::new(
                &settings.access_key,
                &settings.secret_key,
                &settings.region,
            ),
        )
    }

    /// Stored bucket policy, if any
    pub fn bucket_policy(&self, bucket: &str) -> Option<String> {
        self.state
            .read()
            .buckets
            .get(bucket)
            .and_then(|b| b.policy.clone())
    }

    /// Content type an object was stored with
    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.state
            .read()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.content_type.clone())
    }

    /// Number of uploads neither completed nor aborted
    pub fn pending_uploads(&self) -> usize {
        self.state.read().uploads.len()
    }

    fn presign(
        &self,
        method: &str,
        bucket: &str,
        key: &str,
        expiry: Duration,
        query: &[(&str, String)],
    ) -> Result<String> {
        let mut request = PresignRequest::new(method, bucket, key, expiry.as_secs());
        for (k, v) in query {
            request = request.with_query(*k, v.clone());
        }
        presign_url(&self.endpoint, &request, &self.signing, Utc::now())
    }
}

fn no_such_bucket(bucket: &str) -> Error {
    Error::with_code(
        ErrorKind::Server,
        "NoSuchBucket",
        format!("The specified bucket does not exist: {}", bucket),
    )
}

fn no_such_key(key: &str) -> Error {
    Error::with_code(
        ErrorKind::Server,
        "NoSuchKey",
        format!("The specified key does not exist: {}", key),
    )
}

fn no_such_upload(upload_id: &str) -> Error {
    Error::with_code(
        ErrorKind::Server,
        "NoSuchUpload",
        format!("The specified upload does not exist: {}", upload_id),
    )
}

fn quoted_md5(data: &[u8]) -> String {
    format!("\"{}\"", md5_hash(data))
}

fn slice_range(data: &Bytes, opts: &GetOptions) -> Result<Bytes> {
    let len = data.len() as u64;
    let Some(offset) = opts.offset else {
        return Ok(data.clone());
    };
    if offset >= len && len > 0 {
        return Err(Error::with_code(
            ErrorKind::Server,
            "InvalidRange",
            "The requested range is not satisfiable",
        ));
    }

    let end = match opts.length {
        Some(0) | None => len,
        Some(n) => offset.saturating_add(n).min(len),
    };
    let start = usize::try_from(offset.min(len)).unwrap_or(data.len());
    let end = usize::try_from(end).unwrap_or(data.len());
    Ok(data.slice(start..end))
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.state.read().buckets.contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.buckets.contains_key(bucket) {
            return Err(Error::with_code(
                ErrorKind::Server,
                "BucketAlreadyOwnedByYou",
                format!("Bucket already exists: {}", bucket),
            ));
        }

        debug!("Creating bucket {}", bucket);
        state.buckets.insert(
            bucket.to_string(),
            StoredBucket {
                created_at: Some(Utc::now()),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.state.write();
        let stored = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        if !stored.objects.is_empty() {
            return Err(Error::with_code(
                ErrorKind::Server,
                "BucketNotEmpty",
                format!("The bucket you tried to delete is not empty: {}", bucket),
            ));
        }

        state.buckets.remove(bucket);
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        Ok(self
            .state
            .read()
            .buckets
            .iter()
            .map(|(name, b)| BucketInfo {
                name: name.clone(),
                created_at: b.created_at,
            })
            .collect())
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        PolicyDocument::from_json(policy).map_err(|e| {
            Error::with_code(ErrorKind::Server, "MalformedPolicy", e.to_string())
        })?;

        let mut state = self.state.write();
        let stored = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        stored.policy = Some(policy.to_string());
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<ObjectInfo>> {
        let state = self.state.read();
        let stored = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        let prefix = prefix.unwrap_or("");

        let mut dirs = BTreeSet::new();
        let mut objects = Vec::new();

        for (key, obj) in stored.objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };

            if !recursive {
                if let Some(idx) = rest.find(URI_DELIMITER) {
                    dirs.insert(format!("{}{}", prefix, &rest[..=idx]));
                    continue;
                }
            }

            objects.push(ObjectInfo {
                key: key.clone(),
                size: obj.data.len() as i64,
                last_modified: Some(obj.last_modified),
                etag: Some(obj.etag.clone()),
                is_dir: false,
                version_id: None,
            });
        }

        Ok(dirs.into_iter().map(ObjectInfo::dir).chain(objects).collect())
    }

    async fn get_object(&self, bucket: &str, key: &str, opts: &GetOptions) -> Result<Bytes> {
        let state = self.state.read();
        let stored = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        let obj = stored.objects.get(key).ok_or_else(|| no_such_key(key))?;

        slice_range(&obj.data, opts)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<WriteResponse> {
        let mut state = self.state.write();
        let stored = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;

        let etag = quoted_md5(&data);
        debug!("PUT {}/{} ({} bytes)", bucket, key, data.len());
        stored.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                etag: etag.clone(),
                last_modified: Utc::now(),
            },
        );

        Ok(WriteResponse {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: Some(etag),
            ..Default::default()
        })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut state = self.state.write();
        let stored = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        stored.objects.remove(key);
        Ok(())
    }

    async fn remove_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteFailure>> {
        let mut state = self.state.write();
        let stored = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;

        let mut failures = Vec::new();
        for key in keys {
            if stored.objects.remove(key).is_none() {
                failures.push(DeleteFailure {
                    key: key.clone(),
                    code: Some("NoSuchKey".to_string()),
                    message: Some("The specified key does not exist.".to_string()),
                });
            }
        }
        Ok(failures)
    }

    async fn presign_get(&self, bucket: &str, key: &str, expiry: Duration) -> Result<String> {
        self.presign("GET", bucket, key, expiry, &[])
    }

    async fn presign_put(&self, bucket: &str, key: &str, expiry: Duration) -> Result<String> {
        self.presign("PUT", bucket, key, expiry, &[])
    }

    async fn presign_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expiry: Duration,
    ) -> Result<String> {
        self.presign(
            "PUT",
            bucket,
            key,
            expiry,
            &[
                ("uploadId", upload_id.to_string()),
                ("partNumber", part_number.to_string()),
            ],
        )
    }

    async fn presign_post_policy(&self, policy: &PostPolicy) -> Result<HashMap<String, String>> {
        Ok(sign_post_policy(policy, &self.signing, Utc::now()))
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String> {
        let mut state = self.state.write();
        if !state.buckets.contains_key(bucket) {
            return Err(no_such_bucket(bucket));
        }

        let upload_id = Uuid::new_v4().to_string();
        state.uploads.insert(
            upload_id.clone(),
            Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );

        debug!("Initiated upload {} for {}/{}", upload_id, bucket, key);
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<String> {
        if !(1..=coffer_core::MAX_PARTS).contains(&part_number) {
            return Err(Error::with_code(
                ErrorKind::Server,
                "InvalidArgument",
                format!("Part number must be between 1 and {}", coffer_core::MAX_PARTS),
            ));
        }

        let mut state = self.state.write();
        let upload = state
            .uploads
            .get_mut(upload_id)
            .filter(|u| u.bucket == bucket && u.key == key)
            .ok_or_else(|| no_such_upload(upload_id))?;

        let etag = quoted_md5(&data);
        upload.parts.insert(
            part_number,
            StoredPart {
                data,
                etag: etag.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(etag)
    }

    async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        max_parts: i32,
    ) -> Result<Vec<PartInfo>> {
        let state = self.state.read();
        let upload = state
            .uploads
            .get(upload_id)
            .filter(|u| u.bucket == bucket && u.key == key)
            .ok_or_else(|| no_such_upload(upload_id))?;

        Ok(upload
            .parts
            .iter()
            .take(usize::try_from(max_parts.max(0)).unwrap_or(0))
            .map(|(number, part)| PartInfo {
                part_number: *number,
                etag: part.etag.clone(),
                size: part.data.len() as i64,
                last_modified: Some(part.last_modified),
            })
            .collect())
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPartRef],
    ) -> Result<WriteResponse> {
        let mut state = self.state.write();
        let upload = state
            .uploads
            .get(upload_id)
            .filter(|u| u.bucket == bucket && u.key == key)
            .ok_or_else(|| no_such_upload(upload_id))?;

        if parts.is_empty() {
            return Err(Error::with_code(
                ErrorKind::Server,
                "MalformedXML",
                "The XML you provided was not well-formed",
            ));
        }

        let mut data = BytesMut::new();
        let mut etags = Vec::with_capacity(parts.len());
        let mut previous = 0;
        for part in parts {
            if part.part_number <= previous {
                return Err(Error::with_code(
                    ErrorKind::Server,
                    "InvalidPartOrder",
                    "The list of parts was not in ascending order",
                ));
            }
            previous = part.part_number;

            let stored = upload
                .parts
                .get(&part.part_number)
                .filter(|p| p.etag.trim_matches('"') == part.etag.trim_matches('"'))
                .ok_or_else(|| {
                    Error::with_code(
                        ErrorKind::Server,
                        "InvalidPart",
                        format!("One or more of the specified parts could not be found: {}", part.part_number),
                    )
                })?;
            data.extend_from_slice(&stored.data);
            etags.push(stored.etag.clone());
        }

        let content_type = upload.content_type.clone();
        let etag = format!("\"{}\"", multipart_etag(&etags));
        state.uploads.remove(upload_id);

        let stored = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        stored.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.freeze(),
                content_type,
                etag: etag.clone(),
                last_modified: Utc::now(),
            },
        );

        debug!("Completed upload {} for {}/{}", upload_id, bucket, key);
        Ok(WriteResponse {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: Some(etag),
            version_id: None,
            location: Some(format!(
                "{}/{}/{}",
                self.endpoint.trim_end_matches('/'),
                bucket,
                key
            )),
        })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        let mut state = self.state.write();
        let matches = state
            .uploads
            .get(upload_id)
            .map_or(false, |u| u.bucket == bucket && u.key == key);
        if !matches {
            return Err(no_such_upload(upload_id));
        }

        state.uploads.remove(upload_id);
        debug!("Aborted upload {} for {}/{}", upload_id, bucket, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryBackend {
        MemoryBackend::new(
            "http://127.0.0.1:9000",
            SigningCredentials::new("minioadmin", "minioadmin", "us-east-1"),
        )
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let mem = backend();
        assert!(!mem.bucket_exists("photos").await.unwrap());

        mem.make_bucket("photos").await.unwrap();
        assert!(mem.bucket_exists("photos").await.unwrap());

        let err = mem.make_bucket("photos").await.unwrap_err();
        assert_eq!(err.code(), Some("BucketAlreadyOwnedByYou"));

        mem.put_object("photos", "a.txt", "text/plain", Bytes::from_static(b"a"))
            .await
            .unwrap();
        let err = mem.remove_bucket("photos").await.unwrap_err();
        assert_eq!(err.code(), Some("BucketNotEmpty"));

        mem.remove_object("photos", "a.txt").await.unwrap();
        mem.remove_bucket("photos").await.unwrap();
        assert!(mem.list_buckets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_with_delimiter() {
        let mem = backend();
        mem.make_bucket("docs").await.unwrap();
        for key in ["a.txt", "2024/01/x.txt", "2024/02/y.txt", "notes/z.md"] {
            mem.put_object("docs", key, "text/plain", Bytes::from_static(b"x"))
                .await
                .unwrap();
        }

        let top = mem.list_objects("docs", None, false).await.unwrap();
        let keys: Vec<_> = top.iter().map(|o| (o.key.as_str(), o.is_dir)).collect();
        assert_eq!(
            keys,
            vec![("2024/", true), ("notes/", true), ("a.txt", false)]
        );

        let nested = mem.list_objects("docs", Some("2024/"), false).await.unwrap();
        assert_eq!(nested.len(), 2);
        assert!(nested.iter().all(|o| o.is_dir));

        let all = mem.list_objects("docs", Some("2024/"), true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|o| !o.is_dir));
    }

    #[tokio::test]
    async fn test_ranged_get() {
        let mem = backend();
        mem.make_bucket("b").await.unwrap();
        mem.put_object("b", "k", "text/plain", Bytes::from_static(b"hello world"))
            .await
            .unwrap();

        let opts = GetOptions {
            offset: Some(6),
            length: Some(5),
            ..Default::default()
        };
        assert_eq!(mem.get_object("b", "k", &opts).await.unwrap(), "world");

        let to_end = GetOptions {
            offset: Some(6),
            length: Some(u64::MAX),
            ..Default::default()
        };
        assert_eq!(mem.get_object("b", "k", &to_end).await.unwrap(), "world");
        assert!(to_end.range().is_some());

        let err = mem
            .get_object("b", "missing", &GetOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("NoSuchKey"));
    }

    #[tokio::test]
    async fn test_multipart_roundtrip() {
        let mem = backend();
        mem.make_bucket("b").await.unwrap();
        let id = mem
            .create_multipart_upload("b", "big.bin", "application/zip")
            .await
            .unwrap();

        mem.upload_part("b", "big.bin", &id, 2, Bytes::from_static(b"world"))
            .await
            .unwrap();
        mem.upload_part("b", "big.bin", &id, 1, Bytes::from_static(b"hello "))
            .await
            .unwrap();

        let parts = mem.list_parts("b", "big.bin", &id, 1000).await.unwrap();
        assert_eq!(
            parts.iter().map(|p| p.part_number).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let refs: Vec<CompletedPartRef> = parts.iter().map(CompletedPartRef::from).collect();
        let resp = mem
            .complete_multipart_upload("b", "big.bin", &id, &refs)
            .await
            .unwrap();
        assert!(resp.etag.unwrap().ends_with("-2\""));
        assert_eq!(
            mem.get_object("b", "big.bin", &GetOptions::default()).await.unwrap(),
            "hello world"
        );
        assert_eq!(mem.content_type("b", "big.bin").as_deref(), Some("application/zip"));
        assert_eq!(mem.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn test_abort_unknown_upload() {
        let mem = backend();
        mem.make_bucket("b").await.unwrap();
        let err = mem.abort_multipart_upload("b", "k", "nope").await.unwrap_err();
        assert_eq!(err.code(), Some("NoSuchUpload"));
    }

    #[tokio::test]
    async fn test_rejects_malformed_policy() {
        let mem = backend();
        mem.make_bucket("b").await.unwrap();

        let err = mem.set_bucket_policy("b", "{\"Version\":").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.code(), Some("MalformedPolicy"));
        assert!(mem.bucket_policy("b").is_none());

        let policy = r#"{"Statement":[{"Effect":"Allow","Action":"s3:GetObject","Resource":"arn:aws:s3:::b/*"}]}"#;
        mem.set_bucket_policy("b", policy).await.unwrap();
        assert_eq!(mem.bucket_policy("b").as_deref(), Some(policy));
    }
}
