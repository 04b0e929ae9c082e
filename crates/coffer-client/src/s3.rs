//! Object backend on the AWS SDK for S3

use crate::backend::ObjectBackend;
use crate::provider::ClientSettings;
use async_trait::async_trait;
use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Builder as S3ConfigBuilder};
use aws_sdk_s3::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime as SdkDateTime};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
    Delete, ObjectIdentifier,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use coffer_auth::{sign_post_policy, SigningCredentials};
use coffer_core::types::{
    BucketInfo, CompletedPartRef, DeleteFailure, GetOptions, ObjectInfo, PartInfo, PostPolicy,
    WriteResponse,
};
use coffer_core::{Error, ErrorKind, Result, DEFAULT_REGION, MAX_DELETE_BATCH, URI_DELIMITER};
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;

/// Service error codes reported as authentication failures
const AUTH_ERROR_CODES: &[&str] = &[
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
];

/// Largest page the service returns for ListParts
const LIST_PARTS_PAGE: i32 = 1000;

/// S3-compatible store reached through `aws-sdk-s3`
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    endpoint: String,
    signing: SigningCredentials,
}

impl S3Backend {
    /// Build the SDK client. No request is sent.
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        if settings.endpoint.is_empty() {
            return Err(Error::Config("Endpoint not configured".into()));
        }

        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            "coffer",
        );

        let s3_config = S3ConfigBuilder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&settings.endpoint)
            .force_path_style(settings.path_style)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            endpoint: settings.endpoint.clone(),
            signing: SigningCredentials::new(
                &settings.access_key,
                &settings.secret_key,
                &settings.region,
            ),
        })
    }

    /// Underlying SDK client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        debug!("HEAD bucket {}", bucket);

        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().map_or(false, |e| e.is_not_found()) => Ok(false),
            Err(err) => Err(sdk_error(err)),
        }
    }

    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        debug!("Creating bucket {}", bucket);

        let mut req = self.client.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if self.signing.region != DEFAULT_REGION {
            let constraint = BucketLocationConstraint::from(self.signing.region.as_str());
            let config = CreateBucketConfiguration::builder()
                .location_constraint(constraint)
                .build();
            req = req.create_bucket_configuration(config);
        }

        req.send().await.map_err(sdk_error)?;
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        debug!("Deleting bucket {}", bucket);

        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let resp = self.client.list_buckets().send().await.map_err(sdk_error)?;

        Ok(resp
            .buckets()
            .iter()
            .map(|b| BucketInfo {
                name: b.name().unwrap_or_default().to_string(),
                created_at: b.creation_date().and_then(to_utc),
            })
            .collect())
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        debug!("Setting policy on bucket {}", bucket);

        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_prefix(prefix.filter(|p| !p.is_empty()).map(str::to_string));

            if !recursive {
                req = req.delimiter(URI_DELIMITER);
            }
            if let Some(token) = &continuation_token {
                req = req.continuation_token(token);
            }

            let resp = req.send().await.map_err(sdk_error)?;

            for prefix in resp.common_prefixes() {
                if let Some(p) = prefix.prefix() {
                    objects.push(ObjectInfo::dir(p));
                }
            }

            for obj in resp.contents() {
                objects.push(ObjectInfo {
                    key: obj.key().unwrap_or_default().to_string(),
                    size: obj.size().unwrap_or(0),
                    last_modified: obj.last_modified().and_then(to_utc),
                    etag: obj.e_tag().map(str::to_string),
                    is_dir: false,
                    version_id: None,
                });
            }

            if resp.is_truncated().unwrap_or(false) {
                continuation_token = resp.next_continuation_token().map(str::to_string);
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        debug!("Listed {} entries in {}", objects.len(), bucket);
        Ok(objects)
    }

    async fn get_object(&self, bucket: &str, key: &str, opts: &GetOptions) -> Result<Bytes> {
        debug!("GET {}/{}", bucket, key);

        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(opts.version_id.clone())
            .set_range(opts.range())
            .send()
            .await
            .map_err(sdk_error)?;

        let data = resp.body.collect().await.map_err(|e| {
            Error::client(ErrorKind::Transport, format!("Failed to read object body: {}", e))
                .caused_by(e)
        })?;

        Ok(data.into_bytes())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<WriteResponse> {
        debug!("PUT {}/{} ({} bytes)", bucket, key, data.len());

        let resp = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(WriteResponse {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: resp.e_tag().map(str::to_string),
            version_id: resp.version_id().map(str::to_string),
            location: None,
        })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        debug!("DELETE {}/{}", bucket, key);

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn remove_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteFailure>> {
        let mut failures = Vec::new();

        for chunk in keys.chunks(MAX_DELETE_BATCH) {
            let identifiers = chunk
                .iter()
                .map(|k| ObjectIdentifier::builder().key(k).build())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(build_error)?;

            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(build_error)?;

            debug!("Deleting {} objects from {}", chunk.len(), bucket);

            let resp = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(sdk_error)?;

            failures.extend(resp.errors().iter().map(|e| DeleteFailure {
                key: e.key().unwrap_or_default().to_string(),
                code: e.code().map(str::to_string),
                message: e.message().map(str::to_string),
            }));
        }

        Ok(failures)
    }

    async fn presign_get(&self, bucket: &str, key: &str, expiry: Duration) -> Result<String> {
        let req = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning(expiry)?)
            .await
            .map_err(sdk_error)?;

        Ok(req.uri().to_string())
    }

    async fn presign_put(&self, bucket: &str, key: &str, expiry: Duration) -> Result<String> {
        let req = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning(expiry)?)
            .await
            .map_err(sdk_error)?;

        Ok(req.uri().to_string())
    }

    async fn presign_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expiry: Duration,
    ) -> Result<String> {
        let req = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(presigning(expiry)?)
            .await
            .map_err(sdk_error)?;

        Ok(req.uri().to_string())
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
        let resp = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(sdk_error)?;

        let upload_id = resp.upload_id().ok_or_else(|| {
            Error::client(ErrorKind::Protocol, "CreateMultipartUpload returned no upload id")
        })?;

        debug!("Initiated upload {} for {}/{}", upload_id, bucket, key);
        Ok(upload_id.to_string())
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<String> {
        debug!(
            "Uploading part {} of {} for {}/{} ({} bytes)",
            part_number,
            upload_id,
            bucket,
            key,
            data.len()
        );

        let resp = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(resp.e_tag().unwrap_or_default().to_string())
    }

    async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        max_parts: i32,
    ) -> Result<Vec<PartInfo>> {
        let limit = usize::try_from(max_parts.max(0)).unwrap_or(0);
        let mut parts: Vec<PartInfo> = Vec::new();
        let mut marker: Option<String> = None;

        while parts.len() < limit {
            let remaining = i32::try_from(limit - parts.len()).unwrap_or(LIST_PARTS_PAGE);

            let resp = self
                .client
                .list_parts()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .max_parts(remaining.min(LIST_PARTS_PAGE))
                .set_part_number_marker(marker.take())
                .send()
                .await
                .map_err(sdk_error)?;

            parts.extend(resp.parts().iter().map(|p| PartInfo {
                part_number: p.part_number().unwrap_or_default(),
                etag: p.e_tag().unwrap_or_default().to_string(),
                size: p.size().unwrap_or(0),
                last_modified: p.last_modified().and_then(to_utc),
            }));

            if !resp.is_truncated().unwrap_or(false) {
                break;
            }
            marker = resp.next_part_number_marker().map(str::to_string);
            if marker.is_none() {
                break;
            }
        }

        parts.truncate(limit);
        Ok(parts)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPartRef],
    ) -> Result<WriteResponse> {
        debug!(
            "Completing upload {} for {}/{} with {} parts",
            upload_id,
            bucket,
            key,
            parts.len()
        );

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|p| {
                        CompletedPart::builder()
                            .part_number(p.part_number)
                            .e_tag(&p.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        let resp = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(WriteResponse {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: resp.e_tag().map(str::to_string),
            version_id: resp.version_id().map(str::to_string),
            location: resp.location().map(str::to_string),
        })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        debug!("Aborting upload {} for {}/{}", upload_id, bucket, key);

        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}

fn presigning(expiry: Duration) -> Result<PresigningConfig> {
    PresigningConfig::expires_in(expiry)
        .map_err(|e| Error::InvalidArgument(format!("Invalid presign expiry {:?}: {}", expiry, e)))
}

fn to_utc(dt: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn build_error(err: BuildError) -> Error {
    Error::client(ErrorKind::Protocol, format!("Invalid request: {}", err)).caused_by(err)
}

/// Classify a service error code
pub(crate) fn service_error_kind(code: Option<&str>) -> ErrorKind {
    match code {
        Some(code) if AUTH_ERROR_CODES.contains(&code) => ErrorKind::Auth,
        _ => ErrorKind::Server,
    }
}

/// Translate an SDK fault into a client-level error
pub(crate) fn sdk_error<E, R>(err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let (kind, code, message) = match &err {
        SdkError::ServiceError(ctx) => {
            let code = ctx.err().code().map(str::to_string);
            let message = ctx
                .err()
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
            (service_error_kind(code.as_deref()), code, message)
        }
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            (ErrorKind::Transport, None, DisplayErrorContext(&err).to_string())
        }
        _ => (ErrorKind::Protocol, None, DisplayErrorContext(&err).to_string()),
    };

    Error::Client {
        kind,
        code,
        message,
        source: Some(Box::new(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::get_object::GetObjectError;

    fn backend() -> S3Backend {
        S3Backend::new(&ClientSettings {
            endpoint: "http://127.0.0.1:9000".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            path_style: true,
        })
        .unwrap()
    }

    fn service_error(code: &str) -> SdkError<GetObjectError, ()> {
        let meta = ErrorMetadata::builder()
            .code(code)
            .message("request failed")
            .build();
        SdkError::service_error(GetObjectError::generic(meta), ())
    }

    #[tokio::test]
    async fn test_presign_get_offline() {
        let url = backend()
            .presign_get("photos", "2024/01/02/cat.png", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(url.starts_with("http://127.0.0.1:9000/photos/2024/01/02/cat.png?"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn test_presign_upload_part_offline() {
        let url = backend()
            .presign_upload_part("photos", "big.bin", "upload-1", 2, Duration::from_secs(600))
            .await
            .unwrap();

        assert!(url.contains("uploadId=upload-1"));
        assert!(url.contains("partNumber=2"));
    }

    #[tokio::test]
    async fn test_presign_rejects_long_expiry() {
        let err = backend()
            .presign_put("photos", "a.txt", Duration::from_secs(8 * 24 * 3600))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_auth_codes() {
        for code in AUTH_ERROR_CODES {
            let err = sdk_error(service_error(code));
            assert_eq!(err.kind(), ErrorKind::Auth);
            assert_eq!(err.code(), Some(*code));
        }
    }

    #[test]
    fn test_server_code() {
        let err = sdk_error(service_error("NoSuchKey"));
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.code(), Some("NoSuchKey"));
        assert_eq!(err.to_string(), "server error: request failed");
    }

    #[test]
    fn test_transport_and_protocol() {
        let timeout: SdkError<GetObjectError, ()> = SdkError::timeout_error("timed out");
        assert_eq!(sdk_error(timeout).kind(), ErrorKind::Transport);

        let construction: SdkError<GetObjectError, ()> =
            SdkError::construction_failure("bad request");
        assert_eq!(sdk_error(construction).kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_missing_endpoint() {
        let err = S3Backend::new(&ClientSettings {
            endpoint: String::new(),
            access_key: "a".into(),
            secret_key: "b".into(),
            region: "us-east-1".into(),
            path_style: true,
        })
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
