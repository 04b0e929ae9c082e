//! Multipart upload orchestration
//!
//! A browser or other client uploads large files directly to the store:
//!
//! 1. [`StorageService::presigned_multipart_urls`] initiates the upload and
//!    hands out one presigned PUT per part, all sharing one `uploadId`.
//! 2. The client PUTs each part to its URL.
//! 3. [`StorageService::merge_multipart_upload`] lists the stored parts and
//!    completes the upload.
//!
//! Nothing is aborted automatically: an interrupted upload stays pending
//! until [`StorageService::abort_multipart_upload`] is called or the
//! bucket's lifecycle rules reclaim it.

use crate::service::StorageService;
use coffer_core::types::{CompletedPartRef, MultipartUploadInfo};
use coffer_core::utils::{self, content_type, object_key, object_name};
use coffer_core::{
    Error, Result, ResultExt, DEFAULT_MAX_PARTS, DEFAULT_MULTIPART_URL_EXPIRY, MAX_PARTS,
};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub path: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MultipartOptions {
    pub path: Option<String>,
    pub content_type: Option<String>,
    /// Lifetime of each part URL
    pub expiry: Duration,
}

impl Default for MultipartOptions {
    fn default() -> Self {
        Self {
            path: None,
            content_type: None,
            expiry: DEFAULT_MULTIPART_URL_EXPIRY,
        }
    }
}

fn check_part_number(part_number: i32) -> Result<()> {
    if !(1..=MAX_PARTS).contains(&part_number) {
        return Err(Error::InvalidArgument(format!(
            "Part number {} out of range 1..={}",
            part_number, MAX_PARTS
        )));
    }
    Ok(())
}

impl StorageService {
    /// Initiate a multipart upload, returning its upload id
    pub async fn init_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        opts: &InitOptions,
    ) -> Result<String> {
        let key = object_key(opts.path.as_deref(), key);
        let upload_id = self
            .backend
            .create_multipart_upload(bucket, &key, content_type(opts.content_type.as_deref()))
            .await
            .context_with(|| {
                format!(
                    "Failed to initiate multipart upload for object: {} in bucket: {}",
                    key, bucket
                )
            })?;

        info!("Initiated multipart upload {} for {}/{}", upload_id, bucket, key);
        Ok(upload_id)
    }

    /// Initiate an upload and presign `part_count` part URLs
    pub async fn presigned_multipart_urls(
        &self,
        bucket: &str,
        key: &str,
        part_count: i32,
        opts: &MultipartOptions,
    ) -> Result<MultipartUploadInfo> {
        if !(1..=MAX_PARTS).contains(&part_count) {
            return Err(Error::InvalidArgument(format!(
                "Part count must be between 1 and {}",
                MAX_PARTS
            )));
        }

        let init = InitOptions {
            path: opts.path.clone(),
            content_type: opts.content_type.clone(),
        };
        let upload_id = self.init_multipart_upload(bucket, key, &init).await?;

        let part_numbers: Vec<i32> = (1..=part_count).collect();
        self.presigned_multipart_urls_for_parts(&upload_id, bucket, key, &part_numbers, opts)
            .await
    }

    /// Presign part URLs for an existing upload, e.g. to resume it
    pub async fn presigned_multipart_urls_for_parts(
        &self,
        upload_id: &str,
        bucket: &str,
        key: &str,
        part_numbers: &[i32],
        opts: &MultipartOptions,
    ) -> Result<MultipartUploadInfo> {
        let key = object_key(opts.path.as_deref(), key);
        let mut upload_urls = Vec::with_capacity(part_numbers.len());

        for &part_number in part_numbers {
            check_part_number(part_number)?;

            let url = self
                .backend
                .presign_upload_part(bucket, &key, upload_id, part_number, opts.expiry)
                .await
                .context_with(|| {
                    format!(
                        "Failed to get presigned multipart upload URLs for object: {} in bucket: {}",
                        key, bucket
                    )
                })?;
            upload_urls.push(url);
        }

        debug!(
            "Presigned {} part URLs for upload {} of {}/{}",
            upload_urls.len(),
            upload_id,
            bucket,
            key
        );

        Ok(MultipartUploadInfo {
            upload_id: upload_id.to_string(),
            object_name: key,
            expires_at: utils::expires_at(opts.expiry),
            upload_urls,
        })
    }

    /// Part numbers already stored, at most `max_parts` (default 1000)
    pub async fn list_uploaded_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        max_parts: Option<i32>,
    ) -> Result<Vec<i32>> {
        let key = object_name(key);
        let parts = self
            .backend
            .list_parts(bucket, key, upload_id, max_parts.unwrap_or(DEFAULT_MAX_PARTS))
            .await
            .context_with(|| {
                format!(
                    "Failed to list multipart upload parts for object: {} in bucket: {}, upload ID: {}",
                    key, bucket, upload_id
                )
            })?;

        Ok(parts.into_iter().map(|p| p.part_number).collect())
    }

    /// Complete the upload from its stored parts, returning the object's
    /// public URL
    pub async fn merge_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        max_parts: Option<i32>,
    ) -> Result<String> {
        let key = object_name(key);
        let context = || {
            format!(
                "Failed to merge multipart upload for object: {} in bucket: {}, upload ID: {}",
                key, bucket, upload_id
            )
        };

        let parts = self
            .backend
            .list_parts(bucket, key, upload_id, max_parts.unwrap_or(DEFAULT_MAX_PARTS))
            .await
            .context_with(context)?;

        let parts: Vec<CompletedPartRef> = parts.iter().map(CompletedPartRef::from).collect();
        let resp = self
            .backend
            .complete_multipart_upload(bucket, key, upload_id, &parts)
            .await
            .context_with(context)?;

        info!(
            "Merged {} parts of upload {} into {}/{}",
            parts.len(),
            upload_id,
            bucket,
            resp.key
        );
        Ok(self.gateway_url(bucket, &resp.key))
    }

    /// Abandon an upload and discard its parts
    pub async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<bool> {
        let key = object_name(key);
        self.backend
            .abort_multipart_upload(bucket, key, upload_id)
            .await
            .context_with(|| {
                format!(
                    "Failed to abort multipart upload for object: {} in bucket: {}, upload ID: {}",
                    key, bucket, upload_id
                )
            })?;

        info!("Aborted multipart upload {} for {}/{}", upload_id, bucket, key);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{service, service_with};
    use coffer_core::types::GetOptions;
    use coffer_core::ErrorKind;

    fn query_value<'a>(url: &'a str, name: &str) -> Option<&'a str> {
        let query = url.split_once('?')?.1;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }

    #[tokio::test]
    async fn test_part_urls_share_upload_id() {
        let (svc, _) = service();
        svc.create_bucket("uploads").await.unwrap();

        let info = svc
            .presigned_multipart_urls(
                "uploads",
                "/movie.mp4",
                3,
                &MultipartOptions {
                    path: Some("2024/05".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(info.object_name, "2024/05/movie.mp4");
        assert_eq!(info.upload_urls.len(), 3);
        for (i, url) in info.upload_urls.iter().enumerate() {
            assert_eq!(query_value(url, "uploadId"), Some(info.upload_id.as_str()));
            assert_eq!(query_value(url, "partNumber"), Some((i + 1).to_string().as_str()));
            assert_eq!(query_value(url, "X-Amz-Expires"), Some("600"));
        }
    }

    #[tokio::test]
    async fn test_resume_with_part_numbers() {
        let (svc, _) = service();
        svc.create_bucket("uploads").await.unwrap();
        let id = svc
            .init_multipart_upload("uploads", "big.bin", &InitOptions::default())
            .await
            .unwrap();

        let info = svc
            .presigned_multipart_urls_for_parts(&id, "uploads", "big.bin", &[4, 7], &MultipartOptions::default())
            .await
            .unwrap();
        assert_eq!(info.upload_id, id);
        assert_eq!(query_value(&info.upload_urls[1], "partNumber"), Some("7"));

        let err = svc
            .presigned_multipart_urls_for_parts(&id, "uploads", "big.bin", &[0], &MultipartOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_merge_returns_public_url() {
        let (svc, mem) = service_with("https://files.example.com");
        svc.create_bucket("uploads").await.unwrap();
        let id = svc
            .init_multipart_upload(
                "uploads",
                "report.pdf",
                &InitOptions {
                    path: Some("docs".into()),
                    content_type: Some("application/pdf".into()),
                },
            )
            .await
            .unwrap();

        svc.upload_part("uploads", "docs/report.pdf", &id, 1, "part one, ")
            .await
            .unwrap();
        svc.upload_part("uploads", "docs/report.pdf", &id, 2, "part two")
            .await
            .unwrap();
        assert_eq!(
            svc.list_uploaded_parts("uploads", "/docs/report.pdf", &id, None)
                .await
                .unwrap(),
            vec![1, 2]
        );

        let url = svc
            .merge_multipart_upload("uploads", "/docs/report.pdf", &id, None)
            .await
            .unwrap();
        assert_eq!(url, "https://files.example.com/uploads/docs/report.pdf");

        let data = svc
            .get_object("uploads", "docs/report.pdf", &GetOptions::default())
            .await
            .unwrap();
        assert_eq!(data, "part one, part two");
        assert_eq!(
            mem.content_type("uploads", "docs/report.pdf").as_deref(),
            Some("application/pdf")
        );
    }

    #[tokio::test]
    async fn test_abort() {
        let (svc, mem) = service();
        svc.create_bucket("uploads").await.unwrap();
        let id = svc
            .init_multipart_upload("uploads", "a.bin", &InitOptions::default())
            .await
            .unwrap();
        assert_eq!(mem.pending_uploads(), 1);

        assert!(svc.abort_multipart_upload("uploads", "a.bin", &id).await.unwrap());
        assert_eq!(mem.pending_uploads(), 0);

        let err = svc
            .merge_multipart_upload("uploads", "a.bin", &id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.code(), Some("NoSuchUpload"));
    }

    #[tokio::test]
    async fn test_rejects_bad_part_count() {
        let (svc, mem) = service();
        svc.create_bucket("uploads").await.unwrap();

        let err = svc
            .presigned_multipart_urls("uploads", "a.bin", 0, &MultipartOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(mem.pending_uploads(), 0);
    }
}
