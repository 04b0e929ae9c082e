//! Pre-signed URL generation
//!
//! Query-string SigV4 presigning, path-style, with caller-supplied extra
//! query parameters (e.g. `uploadId` and `partNumber` for part uploads).

use crate::signature::{self, SigningCredentials, ALGORITHM};
use chrono::{DateTime, Utc};
use coffer_core::{Error, Result, MAX_PRESIGN_EXPIRY};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

const X_AMZ_ALGORITHM: &str = "X-Amz-Algorithm";
const X_AMZ_CREDENTIAL: &str = "X-Amz-Credential";
const X_AMZ_DATE: &str = "X-Amz-Date";
const X_AMZ_EXPIRES: &str = "X-Amz-Expires";
const X_AMZ_SIGNED_HEADERS: &str = "X-Amz-SignedHeaders";
const X_AMZ_SIGNATURE: &str = "X-Amz-Signature";

const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

#[derive(Debug, Clone)]
pub struct PresignRequest {
    /// GET, PUT, ...
    pub method: String,
    pub bucket: String,
    pub key: String,
    pub expires_in: u64,
    pub extra_query: BTreeMap<String, String>,
}

impl PresignRequest {
    pub fn new(method: &str, bucket: &str, key: &str, expires_in: u64) -> Self {
        Self {
            method: method.to_uppercase(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            expires_in,
            extra_query: BTreeMap::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_query.insert(key.into(), value.into());
        self
    }

    /// `/bucket/key`, or just `/key` when no bucket is given
    fn canonical_uri(&self) -> String {
        if self.bucket.is_empty() {
            format!("/{}", signature::uri_encode(&self.key, false))
        } else {
            format!(
                "/{}/{}",
                signature::uri_encode(&self.bucket, false),
                signature::uri_encode(&self.key, false)
            )
        }
    }
}

/// Presign `request` against `endpoint` as of `now`
pub fn presign_url(
    endpoint: &str,
    request: &PresignRequest,
    credentials: &SigningCredentials,
    now: DateTime<Utc>,
) -> Result<String> {
    if request.expires_in == 0 || request.expires_in > MAX_PRESIGN_EXPIRY.as_secs() {
        return Err(Error::InvalidArgument(format!(
            "Expiry must be between 1 and {} seconds",
            MAX_PRESIGN_EXPIRY.as_secs()
        )));
    }

    let amz_date = signature::amz_date(&now);
    let date_stamp = signature::date_stamp(&now);
    let host = extract_host(endpoint)?;
    let canonical_uri = request.canonical_uri();

    let mut query = request.extra_query.clone();
    query.insert(X_AMZ_ALGORITHM.to_string(), ALGORITHM.to_string());
    query.insert(X_AMZ_CREDENTIAL.to_string(), credentials.credential(&date_stamp));
    query.insert(X_AMZ_DATE.to_string(), amz_date.clone());
    query.insert(X_AMZ_EXPIRES.to_string(), request.expires_in.to_string());
    query.insert(X_AMZ_SIGNED_HEADERS.to_string(), "host".to_string());

    let canonical_query = signature::canonical_query_string(&query);

    let canonical_request = format!(
        "{}\n{}\n{}\nhost:{}\n\nhost\n{}",
        request.method, canonical_uri, canonical_query, host, UNSIGNED_PAYLOAD
    );
    let string_to_sign = signature::string_to_sign(
        &amz_date,
        &credentials.scope(&date_stamp),
        &canonical_request,
    );
    let signature = credentials.sign(&date_stamp, &string_to_sign);

    debug!(
        "Presigned {} {} (expires in {}s)",
        request.method, canonical_uri, request.expires_in
    );

    Ok(format!(
        "{}{}?{}&{}={}",
        endpoint.trim_end_matches('/'),
        canonical_uri,
        canonical_query,
        X_AMZ_SIGNATURE,
        signature
    ))
}

/// `host[:port]` of an endpoint URL
pub fn extract_host(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint)
        .map_err(|e| Error::InvalidArgument(format!("Invalid endpoint URL {}: {}", endpoint, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidArgument(format!("No host in endpoint: {}", endpoint)))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
