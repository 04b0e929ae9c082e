//! AWS Signature V4 primitives

use chrono::{DateTime, Utc};
use coffer_crypto::{hmac_sha256, sha256_hash};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::BTreeMap;
use tracing::debug;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

const SERVICE: &str = "s3";

/// Characters left as-is by SigV4 URI encoding
const URI_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Credentials and region a request is signed for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl SigningCredentials {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
        }
    }

    /// `date/region/s3/aws4_request`
    pub fn scope(&self, date_stamp: &str) -> String {
        format!("{}/{}/{}/aws4_request", date_stamp, self.region, SERVICE)
    }

    /// `access_key/scope`
    pub fn credential(&self, date_stamp: &str) -> String {
        format!("{}/{}", self.access_key, self.scope(date_stamp))
    }

    pub fn signing_key(&self, date_stamp: &str) -> Vec<u8> {
        let k_date = hmac_sha256(
            format!("AWS4{}", self.secret_key).as_bytes(),
            date_stamp.as_bytes(),
        );
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }

    /// Hex signature of `string_to_sign`
    pub fn sign(&self, date_stamp: &str, string_to_sign: &str) -> String {
        hex::encode(hmac_sha256(
            &self.signing_key(date_stamp),
            string_to_sign.as_bytes(),
        ))
    }
}

/// `YYYYMMDD'T'HHMMSS'Z'`
pub fn amz_date(now: &DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// `YYYYMMDD`
pub fn date_stamp(now: &DateTime<Utc>) -> String {
    now.format("%Y%m%d").to_string()
}

pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let encoded = utf8_percent_encode(input, URI_UNRESERVED).to_string();
    if encode_slash {
        encoded
    } else {
        encoded.replace("%2F", "/")
    }
}

/// Sorted, encoded `k=v&...`
pub fn canonical_query_string(params: &BTreeMap<String, String>) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    pairs.sort();

    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// String to sign for a canonical request
pub fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    debug!("Canonical request:\n{}", canonical_request);

    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hash(canonical_request.as_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("a b/c~d", false), "a%20b/c~d");
        assert_eq!(uri_encode("a b/c~d", true), "a%20b%2Fc~d");
        assert_eq!(uri_encode("文件.txt", false), "%E6%96%87%E4%BB%B6.txt");
    }

    #[test]
    fn test_canonical_query_string() {
        let mut params = BTreeMap::new();
        params.insert("uploadId".to_string(), "abc=".to_string());
        params.insert("partNumber".to_string(), "2".to_string());
        params.insert("X-Amz-Expires".to_string(), "600".to_string());

        assert_eq!(
            canonical_query_string(&params),
            "X-Amz-Expires=600&partNumber=2&uploadId=abc%3D"
        );
    }

    #[test]
    fn test_signing_key_is_date_scoped() {
        let creds = SigningCredentials::new("AKID", "secret", "us-east-1");
        assert_ne!(creds.signing_key("20240101"), creds.signing_key("20240102"));
        assert_eq!(
            creds.credential("20240101"),
            "AKID/20240101/us-east-1/s3/aws4_request"
        );
    }
}
