//! Hash utilities

use digest::Digest;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn md5_hash(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn sha256_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// ETag of a completed multipart upload: MD5(concat(part md5s))-count
pub fn multipart_etag(part_etags: &[String]) -> String {
    let mut hasher = Md5::new();

    for etag in part_etags {
        let clean = etag.trim_matches('"');
        if let Ok(bytes) = hex::decode(clean) {
            hasher.update(&bytes);
        }
    }

    format!("{}-{}", hex::encode(hasher.finalize()), part_etags.len())
}
