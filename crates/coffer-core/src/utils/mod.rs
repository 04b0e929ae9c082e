//! Key, path and time helpers

use crate::{DEFAULT_CONTENT_TYPE, URI_DELIMITER};
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use std::time::Duration;

/// Strip a single leading `/` from an object name.
///
/// A lone `/` is returned unchanged.
pub fn object_name(name: &str) -> &str {
    if name.len() > 1 {
        name.strip_prefix(URI_DELIMITER).unwrap_or(name)
    } else {
        name
    }
}

/// Normalize a key prefix: drop one leading `/`, ensure one trailing `/`.
///
/// An absent or empty path yields an empty prefix.
pub fn key_prefix(path: Option<&str>) -> String {
    let path = match path {
        Some(p) if !p.is_empty() => p,
        _ => return String::new(),
    };

    let path = path.strip_prefix(URI_DELIMITER).unwrap_or(path);
    if path.ends_with(URI_DELIMITER) {
        path.to_string()
    } else {
        format!("{}{}", path, URI_DELIMITER)
    }
}

/// Final object key for an optional path prefix and an object name
pub fn object_key(path: Option<&str>, name: &str) -> String {
    format!("{}{}", key_prefix(path), object_name(name))
}

/// `[yyyy, MM, dd]` folder components for `date`
pub fn date_folder(date: NaiveDate) -> [String; 3] {
    [
        date.year().to_string(),
        format!("{:02}", date.month()),
        format!("{:02}", date.day()),
    ]
}

/// Today's `yyyy/MM/dd` path in local time
pub fn date_path() -> String {
    date_folder(Local::now().date_naive()).join(URI_DELIMITER)
}

/// Caller content type or the octet-stream default
pub fn content_type(content_type: Option<&str>) -> &str {
    match content_type {
        Some(ct) if !ct.is_empty() => ct,
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Instant `expiry` from now
pub fn expires_at(expiry: Duration) -> DateTime<Utc> {
    let delta = chrono::Duration::from_std(expiry)
        .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)));
    Utc::now()
        .checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Replace the endpoint with the public address by substring substitution.
///
/// Not URL-aware: every occurrence of `endpoint` is replaced.
pub fn rewrite_address(url: &str, endpoint: &str, address: &str) -> String {
    if endpoint.is_empty() || address.is_empty() {
        return url.to_string();
    }
    url.replace(endpoint, address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_name() {
        assert_eq!(object_name("/a/b.txt"), "a/b.txt");
        assert_eq!(object_name("a/b.txt"), "a/b.txt");
        assert_eq!(object_name("//a"), "/a");
        assert_eq!(object_name("/"), "/");
        assert_eq!(object_name(""), "");
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix(Some("test/file")), "test/file/");
        assert_eq!(key_prefix(Some("/test/file/")), "test/file/");
        assert_eq!(key_prefix(Some("docs")), "docs/");
        assert_eq!(key_prefix(None), "");
        assert_eq!(key_prefix(Some("")), "");
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key(Some("avatars"), "/me.png"), "avatars/me.png");
        assert_eq!(object_key(None, "/me.png"), "me.png");
    }

    #[test]
    fn test_date_folder() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 5).unwrap();
        assert_eq!(date_folder(date), ["2021", "01", "05"]);

        let today = date_path();
        assert_eq!(today.split('/').count(), 3);
    }

    #[test]
    fn test_date_path_uses_local_date() {
        let before = date_folder(Local::now().date_naive()).join("/");
        let path = date_path();
        let after = date_folder(Local::now().date_naive()).join("/");
        assert!(path == before || path == after);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(None), "application/octet-stream");
        assert_eq!(content_type(Some("")), "application/octet-stream");
        assert_eq!(content_type(Some("image/png")), "image/png");
    }

    #[test]
    fn test_expires_at() {
        let before = Utc::now();
        let at = expires_at(Duration::from_secs(600));
        assert!(at >= before + chrono::Duration::seconds(600));
        assert!(at <= Utc::now() + chrono::Duration::seconds(601));
    }

    #[test]
    fn test_rewrite_address() {
        let url = "http://127.0.0.1:9000/bucket/a.txt?X-Amz-Signature=abc";
        assert_eq!(
            rewrite_address(url, "http://127.0.0.1:9000", "https://cdn.example.com"),
            "https://cdn.example.com/bucket/a.txt?X-Amz-Signature=abc"
        );
        assert_eq!(rewrite_address(url, "http://127.0.0.1:9000", ""), url);
    }
}
