//! Output helpers

use chrono::{DateTime, Utc};

/// Format a datetime for display
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Optional datetime padded to a fixed column width
pub fn format_optional_datetime(dt: Option<&DateTime<Utc>>) -> String {
    dt.map(format_datetime)
        .unwrap_or_else(|| " ".repeat(19))
}

/// Format size as human readable
pub fn format_size(bytes: i64, human_readable: bool) -> String {
    if human_readable {
        humansize::format_size(bytes.max(0) as u64, humansize::BINARY)
    } else {
        bytes.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_datetime() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_datetime(&dt), "2024-01-02 03:04:05");
        assert_eq!(format_optional_datetime(None).len(), 19);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(1024, false), "1024");
        assert!(format_size(1024, true).contains("KiB"));
    }
}
