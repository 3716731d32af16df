//! Date/time helpers for Sharebox.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a database datetime (`YYYY-MM-DD HH:MM:SS`, UTC) or an RFC3339 string.
pub fn parse_db_datetime(datetime_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(datetime_str) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Convert a database datetime string to RFC3339 for API responses.
///
/// Strings that cannot be parsed are returned unchanged.
pub fn to_rfc3339(datetime_str: &str) -> String {
    parse_db_datetime(datetime_str)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| datetime_str.to_string())
}

/// Convert a Unix timestamp in seconds, as carried by session tokens.
pub fn from_unix_seconds(secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_to_rfc3339() {
        assert_eq!(to_rfc3339("2024-01-15 10:30:00"), "2024-01-15T10:30:00Z");
        assert_eq!(to_rfc3339("2024-12-31 23:59:59"), "2024-12-31T23:59:59Z");
    }

    #[test]
    fn test_to_rfc3339_normalizes_offsets() {
        assert_eq!(
            to_rfc3339("2024-01-15T19:30:00+09:00"),
            "2024-01-15T10:30:00Z"
        );
    }

    #[test]
    fn test_to_rfc3339_invalid() {
        assert_eq!(to_rfc3339("not a date"), "not a date");
    }

    #[test]
    fn test_from_unix_seconds() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(
            from_unix_seconds(expected.timestamp() as u64),
            Some(expected)
        );
        assert_eq!(from_unix_seconds(u64::MAX), None);
    }
}
