//! `Range` header parsing for single byte ranges.

use crate::{Result, ShareboxError};

/// An inclusive byte window within a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset, inclusive.
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes in the window.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges always hold at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` value for a resource of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// `Content-Range` value sent with a 416 response.
pub fn unsatisfiable_content_range(size: u64) -> String {
    format!("bytes */{size}")
}

/// Parse a `Range` header value against a resource of `size` bytes.
///
/// Accepts `bytes=start-end`, `bytes=start-` and `bytes=-suffix`. A
/// malformed header or a multi-range request is a `Validation` error. A
/// well-formed range that does not satisfy `0 <= start <= end < size` is
/// `RangeNotSatisfiable`; `end` is never clamped.
pub fn parse_range(value: &str, size: u64) -> Result<ByteRange> {
    let malformed = || ShareboxError::Validation("invalid Range header".to_string());
    let unsatisfiable = || ShareboxError::RangeNotSatisfiable { size };

    let ranges = value.trim();
    let ranges = match ranges.split_once('=') {
        Some((unit, rest)) if unit.trim().eq_ignore_ascii_case("bytes") => rest.trim(),
        _ => return Err(malformed()),
    };
    if ranges.contains(',') {
        return Err(ShareboxError::Validation(
            "multiple ranges are not supported".to_string(),
        ));
    }

    let (start_part, end_part) = ranges.split_once('-').ok_or_else(malformed)?;
    let (start_part, end_part) = (start_part.trim(), end_part.trim());
    // Digits past u64 are still a position past the end; saturate them.
    let parse = |s: &str| -> Result<u64> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        Ok(s.parse::<u64>().unwrap_or(u64::MAX))
    };

    let range = if start_part.is_empty() {
        let suffix = parse(end_part)?;
        if suffix == 0 || size == 0 {
            return Err(unsatisfiable());
        }
        ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        }
    } else {
        let start = parse(start_part)?;
        let end = if end_part.is_empty() {
            if size == 0 {
                return Err(unsatisfiable());
            }
            size - 1
        } else {
            parse(end_part)?
        };
        ByteRange { start, end }
    };

    if range.start > range.end || range.end >= size {
        return Err(unsatisfiable());
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_416(result: Result<ByteRange>) -> bool {
        matches!(result, Err(ShareboxError::RangeNotSatisfiable { .. }))
    }

    fn is_400(result: Result<ByteRange>) -> bool {
        matches!(result, Err(ShareboxError::Validation(_)))
    }

    #[test]
    fn test_explicit_range() {
        let range = parse_range("bytes=0-99", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 99 });
        assert_eq!(range.len(), 100);
        assert_eq!(range.content_range(1000), "bytes 0-99/1000");
    }

    #[test]
    fn test_open_ended_range() {
        let range = parse_range("bytes=900-", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 900, end: 999 });
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(
            parse_range("bytes=-100", 1000).unwrap(),
            ByteRange { start: 900, end: 999 }
        );
        // Suffix longer than the resource covers all of it.
        assert_eq!(
            parse_range("bytes=-5000", 1000).unwrap(),
            ByteRange { start: 0, end: 999 }
        );
    }

    #[test]
    fn test_single_byte_and_last_byte() {
        assert_eq!(parse_range("bytes=0-0", 1).unwrap().len(), 1);
        assert_eq!(
            parse_range("bytes=999-999", 1000).unwrap(),
            ByteRange { start: 999, end: 999 }
        );
    }

    #[test]
    fn test_unsatisfiable() {
        assert!(is_416(parse_range("bytes=100-50", 1000)));
        assert!(is_416(parse_range("bytes=0-1000", 1000)));
        assert!(is_416(parse_range("bytes=1000-", 1000)));
        assert!(is_416(parse_range("bytes=-0", 1000)));
        assert!(is_416(parse_range("bytes=0-", 0)));
        assert!(is_416(parse_range("bytes=-10", 0)));
    }

    #[test]
    fn test_malformed() {
        assert!(is_400(parse_range("items=0-10", 1000)));
        assert!(is_400(parse_range("bytes=abc-10", 1000)));
        assert!(is_400(parse_range("bytes=10", 1000)));
        assert!(is_400(parse_range("bytes=-", 1000)));
        assert!(is_400(parse_range("bytes=+1-5", 1000)));
        assert!(is_400(parse_range("bytes=0-10,20-30", 1000)));
    }

    #[test]
    fn test_oversized_positions() {
        let huge = "99999999999999999999999";
        assert!(is_416(parse_range(&format!("bytes=0-{huge}"), 1000)));
        assert!(is_416(parse_range(&format!("bytes={huge}-"), 1000)));
        assert!(is_416(parse_range(&format!("bytes={huge}-{huge}"), 1000)));
        // A suffix longer than the resource selects all of it.
        assert_eq!(
            parse_range(&format!("bytes=-{huge}"), 1000).unwrap(),
            ByteRange { start: 0, end: 999 }
        );
    }

    #[test]
    fn test_unsatisfiable_content_range() {
        assert_eq!(unsatisfiable_content_range(42), "bytes */42");
    }
}
