//! `Content-Disposition` values with RFC 5987 filenames.

/// Whether the client should save or display the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Save as a file.
    Attachment,
    /// Display in the browser.
    Inline,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        }
    }
}

/// Percent-encode a filename for the `filename*` parameter.
pub fn encode_filename(filename: &str) -> String {
    urlencoding::encode(filename).into_owned()
}

/// Decode a `filename*` value produced by [`encode_filename`].
pub fn decode_filename(encoded: &str) -> Option<String> {
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}

/// ASCII stand-in for clients that ignore `filename*`.
///
/// Control characters are dropped; quotes, backslashes and non-ASCII
/// characters become `_`.
fn ascii_fallback(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect();
    if fallback.trim().is_empty() {
        "download".to_string()
    } else {
        fallback
    }
}

/// Build a `Content-Disposition` header value.
///
/// The value is always plain ASCII, so it is a valid header, and always
/// carries `filename*=UTF-8''...` so the original name survives.
pub fn content_disposition(disposition: Disposition, filename: &str) -> String {
    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition.as_str(),
        ascii_fallback(filename),
        encode_filename(filename)
    )
}

/// Extract and decode the `filename*` parameter from a header value.
pub fn parse_extended_filename(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("filename*="))
        .and_then(|value| value.strip_prefix("UTF-8''"))
        .and_then(decode_filename)
}
