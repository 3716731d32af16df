//! Extension based media classification.
//!
//! A single static table answers both "what media type is this" and
//! "may this be previewed inline", so the store and the preview gate
//! cannot disagree.

use serde::Serialize;
use utoipa::ToSchema;

/// Coarse content category used for quotas and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Document,
    Image,
    Video,
    Audio,
    Other,
}

impl Category {
    /// All categories, in reporting order.
    pub const ALL: [Category; 5] = [
        Category::Document,
        Category::Image,
        Category::Video,
        Category::Audio,
        Category::Other,
    ];

    /// Check if avatars may use this category.
    pub fn is_image(self) -> bool {
        self == Category::Image
    }
}

/// How a file can be previewed inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Image,
    Pdf,
    Video,
    Document,
    Unsupported,
}

impl PreviewKind {
    /// Check if inline preview is allowed.
    pub fn is_previewable(self) -> bool {
        self != PreviewKind::Unsupported
    }
}

/// Classification of a stored name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaInfo {
    /// MIME media type.
    pub media_type: &'static str,
    /// Coarse category.
    pub category: Category,
    /// Inline preview capability.
    pub preview: PreviewKind,
}

/// Media type for anything the table does not know.
pub const OCTET_STREAM: &str = "application/octet-stream";

const UNKNOWN: MediaInfo = MediaInfo {
    media_type: OCTET_STREAM,
    category: Category::Other,
    preview: PreviewKind::Unsupported,
};

const fn entry(
    ext: &'static str,
    media_type: &'static str,
    category: Category,
    preview: PreviewKind,
) -> (&'static str, MediaInfo) {
    (
        ext,
        MediaInfo {
            media_type,
            category,
            preview,
        },
    )
}

use Category as C;
use PreviewKind as P;

static MEDIA_TABLE: &[(&str, MediaInfo)] = &[
    // Documents
    entry("pdf", "application/pdf", C::Document, P::Pdf),
    entry("doc", "application/msword", C::Document, P::Document),
    entry(
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        C::Document,
        P::Document,
    ),
    entry("xls", "application/vnd.ms-excel", C::Document, P::Document),
    entry(
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        C::Document,
        P::Document,
    ),
    entry("ppt", "application/vnd.ms-powerpoint", C::Document, P::Document),
    entry(
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        C::Document,
        P::Document,
    ),
    entry("txt", "text/plain", C::Document, P::Unsupported),
    entry("csv", "text/csv", C::Document, P::Unsupported),
    // Images
    entry("jpg", "image/jpeg", C::Image, P::Image),
    entry("jpeg", "image/jpeg", C::Image, P::Image),
    entry("png", "image/png", C::Image, P::Image),
    entry("gif", "image/gif", C::Image, P::Image),
    entry("svg", "image/svg+xml", C::Image, P::Image),
    entry("webp", "image/webp", C::Image, P::Unsupported),
    entry("bmp", "image/bmp", C::Image, P::Unsupported),
    // Video
    entry("mp4", "video/mp4", C::Video, P::Video),
    entry("webm", "video/webm", C::Video, P::Video),
    entry("ogg", "video/ogg", C::Video, P::Video),
    entry("avi", "video/x-msvideo", C::Video, P::Unsupported),
    entry("wmv", "video/x-ms-wmv", C::Video, P::Unsupported),
    entry("flv", "video/x-flv", C::Video, P::Unsupported),
    entry("mov", "video/quicktime", C::Video, P::Unsupported),
    // Audio
    entry("mp3", "audio/mpeg", C::Audio, P::Unsupported),
    entry("wav", "audio/wav", C::Audio, P::Unsupported),
    entry("flac", "audio/flac", C::Audio, P::Unsupported),
    // Archives
    entry("zip", "application/zip", C::Other, P::Unsupported),
];

/// Extract the lowercase extension of a name.
///
/// A leading dot (`.hidden`) and a trailing dot (`name.`) yield no extension.
pub fn extension(name: &str) -> Option<String> {
    let dot = name.rfind('.')?;
    if dot == 0 || dot == name.len() - 1 {
        return None;
    }
    Some(name[dot + 1..].to_ascii_lowercase())
}

/// Classify a name by its extension, case-insensitively.
pub fn classify(name: &str) -> MediaInfo {
    let Some(ext) = extension(name) else {
        return UNKNOWN;
    };
    MEDIA_TABLE
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, info)| *info)
        .unwrap_or(UNKNOWN)
}

/// Format a byte count the way listings show it (`512 B`, `1.5 KB`, `2.0 GB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    value /= 1024.0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}B", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        assert_eq!(extension("report.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension("README"), None);
        assert_eq!(extension(".hidden"), None);
        assert_eq!(extension("trailing."), None);
    }

    #[test]
    fn test_classify_case_insensitive() {
        let info = classify("Holiday.JPG");
        assert_eq!(info.media_type, "image/jpeg");
        assert_eq!(info.category, Category::Image);
        assert_eq!(info.preview, PreviewKind::Image);
    }

    #[test]
    fn test_classify_unknown() {
        for name in ["data.bin", "noext", "weird.xyz"] {
            let info = classify(name);
            assert_eq!(info.media_type, OCTET_STREAM);
            assert_eq!(info.category, Category::Other);
            assert!(!info.preview.is_previewable());
        }
    }

    #[test]
    fn test_previewable_set() {
        let previewable = [
            "a.pdf", "a.doc", "a.docx", "a.xls", "a.xlsx", "a.ppt", "a.pptx", "a.jpg", "a.jpeg",
            "a.png", "a.gif", "a.svg", "a.mp4", "a.webm", "a.ogg",
        ];
        for name in previewable {
            assert!(classify(name).preview.is_previewable(), "{name}");
        }
        for name in ["a.txt", "a.mp3", "a.avi", "a.zip", "a.exe"] {
            assert!(!classify(name).preview.is_previewable(), "{name}");
        }
    }

    #[test]
    fn test_preview_kinds() {
        assert_eq!(classify("a.pdf").preview, PreviewKind::Pdf);
        assert_eq!(classify("a.pptx").preview, PreviewKind::Document);
        assert_eq!(classify("a.webm").preview, PreviewKind::Video);
    }

    #[test]
    fn test_ogg_is_video() {
        let info = classify("clip.ogg");
        assert_eq!(info.media_type, "video/ogg");
        assert_eq!(info.category, Category::Video);
    }

    #[test]
    fn test_table_has_no_duplicate_extensions() {
        for (i, (ext, _)) in MEDIA_TABLE.iter().enumerate() {
            assert!(
                MEDIA_TABLE[i + 1..].iter().all(|(other, _)| other != ext),
                "duplicate extension {ext}"
            );
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GB");
    }
}
