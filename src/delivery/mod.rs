//! Delivery engine for Sharebox.
//!
//! Turns an already authorized file into an HTTP response:
//! - Full download as an attachment
//! - Inline preview for the previewable media set
//! - Byte range streaming (200 / 206 / 416)
//! - Multi-file zip archives
//!
//! Every body is streamed in bounded chunks; nothing is buffered whole.

mod archive;
mod body;
mod disposition;
mod range;

pub use archive::{build_archive, ArchiveEntry, BuiltArchive, ARCHIVE_NAME};
pub use body::DeliveryStream;
pub use disposition::{
    content_disposition, decode_filename, encode_filename, parse_extended_filename, Disposition,
};
pub use range::{parse_range, unsatisfiable_content_range, ByteRange};

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{header, response::Builder, StatusCode};
use axum::response::Response;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use crate::file::{media, ContentStore, StoredFile};
use crate::{Result, ShareboxError};

/// Default read size for streamed bodies.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default lifetime of cached previews, in seconds.
pub const DEFAULT_PREVIEW_CACHE_SECS: u64 = 3600;

/// Builds responses for stored content.
#[derive(Debug, Clone)]
pub struct DeliveryEngine {
    store: ContentStore,
    chunk_size: usize,
    preview_cache_secs: u64,
    temp_dir: PathBuf,
}

impl DeliveryEngine {
    /// Create an engine serving from `store`, building archives in `temp_dir`.
    pub fn new(store: ContentStore, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
            preview_cache_secs: DEFAULT_PREVIEW_CACHE_SECS,
            temp_dir: temp_dir.into(),
        }
    }

    /// Set the chunk size for streamed bodies.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set how long clients may cache previews.
    pub fn with_preview_cache_secs(mut self, secs: u64) -> Self {
        self.preview_cache_secs = secs;
        self
    }

    /// The content store this engine reads from.
    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Directory for transient archives.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Serve the whole file as an attachment under its logical name.
    pub async fn download(&self, file: &StoredFile) -> Result<Response> {
        let handle = self.store.load(&file.stored_name).await?;
        let size = handle.size;
        debug!(file_id = file.id, size, "download");

        let stream = DeliveryStream::new(handle.file, self.chunk_size, size, file.stored_name.as_str());
        build(
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, file.content_type.as_str())
                .header(
                    header::CONTENT_DISPOSITION,
                    content_disposition(Disposition::Attachment, &file.filename),
                )
                .header(header::CONTENT_LENGTH, size)
                .header(header::ACCEPT_RANGES, "bytes"),
            Body::from_stream(stream),
        )
    }

    /// Serve the file inline if its type is previewable.
    ///
    /// Anything outside the previewable set is a `Validation` error.
    pub async fn preview(&self, file: &StoredFile) -> Result<Response> {
        let info = media::classify(&file.stored_name);
        if !info.preview.is_previewable() {
            return Err(ShareboxError::Validation(
                "preview is not available for this file type".to_string(),
            ));
        }

        let handle = self.store.load(&file.stored_name).await?;
        let size = handle.size;
        let stream = DeliveryStream::new(handle.file, self.chunk_size, size, file.stored_name.as_str());
        build(
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, info.media_type)
                .header(
                    header::CONTENT_DISPOSITION,
                    content_disposition(Disposition::Inline, &file.filename),
                )
                .header(header::CONTENT_LENGTH, size)
                .header(header::CACHE_CONTROL, self.cache_control()),
            Body::from_stream(stream),
        )
    }

    /// Serve the file honouring an optional `Range` header value.
    ///
    /// Without a range the whole file is sent with 200. A satisfiable range
    /// is sent with 206 and exactly `end - start + 1` bytes. An unsatisfiable
    /// one fails with `RangeNotSatisfiable` carrying the file size.
    pub async fn stream(&self, file: &StoredFile, range: Option<&str>) -> Result<Response> {
        let info = media::classify(&file.stored_name);
        let mut handle = self.store.load(&file.stored_name).await?;
        let size = handle.size;

        let Some(range) = range else {
            let stream = DeliveryStream::new(handle.file, self.chunk_size, size, file.stored_name.as_str());
            return build(
                Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, info.media_type)
                    .header(header::CONTENT_LENGTH, size)
                    .header(header::ACCEPT_RANGES, "bytes"),
                Body::from_stream(stream),
            );
        };

        let window = parse_range(range, size)?;
        handle.file.seek(SeekFrom::Start(window.start)).await?;
        let reader = handle.file.take(window.len());
        debug!(
            file_id = file.id,
            start = window.start,
            end = window.end,
            size,
            "partial content"
        );

        let stream = DeliveryStream::new(reader, self.chunk_size, window.len(), file.stored_name.as_str());
        build(
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, info.media_type)
                .header(header::CONTENT_LENGTH, window.len())
                .header(header::CONTENT_RANGE, window.content_range(size))
                .header(header::ACCEPT_RANGES, "bytes"),
            Body::from_stream(stream),
        )
    }

    /// Serve several files as one zip attachment.
    ///
    /// `files` must already be filtered to what the caller may read. Even
    /// a single entry is zipped. Entries are named by stored name; the
    /// temporary archive is removed when the body is dropped, however the
    /// response ends.
    pub async fn archive(&self, files: &[StoredFile]) -> Result<Response> {
        match files {
            [] => Err(ShareboxError::Forbidden("no readable files".to_string())),
            files => {
                let mut entries = Vec::with_capacity(files.len());
                for file in files {
                    entries.push(ArchiveEntry {
                        name: file.stored_name.clone(),
                        path: self.store.resolve(&file.stored_name)?,
                    });
                }

                let built = build_archive(&self.temp_dir, entries).await?;
                info!(entries = built.entries, size = built.size, "archive ready");

                let reader = tokio::fs::File::open(&*built.path).await?;
                let stream = DeliveryStream::new(reader, self.chunk_size, built.size, ARCHIVE_NAME)
                    .with_temp_file(built.path);
                build(
                    Response::builder()
                        .status(StatusCode::OK)
                        .header(header::CONTENT_TYPE, "application/zip")
                        .header(
                            header::CONTENT_DISPOSITION,
                            content_disposition(Disposition::Attachment, ARCHIVE_NAME),
                        )
                        .header(header::CONTENT_LENGTH, built.size),
                    Body::from_stream(stream),
                )
            }
        }
    }

    /// Serve an avatar image inline from `avatars`.
    ///
    /// References that are unknown or malformed are `NotFound`.
    pub async fn avatar(&self, avatars: &ContentStore, reference: &str) -> Result<Response> {
        let handle = match avatars.load(reference).await {
            Ok(handle) => handle,
            Err(ShareboxError::Validation(_)) => {
                return Err(ShareboxError::NotFound("avatar".to_string()))
            }
            Err(e) => return Err(e),
        };
        let info = media::classify(reference);
        let size = handle.size;
        let stream = DeliveryStream::new(handle.file, self.chunk_size, size, reference);
        build(
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, info.media_type)
                .header(
                    header::CONTENT_DISPOSITION,
                    content_disposition(Disposition::Inline, reference),
                )
                .header(header::CONTENT_LENGTH, size)
                .header(header::CACHE_CONTROL, self.cache_control()),
            Body::from_stream(stream),
        )
    }

    fn cache_control(&self) -> String {
        format!("private, max-age={}", self.preview_cache_secs)
    }
}

fn build(builder: Builder, body: Body) -> Result<Response> {
    builder
        .body(body)
        .map_err(|e| ShareboxError::Internal(format!("failed to build response: {e}")))
}
