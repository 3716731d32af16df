//! Zip packaging for multi-file downloads.
//!
//! The archive is accumulated in a temporary file and handed back as a
//! [`TempPath`], so it disappears as soon as the last owner lets go of it.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::{Result, ShareboxError};

/// Name offered to the client for every multi-file archive.
pub const ARCHIVE_NAME: &str = "files.zip";

/// One file to put into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Name of the entry inside the archive.
    pub name: String,
    /// Location of the content on disk.
    pub path: PathBuf,
}

/// A finished archive on disk.
#[derive(Debug)]
pub struct BuiltArchive {
    /// Temporary file holding the archive; removed on drop.
    pub path: TempPath,
    /// Archive size in bytes.
    pub size: u64,
    /// Number of entries written.
    pub entries: usize,
}

/// Build a zip archive of `entries` inside `temp_dir`.
///
/// Entries whose content has vanished are skipped. If none could be
/// written the archive is discarded and `NotFound` is returned.
pub async fn build_archive(temp_dir: &Path, entries: Vec<ArchiveEntry>) -> Result<BuiltArchive> {
    let temp_dir = temp_dir.to_path_buf();
    tokio::task::spawn_blocking(move || write_archive(&temp_dir, &entries))
        .await
        .map_err(|e| ShareboxError::Archive(format!("archive task failed: {e}")))?
}

fn write_archive(temp_dir: &Path, entries: &[ArchiveEntry]) -> Result<BuiltArchive> {
    std::fs::create_dir_all(temp_dir)?;
    let (file, path) = tempfile::Builder::new()
        .prefix("sharebox-")
        .suffix(".zip")
        .tempfile_in(temp_dir)?
        .into_parts();

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);
    let mut writer = ZipWriter::new(file);
    let mut written = 0;

    for entry in entries {
        let mut source = match File::open(&entry.path) {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(entry = %entry.name, "content missing, left out of archive");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        writer.start_file(entry.name.as_str(), options)?;
        io::copy(&mut source, &mut writer)?;
        written += 1;
    }

    let file = writer.finish()?;
    if written == 0 {
        return Err(ShareboxError::NotFound("stored content".to_string()));
    }
    file.sync_all()?;
    let size = file.metadata()?.len();

    debug!(entries = written, size, "archive built");
    Ok(BuiltArchive {
        path,
        size,
        entries: written,
    })
}
