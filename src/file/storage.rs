//! Content store for Sharebox.
//!
//! This module provides physical file storage:
//! - Collision-safe naming (`report.pdf`, `report(1).pdf`, ...) claimed with
//!   create-exclusive opens, so concurrent uploads never share a name
//! - Streaming writes with a size limit
//! - Traversal-safe resolution, loading and idempotent deletion
//!
//! The store is flat: every stored name is a single path component directly
//! under the root.

use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use super::media::{self, MediaInfo};
use crate::{Result, ShareboxError};

/// Upper bound on `name(n).ext` candidates before giving up.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Longest logical name kept after sanitizing, in UTF-8 bytes.
///
/// Leaves room for a `(n)` suffix under the usual 255-byte component limit.
const MAX_NAME_BYTES: usize = 200;

/// Longest extension (with its dot) kept intact when a name is shortened.
const MAX_KEPT_EXT_BYTES: usize = 16;

/// Name used when an upload carries no usable filename.
const FALLBACK_NAME: &str = "file";

/// Result of storing content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Name the content was stored under.
    pub stored_name: String,
    /// Number of bytes written.
    pub size: u64,
}

/// An open, seekable handle on stored content.
#[derive(Debug)]
pub struct BlobHandle {
    /// The open file.
    pub file: File,
    /// Size in bytes at open time.
    pub size: u64,
}

/// File storage service for managing physical files.
#[derive(Debug, Clone)]
pub struct ContentStore {
    /// Base directory for file storage.
    root: PathBuf,
}

impl ContentStore {
    /// Create a new ContentStore rooted at the given path.
    ///
    /// The root directory will be created if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Get the root path of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a store for a plain sub-directory of this store's root.
    pub fn scoped(&self, dir: &str) -> Result<Self> {
        check_component(dir)?;
        Self::new(self.root.join(dir))
    }

    /// Classify a stored name by its extension.
    pub fn classify(stored_name: &str) -> MediaInfo {
        media::classify(stored_name)
    }

    /// Store an in-memory buffer under a name derived from `suggested`.
    pub async fn store(&self, content: &[u8], suggested: &str) -> Result<String> {
        let blob = self.store_reader(content, suggested, None).await?;
        Ok(blob.stored_name)
    }

    /// Stream content from `reader` into the store.
    ///
    /// The name is derived from `suggested`; on collision a counter is
    /// inserted before the extension. If `limit` is given and the content
    /// exceeds it, the partial file is removed and `TooLarge` is returned.
    /// Content is flushed to disk before this returns.
    pub async fn store_reader<R>(
        &self,
        reader: R,
        suggested: &str,
        limit: Option<u64>,
    ) -> Result<StoredBlob>
    where
        R: AsyncRead + Unpin,
    {
        let (stored_name, mut file) = self.claim_name(suggested).await?;
        let path = self.root.join(&stored_name);

        match write_limited(reader, &mut file, limit).await {
            Ok(size) => {
                debug!(stored_name = %stored_name, size, "stored content");
                Ok(StoredBlob { stored_name, size })
            }
            Err(e) => {
                drop(file);
                if let Err(cleanup) = fs::remove_file(&path).await {
                    warn!(stored_name = %stored_name, error = %cleanup, "failed to remove partial file");
                }
                Err(e)
            }
        }
    }

    /// Open stored content for reading.
    ///
    /// Fails with `NotFound` if the name does not exist, and with
    /// `Validation` if the name would escape the store root.
    pub async fn load(&self, stored_name: &str) -> Result<BlobHandle> {
        let path = self.resolve(stored_name)?;
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ShareboxError::NotFound("stored content".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(ShareboxError::NotFound("stored content".to_string()));
        }
        Ok(BlobHandle {
            file,
            size: metadata.len(),
        })
    }

    /// Read stored content fully into memory.
    pub async fn read(&self, stored_name: &str) -> Result<Vec<u8>> {
        let mut handle = self.load(stored_name).await?;
        let mut content = Vec::with_capacity(handle.size as usize);
        handle.file.read_to_end(&mut content).await?;
        Ok(content)
    }

    /// Delete stored content.
    ///
    /// Returns `true` if the file was deleted, `false` if it didn't exist.
    pub async fn delete(&self, stored_name: &str) -> Result<bool> {
        let path = self.resolve(stored_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if stored content exists.
    pub async fn exists(&self, stored_name: &str) -> Result<bool> {
        let path = self.resolve(stored_name)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Resolve a stored name to its path under the root.
    pub fn resolve(&self, stored_name: &str) -> Result<PathBuf> {
        check_component(stored_name)?;
        Ok(self.root.join(stored_name))
    }

    /// Claim the first free name derived from `suggested`.
    ///
    /// The claim is the create-exclusive open itself, so two callers can
    /// never both succeed on the same name.
    async fn claim_name(&self, suggested: &str) -> Result<(String, File)> {
        let base = sanitize_filename(suggested);
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = numbered_name(&base, attempt);
            let path = self.root.join(&candidate);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ShareboxError::Storage(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free name for upload",
        )))
    }
}

async fn write_limited<R>(reader: R, file: &mut File, limit: Option<u64>) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let written = match limit {
        Some(limit) => {
            let mut limited = reader.take(limit.saturating_add(1));
            let written = tokio::io::copy(&mut limited, file).await?;
            if written > limit {
                return Err(ShareboxError::TooLarge(format!(
                    "file exceeds the limit of {limit} bytes"
                )));
            }
            written
        }
        None => {
            let mut reader = reader;
            tokio::io::copy(&mut reader, file).await?
        }
    };
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

/// Reject anything that is not exactly one normal path component.
///
/// Separators of every platform are refused so the check does not depend
/// on the host's path rules.
fn check_component(name: &str) -> Result<()> {
    let invalid = || ShareboxError::Validation("invalid stored name".to_string());

    if name.is_empty() || name.contains(&['/', '\\', ':', '\0'][..]) {
        return Err(invalid());
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}

/// Reduce an uploaded filename to a safe single component.
///
/// Directory parts are dropped, control characters removed and the
/// result trimmed. Names that end up empty or as `.`/`..` become `file`.
pub fn sanitize_filename(name: &str) -> String {
    let last = name.rsplit(&['/', '\\'][..]).next().unwrap_or(name);
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && *c != ':')
        .collect();
    let truncated = truncate_name(cleaned.trim(), MAX_NAME_BYTES);
    let cleaned = truncated.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Shorten `name` to at most `max` bytes, cutting on a char boundary.
///
/// A short extension survives; the stem is cut instead.
fn truncate_name(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_KEPT_EXT_BYTES => name.split_at(dot),
        _ => (name, ""),
    };
    let budget = max - ext.len();
    let cut = stem
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= budget)
        .last()
        .unwrap_or(0);
    format!("{}{}", &stem[..cut], ext)
}

/// Insert `(n)` before the extension; `0` leaves the name untouched.
fn numbered_name(base: &str, n: u32) -> String {
    if n == 0 {
        return base.to_string();
    }
    match base.rfind('.') {
        Some(dot) if dot > 0 => format!("{}({}){}", &base[..dot], n, &base[dot..]),
        _ => format!("{base}({n})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::Category;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (ContentStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path().join("files")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("report.pdf", 0), "report.pdf");
        assert_eq!(numbered_name("report.pdf", 1), "report(1).pdf");
        assert_eq!(numbered_name("archive.tar.gz", 2), "archive.tar(2).gz");
        assert_eq!(numbered_name("README", 3), "README(3)");
        assert_eq!(numbered_name(".env", 1), ".env(1)");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\doc.txt"), "doc.txt");
        assert_eq!(sanitize_filename("bad\nname.txt"), "badname.txt");
        assert_eq!(sanitize_filename("  "), "file");
        assert_eq!(sanitize_filename(".."), "file");
        assert_eq!(sanitize_filename("Tài liệu.pdf"), "Tài liệu.pdf");
    }

    #[test]
    fn test_sanitize_filename_limits_bytes() {
        // 100 three-byte characters would be 304 bytes with the extension.
        let long = format!("{}.pdf", "文".repeat(100));
        let name = sanitize_filename(&long);
        assert!(name.len() <= MAX_NAME_BYTES, "{} bytes", name.len());
        assert!(name.ends_with(".pdf"));
        assert!(name.starts_with('文'));

        let ascii = format!("{}.txt", "a".repeat(300));
        let name = sanitize_filename(&ascii);
        assert_eq!(name.len(), MAX_NAME_BYTES);
        assert!(name.ends_with(".txt"));

        // An oversized "extension" is not worth keeping.
        let dotted = format!("x.{}", "é".repeat(150));
        assert!(sanitize_filename(&dotted).len() <= MAX_NAME_BYTES);
    }

    #[tokio::test]
    async fn test_store_long_multibyte_name() {
        let (store, _dir) = setup();

        let long = format!("{}.pdf", "文".repeat(100));
        let first = store.store(b"one", &long).await.unwrap();
        let second = store.store(b"two", &long).await.unwrap();

        assert!(first.ends_with(".pdf"));
        assert!(second.ends_with("(1).pdf"));
        assert_eq!(store.read(&second).await.unwrap(), b"two");
    }

    #[test]
    fn test_check_component() {
        assert!(check_component("report(1).pdf").is_ok());
        for bad in ["", ".", "..", "../x", "a/b", "a\\b", "C:x", "/etc/passwd", "x\0"] {
            assert!(check_component(bad).is_err(), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let (store, _dir) = setup();

        let name = store.store(b"hello", "hello.txt").await.unwrap();
        assert_eq!(name, "hello.txt");

        let handle = store.load(&name).await.unwrap();
        assert_eq!(handle.size, 5);
        assert_eq!(store.read(&name).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_store_collision_appends_counter() {
        let (store, _dir) = setup();

        let first = store.store(b"1", "report.pdf").await.unwrap();
        let second = store.store(b"2", "report.pdf").await.unwrap();
        let third = store.store(b"3", "report.pdf").await.unwrap();

        assert_eq!(first, "report.pdf");
        assert_eq!(second, "report(1).pdf");
        assert_eq!(third, "report(2).pdf");
        assert_eq!(store.read(&first).await.unwrap(), b"1");
        assert_eq!(store.read(&third).await.unwrap(), b"3");
    }

    #[tokio::test]
    async fn test_concurrent_stores_get_distinct_names() {
        let (store, _dir) = setup();
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.store(&[i], "same.bin").await.unwrap()
            }));
        }

        let mut names = HashSet::new();
        for handle in handles {
            assert!(names.insert(handle.await.unwrap()));
        }
        assert_eq!(names.len(), 16);

        let mut bytes = HashSet::new();
        for name in &names {
            bytes.insert(store.read(name).await.unwrap()[0]);
        }
        assert_eq!(bytes.len(), 16);
    }

    #[tokio::test]
    async fn test_store_reader_limit_removes_partial_file() {
        let (store, _dir) = setup();

        let content = vec![7u8; 100];
        let result = store
            .store_reader(content.as_slice(), "big.bin", Some(50))
            .await;
        assert!(matches!(result, Err(ShareboxError::TooLarge(_))));
        assert!(!store.exists("big.bin").await.unwrap());

        let blob = store
            .store_reader(content.as_slice(), "big.bin", Some(100))
            .await
            .unwrap();
        assert_eq!(blob.stored_name, "big.bin");
        assert_eq!(blob.size, 100);
    }

    #[tokio::test]
    async fn test_load_not_found() {
        let (store, _dir) = setup();
        let result = store.load("missing.txt").await;
        assert!(matches!(result, Err(ShareboxError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_traversal() {
        let (store, dir) = setup();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        for name in ["../secret.txt", "..\\secret.txt", "/etc/passwd", ".."] {
            let result = store.load(name).await;
            assert!(matches!(result, Err(ShareboxError::Validation(_))), "{name}");
        }
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _dir) = setup();

        let name = store.store(b"x", "x.txt").await.unwrap();
        assert!(store.delete(&name).await.unwrap());
        assert!(!store.delete(&name).await.unwrap());
        assert!(!store.exists(&name).await.unwrap());
    }

    #[tokio::test]
    async fn test_scoped_store() {
        let (store, _dir) = setup();

        let avatars = store.scoped("avatars").unwrap();
        assert_eq!(avatars.root(), store.root().join("avatars"));
        let name = avatars.store(b"img", "me.png").await.unwrap();
        assert!(!store.exists(&name).await.unwrap());
        assert!(avatars.exists(&name).await.unwrap());

        assert!(store.scoped("../outside").is_err());
    }

    #[test]
    fn test_classify() {
        let info = ContentStore::classify("Movie.MP4");
        assert_eq!(info.media_type, "video/mp4");
        assert_eq!(info.category, Category::Video);
    }
}
