//! Blob storage for uploaded song files and generated thumbnails.
//!
//! Files are addressed by an opaque locator of the form
//! `{bucket}/{unique_name}`. [`BlobStore`] is the seam the workflows call
//! through; [`LocalBlobStore`] keeps blobs on the local filesystem under a
//! media root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Logical storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    MusicSheets,
    MidiFiles,
    Mp3Files,
    MusicThumbnails,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::MusicSheets,
        Bucket::MidiFiles,
        Bucket::Mp3Files,
        Bucket::MusicThumbnails,
    ];

    /// Directory name and locator prefix.
    pub fn name(self) -> &'static str {
        match self {
            Self::MusicSheets => "music_sheets",
            Self::MidiFiles => "midi_files",
            Self::Mp3Files => "mp3_files",
            Self::MusicThumbnails => "music_thumbnails",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

/// Errors raised by a [`BlobStore`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid blob locator: {0}")]
    InvalidLocator(String),

    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistent store for uploaded bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` in `bucket`, returning a locator that names them.
    ///
    /// `file_name` is the client's name and only influences the readable
    /// part of the locator; locators never collide.
    async fn store(
        &self,
        bucket: Bucket,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError>;

    /// Read back the bytes behind `locator`.
    async fn read(&self, locator: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove the blob behind `locator`. Removing a missing blob succeeds.
    async fn delete(&self, locator: &str) -> Result<(), StorageError>;

    /// Confirm the store can currently serve uploads and downloads.
    async fn check(&self) -> Result<(), StorageError>;
}

/// Filesystem-backed [`BlobStore`] rooted at a media directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a locator onto a path under the media root.
    ///
    /// Only `{known_bucket}/{single_component}` locators are accepted.
    fn resolve(&self, locator: &str) -> Result<PathBuf, StorageError> {
        let (bucket, name) = locator
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidLocator(locator.to_string()))?;
        let bucket =
            Bucket::from_name(bucket).ok_or_else(|| StorageError::InvalidLocator(locator.to_string()))?;
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StorageError::InvalidLocator(locator.to_string()));
        }
        Ok(self.root.join(bucket.name()).join(name))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(
        &self,
        bucket: Bucket,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let dir = self.root.join(bucket.name());
        tokio::fs::create_dir_all(&dir).await?;

        let stored_name = format!("{}_{}", uuid::Uuid::now_v7().simple(), sanitize_file_name(file_name));
        tokio::fs::write(dir.join(&stored_name), bytes).await?;

        let locator = format!("{}/{stored_name}", bucket.name());
        tracing::debug!(%locator, size = bytes.len(), "Blob stored");
        Ok(locator)
    }

    async fn read(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(locator)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(locator.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        let path = self.resolve(locator)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(%locator, "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn check(&self) -> Result<(), StorageError> {
        let meta = tokio::fs::metadata(&self.root).await?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(StorageError::NotFound(self.root.display().to_string()))
        }
    }
}

/// Maximum length of the readable part of a stored file name.
const MAX_STORED_NAME_LEN: usize = 100;

/// Reduce a client file name to a safe single path component.
///
/// Directory parts are dropped and anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim_start_matches('.');

    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.len() > MAX_STORED_NAME_LEN {
        // Keep the tail so the extension survives.
        cleaned = cleaned[cleaned.len() - MAX_STORED_NAME_LEN..].to_string();
    }
    if cleaned.is_empty() {
        cleaned.push_str("upload");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\scores\\Ave Maria.pdf"), "Ave_Maria.pdf");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn sanitize_keeps_extension_of_long_names() {
        let long = format!("{}.mp3", "a".repeat(300));
        let cleaned = sanitize_file_name(&long);
        assert_eq!(cleaned.len(), MAX_STORED_NAME_LEN);
        assert!(cleaned.ends_with(".mp3"));
    }

    #[tokio::test]
    async fn store_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        let locator = store
            .store(Bucket::Mp3Files, "Gloria take 1.mp3", b"ID3data")
            .await
            .unwrap();
        assert!(locator.starts_with("mp3_files/"));
        assert!(locator.ends_with("_Gloria_take_1.mp3"));

        assert_eq!(store.read(&locator).await.unwrap(), b"ID3data");

        store.delete(&locator).await.unwrap();
        assert_matches!(store.read(&locator).await, Err(StorageError::NotFound(_)));
        // Deleting twice is fine.
        store.delete(&locator).await.unwrap();
    }

    #[tokio::test]
    async fn check_requires_the_media_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalBlobStore::new(dir.path()).check().await.is_ok());

        let missing = LocalBlobStore::new(dir.path().join("absent"));
        assert_matches!(missing.check().await, Err(StorageError::Io(_)));

        let file = dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();
        assert_matches!(LocalBlobStore::new(&file).check().await, Err(StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn same_name_gets_distinct_locators() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let a = store.store(Bucket::MusicSheets, "s.pdf", b"1").await.unwrap();
        let b = store.store(Bucket::MusicSheets, "s.pdf", b"2").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.read(&a).await.unwrap(), b"1");
        assert_eq!(store.read(&b).await.unwrap(), b"2");
    }

    #[tokio::test]
    async fn rejects_traversal_locators() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        for bad in ["../secret", "music_sheets/../x", "unknown/file", "midi_files/", "mp3_files/.env"] {
            assert_matches!(
                store.read(bad).await,
                Err(StorageError::InvalidLocator(_)),
                "{bad} should be rejected"
            );
        }
    }
}
