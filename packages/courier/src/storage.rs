//! Media storage
//!
//! Uploaded files are written under a single directory with a content-derived
//! name (`<sha256 hex>.<ext>`). That name is the opaque media id clients put in
//! image and video messages.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::StorageConfig;

/// Accepted upload types and the extension each is stored under.
pub const ALLOWED_MIME_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("video/mp4", "mp4"),
];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    #[error("File too large: limit is {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    ALLOWED_MIME_TYPES
        .iter()
        .find(|(m, _)| *m == mime)
        .map(|(_, ext)| *ext)
}

pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    ALLOWED_MIME_TYPES
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(mime, _)| *mime)
}

/// A stored media file read back from disk.
#[derive(Debug)]
pub struct StoredMedia {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

pub struct MediaStore {
    root: PathBuf,
    max_file_size_bytes: u64,
}

impl MediaStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.path).with_context(|| {
            format!("Failed to create storage directory: {:?}", config.path)
        })?;
        info!(path = %config.path.display(), "media storage ready");

        Ok(Self {
            root: config.path.clone(),
            max_file_size_bytes: config.max_file_size_bytes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    /// Rejects `mime` unless it is one of [`ALLOWED_MIME_TYPES`].
    pub fn check_type(&self, mime: &str) -> Result<&'static str, StorageError> {
        extension_for_mime(mime).ok_or_else(|| StorageError::InvalidFileType(mime.to_string()))
    }

    pub fn check_size(&self, size: u64) -> Result<(), StorageError> {
        if size > self.max_file_size_bytes {
            return Err(StorageError::FileTooLarge {
                limit: self.max_file_size_bytes,
            });
        }
        Ok(())
    }

    /// Writes `data` and returns its media id.
    pub async fn store(
        &self,
        original_name: &str,
        mime: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        let ext = self.check_type(mime)?;
        self.check_size(data.len() as u64)?;

        let media_id = media_id(original_name, chrono::Utc::now().timestamp_millis(), ext);
        tokio::fs::write(self.root.join(&media_id), data).await?;
        debug!(%media_id, bytes = data.len(), "stored media");
        Ok(media_id)
    }

    pub async fn open(&self, media_id: &str) -> Result<StoredMedia, StorageError> {
        let not_found = || StorageError::NotFound(media_id.to_string());

        let content_type = valid_media_id(media_id)
            .then(|| media_id.rsplit_once('.'))
            .flatten()
            .and_then(|(_, ext)| mime_for_extension(ext))
            .ok_or_else(not_found)?;

        match tokio::fs::read(self.root.join(media_id)).await {
            Ok(bytes) => Ok(StoredMedia {
                bytes,
                content_type,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(e.into()),
        }
    }
}

/// `<hex sha256(original_name + millis)>.<ext>`
pub fn media_id(original_name: &str, millis: i64, ext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(original_name.as_bytes());
    hasher.update(millis.to_string().as_bytes());
    let digest = hasher.finalize();
    format!("{}.{}", data_encoding::HEXLOWER.encode(digest.as_slice()), ext)
}

/// Plain file names only: no separators, no parent references.
fn valid_media_id(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && !name.contains("..")
        && !name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path, limit: u64) -> MediaStore {
        MediaStore::new(&StorageConfig {
            path: dir.to_path_buf(),
            max_file_size_bytes: limit,
        })
        .unwrap()
    }

    #[test]
    fn test_media_id_shape() {
        let id = media_id("cat.png", 1_700_000_000_000, "png");
        let (hash, ext) = id.split_once('.').unwrap();
        assert_eq!(ext, "png");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_media_id_depends_on_time() {
        assert_ne!(
            media_id("cat.png", 1, "png"),
            media_id("cat.png", 2, "png")
        );
        assert_eq!(
            media_id("cat.png", 1, "png"),
            media_id("cat.png", 1, "png")
        );
    }

    #[test]
    fn test_mime_table() {
        assert_eq!(extension_for_mime("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for_mime("video/mp4"), Some("mp4"));
        assert_eq!(extension_for_mime("text/plain"), None);
        assert_eq!(mime_for_extension("gif"), Some("image/gif"));
        assert_eq!(mime_for_extension("exe"), None);
    }

    #[test]
    fn test_valid_media_id() {
        assert!(valid_media_id("abc.png"));
        assert!(!valid_media_id(""));
        assert!(!valid_media_id("../etc/passwd"));
        assert!(!valid_media_id("a/b.png"));
        assert!(!valid_media_id(".hidden.png"));
    }

    #[tokio::test]
    async fn test_store_and_open() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path(), 1024);

        let id = store.store("cat.gif", "image/gif", b"GIF89a").await.unwrap();
        assert!(id.ends_with(".gif"));
        assert_eq!(store.root(), tmp.path());
        assert!(store.root().join(&id).exists());

        let media = store.open(&id).await.unwrap();
        assert_eq!(media.bytes, b"GIF89a");
        assert_eq!(media.content_type, "image/gif");
    }

    #[tokio::test]
    async fn test_store_rejects_type() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path(), 1024);

        let err = store.store("x.txt", "text/plain", b"hi").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidFileType(ref m) if m == "text/plain"));
    }

    #[tokio::test]
    async fn test_store_rejects_size() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path(), 4);

        let err = store
            .store("big.png", "image/png", b"12345")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::FileTooLarge { limit: 4 }));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_open_missing_and_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp.path().join("media"), 1024);
        std::fs::write(tmp.path().join("secret.png"), b"x").unwrap();

        assert!(matches!(
            store.open("nope.png").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.open("../secret.png").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.open("noext").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
