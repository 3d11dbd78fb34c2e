use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors from the attachment store
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Only images are allowed (got {0})")]
    UnsupportedMediaType(String),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Invalid attachment filename: {0}")]
    InvalidFilename(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AttachmentError {
    /// Whether the error is caused by the uploaded file rather than by storage
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AttachmentError::UnsupportedMediaType(_)
                | AttachmentError::PayloadTooLarge { .. }
                | AttachmentError::InvalidFilename(_)
        )
    }
}

/// A file received from a client, not yet stored
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(
        original_name: Option<String>,
        content_type: Option<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            original_name,
            content_type,
            data: data.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Extension of the original filename including the leading dot, or "" if
    /// it has none or it is not a short alphanumeric token.
    pub fn extension(&self) -> String {
        self.original_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default()
    }
}

/// Filesystem store for profile pictures.
///
/// Files live flat under `root`, named `<millis>-<random><ext>`. The directory
/// is created once by [`AttachmentStore::open`]; nothing else creates it.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
    max_file_size: usize,
}

impl AttachmentStore {
    /// Open the store, creating the directory if it does not exist yet
    pub async fn open(root: impl Into<PathBuf>, max_file_size: usize) -> Result<Self, AttachmentError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!(root = %root.display(), max_file_size, "attachment store ready");
        Ok(Self { root, max_file_size })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Check content type and size. Runs before anything touches the disk.
    /// The `image/` prefix is matched exactly as sent, so `IMAGE/PNG` is refused.
    pub fn validate(&self, file: &UploadedFile) -> Result<(), AttachmentError> {
        let content_type = file.content_type.as_deref().unwrap_or("");
        if !content_type.starts_with("image/") {
            return Err(AttachmentError::UnsupportedMediaType(if content_type.is_empty() {
                "no content type".to_string()
            } else {
                content_type.to_string()
            }));
        }
        if file.size() > self.max_file_size {
            return Err(AttachmentError::PayloadTooLarge {
                size: file.size(),
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Validate and write the file, returning its generated filename
    pub async fn save(&self, file: &UploadedFile) -> Result<String, AttachmentError> {
        self.validate(file)?;

        // create_new never clobbers an existing file; a taken name gets a fresh suffix
        let mut attempts = 0;
        loop {
            let filename = Self::generate_filename(&file.extension());
            let path = self.root.join(&filename);
            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut handle) => {
                    let written = async {
                        handle.write_all(&file.data).await?;
                        handle.sync_all().await
                    }
                    .await;
                    if let Err(e) = written {
                        drop(handle);
                        let _ = fs::remove_file(&path).await;
                        return Err(e.into());
                    }
                    debug!(filename = %filename, size = file.size(), "attachment saved");
                    return Ok(filename);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts < 3 => {
                    attempts += 1;
                    warn!(filename = %filename, "attachment name taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Remove a file. Returns false when it was already gone.
    pub async fn delete(&self, filename: &str) -> Result<bool, AttachmentError> {
        let path = self.path_for(filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(filename = %filename, "attachment deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, filename: &str) -> Result<bool, AttachmentError> {
        let path = self.path_for(filename)?;
        Ok(fs::try_exists(path).await?)
    }

    /// Save `new` and only then drop `old`.
    ///
    /// A failed save leaves `old` untouched. A failure to delete `old` is
    /// logged and swallowed: the new file is already stored and referenced.
    pub async fn replace(&self, old: Option<&str>, new: &UploadedFile) -> Result<String, AttachmentError> {
        let filename = self.save(new).await?;
        if let Some(old) = old.filter(|old| *old != filename) {
            self.delete_quietly(old).await;
        }
        Ok(filename)
    }

    /// Best-effort delete used during cleanup
    pub async fn delete_quietly(&self, filename: &str) {
        match self.exists(filename).await {
            Ok(true) => {
                if let Err(e) = self.delete(filename).await {
                    warn!(filename = %filename, error = %e, "failed to delete attachment");
                }
            }
            Ok(false) => debug!(filename = %filename, "attachment already missing"),
            Err(e) => warn!(filename = %filename, error = %e, "failed to check attachment"),
        }
    }

    /// Resolve a stored filename to its path, refusing anything that is not a bare name
    pub fn path_for(&self, filename: &str) -> Result<PathBuf, AttachmentError> {
        if !Self::is_bare_filename(filename) {
            return Err(AttachmentError::InvalidFilename(filename.to_string()));
        }
        Ok(self.root.join(filename))
    }

    fn is_bare_filename(name: &str) -> bool {
        !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(&['/', '\\', '\0'][..])
    }

    fn generate_filename(extension: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        format!("{}-{}{}", Utc::now().timestamp_millis(), &token[..6], extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LIMIT: usize = 3 * 1024 * 1024;

    fn png(name: &str, size: usize) -> UploadedFile {
        UploadedFile::new(Some(name.to_string()), Some("image/png".to_string()), vec![7u8; size])
    }

    async fn store() -> (TempDir, AttachmentStore) {
        let dir = TempDir::new().unwrap();
        let store = AttachmentStore::open(dir.path().join("uploads"), LIMIT).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn open_creates_directory_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("uploads");
        AttachmentStore::open(&root, LIMIT).await.unwrap();
        assert!(root.is_dir());
        AttachmentStore::open(&root, LIMIT).await.unwrap();
    }

    #[tokio::test]
    async fn validate_rejects_non_images() {
        let (_dir, store) = store().await;
        let file = UploadedFile::new(Some("notes.txt".into()), Some("text/plain".into()), b"hi".to_vec());
        assert!(matches!(store.validate(&file), Err(AttachmentError::UnsupportedMediaType(_))));

        let untyped = UploadedFile::new(Some("a.png".into()), None, b"hi".to_vec());
        assert!(matches!(store.validate(&untyped), Err(AttachmentError::UnsupportedMediaType(_))));
    }

    #[tokio::test]
    async fn validate_matches_image_prefix_case_sensitively() {
        let (_dir, store) = store().await;
        let upper = UploadedFile::new(Some("a.png".into()), Some("IMAGE/PNG".into()), b"hi".to_vec());
        assert!(matches!(store.validate(&upper), Err(AttachmentError::UnsupportedMediaType(_))));

        let lower = UploadedFile::new(Some("a.png".into()), Some("image/png".into()), b"hi".to_vec());
        assert!(store.validate(&lower).is_ok());
    }

    #[tokio::test]
    async fn validate_enforces_size_limit() {
        let (_dir, store) = store().await;
        assert!(store.validate(&png("ok.png", LIMIT)).is_ok());
        let err = store.validate(&png("big.png", LIMIT + 1)).unwrap_err();
        assert!(matches!(&err, AttachmentError::PayloadTooLarge { size, limit } if *size == LIMIT + 1 && *limit == LIMIT));
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn save_writes_nothing_for_invalid_file() {
        let (_dir, store) = store().await;
        let file = UploadedFile::new(Some("x.pdf".into()), Some("application/pdf".into()), vec![1, 2, 3]);
        assert!(store.save(&file).await.is_err());
        let mut entries = fs::read_dir(store.root()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_names_file_after_time_and_extension() {
        let (_dir, store) = store().await;
        let before = Utc::now().timestamp_millis();
        let filename = store.save(&png("Portrait.JPG", 16)).await.unwrap();

        assert!(filename.ends_with(".JPG"));
        let millis: i64 = filename.split('-').next().unwrap().parse().unwrap();
        assert!(millis >= before);
        assert_eq!(fs::read(store.root().join(&filename)).await.unwrap(), vec![7u8; 16]);
    }

    #[tokio::test]
    async fn saves_in_same_millisecond_do_not_collide() {
        let (_dir, store) = store().await;
        let a = store.save(&png("a.png", 4)).await.unwrap();
        let b = store.save(&png("a.png", 4)).await.unwrap();
        assert_ne!(a, b);
        assert!(store.exists(&a).await.unwrap());
        assert!(store.exists(&b).await.unwrap());
    }

    #[test]
    fn extension_handling() {
        assert_eq!(png("photo.jpeg", 1).extension(), ".jpeg");
        assert_eq!(png("archive.tar.gz", 1).extension(), ".gz");
        assert_eq!(png(".bashrc", 1).extension(), "");
        assert_eq!(png("noext", 1).extension(), "");
        assert_eq!(png("bad.p/ng", 1).extension(), "");
        assert_eq!(UploadedFile::new(None, Some("image/png".into()), vec![]).extension(), "");
    }

    #[tokio::test]
    async fn delete_missing_file_is_noop() {
        let (_dir, store) = store().await;
        assert!(!store.delete("1700000000000-abcdef.png").await.unwrap());
        store.delete_quietly("1700000000000-abcdef.png").await;
    }

    #[tokio::test]
    async fn delete_rejects_paths() {
        let (_dir, store) = store().await;
        assert!(matches!(store.delete("../secret").await, Err(AttachmentError::InvalidFilename(_))));
        assert!(matches!(store.delete("..").await, Err(AttachmentError::InvalidFilename(_))));
        assert!(matches!(store.exists("a/b.png").await, Err(AttachmentError::InvalidFilename(_))));
    }

    #[tokio::test]
    async fn replace_saves_new_then_removes_old() {
        let (_dir, store) = store().await;
        let old = store.save(&png("old.png", 8)).await.unwrap();
        let new = store.replace(Some(&old), &png("new.png", 8)).await.unwrap();

        assert_ne!(old, new);
        assert!(!store.exists(&old).await.unwrap());
        assert!(store.exists(&new).await.unwrap());
    }

    #[tokio::test]
    async fn failed_replace_keeps_old_file() {
        let (_dir, store) = store().await;
        let old = store.save(&png("old.png", 8)).await.unwrap();
        let result = store.replace(Some(&old), &png("huge.png", LIMIT + 1)).await;

        assert!(result.is_err());
        assert!(store.exists(&old).await.unwrap());
    }

    #[tokio::test]
    async fn replace_tolerates_missing_old_file() {
        let (_dir, store) = store().await;
        let new = store.replace(Some("1600000000000-000000.png"), &png("new.png", 8)).await.unwrap();
        assert!(store.exists(&new).await.unwrap());
    }
}
