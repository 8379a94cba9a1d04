//! # Prescription File Store
//!
//! Keeps uploaded prescription images in a single local directory. Every
//! upload gets a fresh `<epoch_millis>_<uuid>.<ext>` name, so writes never
//! collide and need no locking. Stored identifiers are bare file names; the
//! store refuses anything that could point outside its directory.

use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Image extensions accepted for prescriptions (lowercase)
pub const ACCEPTED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    #[error("Unsupported image type '{0}', expected one of png, jpg, jpeg, gif, webp")]
    UnsupportedType(String),

    #[error("Image is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Image is empty")]
    Empty,

    #[error("Invalid prescription path '{0}'")]
    InvalidPath(String),

    #[error("Prescription not found: {0}")]
    NotFound(String),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    max_bytes: usize,
}

impl FileStore {
    /// Open the store, creating the upload directory if needed
    pub async fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Result<Self, FileStoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!("Prescription store at {}", root.display());
        Ok(Self { root, max_bytes })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check type and size of an upload without touching the disk
    fn check_upload(&self, bytes: &[u8], original_filename: &str) -> Result<String, FileStoreError> {
        let extension = accepted_extension(original_filename)?;
        if bytes.is_empty() {
            return Err(FileStoreError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(FileStoreError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }
        Ok(extension)
    }

    /// Write an image and return its stored identifier.
    ///
    /// The bytes go to a hidden temporary file that is renamed into place, and
    /// the temporary file is removed on failure, so an interrupted write never
    /// leaves a partial image behind.
    pub async fn save(&self, bytes: &[u8], original_filename: &str) -> Result<String, FileStoreError> {
        let extension = self.check_upload(bytes, original_filename)?;

        let stored = format!(
            "{}_{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension
        );
        let target = self.root.join(&stored);
        let temp = self.root.join(format!(".{stored}.part"));

        if let Err(e) = write_new_file(&temp, bytes).await {
            remove_if_present(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            remove_if_present(&temp).await;
            return Err(e.into());
        }

        info!("Saved prescription {} ({} bytes) from '{}'", stored, bytes.len(), original_filename);
        Ok(stored)
    }

    pub async fn read(&self, stored: &str) -> Result<Vec<u8>, FileStoreError> {
        let path = self.resolve(stored)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FileStoreError::NotFound(stored.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an image; a missing file is not an error
    pub async fn delete(&self, stored: &str) -> Result<(), FileStoreError> {
        let path = self.resolve(stored)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted prescription {}", stored);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, stored: &str) -> Result<bool, FileStoreError> {
        let path = self.resolve(stored)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// MIME type for serving a stored image
    pub fn content_type(stored: &str) -> &'static str {
        match extension_of(stored).as_deref() {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => "application/octet-stream",
        }
    }

    fn resolve(&self, stored: &str) -> Result<PathBuf, FileStoreError> {
        let is_plain_name = !stored.is_empty()
            && !stored.starts_with('.')
            && !stored.contains(|c: char| c == '/' || c == '\\')
            && !stored.contains("..");

        if !is_plain_name || accepted_extension(stored).is_err() {
            return Err(FileStoreError::InvalidPath(stored.to_string()));
        }
        Ok(self.root.join(stored))
    }
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn accepted_extension(filename: &str) -> Result<String, FileStoreError> {
    let extension = extension_of(filename).unwrap_or_default();
    if ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(FileStoreError::UnsupportedType(extension))
    }
}

async fn write_new_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

async fn remove_if_present(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove temporary upload {}: {}", path.display(), e);
        }
    }
}
