//! File storage for uploaded document versions.
//!
//! Paths handed to and returned from a [`FileStore`] are relative to the
//! store root and `/`-separated (e.g. `uploads/documents/<patient>/<doc>/v1_<uuid>.pdf`).

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),
}

/// Extensions accepted for upload (lowercase, with dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &[".pdf", ".jpg", ".jpeg", ".png", ".csv"];

/// Byte storage for document versions.
pub trait FileStore {
    fn save(&self, relative_path: &str, bytes: &[u8]) -> Result<(), StorageError>;
    fn read(&self, relative_path: &str) -> Result<Vec<u8>, StorageError>;
    fn delete(&self, relative_path: &str) -> Result<(), StorageError>;
    fn exists(&self, relative_path: &str) -> bool;
}

/// Files under a directory on the local filesystem.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a relative path under the root, refusing anything that
    /// would escape it.
    pub fn full_path(&self, relative_path: &str) -> Result<PathBuf, StorageError> {
        let trimmed = relative_path.trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(StorageError::InvalidPath(relative_path.into()));
        }
        let rel = Path::new(trimmed);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(StorageError::InvalidPath(relative_path.into()));
        }
        Ok(self.root.join(rel))
    }
}

impl FileStore for LocalFileStore {
    fn save(&self, relative_path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full_path = self.full_path(relative_path)?;
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full_path, bytes)?;
        Ok(())
    }

    fn read(&self, relative_path: &str) -> Result<Vec<u8>, StorageError> {
        Ok(std::fs::read(self.full_path(relative_path)?)?)
    }

    /// Deleting a file that is already gone is not an error.
    fn delete(&self, relative_path: &str) -> Result<(), StorageError> {
        let full_path = self.full_path(relative_path)?;
        match std::fs::remove_file(&full_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, relative_path: &str) -> bool {
        self.full_path(relative_path)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }
}

/// Lowercased extension (with dot) of an uploaded file name, if allowed.
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))?;
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Storage path for a new version: `uploads/documents/{patient}/{document}/v{n}_{uuid}{ext}`.
pub fn version_path(patient_id: &Uuid, document_id: &Uuid, version_number: u32, extension: &str) -> String {
    format!(
        "uploads/documents/{patient_id}/{document_id}/v{version_number}_{}{extension}",
        Uuid::new_v4()
    )
}

/// Hex SHA-256 of the given bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
