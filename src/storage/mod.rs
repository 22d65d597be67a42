//! Object storage for uploaded files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

mod allowlist;
pub use allowlist::{ALLOWED_TYPES, AllowedType, FileCategory, validate_upload};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file extension `{0}` is not allowed")]
    ExtensionNotAllowed(String),
    #[error("content type `{content_type}` does not match extension `{extension}`")]
    ContentTypeMismatch {
        extension: String,
        content_type: String,
    },
    #[error("file is too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },
    #[error("file is empty")]
    Empty,
    #[error("invalid object id: {0}")]
    InvalidId(String),
}

impl StorageError {
    /// Errors caused by the uploaded file itself rather than by the backend.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct StoredObject {
    pub url: String,
    pub public_id: String,
    pub size: usize,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, file_name: &str, content_type: &str, bytes: &[u8]) -> StorageResult<StoredObject>;

    async fn delete(&self, public_id: &str) -> StorageResult<()>;
}

/// Stores objects as files in one directory that is served statically.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_path: String,
}

impl LocalStorage {
    pub async fn new(root: impl Into<PathBuf>, public_path: &str) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_path: public_path.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, public_id: &str) -> StorageResult<PathBuf> {
        let valid = !public_id.is_empty()
            && public_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !public_id.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidId(public_id.to_string()));
        }
        Ok(self.root.join(public_id))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, file_name: &str, _content_type: &str, bytes: &[u8]) -> StorageResult<StoredObject> {
        let extension = allowlist::extension_of(file_name)
            .ok_or_else(|| StorageError::ExtensionNotAllowed(String::new()))?;
        let public_id = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.object_path(&public_id)?;

        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(%public_id, size = bytes.len(), "object stored");

        Ok(StoredObject {
            url: format!("{}/{}", self.public_path, public_id),
            public_id,
            size: bytes.len(),
        })
    }

    async fn delete(&self, public_id: &str) -> StorageResult<()> {
        let path = self.object_path(public_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/api/static/").await.unwrap();

        let stored = storage.put("Photo.PNG", "image/png", b"png").await.unwrap();
        assert!(stored.public_id.ends_with(".png"));
        assert_eq!(stored.url, format!("/api/static/{}", stored.public_id));
        assert_eq!(stored.size, 3);
        assert!(dir.path().join(&stored.public_id).exists());

        storage.delete(&stored.public_id).await.unwrap();
        assert!(!dir.path().join(&stored.public_id).exists());
        // deleting twice is fine
        storage.delete(&stored.public_id).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/static").await.unwrap();

        for id in ["../config.toml", "a/b.png", "", ".hidden"] {
            assert!(matches!(
                storage.delete(id).await,
                Err(StorageError::InvalidId(_))
            ));
        }
    }
}
