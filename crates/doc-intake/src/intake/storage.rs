use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to prepare scratch directory {path}: {source}")]
    Prepare { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to delete {path}: {source}")]
    Delete { path: PathBuf, source: io::Error },
}

fn join_failure(path: &Path, err: tokio::task::JoinError) -> io::Error {
    io::Error::other(format!(
        "scratch task for {} did not complete: {err}",
        path.display()
    ))
}

/// Handle to a document written by a [`DocumentStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    path: PathBuf,
}

impl StoredDocument {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Storage abstraction so the pipeline never touches a shared upload folder.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(&self, extension: &str, bytes: &[u8]) -> Result<StoredDocument, StorageError>;
    async fn read(&self, document: &StoredDocument) -> Result<Bytes, StorageError>;
    async fn delete(&self, document: StoredDocument) -> Result<(), StorageError>;
}

/// Private temp directory for one request, removed with everything in it on drop.
#[derive(Debug)]
pub struct ScratchStore {
    dir: TempDir,
}

impl ScratchStore {
    /// Create the shared root if needed, then a fresh directory inside it.
    pub async fn create_in(root: &Path) -> Result<Self, StorageError> {
        let prepare = |source: io::Error| StorageError::Prepare {
            path: root.to_path_buf(),
            source,
        };
        tokio::fs::create_dir_all(root).await.map_err(prepare)?;

        let parent = root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix("intake-").tempdir_in(parent)
        })
        .await
        .map_err(|err| prepare(join_failure(root, err)))?
        .map_err(prepare)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory and anything left in it off the async workers.
    /// Dropping the store without closing it still removes the directory.
    pub async fn close(self) -> Result<(), StorageError> {
        let path = self.dir.path().to_path_buf();
        tokio::task::spawn_blocking(move || self.dir.close())
            .await
            .map_err(|err| join_failure(&path, err))
            .and_then(|removed| removed)
            .map_err(|source| StorageError::Delete { path, source })
    }

    fn unique_name(extension: &str) -> String {
        let extension: String = extension
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(8)
            .collect();
        let stem = format!("{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple());
        if extension.is_empty() {
            stem
        } else {
            format!("{stem}.{extension}")
        }
    }
}

#[async_trait]
impl DocumentStore for ScratchStore {
    async fn save(&self, extension: &str, bytes: &[u8]) -> Result<StoredDocument, StorageError> {
        let path = self.dir.path().join(Self::unique_name(extension));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(StoredDocument { path })
    }

    async fn read(&self, document: &StoredDocument) -> Result<Bytes, StorageError> {
        tokio::fs::read(&document.path)
            .await
            .map(Bytes::from)
            .map_err(|source| StorageError::Read {
                path: document.path.clone(),
                source,
            })
    }

    async fn delete(&self, document: StoredDocument) -> Result<(), StorageError> {
        tokio::fs::remove_file(&document.path)
            .await
            .map_err(|source| StorageError::Delete {
                path: document.path,
                source,
            })
    }
}
