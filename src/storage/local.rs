//! Local filesystem storage backend

use super::{path_segments, StorageError, StorageMover};
use async_trait::async_trait;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Storage rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.root.clone();
        resolved.extend(path_segments(path)?);
        Ok(resolved)
    }
}

/// Metadata without following symlinks, `None` if nothing is there
async fn entry(path: &Path) -> Option<Metadata> {
    fs::symlink_metadata(path).await.ok()
}

#[async_trait]
impl StorageMover for LocalStorage {
    async fn create_folder(&self, path: &str) -> Result<(), StorageError> {
        let dir = self.resolve(path)?;

        // Follows links: a link to a folder is a usable folder
        if fs::metadata(&dir).await.is_ok_and(|meta| !meta.is_dir()) {
            return Err(StorageError::NotAFolder {
                path: path.to_string(),
            });
        }

        fs::create_dir_all(&dir).await?;
        tracing::debug!(path = %dir.display(), "Folder ready");
        Ok(())
    }

    async fn move_item(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;

        let Some(src_meta) = entry(&src).await else {
            return Err(StorageError::SourceNotFound {
                path: from.to_string(),
            });
        };

        if entry(&dst).await.is_some() {
            return Err(StorageError::DestinationExists {
                path: to.to_string(),
            });
        }

        // Try rename first (same filesystem), fall back to copy+delete
        if let Err(rename_err) = fs::rename(&src, &dst).await {
            if src_meta.is_dir() {
                return Err(rename_err.into());
            }
            tracing::debug!(error = %rename_err, "Rename failed, copying instead");
            fs::copy(&src, &dst).await?;
            fs::remove_file(&src).await?;
        }

        tracing::debug!(from = %src.display(), to = %dst.display(), "Moved item");
        Ok(())
    }
}
