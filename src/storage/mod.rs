//! Storage backends
//!
//! The pipeline only needs two operations from storage: create a folder
//! (idempotent) and move/rename an item. Paths are `/`-separated and relative
//! to the backend's root; a leading `/` is ignored.

pub mod graph;
pub mod local;

pub use graph::GraphStorage;
pub use local::LocalStorage;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Source does not exist: {path}")]
    SourceNotFound { path: String },

    #[error("Destination already exists: {path}")]
    DestinationExists { path: String },

    #[error("Path exists but is not a folder: {path}")]
    NotAFolder { path: String },

    #[error("Invalid storage path: {path:?}")]
    InvalidPath { path: String },

    #[error("Invalid storage URL: {0}")]
    InvalidUrl(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Storage API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Folder creation and move/rename against a storage root
#[async_trait]
pub trait StorageMover: Send + Sync {
    /// Create the folder and any missing parents. Succeeds if it already exists.
    async fn create_folder(&self, path: &str) -> Result<(), StorageError>;

    /// Move `from` to `to`, renaming on the way. Never overwrites.
    async fn move_item(&self, from: &str, to: &str) -> Result<(), StorageError>;
}

/// Split a storage path into segments, rejecting `..` and empty paths
pub fn path_segments(path: &str) -> Result<Vec<&str>, StorageError> {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    if segments.is_empty() || segments.iter().any(|s| *s == ".." || s.contains('\\')) {
        return Err(StorageError::InvalidPath {
            path: path.to_string(),
        });
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        assert_eq!(
            path_segments("/processed_files/sales_data/a.xlsx").unwrap(),
            vec!["processed_files", "sales_data", "a.xlsx"]
        );
        assert_eq!(path_segments("a//./b").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_path_segments_rejects_escapes() {
        assert!(path_segments("../etc/passwd").is_err());
        assert!(path_segments("a/../../b").is_err());
        assert!(path_segments("a\\..\\b").is_err());
        assert!(path_segments("/").is_err());
        assert!(path_segments("").is_err());
    }
}
