//! Tokio-backed file system.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use kustforge_application::ports::{FileSystem, FileSystemError};
use tokio::fs;

/// Real file system implementation using `tokio::fs`.
#[derive(Debug, Clone, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    /// Creates a new `TokioFileSystem`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn map_io(path: &Path, err: std::io::Error) -> FileSystemError {
    match err.kind() {
        ErrorKind::NotFound => FileSystemError::NotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => FileSystemError::PermissionDenied(path.to_path_buf()),
        _ => FileSystemError::Io(err),
    }
}

impl FileSystem for TokioFileSystem {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, FileSystemError> {
        fs::read(path).await.map_err(|e| map_io(path, e))
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), FileSystemError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io(parent, e))?;
        }
        fs::write(path, contents).await.map_err(|e| map_io(path, e))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), FileSystemError> {
        fs::create_dir_all(path).await.map_err(|e| map_io(path, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok()
    }

    async fn is_dir(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok_and(|m| m.is_dir())
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, FileSystemError> {
        let mut dir = fs::read_dir(path).await.map_err(|e| map_io(path, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }

    async fn remove_file(&self, path: &Path) -> Result<(), FileSystemError> {
        fs::remove_file(path).await.map_err(|e| map_io(path, e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), FileSystemError> {
        fs::rename(from, to).await.map_err(|e| map_io(from, e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_write_creates_parents_and_reads_back() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        let path = dir.path().join("a/b/out.yaml");

        fs.write_file(&path, b"key: value\r\n").await.unwrap();

        assert_eq!(fs.read_file(&path).await.unwrap(), b"key: value\r\n");
        assert!(fs.is_dir(&dir.path().join("a/b")).await);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        let err = fs.read_file(&dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, FileSystemError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_dir_is_sorted() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        for name in ["c", "a", "b"] {
            fs.write_file(&dir.path().join(name), b"").await.unwrap();
        }

        let names: Vec<String> = fs
            .read_dir(dir.path())
            .await
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_rename_replaces_destination() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        let from = dir.path().join("tmp");
        let to = dir.path().join("final");
        fs.write_file(&to, b"old").await.unwrap();
        fs.write_file(&from, b"new").await.unwrap();

        fs.rename(&from, &to).await.unwrap();

        assert!(!fs.exists(&from).await);
        assert_eq!(fs.read_file(&to).await.unwrap(), b"new");
    }
}
