use std::path::{Path, PathBuf};
use tokio::fs;

use crate::types::Result;

/// File system utilities
pub struct FsUtils;

impl FsUtils {
    /// Ensure the directory exists
    pub async fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> Result<()> {
        fs::create_dir_all(path.as_ref()).await?;
        Ok(())
    }

    /// Write a file, creating parent directories as needed
    pub async fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            Self::ensure_dir_exists(parent).await?;
        }

        fs::write(path, contents).await?;
        Ok(())
    }

    /// Delete a directory and all its contents; a missing directory is fine
    pub async fn remove_dir_all<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(());
        }

        fs::remove_dir_all(path).await?;
        Ok(())
    }

    /// List entries of a directory, sorted by path
    pub async fn list_dir<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(path.as_ref()).await?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }

        paths.sort();
        Ok(paths)
    }

    /// Move a file, creating the target directory as needed
    pub async fn move_file<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> Result<()> {
        let to = to.as_ref();

        if let Some(parent) = to.parent() {
            Self::ensure_dir_exists(parent).await?;
        }

        fs::rename(from.as_ref(), to).await?;
        Ok(())
    }
}
