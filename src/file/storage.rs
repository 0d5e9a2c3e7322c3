//! Physical file storage for filedepot.
//!
//! Storage paths mirror metadata identifiers: a file in a folder lives at
//! `{upload_root}/{folder_id}/{stored_name}`, an unfoldered file at
//! `{upload_root}/{stored_name}`. The stored name is `{file_id}{ext}` with
//! the extension taken from the original filename.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::{DepotError, Result};

/// Filesystem adapter keyed by metadata identifiers.
#[derive(Debug, Clone)]
pub struct FileStorage {
    upload_root: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage rooted at the given directory.
    pub fn new(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
        }
    }

    /// Create a FileStorage from the storage configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.upload_root)
    }

    /// The root directory uploads are stored under.
    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    /// Extract the extension from a filename, including the dot.
    ///
    /// Returns an empty string when there is no extension. The extension is
    /// lowercased so stored names are stable regardless of input casing.
    pub fn extract_extension(name: &str) -> String {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default()
    }

    /// Derive the stored filename for a file ID and original name.
    pub fn stored_name(file_id: &str, original_name: &str) -> String {
        format!("{}{}", file_id, Self::extract_extension(original_name))
    }

    /// Derive the storage path for a stored name, optionally inside a folder.
    pub fn storage_path(&self, folder_id: Option<&str>, stored_name: &str) -> PathBuf {
        match folder_id {
            Some(folder_id) => self.upload_root.join(folder_id).join(stored_name),
            None => self.upload_root.join(stored_name),
        }
    }

    /// Ensure the directory for a folder exists.
    ///
    /// Creating an already existing directory is not an error.
    pub async fn ensure_folder_dir(&self, folder_id: &str) -> Result<PathBuf> {
        let dir = self.upload_root.join(folder_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Remove the directory for a folder, best effort.
    ///
    /// Only removes the directory if it is empty; a missing directory
    /// counts as removed.
    pub async fn remove_folder_dir(&self, folder_id: &str) -> bool {
        let dir = self.upload_root.join(folder_id);
        match fs::remove_dir(&dir).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Could not remove folder directory {:?}: {}", dir, e);
                false
            }
        }
    }

    /// Write file bytes to the given path, creating parent directories.
    pub async fn save(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DepotError::Upload(format!("cannot create {:?}: {}", parent, e)))?;
        }

        fs::write(path, data)
            .await
            .map_err(|e| DepotError::Upload(format!("cannot write {:?}: {}", path, e)))?;

        debug!("Wrote {} bytes to {:?}", data.len(), path);
        Ok(())
    }

    /// Read file bytes from the given path.
    pub async fn load(&self, path: &Path) -> Result<Vec<u8>> {
        match fs::read(path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DepotError::FileNotFound(
                path.to_string_lossy().into_owned(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether a path exists on disk.
    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Get the size of a file on disk.
    pub async fn file_size(&self, path: &Path) -> Result<u64> {
        let meta = fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DepotError::FileNotFound(path.to_string_lossy().into_owned())
            } else {
                e.into()
            }
        })?;
        Ok(meta.len())
    }

    /// Delete a file, best effort. Returns whether it is gone afterwards.
    ///
    /// Deletion failures are logged, not propagated; metadata removal must
    /// proceed even when the physical file is stuck.
    pub async fn delete(&self, path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Deleted {:?}", path);
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Could not delete {:?}: {}", path, e);
                false
            }
        }
    }

    /// Remove empty folder directories under the upload root.
    ///
    /// Returns the number of directories removed.
    pub async fn cleanup_empty_dirs(&self) -> Result<usize> {
        let mut removed = 0;
        let mut entries = match fs::read_dir(&self.upload_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            // remove_dir fails on non-empty directories, which is the check
            if fs::remove_dir(&path).await.is_ok() {
                debug!("Removed empty directory {:?}", path);
                removed += 1;
            }
        }

        Ok(removed)
    }
}
