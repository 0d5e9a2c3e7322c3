//! File service for filedepot.
//!
//! Orchestrates uploads, downloads, deletion, renames and sharing over the
//! metadata stores, the physical storage adapter and the thumbnail
//! pipeline. Access on the read path goes through the resolver; write
//! operations are owner-only whenever an owner is recorded.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::media::{is_image_mime, ThumbnailGenerator};
use crate::{DepotError, Result};

use super::access::{resolve_file_access, ShareBackend};
use super::folder::FolderStore;
use super::metadata::{FileRecord, FileStore, FileUpdate, NewFileRecord};
use super::share::{AccessLevel, FileShare, NewShare, ReferenceCleanup, ShareStore};
use super::storage::FileStorage;
use super::{AccessType, MAX_NAME_LENGTH};

/// An upload to be stored.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Original filename.
    pub original_name: String,
    /// Declared MIME type; guessed from the filename when absent.
    pub mime_type: Option<String>,
    /// File contents.
    pub data: Vec<u8>,
    /// Destination folder.
    pub folder_id: Option<String>,
    /// Uploading user.
    pub owner_id: Option<i64>,
    /// Coarse access label for the new file.
    pub access: AccessType,
}

impl UploadRequest {
    /// Create a new UploadRequest.
    pub fn new(original_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: None,
            data,
            folder_id: None,
            owner_id: None,
            access: AccessType::Private,
        }
    }

    /// Set the declared MIME type.
    pub fn with_mime(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the destination folder.
    pub fn with_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    /// Set the owner.
    pub fn with_owner(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Set the access label.
    pub fn with_access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }
}

/// Everything a caller needs to serve a downloaded file.
#[derive(Debug, Clone)]
pub struct DownloadHandle {
    /// Path of the file on disk.
    pub path: PathBuf,
    /// Name to present to the downloader.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
}

/// Check a MIME type against the allow list.
///
/// Entries ending in "/*" match the whole top-level type.
fn mime_allowed(mime: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|entry| {
        if let Some(prefix) = entry.strip_suffix("/*") {
            mime.split('/')
                .next()
                .is_some_and(|t| t.eq_ignore_ascii_case(prefix))
        } else {
            entry.eq_ignore_ascii_case(mime)
        }
    })
}

/// Sanitize a filename: strip line breaks and surrounding whitespace.
fn sanitize_name(name: &str) -> String {
    name.replace(['\n', '\r'], "").trim().to_string()
}

/// Service for file operations.
pub struct FileService<F, M, S> {
    folders: F,
    files: M,
    shares: ShareBackend<S>,
    storage: FileStorage,
    thumbnails: Option<ThumbnailGenerator>,
    cleanups: Vec<Arc<dyn ReferenceCleanup>>,
    max_file_size: u64,
    allowed_mime_types: Vec<String>,
    enable_thumbnails: bool,
}

impl<F, M, S> FileService<F, M, S>
where
    F: FolderStore,
    M: FileStore,
    S: ShareStore,
{
    /// Create a new FileService.
    pub fn new(
        folders: F,
        files: M,
        shares: ShareBackend<S>,
        storage: FileStorage,
        config: &StorageConfig,
    ) -> Self {
        Self {
            folders,
            files,
            shares,
            storage,
            thumbnails: None,
            cleanups: Vec::new(),
            max_file_size: config.max_file_size,
            allowed_mime_types: config.allowed_mime_types.clone(),
            enable_thumbnails: config.enable_thumbnails,
        }
    }

    /// Attach a thumbnail generator for uploaded images.
    ///
    /// Generation still only runs when the storage configuration has
    /// thumbnails enabled.
    pub fn with_thumbnails(mut self, thumbnails: ThumbnailGenerator) -> Self {
        self.thumbnails = Some(thumbnails);
        self
    }

    /// Register a cleanup hook run when files are deleted.
    pub fn add_cleanup(mut self, cleanup: impl ReferenceCleanup + 'static) -> Self {
        self.cleanups.push(Arc::new(cleanup));
        self
    }

    /// Store an uploaded file.
    ///
    /// Validates the name, size and MIME type, writes the bytes, generates
    /// a thumbnail for images when enabled, then persists the metadata.
    /// Failures after the physical write remove the written file again.
    pub async fn upload(&self, request: UploadRequest) -> Result<FileRecord> {
        let name = sanitize_name(&request.original_name);

        if name.is_empty() {
            return Err(DepotError::Validation(
                "filename cannot be empty".to_string(),
            ));
        }

        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(DepotError::Validation(format!(
                "filename cannot exceed {MAX_NAME_LENGTH} characters"
            )));
        }

        if request.data.len() as u64 > self.max_file_size {
            return Err(DepotError::Validation(format!(
                "file exceeds the maximum size of {} bytes",
                self.max_file_size
            )));
        }

        let mime_type = match request.mime_type {
            Some(mime) => mime,
            None => mime_guess::from_path(&name)
                .first_or_octet_stream()
                .to_string(),
        };

        if !mime_allowed(&mime_type, &self.allowed_mime_types) {
            return Err(DepotError::Validation(format!(
                "file type '{mime_type}' is not allowed"
            )));
        }

        if let Some(ref folder_id) = request.folder_id {
            self.folders
                .get_by_id(folder_id)
                .await?
                .ok_or_else(|| DepotError::FolderNotFound(folder_id.clone()))?;
        }

        let id = Uuid::new_v4().to_string();
        let stored_name = FileStorage::stored_name(&id, &name);
        let path = self
            .storage
            .storage_path(request.folder_id.as_deref(), &stored_name);

        self.storage.save(&path, &request.data).await?;

        let thumbnail_path = match self.thumbnails {
            Some(ref thumbnails) if self.enable_thumbnails && is_image_mime(&mime_type) => {
                match thumbnails.generate(&path, &stored_name).await {
                    Ok(thumb) => Some(thumb.to_string_lossy().into_owned()),
                    Err(e) => {
                        self.storage.delete(&path).await;
                        return Err(e);
                    }
                }
            }
            _ => None,
        };

        let mut record = NewFileRecord::new(
            &id,
            &name,
            &stored_name,
            path.to_string_lossy().into_owned(),
            request.data.len() as i64,
            &mime_type,
        )
        .with_access(request.access);
        record.folder_id = request.folder_id;
        record.owner_id = request.owner_id;
        record.thumbnail_path = thumbnail_path;

        let created = match self.files.create(&record).await {
            Ok(created) => created,
            Err(e) => {
                // Keep disk and metadata consistent
                self.storage.delete(&path).await;
                if let Some(ref thumb) = record.thumbnail_path {
                    self.storage.delete(std::path::Path::new(thumb)).await;
                }
                return Err(e);
            }
        };

        info!(
            "Uploaded '{}' ({} bytes) as {}",
            created.original_name, created.size, created.id
        );
        Ok(created)
    }

    /// Get a file by ID.
    pub async fn get_file(&self, id: &str) -> Result<FileRecord> {
        self.files
            .get_by_id(id)
            .await?
            .ok_or_else(|| DepotError::FileNotFound(id.to_string()))
    }

    /// Resolve access and hand out a file for download.
    ///
    /// Counts the download when access is granted.
    pub async fn download(&self, id: &str, user_id: Option<i64>) -> Result<DownloadHandle> {
        let file = self.get_file(id).await?;

        let folder = match file.folder_id {
            Some(ref folder_id) => self.folders.get_by_id(folder_id).await?,
            None => None,
        };

        let decision = resolve_file_access(&file, folder.as_ref(), user_id, &self.shares).await?;
        if !decision.is_granted() {
            return Err(DepotError::Permission(format!(
                "no access to file {id}"
            )));
        }

        let path = PathBuf::from(&file.path);
        if !self.storage.exists(&path).await {
            return Err(DepotError::FileNotFound(file.path.clone()));
        }

        self.files.increment_downloads(id).await?;

        Ok(DownloadHandle {
            path,
            name: file.original_name,
            mime_type: file.mime_type,
        })
    }

    /// Delete a file. Only the owner may delete when an owner is recorded.
    ///
    /// Physical deletion of the file and its thumbnail is best effort;
    /// share rows and foreign references go before the metadata row.
    pub async fn delete_file(&self, id: &str, user_id: Option<i64>) -> Result<()> {
        let file = self.get_file(id).await?;

        if let (Some(user_id), Some(owner_id)) = (user_id, file.owner_id) {
            if user_id != owner_id {
                return Err(DepotError::Permission(
                    "only the owner can delete a file".to_string(),
                ));
            }
        }

        if !self.storage.delete(std::path::Path::new(&file.path)).await {
            warn!("Physical file {} left behind", file.path);
        }
        if let Some(ref thumb) = file.thumbnail_path {
            if !self.storage.delete(std::path::Path::new(thumb)).await {
                warn!("Thumbnail {} left behind", thumb);
            }
        }

        if let ShareBackend::Store(ref shares) = self.shares {
            shares.delete_for_file(id).await?;
        }

        for cleanup in &self.cleanups {
            cleanup.remove_references(id).await?;
        }

        self.files.delete(id).await?;

        info!("Deleted file '{}' ({})", file.original_name, id);
        Ok(())
    }

    /// Rename a file, preserving its extension.
    ///
    /// Line breaks are stripped from the new name; the stored file on disk
    /// is untouched since its name is keyed by the file ID.
    pub async fn rename_file(
        &self,
        id: &str,
        new_name: &str,
        user_id: Option<i64>,
    ) -> Result<FileRecord> {
        let file = self.get_file(id).await?;

        if let (Some(user_id), Some(owner_id)) = (user_id, file.owner_id) {
            if user_id != owner_id {
                return Err(DepotError::Permission(
                    "only the owner can rename a file".to_string(),
                ));
            }
        }

        let name = sanitize_name(new_name);
        if name.is_empty() {
            return Err(DepotError::Validation(
                "filename cannot be empty".to_string(),
            ));
        }

        let ext = FileStorage::extract_extension(&file.original_name);
        let renamed = if !ext.is_empty() && !name.to_lowercase().ends_with(&ext) {
            format!("{name}{ext}")
        } else {
            name
        };

        if renamed.chars().count() > MAX_NAME_LENGTH {
            return Err(DepotError::Validation(format!(
                "filename cannot exceed {MAX_NAME_LENGTH} characters"
            )));
        }

        self.files
            .update(id, &FileUpdate::new().original_name(renamed))
            .await?
            .ok_or_else(|| DepotError::FileNotFound(id.to_string()))
    }

    /// Share a file with a list of users at the given access level.
    /// Only the owner may share.
    pub async fn share_file_with_users(
        &self,
        file_id: &str,
        owner_id: i64,
        user_ids: &[i64],
        level: AccessLevel,
    ) -> Result<Vec<FileShare>> {
        if user_ids.is_empty() {
            return Err(DepotError::Validation(
                "no users to share the file with".to_string(),
            ));
        }

        let file = self.get_file(file_id).await?;

        if file.owner_id != Some(owner_id) {
            return Err(DepotError::Permission(
                "only the owner can share a file".to_string(),
            ));
        }

        let ShareBackend::Store(ref shares) = self.shares else {
            return Err(DepotError::Config(
                "sharing is not available".to_string(),
            ));
        };

        let mut created = Vec::with_capacity(user_ids.len());
        for &user_id in user_ids {
            created.push(
                shares
                    .share_file(file_id, &NewShare::for_user(user_id).with_access(level))
                    .await?,
            );
        }

        info!(
            "Shared file '{}' ({}) with {} user(s)",
            file.original_name,
            file_id,
            created.len()
        );
        Ok(created)
    }

    /// List files that have a share grant for the given user.
    pub async fn files_shared_with_user(&self, user_id: i64) -> Result<Vec<FileRecord>> {
        let ShareBackend::Store(ref shares) = self.shares else {
            return Ok(Vec::new());
        };

        let ids = shares.file_ids_shared_with_user(user_id).await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            // A grant may outlive its file row briefly during deletion
            if let Some(record) = self.files.get_by_id(&id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }
}
