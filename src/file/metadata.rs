//! File metadata types and repository for filedepot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool};

use crate::{DepotError, Result};

use super::AccessType;

/// Metadata for a stored file.
///
/// The storage path is derived from the folder and file identifiers and must
/// exist on disk whenever this record exists, except in the narrow window
/// between the metadata write and the physical write.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileRecord {
    /// Unique file ID.
    pub id: String,
    /// Original filename (display name).
    pub original_name: String,
    /// Stored filename ({id}{ext} format).
    pub stored_name: String,
    /// Full storage path on disk.
    pub path: String,
    /// Path of the generated thumbnail, if any.
    pub thumbnail_path: Option<String>,
    /// File size in bytes.
    pub size: i64,
    /// MIME type.
    pub mime_type: String,
    /// Folder ID this file belongs to (None for root).
    pub folder_id: Option<String>,
    /// User ID of the owner.
    pub owner_id: Option<i64>,
    /// Coarse access label.
    #[sqlx(try_from = "String")]
    pub access: AccessType,
    /// Number of times downloaded.
    pub downloads: i64,
    /// When the file was uploaded.
    pub created_at: String,
    /// When the metadata was last updated.
    pub updated_at: String,
}

impl FileRecord {
    /// Get the created_at as DateTime<Utc>.
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("{}Z", self.created_at.replace(' ', "T")))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

/// Data for creating a new file record.
///
/// The ID is supplied by the caller because the storage path embeds it and
/// the physical write happens before the metadata write.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    /// File ID.
    pub id: String,
    /// Original filename.
    pub original_name: String,
    /// Stored filename.
    pub stored_name: String,
    /// Full storage path.
    pub path: String,
    /// File size in bytes.
    pub size: i64,
    /// MIME type.
    pub mime_type: String,
    /// Folder ID this file belongs to.
    pub folder_id: Option<String>,
    /// User ID of the owner.
    pub owner_id: Option<i64>,
    /// Coarse access label.
    pub access: AccessType,
    /// Thumbnail path, if one was generated.
    pub thumbnail_path: Option<String>,
}

impl NewFileRecord {
    /// Create a new NewFileRecord.
    pub fn new(
        id: impl Into<String>,
        original_name: impl Into<String>,
        stored_name: impl Into<String>,
        path: impl Into<String>,
        size: i64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            original_name: original_name.into(),
            stored_name: stored_name.into(),
            path: path.into(),
            size,
            mime_type: mime_type.into(),
            folder_id: None,
            owner_id: None,
            access: AccessType::Private,
            thumbnail_path: None,
        }
    }

    /// Set the folder.
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

    /// Set the thumbnail path.
    pub fn with_thumbnail(mut self, thumbnail_path: impl Into<String>) -> Self {
        self.thumbnail_path = Some(thumbnail_path.into());
        self
    }
}

/// Builder for updating file metadata.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    /// New display name.
    pub original_name: Option<String>,
    /// New thumbnail path (Some(None) clears it).
    pub thumbnail_path: Option<Option<String>>,
    /// New access label.
    pub access: Option<AccessType>,
}

impl FileUpdate {
    /// Create a new FileUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name.
    pub fn original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    /// Set the thumbnail path.
    pub fn thumbnail_path(mut self, path: Option<impl Into<String>>) -> Self {
        self.thumbnail_path = Some(path.map(|p| p.into()));
        self
    }

    /// Set the access label.
    pub fn access(mut self, access: AccessType) -> Self {
        self.access = Some(access);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.original_name.is_none() && self.thumbnail_path.is_none() && self.access.is_none()
    }
}

/// Metadata-store interface for files.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Create a new file record.
    async fn create(&self, file: &NewFileRecord) -> Result<FileRecord>;

    /// Get a file by ID.
    async fn get_by_id(&self, id: &str) -> Result<Option<FileRecord>>;

    /// Get a file by storage path.
    async fn get_by_path(&self, path: &str) -> Result<Option<FileRecord>>;

    /// List files in a folder (None lists unfoldered files).
    async fn list_by_folder(&self, folder_id: Option<&str>) -> Result<Vec<FileRecord>>;

    /// List files owned by a user.
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<FileRecord>>;

    /// Update file metadata. Returns None if the file does not exist.
    async fn update(&self, id: &str, update: &FileUpdate) -> Result<Option<FileRecord>>;

    /// Increment the download count for a file.
    async fn increment_downloads(&self, id: &str) -> Result<i64>;

    /// Delete a file record by ID. Returns whether a row was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Count files in a folder.
    async fn count_by_folder(&self, folder_id: &str) -> Result<i64>;

    /// Get total size of files in a folder.
    async fn total_size_by_folder(&self, folder_id: &str) -> Result<i64>;
}

/// sqlx-backed repository for file metadata operations.
#[derive(Debug, Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    /// Create a new FileRepository with the given database pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, original_name, stored_name, path, thumbnail_path, size, \
     mime_type, folder_id, owner_id, access, downloads, created_at, updated_at";

#[async_trait]
impl FileStore for FileRepository {
    async fn create(&self, file: &NewFileRecord) -> Result<FileRecord> {
        sqlx::query(
            "INSERT INTO files (id, original_name, stored_name, path, thumbnail_path, size,
                                mime_type, folder_id, owner_id, access)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.id)
        .bind(&file.original_name)
        .bind(&file.stored_name)
        .bind(&file.path)
        .bind(&file.thumbnail_path)
        .bind(file.size)
        .bind(&file.mime_type)
        .bind(&file.folder_id)
        .bind(file.owner_id)
        .bind(file.access.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DepotError::Database(e.to_string()))?;

        self.get_by_id(&file.id)
            .await?
            .ok_or_else(|| DepotError::FileNotFound(file.id.clone()))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(file)
    }

    async fn get_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM files WHERE path = ?"
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(file)
    }

    async fn list_by_folder(&self, folder_id: Option<&str>) -> Result<Vec<FileRecord>> {
        let files = match folder_id {
            Some(folder_id) => {
                sqlx::query_as::<_, FileRecord>(&format!(
                    "SELECT {SELECT_COLUMNS} FROM files
                     WHERE folder_id = ? ORDER BY created_at DESC, id DESC"
                ))
                .bind(folder_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, FileRecord>(&format!(
                    "SELECT {SELECT_COLUMNS} FROM files
                     WHERE folder_id IS NULL ORDER BY created_at DESC, id DESC"
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(files)
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM files
             WHERE owner_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(files)
    }

    async fn update(&self, id: &str, update: &FileUpdate) -> Result<Option<FileRecord>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE files SET ");
        let mut separated = query.separated(", ");

        if let Some(ref original_name) = update.original_name {
            separated.push("original_name = ");
            separated.push_bind_unseparated(original_name);
        }

        if let Some(ref thumbnail_path) = update.thumbnail_path {
            separated.push("thumbnail_path = ");
            separated.push_bind_unseparated(thumbnail_path.clone());
        }

        if let Some(access) = update.access {
            separated.push("access = ");
            separated.push_bind_unseparated(access.as_str().to_string());
        }

        separated.push("updated_at = datetime('now')");

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| DepotError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    async fn increment_downloads(&self, id: &str) -> Result<i64> {
        sqlx::query("UPDATE files SET downloads = downloads + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DepotError::Database(e.to_string()))?;

        let downloads: i64 = sqlx::query_scalar("SELECT downloads FROM files WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(downloads)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_folder(&self, folder_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE folder_id = ?")
            .bind(folder_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(count)
    }

    async fn total_size_by_folder(&self, folder_id: &str) -> Result<i64> {
        let size: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM files WHERE folder_id = ?")
                .bind(folder_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(size)
    }
}
