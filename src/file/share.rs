//! Share grants for files and folders.
//!
//! A grant row with a NULL user_id is a public grant that applies to any
//! caller. Grants are consulted by the access resolver after ownership and
//! folder publicity checks.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::{DepotError, Result};

/// Access level carried by a share grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessLevel {
    /// Grantee may read and download.
    #[default]
    Read,
    /// Grantee may also modify.
    Write,
}

impl AccessLevel {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(AccessLevel::Read),
            "write" => Ok(AccessLevel::Write),
            _ => Err(format!("unknown access level: {s}")),
        }
    }
}

impl TryFrom<String> for AccessLevel {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// A share grant on a file.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileShare {
    /// Unique grant ID.
    pub id: String,
    /// File this grant applies to.
    pub file_id: String,
    /// Grantee user ID (None grants everyone).
    pub user_id: Option<i64>,
    /// Access level.
    #[sqlx(try_from = "String")]
    pub access: AccessLevel,
    /// When the grant was created.
    pub created_at: String,
}

/// A share grant on a folder.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FolderShare {
    /// Unique grant ID.
    pub id: String,
    /// Folder this grant applies to.
    pub folder_id: String,
    /// Grantee user ID (None grants everyone).
    pub user_id: Option<i64>,
    /// Access level.
    #[sqlx(try_from = "String")]
    pub access: AccessLevel,
    /// When the grant was created.
    pub created_at: String,
}

/// Data for creating a share grant.
#[derive(Debug, Clone)]
pub struct NewShare {
    /// Grantee user ID (None for a public grant).
    pub user_id: Option<i64>,
    /// Access level.
    pub access: AccessLevel,
}

impl NewShare {
    /// Create a read grant for a specific user.
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            access: AccessLevel::Read,
        }
    }

    /// Create a public read grant.
    pub fn public() -> Self {
        Self {
            user_id: None,
            access: AccessLevel::Read,
        }
    }

    /// Set the access level.
    pub fn with_access(mut self, access: AccessLevel) -> Self {
        self.access = access;
        self
    }
}

/// Store interface for share grants.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Create a share grant on a file.
    async fn share_file(&self, file_id: &str, share: &NewShare) -> Result<FileShare>;

    /// Create a share grant on a folder.
    async fn share_folder(&self, folder_id: &str, share: &NewShare) -> Result<FolderShare>;

    /// List grants on a file.
    async fn list_file_shares(&self, file_id: &str) -> Result<Vec<FileShare>>;

    /// List grants on a folder.
    async fn list_folder_shares(&self, folder_id: &str) -> Result<Vec<FolderShare>>;

    /// Find a grant on a file that applies to the given user.
    ///
    /// A row with a NULL user_id applies to any caller; a user-specific row
    /// is preferred when both exist.
    async fn find_file_grant(&self, file_id: &str, user_id: Option<i64>)
        -> Result<Option<FileShare>>;

    /// Find a grant on a folder that applies to the given user.
    async fn find_folder_grant(
        &self,
        folder_id: &str,
        user_id: Option<i64>,
    ) -> Result<Option<FolderShare>>;

    /// Delete all grants on a file. Returns the number of rows removed.
    async fn delete_for_file(&self, file_id: &str) -> Result<u64>;

    /// Delete all grants on a folder. Returns the number of rows removed.
    async fn delete_for_folder(&self, folder_id: &str) -> Result<u64>;

    /// IDs of files with a grant for the given user (user-specific rows only).
    async fn file_ids_shared_with_user(&self, user_id: i64) -> Result<Vec<String>>;
}

/// sqlx-backed repository for share grants.
#[derive(Debug, Clone)]
pub struct ShareRepository {
    pool: SqlitePool,
}

impl ShareRepository {
    /// Create a new ShareRepository with the given database pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShareStore for ShareRepository {
    async fn share_file(&self, file_id: &str, share: &NewShare) -> Result<FileShare> {
        let id = Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO file_shares (id, file_id, user_id, access) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(file_id)
            .bind(share.user_id)
            .bind(share.access.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DepotError::Database(e.to_string()))?;

        let created = sqlx::query_as::<_, FileShare>(
            "SELECT id, file_id, user_id, access, created_at FROM file_shares WHERE id = ?",
        )
        .bind(&id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DepotError::Database(e.to_string()))?;

        debug!(file_id, user_id = ?share.user_id, "Created file share grant");
        Ok(created)
    }

    async fn share_folder(&self, folder_id: &str, share: &NewShare) -> Result<FolderShare> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO folder_shares (id, folder_id, user_id, access) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(folder_id)
        .bind(share.user_id)
        .bind(share.access.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DepotError::Database(e.to_string()))?;

        let created = sqlx::query_as::<_, FolderShare>(
            "SELECT id, folder_id, user_id, access, created_at FROM folder_shares WHERE id = ?",
        )
        .bind(&id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DepotError::Database(e.to_string()))?;

        debug!(folder_id, user_id = ?share.user_id, "Created folder share grant");
        Ok(created)
    }

    async fn list_file_shares(&self, file_id: &str) -> Result<Vec<FileShare>> {
        let shares = sqlx::query_as::<_, FileShare>(
            "SELECT id, file_id, user_id, access, created_at FROM file_shares
             WHERE file_id = ? ORDER BY created_at, id",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(shares)
    }

    async fn list_folder_shares(&self, folder_id: &str) -> Result<Vec<FolderShare>> {
        let shares = sqlx::query_as::<_, FolderShare>(
            "SELECT id, folder_id, user_id, access, created_at FROM folder_shares
             WHERE folder_id = ? ORDER BY created_at, id",
        )
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(shares)
    }

    async fn find_file_grant(
        &self,
        file_id: &str,
        user_id: Option<i64>,
    ) -> Result<Option<FileShare>> {
        let grant = match user_id {
            Some(user_id) => {
                // Prefer the user-specific row over a public one
                sqlx::query_as::<_, FileShare>(
                    "SELECT id, file_id, user_id, access, created_at FROM file_shares
                     WHERE file_id = ? AND (user_id = ? OR user_id IS NULL)
                     ORDER BY user_id IS NULL, created_at LIMIT 1",
                )
                .bind(file_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, FileShare>(
                    "SELECT id, file_id, user_id, access, created_at FROM file_shares
                     WHERE file_id = ? AND user_id IS NULL
                     ORDER BY created_at LIMIT 1",
                )
                .bind(file_id)
                .fetch_optional(&self.pool)
                .await
            }
        }
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(grant)
    }

    async fn find_folder_grant(
        &self,
        folder_id: &str,
        user_id: Option<i64>,
    ) -> Result<Option<FolderShare>> {
        let grant = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, FolderShare>(
                    "SELECT id, folder_id, user_id, access, created_at FROM folder_shares
                     WHERE folder_id = ? AND (user_id = ? OR user_id IS NULL)
                     ORDER BY user_id IS NULL, created_at LIMIT 1",
                )
                .bind(folder_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, FolderShare>(
                    "SELECT id, folder_id, user_id, access, created_at FROM folder_shares
                     WHERE folder_id = ? AND user_id IS NULL
                     ORDER BY created_at LIMIT 1",
                )
                .bind(folder_id)
                .fetch_optional(&self.pool)
                .await
            }
        }
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(grant)
    }

    async fn delete_for_file(&self, file_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM file_shares WHERE file_id = ?")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn delete_for_folder(&self, folder_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM folder_shares WHERE folder_id = ?")
            .bind(folder_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn file_ids_shared_with_user(&self, user_id: i64) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT file_id FROM file_shares WHERE user_id = ? ORDER BY file_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(ids)
    }
}

/// Cleanup hook for foreign subsystems that reference file IDs.
///
/// Invoked during file deletion after the physical bytes are gone but before
/// the metadata row is removed.
#[async_trait]
pub trait ReferenceCleanup: Send + Sync {
    /// Remove all references to the given file. Returns the number removed.
    async fn remove_references(&self, file_id: &str) -> Result<u64>;
}

/// Removes publication attachment rows that reference a deleted file.
#[derive(Debug, Clone)]
pub struct PostAttachmentCleanup {
    pool: SqlitePool,
}

impl PostAttachmentCleanup {
    /// Create a new PostAttachmentCleanup with the given database pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceCleanup for PostAttachmentCleanup {
    async fn remove_references(&self, file_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM post_attachments WHERE file_id = ?")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DepotError::Database(e.to_string()))?;

        if result.rows_affected() > 0 {
            debug!(
                file_id,
                count = result.rows_affected(),
                "Removed attachment references"
            );
        }
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{
        AccessType, FileRepository, FileStore, FolderRepository, FolderStore, NewFileRecord,
        NewFolder,
    };
    use crate::Database;

    async fn setup() -> (Database, String) {
        let db = Database::open_in_memory().await.unwrap();
        let folder = FolderRepository::new(db.pool().clone())
            .create(&NewFolder::new("Folder"))
            .await
            .unwrap();
        let file = FileRepository::new(db.pool().clone())
            .create(
                &NewFileRecord::new(
                    "file1",
                    "doc.pdf",
                    "file1.pdf",
                    format!("data/uploads/{}/file1.pdf", folder.id),
                    100,
                    "application/pdf",
                )
                .with_folder(&folder.id)
                .with_owner(1)
                .with_access(AccessType::Shared),
            )
            .await
            .unwrap();
        (db, file.id)
    }

    #[tokio::test]
    async fn test_share_file_with_user() {
        let (db, file_id) = setup().await;
        let repo = ShareRepository::new(db.pool().clone());

        let share = repo
            .share_file(&file_id, &NewShare::for_user(2))
            .await
            .unwrap();

        assert_eq!(share.file_id, file_id);
        assert_eq!(share.user_id, Some(2));
        assert_eq!(share.access, AccessLevel::Read);
    }

    #[tokio::test]
    async fn test_public_grant_has_null_user() {
        let (db, file_id) = setup().await;
        let repo = ShareRepository::new(db.pool().clone());

        let share = repo.share_file(&file_id, &NewShare::public()).await.unwrap();
        assert!(share.user_id.is_none());
    }

    #[tokio::test]
    async fn test_find_file_grant_for_user() {
        let (db, file_id) = setup().await;
        let repo = ShareRepository::new(db.pool().clone());

        repo.share_file(&file_id, &NewShare::for_user(2))
            .await
            .unwrap();

        let grant = repo.find_file_grant(&file_id, Some(2)).await.unwrap();
        assert!(grant.is_some());

        let other = repo.find_file_grant(&file_id, Some(3)).await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_public_grant_applies_to_everyone() {
        let (db, file_id) = setup().await;
        let repo = ShareRepository::new(db.pool().clone());

        repo.share_file(&file_id, &NewShare::public()).await.unwrap();

        assert!(repo
            .find_file_grant(&file_id, Some(99))
            .await
            .unwrap()
            .is_some());
        assert!(repo.find_file_grant(&file_id, None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_user_specific_grant_preferred_over_public() {
        let (db, file_id) = setup().await;
        let repo = ShareRepository::new(db.pool().clone());

        repo.share_file(&file_id, &NewShare::public()).await.unwrap();
        repo.share_file(&file_id, &NewShare::for_user(2).with_access(AccessLevel::Write))
            .await
            .unwrap();

        let grant = repo.find_file_grant(&file_id, Some(2)).await.unwrap().unwrap();
        assert_eq!(grant.user_id, Some(2));
        assert_eq!(grant.access, AccessLevel::Write);
    }

    #[tokio::test]
    async fn test_list_file_shares() {
        let (db, file_id) = setup().await;
        let repo = ShareRepository::new(db.pool().clone());

        repo.share_file(&file_id, &NewShare::for_user(2))
            .await
            .unwrap();
        repo.share_file(&file_id, &NewShare::for_user(3))
            .await
            .unwrap();

        let shares = repo.list_file_shares(&file_id).await.unwrap();
        assert_eq!(shares.len(), 2);
    }

    #[tokio::test]
    async fn test_folder_grants() {
        let db = Database::open_in_memory().await.unwrap();
        let folder = FolderRepository::new(db.pool().clone())
            .create(&NewFolder::new("Shared"))
            .await
            .unwrap();
        let repo = ShareRepository::new(db.pool().clone());

        repo.share_folder(&folder.id, &NewShare::for_user(5))
            .await
            .unwrap();

        let grant = repo.find_folder_grant(&folder.id, Some(5)).await.unwrap();
        assert!(grant.is_some());

        let shares = repo.list_folder_shares(&folder.id).await.unwrap();
        assert_eq!(shares.len(), 1);

        assert_eq!(repo.delete_for_folder(&folder.id).await.unwrap(), 1);
        assert!(repo
            .find_folder_grant(&folder.id, Some(5))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_for_file() {
        let (db, file_id) = setup().await;
        let repo = ShareRepository::new(db.pool().clone());

        repo.share_file(&file_id, &NewShare::for_user(2))
            .await
            .unwrap();
        repo.share_file(&file_id, &NewShare::public()).await.unwrap();

        assert_eq!(repo.delete_for_file(&file_id).await.unwrap(), 2);
        assert!(repo.list_file_shares(&file_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_ids_shared_with_user() {
        let (db, file_id) = setup().await;
        let repo = ShareRepository::new(db.pool().clone());

        repo.share_file(&file_id, &NewShare::for_user(2))
            .await
            .unwrap();
        // Public grants are not listed under a specific user
        repo.share_file(&file_id, &NewShare::public()).await.unwrap();

        let ids = repo.file_ids_shared_with_user(2).await.unwrap();
        assert_eq!(ids, vec![file_id]);

        assert!(repo.file_ids_shared_with_user(9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_attachment_cleanup() {
        let (db, file_id) = setup().await;

        sqlx::query("INSERT INTO post_attachments (post_id, file_id) VALUES (1, ?)")
            .bind(&file_id)
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO post_attachments (post_id, file_id) VALUES (2, ?)")
            .bind(&file_id)
            .execute(db.pool())
            .await
            .unwrap();

        let cleanup = PostAttachmentCleanup::new(db.pool().clone());
        assert_eq!(cleanup.remove_references(&file_id).await.unwrap(), 2);
        assert_eq!(cleanup.remove_references(&file_id).await.unwrap(), 0);
    }

    #[test]
    fn test_access_level_parse() {
        assert_eq!("read".parse::<AccessLevel>().unwrap(), AccessLevel::Read);
        assert_eq!("WRITE".parse::<AccessLevel>().unwrap(), AccessLevel::Write);
        assert!("admin".parse::<AccessLevel>().is_err());
    }
}
