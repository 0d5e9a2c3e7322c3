//! Folder types and repository for filedepot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool};
use uuid::Uuid;

use crate::{DepotError, Result};

use super::AccessType;

/// A folder in the storage hierarchy.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Folder {
    /// Unique folder ID.
    pub id: String,
    /// Folder name.
    pub name: String,
    /// Parent folder ID (None for root folders).
    pub parent_id: Option<String>,
    /// User ID of the owner (None for unowned system folders).
    pub owner_id: Option<i64>,
    /// Coarse access label.
    #[sqlx(try_from = "String")]
    pub access: AccessType,
    /// Whether all files within are publicly accessible.
    pub is_public: bool,
    /// When the folder was created.
    pub created_at: String,
    /// When the folder was last updated.
    pub updated_at: String,
}

impl Folder {
    /// Get the created_at as DateTime<Utc>.
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("{}Z", self.created_at.replace(' ', "T")))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    /// Folder name.
    pub name: String,
    /// Parent folder ID (None for root folders).
    pub parent_id: Option<String>,
    /// User ID of the owner.
    pub owner_id: Option<i64>,
    /// Coarse access label.
    pub access: AccessType,
    /// Whether all files within are publicly accessible.
    pub is_public: bool,
}

impl NewFolder {
    /// Create a new NewFolder with private access.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: None,
            owner_id: None,
            access: AccessType::Private,
            is_public: false,
        }
    }

    /// Set the parent folder.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
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

    /// Mark the folder as public.
    pub fn public(mut self) -> Self {
        self.is_public = true;
        self.access = AccessType::Public;
        self
    }
}

/// Builder for updating a folder.
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    /// New folder name.
    pub name: Option<String>,
    /// New access label.
    pub access: Option<AccessType>,
    /// New public flag.
    pub is_public: Option<bool>,
}

impl FolderUpdate {
    /// Create a new FolderUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the access label.
    pub fn access(mut self, access: AccessType) -> Self {
        self.access = Some(access);
        self
    }

    /// Set the public flag.
    pub fn is_public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.access.is_none() && self.is_public.is_none()
    }
}

/// Metadata-store interface for folders.
///
/// Services depend on this trait rather than a concrete backend; the sqlx
/// implementation is checked at construction time.
#[async_trait]
pub trait FolderStore: Send + Sync {
    /// Create a new folder.
    async fn create(&self, folder: &NewFolder) -> Result<Folder>;

    /// Get a folder by ID.
    async fn get_by_id(&self, id: &str) -> Result<Option<Folder>>;

    /// List child folders of a parent (None lists root folders).
    async fn list_children(&self, parent_id: Option<&str>) -> Result<Vec<Folder>>;

    /// Find a sibling folder by name, case-insensitively.
    async fn find_by_name(&self, parent_id: Option<&str>, name: &str) -> Result<Option<Folder>>;

    /// Update a folder. Returns None if the folder does not exist.
    async fn update(&self, id: &str, update: &FolderUpdate) -> Result<Option<Folder>>;

    /// Delete a folder by ID. Returns whether a row was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Count direct child folders.
    async fn count_children(&self, id: &str) -> Result<i64>;

    /// Get the depth of a folder (0 for root).
    async fn depth(&self, id: &str) -> Result<usize>;

    /// Get the path from root to a folder.
    async fn path_to_root(&self, id: &str) -> Result<Vec<Folder>>;
}

/// sqlx-backed repository for folder operations.
#[derive(Debug, Clone)]
pub struct FolderRepository {
    pool: SqlitePool,
}

impl FolderRepository {
    /// Create a new FolderRepository with the given database pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FolderStore for FolderRepository {
    async fn create(&self, folder: &NewFolder) -> Result<Folder> {
        let id = Uuid::new_v4().to_string();

        let result = sqlx::query(
            "INSERT INTO folders (id, name, parent_id, owner_id, access, is_public)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&folder.name)
        .bind(&folder.parent_id)
        .bind(folder.owner_id)
        .bind(folder.access.as_str())
        .bind(folder.is_public)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            // The sibling-name unique index closes the duplicate-check race;
            // surface the conflict as the same validation error
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                return Err(DepotError::Validation(format!(
                    "a folder named '{}' already exists here",
                    folder.name
                )));
            }
            return Err(DepotError::Database(e.to_string()));
        }

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DepotError::FolderNotFound(id))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(
            "SELECT id, name, parent_id, owner_id, access, is_public, created_at, updated_at
             FROM folders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(folder)
    }

    async fn list_children(&self, parent_id: Option<&str>) -> Result<Vec<Folder>> {
        let folders = match parent_id {
            Some(parent_id) => {
                sqlx::query_as::<_, Folder>(
                    "SELECT id, name, parent_id, owner_id, access, is_public, created_at, updated_at
                     FROM folders WHERE parent_id = ? ORDER BY name COLLATE NOCASE, id",
                )
                .bind(parent_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Folder>(
                    "SELECT id, name, parent_id, owner_id, access, is_public, created_at, updated_at
                     FROM folders WHERE parent_id IS NULL ORDER BY name COLLATE NOCASE, id",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(folders)
    }

    async fn find_by_name(&self, parent_id: Option<&str>, name: &str) -> Result<Option<Folder>> {
        let folder = match parent_id {
            Some(parent_id) => {
                sqlx::query_as::<_, Folder>(
                    "SELECT id, name, parent_id, owner_id, access, is_public, created_at, updated_at
                     FROM folders WHERE parent_id = ? AND lower(name) = lower(?)",
                )
                .bind(parent_id)
                .bind(name)
                .fetch_optional(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Folder>(
                    "SELECT id, name, parent_id, owner_id, access, is_public, created_at, updated_at
                     FROM folders WHERE parent_id IS NULL AND lower(name) = lower(?)",
                )
                .bind(name)
                .fetch_optional(&self.pool)
                .await
            }
        }
        .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(folder)
    }

    async fn update(&self, id: &str, update: &FolderUpdate) -> Result<Option<Folder>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE folders SET ");
        let mut separated = query.separated(", ");

        if let Some(ref name) = update.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }

        if let Some(access) = update.access {
            separated.push("access = ");
            separated.push_bind_unseparated(access.as_str().to_string());
        }

        if let Some(is_public) = update.is_public {
            separated.push("is_public = ");
            separated.push_bind_unseparated(is_public);
        }

        separated.push("updated_at = datetime('now')");

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(&self.pool).await.map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                DepotError::Validation("a folder with that name already exists here".to_string())
            } else {
                DepotError::Database(e.to_string())
            }
        })?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_children(&self, id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE parent_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DepotError::Database(e.to_string()))?;

        Ok(count)
    }

    async fn depth(&self, id: &str) -> Result<usize> {
        let mut depth = 0;
        let mut current_id = Some(id.to_string());
        let mut hops = 0usize;

        while let Some(folder_id) = current_id {
            // Hop bound turns a corrupted parent chain into an error
            hops += 1;
            if hops > super::MAX_FOLDER_DEPTH * 2 {
                return Err(DepotError::Integrity(format!(
                    "parent chain of folder {id} does not terminate"
                )));
            }

            let folder = self.get_by_id(&folder_id).await?;
            match folder {
                Some(f) => {
                    current_id = f.parent_id;
                    if current_id.is_some() {
                        depth += 1;
                    }
                }
                None => break,
            }
        }

        Ok(depth)
    }

    async fn path_to_root(&self, id: &str) -> Result<Vec<Folder>> {
        let mut path = Vec::new();
        let mut current_id = Some(id.to_string());
        let mut hops = 0usize;

        while let Some(folder_id) = current_id {
            hops += 1;
            if hops > super::MAX_FOLDER_DEPTH * 2 {
                return Err(DepotError::Integrity(format!(
                    "parent chain of folder {id} does not terminate"
                )));
            }

            if let Some(folder) = self.get_by_id(&folder_id).await? {
                current_id = folder.parent_id.clone();
                path.push(folder);
            } else {
                break;
            }
        }

        path.reverse();
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_folder() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let new_folder = NewFolder::new("Shared Files")
            .with_owner(42)
            .with_access(AccessType::Shared);

        let folder = repo.create(&new_folder).await.unwrap();

        assert_eq!(folder.name, "Shared Files");
        assert!(folder.parent_id.is_none());
        assert_eq!(folder.owner_id, Some(42));
        assert_eq!(folder.access, AccessType::Shared);
        assert!(!folder.is_public);
    }

    #[tokio::test]
    async fn test_get_folder_by_id() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let created = repo.create(&NewFolder::new("Test Folder")).await.unwrap();

        let found = repo.get_by_id(&created.id).await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().name, "Test Folder");
    }

    #[tokio::test]
    async fn test_get_folder_not_found() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let found = repo.get_by_id("no-such-id").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_list_root_folders() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        repo.create(&NewFolder::new("Beta")).await.unwrap();
        repo.create(&NewFolder::new("alpha")).await.unwrap();

        let roots = repo.list_children(None).await.unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].name, "alpha");
        assert_eq!(roots[1].name, "Beta");
    }

    #[tokio::test]
    async fn test_list_child_folders() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let parent = repo.create(&NewFolder::new("Parent")).await.unwrap();

        repo.create(&NewFolder::new("Child B").with_parent(&parent.id))
            .await
            .unwrap();
        repo.create(&NewFolder::new("Child A").with_parent(&parent.id))
            .await
            .unwrap();

        let children = repo.list_children(Some(&parent.id)).await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "Child A");
        assert_eq!(children[1].name, "Child B");
    }

    #[tokio::test]
    async fn test_duplicate_sibling_name_rejected() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        repo.create(&NewFolder::new("Reports")).await.unwrap();
        let result = repo.create(&NewFolder::new("reports")).await;

        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[tokio::test]
    async fn test_same_name_under_different_parents() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let parent = repo.create(&NewFolder::new("Parent")).await.unwrap();
        repo.create(&NewFolder::new("Reports")).await.unwrap();

        // Same name under another parent is allowed
        let nested = repo
            .create(&NewFolder::new("Reports").with_parent(&parent.id))
            .await
            .unwrap();
        assert_eq!(nested.parent_id, Some(parent.id));
    }

    #[tokio::test]
    async fn test_find_by_name_case_insensitive() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        repo.create(&NewFolder::new("Reports")).await.unwrap();

        let found = repo.find_by_name(None, "REPORTS").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().name, "Reports");

        let missing = repo.find_by_name(None, "Invoices").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_update_folder() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let folder = repo.create(&NewFolder::new("Original")).await.unwrap();

        let update = FolderUpdate::new()
            .name("Updated")
            .access(AccessType::Public)
            .is_public(true);

        let updated = repo.update(&folder.id, &update).await.unwrap().unwrap();

        assert_eq!(updated.name, "Updated");
        assert_eq!(updated.access, AccessType::Public);
        assert!(updated.is_public);
    }

    #[tokio::test]
    async fn test_update_folder_not_found() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let update = FolderUpdate::new().name("Whatever");
        let updated = repo.update("no-such-id", &update).await.unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_delete_folder() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let folder = repo.create(&NewFolder::new("ToDelete")).await.unwrap();

        let deleted = repo.delete(&folder.id).await.unwrap();
        assert!(deleted);

        let found = repo.get_by_id(&folder.id).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_delete_folder_not_found() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let deleted = repo.delete("no-such-id").await.unwrap();
        assert!(!deleted);
    }

    #[tokio::test]
    async fn test_count_children() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let parent = repo.create(&NewFolder::new("Parent")).await.unwrap();
        assert_eq!(repo.count_children(&parent.id).await.unwrap(), 0);

        repo.create(&NewFolder::new("Child").with_parent(&parent.id))
            .await
            .unwrap();
        assert_eq!(repo.count_children(&parent.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_depth() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let root = repo.create(&NewFolder::new("Root")).await.unwrap();
        let level1 = repo
            .create(&NewFolder::new("Level1").with_parent(&root.id))
            .await
            .unwrap();
        let level2 = repo
            .create(&NewFolder::new("Level2").with_parent(&level1.id))
            .await
            .unwrap();

        assert_eq!(repo.depth(&root.id).await.unwrap(), 0);
        assert_eq!(repo.depth(&level1.id).await.unwrap(), 1);
        assert_eq!(repo.depth(&level2.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_path_to_root() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool().clone());

        let root = repo.create(&NewFolder::new("Root")).await.unwrap();
        let level1 = repo
            .create(&NewFolder::new("Level1").with_parent(&root.id))
            .await
            .unwrap();
        let level2 = repo
            .create(&NewFolder::new("Level2").with_parent(&level1.id))
            .await
            .unwrap();

        let path = repo.path_to_root(&level2.id).await.unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0].name, "Root");
        assert_eq!(path[1].name, "Level1");
        assert_eq!(path[2].name, "Level2");
    }

    #[tokio::test]
    async fn test_new_folder_builder() {
        let folder = NewFolder::new("Test")
            .with_parent("parent-id")
            .with_owner(7)
            .public();

        assert_eq!(folder.name, "Test");
        assert_eq!(folder.parent_id, Some("parent-id".to_string()));
        assert_eq!(folder.owner_id, Some(7));
        assert_eq!(folder.access, AccessType::Public);
        assert!(folder.is_public);
    }
}
