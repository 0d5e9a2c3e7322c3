//! Folder service for filedepot.
//!
//! Validates and orchestrates folder operations over the metadata stores
//! and the physical storage adapter. Physical directories mirror folder
//! IDs and are created together with the metadata row.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use tracing::{info, warn};

use crate::{DepotError, Result};

use super::access::ShareBackend;
use super::folder::{Folder, FolderStore, FolderUpdate, NewFolder};
use super::metadata::{FileRecord, FileStore};
use super::share::{AccessLevel, FolderShare, NewShare, ShareStore};
use super::storage::FileStorage;
use super::{FORBIDDEN_NAME_CHARS, MAX_FOLDER_DEPTH, MAX_NAME_LENGTH};

/// A folder with its files and child folders, recursively.
#[derive(Debug, Clone)]
pub struct FolderNode {
    /// The folder itself.
    pub folder: Folder,
    /// Files directly inside the folder.
    pub files: Vec<FileRecord>,
    /// Child folders, recursively populated.
    pub children: Vec<FolderNode>,
}

/// Service for folder operations.
pub struct FolderService<F, M, S> {
    folders: F,
    files: M,
    shares: ShareBackend<S>,
    storage: FileStorage,
}

/// Validate a folder name, returning the trimmed name.
fn validate_folder_name(name: &str) -> Result<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(DepotError::Validation(
            "folder name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DepotError::Validation(format!(
            "folder name cannot exceed {MAX_NAME_LENGTH} characters"
        )));
    }

    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(DepotError::Validation(format!(
            "folder name cannot contain '{c}'"
        )));
    }

    Ok(name.to_string())
}

impl<F, M, S> FolderService<F, M, S>
where
    F: FolderStore,
    M: FileStore,
    S: ShareStore,
{
    /// Create a new FolderService.
    pub fn new(folders: F, files: M, shares: ShareBackend<S>, storage: FileStorage) -> Self {
        Self {
            folders,
            files,
            shares,
            storage,
        }
    }

    /// Create a folder after validating its name, parent, and depth.
    ///
    /// The physical directory is created alongside the metadata row; if the
    /// directory cannot be created the row is rolled back.
    pub async fn create_folder(&self, new: NewFolder) -> Result<Folder> {
        let name = validate_folder_name(&new.name)?;

        if let Some(ref parent_id) = new.parent_id {
            let parent = self
                .folders
                .get_by_id(parent_id)
                .await?
                .ok_or_else(|| DepotError::FolderNotFound(parent_id.clone()))?;

            if self.folders.depth(&parent.id).await? + 1 >= MAX_FOLDER_DEPTH {
                return Err(DepotError::Validation(format!(
                    "folder nesting cannot exceed {MAX_FOLDER_DEPTH} levels"
                )));
            }
        }

        // Pre-check gives a friendly message; the unique index still closes
        // the race with concurrent creates
        if self
            .folders
            .find_by_name(new.parent_id.as_deref(), &name)
            .await?
            .is_some()
        {
            return Err(DepotError::Validation(format!(
                "a folder named '{name}' already exists here"
            )));
        }

        let folder = self
            .folders
            .create(&NewFolder { name, ..new })
            .await?;

        if let Err(e) = self.storage.ensure_folder_dir(&folder.id).await {
            if !self.folders.delete(&folder.id).await.unwrap_or(false) {
                warn!("Could not roll back folder row {}", folder.id);
            }
            return Err(DepotError::Config(format!(
                "cannot create directory for folder {}: {e}",
                folder.id
            )));
        }

        info!("Created folder '{}' ({})", folder.name, folder.id);
        Ok(folder)
    }

    /// Get a folder by ID.
    pub async fn get_folder(&self, id: &str) -> Result<Folder> {
        self.folders
            .get_by_id(id)
            .await?
            .ok_or_else(|| DepotError::FolderNotFound(id.to_string()))
    }

    /// Build the folder tree with files, starting under the given parent
    /// (None starts from the roots).
    ///
    /// A folder appearing twice in the traversal means the hierarchy has a
    /// cycle, which is reported as an integrity error instead of looping.
    pub async fn folders_with_files(&self, parent_id: Option<&str>) -> Result<Vec<FolderNode>> {
        if let Some(parent_id) = parent_id {
            self.folders
                .get_by_id(parent_id)
                .await?
                .ok_or_else(|| DepotError::FolderNotFound(parent_id.to_string()))?;
        }

        let mut visited = HashSet::new();
        let top = self.folders.list_children(parent_id).await?;

        let mut nodes = Vec::with_capacity(top.len());
        for folder in top {
            nodes.push(self.build_node(folder, &mut visited).await?);
        }
        Ok(nodes)
    }

    fn build_node<'a>(
        &'a self,
        folder: Folder,
        visited: &'a mut HashSet<String>,
    ) -> Pin<Box<dyn Future<Output = Result<FolderNode>> + Send + 'a>> {
        Box::pin(async move {
            if !visited.insert(folder.id.clone()) {
                return Err(DepotError::Integrity(format!(
                    "folder hierarchy cycle detected at {}",
                    folder.id
                )));
            }

            let files = self.files.list_by_folder(Some(&folder.id)).await?;
            let child_folders = self.folders.list_children(Some(&folder.id)).await?;

            let mut children = Vec::with_capacity(child_folders.len());
            for child in child_folders {
                children.push(self.build_node(child, visited).await?);
            }

            Ok(FolderNode {
                folder,
                files,
                children,
            })
        })
    }

    /// Update a folder's name or access settings.
    pub async fn update_folder(&self, id: &str, mut update: FolderUpdate) -> Result<Folder> {
        if let Some(ref name) = update.name {
            update.name = Some(validate_folder_name(name)?);
        }

        self.folders
            .update(id, &update)
            .await?
            .ok_or_else(|| DepotError::FolderNotFound(id.to_string()))
    }

    /// Delete a folder.
    ///
    /// Deletion is refused while the folder still has subfolders or files.
    /// When the caller carries a user identity it must be the owner.
    pub async fn delete_folder(&self, id: &str, user_id: Option<i64>) -> Result<()> {
        let folder = self.get_folder(id).await?;

        if let (Some(user_id), Some(owner_id)) = (user_id, folder.owner_id) {
            if user_id != owner_id {
                return Err(DepotError::Permission(
                    "only the owner can delete a folder".to_string(),
                ));
            }
        }

        if self.folders.count_children(id).await? > 0 {
            return Err(DepotError::Validation(
                "folder has subfolders and cannot be deleted".to_string(),
            ));
        }

        if self.files.count_by_folder(id).await? > 0 {
            return Err(DepotError::Validation(
                "folder has files and cannot be deleted".to_string(),
            ));
        }

        if let ShareBackend::Store(ref shares) = self.shares {
            shares.delete_for_folder(id).await?;
        }

        self.folders.delete(id).await?;

        // Physical removal is best effort; the row is already gone
        self.storage.remove_folder_dir(id).await;

        info!("Deleted folder '{}' ({})", folder.name, id);
        Ok(())
    }

    /// Share a folder with a list of users at the given access level.
    /// Only the owner may share.
    pub async fn share_folder_with_users(
        &self,
        folder_id: &str,
        owner_id: i64,
        user_ids: &[i64],
        level: AccessLevel,
    ) -> Result<Vec<FolderShare>> {
        if user_ids.is_empty() {
            return Err(DepotError::Validation(
                "no users to share the folder with".to_string(),
            ));
        }

        let folder = self.get_folder(folder_id).await?;

        if folder.owner_id != Some(owner_id) {
            return Err(DepotError::Permission(
                "only the owner can share a folder".to_string(),
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
                    .share_folder(folder_id, &NewShare::for_user(user_id).with_access(level))
                    .await?,
            );
        }

        info!(
            "Shared folder '{}' ({}) with {} user(s)",
            folder.name,
            folder_id,
            created.len()
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FileRepository, FolderRepository, NewFileRecord, ShareRepository};
    use crate::Database;
    use tempfile::TempDir;

    type TestService = FolderService<FolderRepository, FileRepository, ShareRepository>;

    async fn service() -> (Database, TempDir, TestService) {
        let db = Database::open_in_memory().await.unwrap();
        let dir = TempDir::new().unwrap();
        let service = FolderService::new(
            FolderRepository::new(db.pool().clone()),
            FileRepository::new(db.pool().clone()),
            ShareBackend::Store(ShareRepository::new(db.pool().clone())),
            FileStorage::new(dir.path().join("uploads")),
        );
        (db, dir, service)
    }

    #[tokio::test]
    async fn test_create_folder_makes_directory() {
        let (_db, dir, service) = service().await;

        let folder = service.create_folder(NewFolder::new("Docs")).await.unwrap();

        assert_eq!(folder.name, "Docs");
        assert!(dir.path().join("uploads").join(&folder.id).is_dir());
    }

    #[tokio::test]
    async fn test_create_folder_trims_name() {
        let (_db, _dir, service) = service().await;

        let folder = service
            .create_folder(NewFolder::new("  Padded  "))
            .await
            .unwrap();
        assert_eq!(folder.name, "Padded");
    }

    #[tokio::test]
    async fn test_create_folder_rejects_empty_name() {
        let (_db, _dir, service) = service().await;

        let result = service.create_folder(NewFolder::new("   ")).await;
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_folder_rejects_forbidden_chars() {
        let (_db, _dir, service) = service().await;

        for name in ["a<b", "a>b", "a:b", "a\"b", "a/b", "a\\b", "a|b", "a?b", "a*b"] {
            let result = service.create_folder(NewFolder::new(name)).await;
            assert!(
                matches!(result, Err(DepotError::Validation(_))),
                "{name} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_create_folder_rejects_long_name() {
        let (_db, _dir, service) = service().await;

        let result = service
            .create_folder(NewFolder::new("x".repeat(MAX_NAME_LENGTH + 1)))
            .await;
        assert!(matches!(result, Err(DepotError::Validation(_))));

        // Exactly at the limit is fine
        service
            .create_folder(NewFolder::new("x".repeat(MAX_NAME_LENGTH)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_folder_rejects_duplicate_sibling() {
        let (_db, _dir, service) = service().await;

        service.create_folder(NewFolder::new("Reports")).await.unwrap();
        let result = service.create_folder(NewFolder::new("REPORTS")).await;
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_folder_missing_parent() {
        let (_db, _dir, service) = service().await;

        let result = service
            .create_folder(NewFolder::new("Child").with_parent("no-such-parent"))
            .await;
        assert!(matches!(result, Err(DepotError::FolderNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_folder_depth_limit() {
        let (_db, _dir, service) = service().await;

        let mut parent = service.create_folder(NewFolder::new("L0")).await.unwrap();
        for level in 1..MAX_FOLDER_DEPTH - 1 {
            parent = service
                .create_folder(NewFolder::new(format!("L{level}")).with_parent(&parent.id))
                .await
                .unwrap();
        }

        let result = service
            .create_folder(NewFolder::new("TooDeep").with_parent(&parent.id))
            .await;
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[tokio::test]
    async fn test_folders_with_files_tree() {
        let (db, _dir, service) = service().await;

        let root = service.create_folder(NewFolder::new("Root")).await.unwrap();
        let child = service
            .create_folder(NewFolder::new("Child").with_parent(&root.id))
            .await
            .unwrap();

        let files = FileRepository::new(db.pool().clone());
        use crate::file::FileStore;
        files
            .create(
                &NewFileRecord::new(
                    "f1",
                    "a.txt",
                    "f1.txt",
                    format!("uploads/{}/f1.txt", child.id),
                    10,
                    "text/plain",
                )
                .with_folder(&child.id),
            )
            .await
            .unwrap();

        let tree = service.folders_with_files(None).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].folder.name, "Root");
        assert!(tree[0].files.is_empty());
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].folder.name, "Child");
        assert_eq!(tree[0].children[0].files.len(), 1);
        assert_eq!(tree[0].children[0].files[0].original_name, "a.txt");

        // Starting under the root lists only its subtree
        let subtree = service.folders_with_files(Some(&root.id)).await.unwrap();
        assert_eq!(subtree.len(), 1);
        assert_eq!(subtree[0].folder.name, "Child");
        assert_eq!(subtree[0].files.len(), 1);
    }

    #[tokio::test]
    async fn test_folders_with_files_missing_parent() {
        let (_db, _dir, service) = service().await;

        let result = service.folders_with_files(Some("no-such-folder")).await;
        assert!(matches!(result, Err(DepotError::FolderNotFound(_))));
    }

    #[tokio::test]
    async fn test_corrupted_parent_chain_is_integrity_error() {
        let (db, _dir, service) = service().await;

        let a = service.create_folder(NewFolder::new("A")).await.unwrap();
        let b = service
            .create_folder(NewFolder::new("B").with_parent(&a.id))
            .await
            .unwrap();

        // Corrupt the hierarchy directly: A becomes a child of B
        sqlx::query("UPDATE folders SET parent_id = ? WHERE id = ?")
            .bind(&b.id)
            .bind(&a.id)
            .execute(db.pool())
            .await
            .unwrap();

        // The depth walk during create must report the cycle, not loop
        let result = service
            .create_folder(NewFolder::new("C").with_parent(&b.id))
            .await;
        assert!(matches!(result, Err(DepotError::Integrity(_))));
    }

    #[tokio::test]
    async fn test_update_folder_validates_name() {
        let (_db, _dir, service) = service().await;

        let folder = service.create_folder(NewFolder::new("Old")).await.unwrap();

        let updated = service
            .update_folder(&folder.id, FolderUpdate::new().name("New"))
            .await
            .unwrap();
        assert_eq!(updated.name, "New");

        let result = service
            .update_folder(&folder.id, FolderUpdate::new().name("bad/name"))
            .await;
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_folder_blocked_by_children() {
        let (_db, _dir, service) = service().await;

        let parent = service.create_folder(NewFolder::new("Parent")).await.unwrap();
        service
            .create_folder(NewFolder::new("Child").with_parent(&parent.id))
            .await
            .unwrap();

        let result = service.delete_folder(&parent.id, None).await;
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_folder_blocked_by_files() {
        let (db, _dir, service) = service().await;

        let folder = service.create_folder(NewFolder::new("Full")).await.unwrap();

        use crate::file::FileStore;
        FileRepository::new(db.pool().clone())
            .create(
                &NewFileRecord::new(
                    "f1",
                    "a.txt",
                    "f1.txt",
                    format!("uploads/{}/f1.txt", folder.id),
                    10,
                    "text/plain",
                )
                .with_folder(&folder.id),
            )
            .await
            .unwrap();

        let result = service.delete_folder(&folder.id, None).await;
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_empty_folder_removes_directory() {
        let (_db, dir, service) = service().await;

        let folder = service.create_folder(NewFolder::new("Empty")).await.unwrap();
        let folder_dir = dir.path().join("uploads").join(&folder.id);
        assert!(folder_dir.is_dir());

        service.delete_folder(&folder.id, None).await.unwrap();

        assert!(!folder_dir.exists());
        assert!(matches!(
            service.get_folder(&folder.id).await,
            Err(DepotError::FolderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_folder_owner_check() {
        let (_db, _dir, service) = service().await;

        let folder = service
            .create_folder(NewFolder::new("Owned").with_owner(1))
            .await
            .unwrap();

        let result = service.delete_folder(&folder.id, Some(2)).await;
        assert!(matches!(result, Err(DepotError::Permission(_))));

        service.delete_folder(&folder.id, Some(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_share_folder_owner_only() {
        let (_db, _dir, service) = service().await;

        let folder = service
            .create_folder(NewFolder::new("Shared").with_owner(1))
            .await
            .unwrap();

        let result = service
            .share_folder_with_users(&folder.id, 2, &[3], AccessLevel::Read)
            .await;
        assert!(matches!(result, Err(DepotError::Permission(_))));

        let shares = service
            .share_folder_with_users(&folder.id, 1, &[3, 4], AccessLevel::Read)
            .await
            .unwrap();
        assert_eq!(shares.len(), 2);
    }

    #[tokio::test]
    async fn test_share_folder_at_write_level() {
        let (_db, _dir, service) = service().await;

        let folder = service
            .create_folder(NewFolder::new("Shared").with_owner(1))
            .await
            .unwrap();

        let shares = service
            .share_folder_with_users(&folder.id, 1, &[2], AccessLevel::Write)
            .await
            .unwrap();
        assert!(shares.iter().all(|s| s.access == AccessLevel::Write));
    }

    #[tokio::test]
    async fn test_share_folder_rejects_empty_list() {
        let (_db, _dir, service) = service().await;

        let folder = service
            .create_folder(NewFolder::new("Shared").with_owner(1))
            .await
            .unwrap();

        let result = service
            .share_folder_with_users(&folder.id, 1, &[], AccessLevel::Read)
            .await;
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[tokio::test]
    async fn test_share_folder_with_disabled_backend() {
        let db = Database::open_in_memory().await.unwrap();
        let dir = TempDir::new().unwrap();
        let service: TestService = FolderService::new(
            FolderRepository::new(db.pool().clone()),
            FileRepository::new(db.pool().clone()),
            ShareBackend::Disabled,
            FileStorage::new(dir.path().join("uploads")),
        );

        let folder = service
            .create_folder(NewFolder::new("Shared").with_owner(1))
            .await
            .unwrap();

        let result = service
            .share_folder_with_users(&folder.id, 1, &[2], AccessLevel::Read)
            .await;
        assert!(matches!(result, Err(DepotError::Config(_))));
    }
}
