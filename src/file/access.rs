//! Access resolution for files and folders.
//!
//! The resolver applies rules in a fixed order and stops at the first match:
//! anonymous caller, ownership, folder publicity, then share grants. When
//! the share backend is disabled the grant lookup finds nothing, so access
//! for non-owners fails closed.

use tracing::trace;

use crate::Result;

use super::folder::Folder;
use super::metadata::FileRecord;
use super::share::{AccessLevel, ShareStore};

/// Outcome of an access resolution, carrying the rule that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Caller carries no user identity; internal callers are trusted.
    Anonymous,
    /// Caller owns the resource.
    Owner,
    /// The enclosing folder is public.
    PublicFolder,
    /// A share grant applies to the caller.
    Shared(AccessLevel),
    /// No rule matched.
    Denied,
}

impl AccessDecision {
    /// Whether the decision permits access.
    pub fn is_granted(&self) -> bool {
        !matches!(self, AccessDecision::Denied)
    }
}

/// Share lookup capability handed to the resolver.
///
/// `Disabled` makes every grant lookup come back empty, which denies all
/// non-owner, non-public access.
#[derive(Debug, Clone)]
pub enum ShareBackend<S> {
    /// Grants are looked up in the given store.
    Store(S),
    /// No share lookups are possible.
    Disabled,
}

impl<S: ShareStore> ShareBackend<S> {
    async fn file_grant(&self, file_id: &str, user_id: Option<i64>) -> Result<Option<AccessLevel>> {
        match self {
            ShareBackend::Store(store) => Ok(store
                .find_file_grant(file_id, user_id)
                .await?
                .map(|g| g.access)),
            ShareBackend::Disabled => Ok(None),
        }
    }

    async fn folder_grant(
        &self,
        folder_id: &str,
        user_id: Option<i64>,
    ) -> Result<Option<AccessLevel>> {
        match self {
            ShareBackend::Store(store) => Ok(store
                .find_folder_grant(folder_id, user_id)
                .await?
                .map(|g| g.access)),
            ShareBackend::Disabled => Ok(None),
        }
    }
}

/// Resolve whether a caller may access a file.
///
/// `folder` is the enclosing folder, if the file has one.
pub async fn resolve_file_access<S: ShareStore>(
    file: &FileRecord,
    folder: Option<&Folder>,
    user_id: Option<i64>,
    shares: &ShareBackend<S>,
) -> Result<AccessDecision> {
    let decision = match user_id {
        None => AccessDecision::Anonymous,
        Some(user_id) => {
            if file.owner_id == Some(user_id) {
                AccessDecision::Owner
            } else if folder.is_some_and(|f| f.is_public) {
                AccessDecision::PublicFolder
            } else {
                match shares.file_grant(&file.id, Some(user_id)).await? {
                    Some(level) => AccessDecision::Shared(level),
                    None => AccessDecision::Denied,
                }
            }
        }
    };

    trace!(file_id = %file.id, ?user_id, ?decision, "Resolved file access");
    Ok(decision)
}

/// Resolve whether a caller may access a folder.
pub async fn resolve_folder_access<S: ShareStore>(
    folder: &Folder,
    user_id: Option<i64>,
    shares: &ShareBackend<S>,
) -> Result<AccessDecision> {
    let decision = match user_id {
        None => AccessDecision::Anonymous,
        Some(user_id) => {
            if folder.owner_id == Some(user_id) {
                AccessDecision::Owner
            } else if folder.is_public {
                AccessDecision::PublicFolder
            } else {
                match shares.folder_grant(&folder.id, Some(user_id)).await? {
                    Some(level) => AccessDecision::Shared(level),
                    None => AccessDecision::Denied,
                }
            }
        }
    };

    trace!(folder_id = %folder.id, ?user_id, ?decision, "Resolved folder access");
    Ok(decision)
}
