//! File management module for filedepot.
//!
//! This module provides the hierarchical storage subsystem:
//! - Folder hierarchy with metadata
//! - File metadata management
//! - Ownership and share-grant based access control
//! - Physical file storage mirrored from metadata identifiers

mod access;
mod folder;
mod folder_service;
mod metadata;
mod service;
mod share;
mod storage;

pub use access::{resolve_file_access, resolve_folder_access, AccessDecision, ShareBackend};
pub use folder::{Folder, FolderRepository, FolderStore, FolderUpdate, NewFolder};
pub use folder_service::{FolderNode, FolderService};
pub use metadata::{FileRecord, FileRepository, FileStore, FileUpdate, NewFileRecord};
pub use service::{DownloadHandle, FileService, UploadRequest};
pub use share::{
    AccessLevel, FileShare, FolderShare, NewShare, PostAttachmentCleanup, ReferenceCleanup,
    ShareRepository, ShareStore,
};
pub use storage::FileStorage;

use std::fmt;
use std::str::FromStr;

/// Maximum length for file and folder names (in characters).
pub const MAX_NAME_LENGTH: usize = 255;

/// Characters that are never allowed in folder names.
pub const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum folder depth (levels).
pub const MAX_FOLDER_DEPTH: usize = 10;

/// Coarse access label on files and folders.
///
/// Distinct from, but informing, the fine-grained resolver decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    /// Only the owner (and anonymous consumers) may access.
    #[default]
    Private,
    /// Accessible to everyone.
    Public,
    /// Accessible through share grants.
    Shared,
}

impl AccessType {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Private => "private",
            AccessType::Public => "public",
            AccessType::Shared => "shared",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(AccessType::Private),
            "public" => Ok(AccessType::Public),
            "shared" => Ok(AccessType::Shared),
            _ => Err(format!("unknown access type: {s}")),
        }
    }
}

impl TryFrom<String> for AccessType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
