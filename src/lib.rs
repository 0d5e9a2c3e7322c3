//! filedepot - hierarchical file storage with sharing and media previews
//!
//! filedepot stores uploaded files in a folder hierarchy backed by SQLite
//! metadata and a mirrored directory layout on disk. Access is resolved
//! from ownership, folder publicity and share grants; image uploads get
//! thumbnails and videos get extracted preview frames.
//!
//! # Features
//!
//! - Folder hierarchy with validated names and depth limits
//! - File upload, download, rename and deletion with ownership checks
//! - Share grants per user or public, for files and folders
//! - Thumbnail generation and video frame extraction with HTTP fallback
//! - TOML configuration with sensible defaults

pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod media;

pub use config::Config;
pub use db::Database;
pub use error::{DepotError, ErrorKind, ErrorPayload, Result};
