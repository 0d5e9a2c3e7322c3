//! Image thumbnail generation.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::config::MediaConfig;
use crate::{DepotError, Result};

/// Resizes uploaded images into thumbnails under the thumbnail root.
#[derive(Debug, Clone)]
pub struct ThumbnailGenerator {
    thumbnail_root: PathBuf,
    max_width: u32,
    max_height: u32,
}

impl ThumbnailGenerator {
    /// Create a new ThumbnailGenerator.
    pub fn new(thumbnail_root: impl Into<PathBuf>, config: &MediaConfig) -> Self {
        Self {
            thumbnail_root: thumbnail_root.into(),
            max_width: config.thumbnail_max_width,
            max_height: config.thumbnail_max_height,
        }
    }

    /// Deterministic output path for a source filename.
    pub fn thumbnail_path(&self, stored_name: &str) -> PathBuf {
        self.thumbnail_root.join(format!("thumb_{stored_name}"))
    }

    /// Generate a thumbnail for an image on disk.
    ///
    /// Returns the existing output without decoding anything when the
    /// thumbnail is already present.
    pub async fn generate(&self, source: &Path, stored_name: &str) -> Result<PathBuf> {
        let output = self.thumbnail_path(stored_name);

        if fs::try_exists(&output).await.unwrap_or(false) {
            debug!("Thumbnail already exists at {:?}", output);
            return Ok(output);
        }

        fs::create_dir_all(&self.thumbnail_root)
            .await
            .map_err(|e| DepotError::Thumbnail(format!("cannot create thumbnail root: {e}")))?;

        let source = source.to_path_buf();
        let target = output.clone();
        let (max_width, max_height) = (self.max_width, self.max_height);

        // Decoding and resizing are CPU-bound, keep them off the reactor
        tokio::task::spawn_blocking(move || -> Result<()> {
            let img = image::open(&source)
                .map_err(|e| DepotError::Thumbnail(format!("cannot decode {:?}: {e}", source)))?;
            let thumb = img.thumbnail(max_width, max_height);
            thumb
                .save(&target)
                .map_err(|e| DepotError::Thumbnail(format!("cannot write {:?}: {e}", target)))?;
            Ok(())
        })
        .await
        .map_err(|e| DepotError::Thumbnail(format!("thumbnail task failed: {e}")))??;

        debug!("Generated thumbnail at {:?}", output);
        Ok(output)
    }
}
