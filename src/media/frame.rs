//! Video frame extraction with an HTTP fallback for hosted videos.
//!
//! Frames come from ffmpeg run as an external process, bounded by a
//! timeout. For externally-hosted videos the extraction attempt can fail
//! (or the tool may be absent entirely); the provider's default thumbnail
//! is then fetched over HTTP instead. Partial outputs are written to a
//! `.part` file and renamed only on success, so failures never leave a
//! half-written frame at the deterministic output path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::redirect::Policy;
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use crate::config::MediaConfig;
use crate::{DepotError, Result};

const FALLBACK_IMAGE_HOST: &str = "https://img.youtube.com";

/// Extracts representative frames from videos.
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    thumbnail_root: PathBuf,
    frame_timeout: Duration,
    fetch_timeout: Duration,
    client: reqwest::Client,
}

impl FrameExtractor {
    /// Create a new FrameExtractor.
    pub fn new(thumbnail_root: impl Into<PathBuf>, config: &MediaConfig) -> Result<Self> {
        let fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(fetch_timeout)
            .redirect(Policy::limited(5))
            .build()
            .map_err(|e| DepotError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            thumbnail_root: thumbnail_root.into(),
            frame_timeout: Duration::from_secs(config.frame_timeout_secs),
            fetch_timeout,
            client,
        })
    }

    /// Deterministic output path for a frame of a local video.
    pub fn frame_path(&self, source: &Path, timestamp_secs: u32) -> PathBuf {
        let basename = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("video");
        self.thumbnail_root
            .join(format!("frame_{basename}_{timestamp_secs}.jpg"))
    }

    /// Deterministic output path for a frame of a hosted video.
    pub fn hosted_frame_path(&self, video_id: &str, timestamp_secs: u32) -> PathBuf {
        self.thumbnail_root
            .join(format!("youtube_{video_id}_{timestamp_secs}.jpg"))
    }

    /// Extract the video ID from a YouTube URL.
    ///
    /// Recognizes `youtu.be/<id>`, `watch?v=<id>`, `/embed/<id>` and
    /// `/shorts/<id>` forms.
    pub fn video_id(video_url: &str) -> Option<String> {
        let url = Url::parse(video_url).ok()?;
        let host = url.host_str()?;

        let id = if host.ends_with("youtu.be") {
            url.path_segments()?.next().map(str::to_string)
        } else if host.ends_with("youtube.com") {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("embed") | Some("shorts") => segments.next().map(str::to_string),
                _ => None,
            }
        } else {
            None
        };

        id.filter(|id| !id.is_empty() && id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_'))
    }

    /// Extract a frame from a local video at the given timestamp.
    ///
    /// Returns the existing output without running the decoder when the
    /// frame is already present.
    pub async fn extract_frame(&self, source: &Path, timestamp_secs: u32) -> Result<PathBuf> {
        let output = self.frame_path(source, timestamp_secs);

        if fs::try_exists(&output).await.unwrap_or(false) {
            debug!("Frame already exists at {:?}", output);
            return Ok(output);
        }

        fs::create_dir_all(&self.thumbnail_root)
            .await
            .map_err(|e| DepotError::Thumbnail(format!("cannot create thumbnail root: {e}")))?;

        self.run_ffmpeg(source.as_os_str(), timestamp_secs, &output)
            .await?;
        Ok(output)
    }

    /// Produce a frame for a hosted video URL.
    ///
    /// Tries stream extraction first; when that fails for any reason the
    /// provider's default thumbnail is fetched instead. The output path is
    /// the same either way.
    pub async fn hosted_frame(&self, video_url: &str, timestamp_secs: u32) -> Result<PathBuf> {
        let video_id = Self::video_id(video_url).ok_or_else(|| {
            DepotError::Validation(format!("not a recognized video URL: {video_url}"))
        })?;

        let output = self.hosted_frame_path(&video_id, timestamp_secs);

        if fs::try_exists(&output).await.unwrap_or(false) {
            debug!("Frame already exists at {:?}", output);
            return Ok(output);
        }

        fs::create_dir_all(&self.thumbnail_root)
            .await
            .map_err(|e| DepotError::Thumbnail(format!("cannot create thumbnail root: {e}")))?;

        match self
            .run_ffmpeg(video_url.as_ref(), timestamp_secs, &output)
            .await
        {
            Ok(()) => Ok(output),
            Err(e) => {
                warn!("Stream extraction failed ({e}), fetching default thumbnail");
                self.fetch_default_thumbnail(&video_id, &output).await?;
                Ok(output)
            }
        }
    }

    /// Run ffmpeg to grab a single frame, bounded by the frame timeout.
    async fn run_ffmpeg(
        &self,
        source: &std::ffi::OsStr,
        timestamp_secs: u32,
        output: &Path,
    ) -> Result<()> {
        // Write to a temp name and rename on success
        let partial = output.with_extension("jpg.part");

        let mut child = Command::new("ffmpeg")
            .arg("-ss")
            .arg(timestamp_secs.to_string())
            .arg("-i")
            .arg(source)
            .arg("-frames:v")
            .arg("1")
            .arg("-q:v")
            .arg("2")
            .arg("-f")
            .arg("image2")
            .arg("-y")
            .arg(&partial)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DepotError::Thumbnail(format!("cannot run frame extractor: {e}")))?;

        let status = match timeout(self.frame_timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                Self::cleanup_partial(&partial).await;
                return Err(DepotError::Thumbnail(format!("frame extractor failed: {e}")));
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Could not kill frame extractor: {e}");
                }
                Self::cleanup_partial(&partial).await;
                return Err(DepotError::Thumbnail(format!(
                    "frame extraction timed out after {:?}",
                    self.frame_timeout
                )));
            }
        };

        if !status.success() || !fs::try_exists(&partial).await.unwrap_or(false) {
            Self::cleanup_partial(&partial).await;
            return Err(DepotError::Thumbnail(format!(
                "frame extractor exited with {status}"
            )));
        }

        fs::rename(&partial, output).await.map_err(|e| {
            DepotError::Thumbnail(format!("cannot move frame into place: {e}"))
        })?;

        debug!("Extracted frame to {:?}", output);
        Ok(())
    }

    /// Fetch the provider's default thumbnail for a video.
    async fn fetch_default_thumbnail(&self, video_id: &str, output: &Path) -> Result<()> {
        let url = format!("{FALLBACK_IMAGE_HOST}/vi/{video_id}/hqdefault.jpg");
        let partial = output.with_extension("jpg.part");

        let result = async {
            let response = timeout(self.fetch_timeout, self.client.get(&url).send())
                .await
                .map_err(|_| {
                    DepotError::Thumbnail(format!(
                        "thumbnail fetch timed out after {:?}",
                        self.fetch_timeout
                    ))
                })?
                .map_err(|e| DepotError::Thumbnail(format!("thumbnail fetch failed: {e}")))?;

            if !response.status().is_success() {
                return Err(DepotError::Thumbnail(format!(
                    "thumbnail fetch returned {}",
                    response.status()
                )));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| DepotError::Thumbnail(format!("thumbnail fetch failed: {e}")))?;

            fs::write(&partial, &bytes)
                .await
                .map_err(|e| DepotError::Thumbnail(format!("cannot write {:?}: {e}", partial)))?;

            fs::rename(&partial, output)
                .await
                .map_err(|e| DepotError::Thumbnail(format!("cannot move thumbnail into place: {e}")))
        }
        .await;

        if result.is_err() {
            Self::cleanup_partial(&partial).await;
        } else {
            debug!("Fetched default thumbnail to {:?}", output);
        }
        result
    }

    async fn cleanup_partial(partial: &Path) {
        if let Err(e) = fs::remove_file(partial).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove partial file {:?}: {e}", partial);
            }
        }
    }
}
