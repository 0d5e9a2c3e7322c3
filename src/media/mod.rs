//! Media preview pipeline for filedepot.
//!
//! Two preview paths exist: image thumbnails produced by resizing in
//! process, and video frames produced by an external decoding tool with an
//! HTTP fallback for externally-hosted videos. All outputs land under the
//! thumbnail root at deterministic paths, so requesting the same preview
//! twice finds the existing file instead of redoing the work.

mod frame;
mod thumbnail;

pub use frame::FrameExtractor;
pub use thumbnail::ThumbnailGenerator;

/// Whether a MIME type denotes a raster image the thumbnailer can handle.
pub fn is_image_mime(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// Whether a MIME type denotes a video.
pub fn is_video_mime(mime: &str) -> bool {
    mime.starts_with("video/")
}
