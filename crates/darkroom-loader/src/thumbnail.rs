//! Thumbnail cache lookups for the preview fast path.
//!
//! Cached previews live under `<root>/<size-class>/<sha256(uri)>.png`. The
//! key is the URI rather than the file contents, so a lookup never has to
//! touch the source image.

use crate::resource::ImageUri;
use darkroom_core::{PixelBuffer, Result, Size};
use image::imageops::FilterType;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Thumbnail size classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailSize {
    /// Fits in 128×128.
    Normal,
    /// Fits in 256×256.
    #[default]
    Large,
}

impl ThumbnailSize {
    /// Longest edge in pixels.
    pub fn pixels(self) -> u32 {
        match self {
            Self::Normal => 128,
            Self::Large => 256,
        }
    }

    /// Subdirectory name for this class.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Large => "large",
        }
    }
}

/// Lookup of reduced-resolution previews.
pub trait ThumbnailCache: Send + Sync {
    /// Return a cached preview for `uri`, if one exists.
    fn lookup(&self, uri: &ImageUri, size: ThumbnailSize) -> Option<PixelBuffer>;
}

/// A cache that never has anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoThumbnails;

impl ThumbnailCache for NoThumbnails {
    fn lookup(&self, _uri: &ImageUri, _size: ThumbnailSize) -> Option<PixelBuffer> {
        None
    }
}

/// PNG thumbnails stored on disk.
#[derive(Debug, Clone)]
pub struct DiskThumbnailCache {
    root: PathBuf,
}

impl DiskThumbnailCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Per-user cache location, if the platform has one.
    pub fn default_root() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("darkroom").join("thumbnails"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the thumbnail for `uri` lives (whether or not it exists).
    pub fn thumbnail_path(&self, uri: &ImageUri, size: ThumbnailSize) -> PathBuf {
        self.root
            .join(size.dir_name())
            .join(format!("{}.png", hash_uri(uri)))
    }

    /// Write a thumbnail for `uri`, downscaling `image` to fit the size class.
    pub fn store(&self, uri: &ImageUri, size: ThumbnailSize, image: &RgbaImage) -> Result<PathBuf> {
        let path = self.thumbnail_path(uri, size);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let source = Size::new(image.width(), image.height());
        let target = source.fit_within(size.pixels());
        if target == source {
            image.save(&path)?;
        } else {
            image::imageops::resize(image, target.width, target.height, FilterType::Triangle)
                .save(&path)?;
        }

        debug!(
            uri = %uri,
            width = target.width,
            height = target.height,
            path = %path.display(),
            "Stored thumbnail"
        );
        Ok(path)
    }

    /// Remove the cached thumbnail for `uri`. Missing entries are not an error.
    pub fn remove(&self, uri: &ImageUri, size: ThumbnailSize) -> Result<()> {
        match std::fs::remove_file(self.thumbnail_path(uri, size)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

impl ThumbnailCache for DiskThumbnailCache {
    fn lookup(&self, uri: &ImageUri, size: ThumbnailSize) -> Option<PixelBuffer> {
        let path = self.thumbnail_path(uri, size);
        if !path.exists() {
            return None;
        }
        match image::open(&path) {
            Ok(image) => Some(PixelBuffer::from_image(image.to_rgba8())),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Unreadable thumbnail, ignoring");
                None
            }
        }
    }
}

/// SHA-256 of the URI text, hex encoded.
fn hash_uri(uri: &ImageUri) -> String {
    let digest = Sha256::digest(uri.as_str().as_bytes());
    format!("{:x}", digest)
}
