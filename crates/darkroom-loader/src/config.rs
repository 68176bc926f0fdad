//! Loader configuration.

use crate::thumbnail::{DiskThumbnailCache, ThumbnailSize};
use darkroom_core::limits::{MAX_DECODED_PIXELS, READ_CHUNK_SIZE};
use darkroom_core::{DarkroomError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for an image loading session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Bytes requested from the source stream per read.
    pub read_chunk_size: usize,
    /// Whether to look up a cached thumbnail before decoding.
    pub use_thumbnails: bool,
    /// Thumbnail size class used for the preview lookup.
    pub thumbnail_size: ThumbnailSize,
    /// Thumbnail cache root. `None` uses the per-user cache directory.
    pub thumbnail_dir: Option<PathBuf>,
    /// Largest image (in pixels) a decoder will allocate a buffer for.
    pub max_decoded_pixels: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: READ_CHUNK_SIZE,
            use_thumbnails: true,
            thumbnail_size: ThumbnailSize::Large,
            thumbnail_dir: None,
            max_decoded_pixels: MAX_DECODED_PIXELS,
        }
    }
}

impl LoaderConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DarkroomError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DarkroomError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Reject values the loader cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_size == 0 {
            return Err(DarkroomError::Config(
                "read_chunk_size must be greater than zero".into(),
            ));
        }
        if self.max_decoded_pixels == 0 {
            return Err(DarkroomError::Config(
                "max_decoded_pixels must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Thumbnail cache root, falling back to the per-user cache directory.
    pub fn resolved_thumbnail_dir(&self) -> Option<PathBuf> {
        self.thumbnail_dir
            .clone()
            .or_else(DiskThumbnailCache::default_root)
    }
}
