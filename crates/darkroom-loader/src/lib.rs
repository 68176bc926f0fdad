//! Darkroom Loader - Asynchronous incremental image loading
//!
//! This crate handles:
//! - Reading image streams on a worker thread, one chunk at a time
//! - Feeding an incremental decoder and accumulating damage
//! - Delivering notifications on a single dispatch thread
//! - Thumbnail previews while the full image decodes

pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod listener;
pub mod loader;
pub mod resource;
pub mod thumbnail;

pub use config::LoaderConfig;
pub use decoder::{BufferedImageDecoder, DecodeSink, IncrementalDecoder};
pub use dispatch::{DispatchHandle, Dispatcher};
pub use listener::{ChannelListener, LoadOutcome, LoaderEvent, LoaderListener};
pub use loader::{ImageLoader, LoaderContext};
pub use resource::{ByteStream, FileResource, ImageResource, ImageUri, MemoryResource, OpenedResource};
pub use thumbnail::{DiskThumbnailCache, NoThumbnails, ThumbnailCache, ThumbnailSize};

/// Log the supported formats (call once at startup).
pub fn init() {
    tracing::info!(
        formats = "png, jpeg, gif, webp, tiff, bmp",
        "Darkroom loader initialized"
    );
}
