//! Darkroom Core - Foundation types for incremental image loading
//!
//! This crate provides the fundamental types shared by the loader crates:
//! - Integer geometry for damage tracking (Rect, Size)
//! - EXIF orientation
//! - Shared RGBA pixel buffers
//! - The common error type

pub mod error;
pub mod geometry;
pub mod orientation;
pub mod pixels;

pub use error::{DarkroomError, Result};
pub use geometry::{Rect, Size};
pub use orientation::Orientation;
pub use pixels::PixelBuffer;

/// Decoder resource limits.
pub mod limits {
    /// Default ceiling on decoded pixels (`width * height`).
    pub const MAX_DECODED_PIXELS: u64 = 40_000_000;

    /// Bytes per decoded pixel (RGBA8).
    pub const BYTES_PER_PIXEL: u64 = 4;

    /// Default read size for a single stream read.
    pub const READ_CHUNK_SIZE: usize = 1 << 16;
}
