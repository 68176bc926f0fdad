//! Shared RGBA pixel buffers.
//!
//! A [`PixelBuffer`] is the handle a decoder fills and a renderer reads.
//! Cloning the handle shares the pixels; writers take the lock only for
//! the duration of a blit.

use crate::geometry::{Rect, Size};
use crate::limits::BYTES_PER_PIXEL;
use image::{Rgba, RgbaImage};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// Arc-wrapped RGBA8 image for shared ownership.
#[derive(Clone)]
pub struct PixelBuffer {
    inner: Arc<RwLock<RgbaImage>>,
}

impl PixelBuffer {
    /// Create a fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_image(RgbaImage::new(width, height))
    }

    /// Wrap an already decoded image.
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            inner: Arc::new(RwLock::new(image)),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.read().width()
    }

    pub fn height(&self) -> u32 {
        self.inner.read().height()
    }

    pub fn size(&self) -> Size {
        let image = self.inner.read();
        Size::new(image.width(), image.height())
    }

    /// Full extent of the buffer, anchored at the origin.
    pub fn bounds(&self) -> Rect {
        self.size().bounds()
    }

    /// Total memory usage of the pixel data in bytes.
    pub fn memory_size(&self) -> u64 {
        self.size().pixels() * BYTES_PER_PIXEL
    }

    /// Lock the pixels for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, RgbaImage> {
        self.inner.read()
    }

    /// Lock the pixels for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, RgbaImage> {
        self.inner.write()
    }

    /// Copy `src` into the buffer with its top-left corner at (`x`, `y`).
    ///
    /// Returns the region actually written after clipping to the buffer
    /// bounds; [`Rect::ZERO`] when nothing overlaps.
    pub fn blit(&self, src: &RgbaImage, x: i32, y: i32) -> Rect {
        let target = Rect::new(x, y, src.width() as i32, src.height() as i32);
        let mut dst = self.inner.write();
        let bounds = Rect::from_size(dst.width(), dst.height());
        let Some(written) = target.intersection(bounds) else {
            return Rect::ZERO;
        };
        image::imageops::replace(&mut *dst, src, x as i64, y as i64);
        written
    }

    /// Owned copy of the current pixels.
    pub fn snapshot(&self) -> RgbaImage {
        self.inner.read().clone()
    }

    /// True when both handles share the same pixels.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles to these pixels.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Create a test pattern buffer (vertical color bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        const COLORS: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];
        let image = RgbaImage::from_fn(width, height, |x, _| {
            let bar = (x as u64 * 8 / width.max(1) as u64) as usize;
            Rgba(COLORS[bar.min(7)])
        });
        Self::from_image(image)
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.size();
        f.debug_struct("PixelBuffer")
            .field("width", &size.width)
            .field("height", &size.height)
            .finish()
    }
}
