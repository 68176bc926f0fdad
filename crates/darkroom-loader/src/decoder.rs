//! Incremental decoders.
//!
//! A decoder is fed the source stream chunk by chunk and reports progress
//! through a [`DecodeSink`] while the caller holds the session lock. The
//! loader never inspects pixels itself; it only tracks what the decoder
//! says became available.

use darkroom_core::{DarkroomError, PixelBuffer, Rect, Result, Size};
use image::ImageReader;
use std::io::Cursor;
use tracing::{debug, info};

/// Receives progress from an [`IncrementalDecoder`].
pub trait DecodeSink {
    /// Image dimensions are known and `buffer` has been allocated.
    fn area_prepared(&mut self, buffer: &PixelBuffer);

    /// New pixels are available in `area`.
    fn area_updated(&mut self, area: Rect);
}

/// A push-style decoder.
pub trait IncrementalDecoder: Send {
    /// Feed the next chunk of the stream.
    ///
    /// Returns `Ok(false)` when the decoder will not accept further data.
    /// Writing after [`close`](Self::close) is an error.
    fn write(&mut self, bytes: &[u8], sink: &mut dyn DecodeSink) -> Result<bool>;

    /// Finish decoding. Errors when already closed or when the data
    /// received so far cannot be decoded.
    fn close(&mut self, sink: &mut dyn DecodeSink) -> Result<()>;

    fn is_closed(&self) -> bool;

    /// Drop any decoded data. Called once when the owning session is disposed.
    fn release(&mut self);
}

/// Bytes needed before an unrecognised signature is treated as an error.
const SIGNATURE_WINDOW: usize = 32;

/// Decoder backed by the `image` crate.
///
/// The header is probed after every write so that `area_prepared` fires as
/// soon as the dimensions can be read. Pixel data is decoded on `close` and
/// reported as a single update.
pub struct BufferedImageDecoder {
    data: Vec<u8>,
    buffer: Option<PixelBuffer>,
    max_pixels: u64,
    closed: bool,
}

impl BufferedImageDecoder {
    pub fn new(max_pixels: u64) -> Self {
        Self {
            data: Vec::new(),
            buffer: None,
            max_pixels,
            closed: false,
        }
    }

    /// Bytes received so far.
    pub fn buffered_len(&self) -> usize {
        self.data.len()
    }

    /// The buffer being filled, once dimensions are known.
    pub fn pixels(&self) -> Option<PixelBuffer> {
        self.buffer.clone()
    }

    fn check_limits(&self, size: Size) -> Result<()> {
        if size.pixels() > self.max_pixels {
            return Err(DarkroomError::ResourceLimit(format!(
                "{}x{} image exceeds the {} pixel limit",
                size.width, size.height, self.max_pixels
            )));
        }
        Ok(())
    }

    /// Allocate the target buffer and announce it.
    fn prepare(&mut self, size: Size, sink: &mut dyn DecodeSink) -> Result<PixelBuffer> {
        self.check_limits(size)?;
        let buffer = PixelBuffer::new(size.width, size.height);
        debug!(width = size.width, height = size.height, "Decoder prepared buffer");
        sink.area_prepared(&buffer);
        self.buffer = Some(buffer.clone());
        Ok(buffer)
    }

    /// Dimensions from the header, or `None` while more data is needed.
    fn probe_dimensions(bytes: &[u8]) -> Result<Option<Size>> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        if reader.format().is_none() {
            if bytes.len() >= SIGNATURE_WINDOW {
                return Err(DarkroomError::UnsupportedFormat(
                    "unrecognised image signature".into(),
                ));
            }
            return Ok(None);
        }
        Ok(reader
            .into_dimensions()
            .ok()
            .map(|(width, height)| Size::new(width, height)))
    }
}

impl IncrementalDecoder for BufferedImageDecoder {
    fn write(&mut self, bytes: &[u8], sink: &mut dyn DecodeSink) -> Result<bool> {
        if self.closed {
            return Err(DarkroomError::Decoder("write after close".into()));
        }
        self.data.extend_from_slice(bytes);

        if self.buffer.is_none() {
            if let Some(size) = Self::probe_dimensions(&self.data)? {
                self.prepare(size, sink)?;
            }
        }
        Ok(true)
    }

    fn close(&mut self, sink: &mut dyn DecodeSink) -> Result<()> {
        if self.closed {
            return Err(DarkroomError::Decoder("decoder already closed".into()));
        }
        self.closed = true;
        let data = std::mem::take(&mut self.data);
        if data.is_empty() {
            return Err(DarkroomError::Decoder("no image data received".into()));
        }

        let decoded = image::load_from_memory(&data)
            .map_err(|e| DarkroomError::Decoder(e.to_string()))?
            .to_rgba8();
        let size = Size::new(decoded.width(), decoded.height());

        let buffer = match &self.buffer {
            Some(buffer) if buffer.size() == size => buffer.clone(),
            _ => self.prepare(size, sink)?,
        };
        let written = buffer.blit(&decoded, 0, 0);
        sink.area_updated(written);

        info!(width = size.width, height = size.height, bytes = data.len(), "Image decoded");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn release(&mut self) {
        self.closed = true;
        self.data = Vec::new();
        self.buffer = None;
    }
}
