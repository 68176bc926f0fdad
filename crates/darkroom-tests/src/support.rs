//! Shared fixtures for the integration tests.

use crossbeam_channel::Receiver;
use darkroom_core::{DarkroomError, Orientation, PixelBuffer, Rect, Result};
use darkroom_loader::{
    ByteStream, DecodeSink, Dispatcher, ImageResource, ImageUri, IncrementalDecoder,
    LoaderEvent, OpenedResource,
};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Reports one full-width strip per write, `strip` rows high.
pub struct StripDecoder {
    width: u32,
    height: u32,
    strip: u32,
    next_row: u32,
    buffer: Option<PixelBuffer>,
    closed: bool,
}

impl StripDecoder {
    pub fn new(width: u32, height: u32, strip: u32) -> Self {
        Self {
            width,
            height,
            strip,
            next_row: 0,
            buffer: None,
            closed: false,
        }
    }
}

impl IncrementalDecoder for StripDecoder {
    fn write(&mut self, _bytes: &[u8], sink: &mut dyn DecodeSink) -> Result<bool> {
        if self.closed {
            return Err(DarkroomError::Decoder("write after close".into()));
        }
        let buffer = match &self.buffer {
            Some(buffer) => buffer.clone(),
            None => {
                let buffer = PixelBuffer::new(self.width, self.height);
                sink.area_prepared(&buffer);
                self.buffer = Some(buffer.clone());
                buffer
            }
        };
        if self.next_row < self.height {
            let rows = self.strip.min(self.height - self.next_row);
            let strip = RgbaImage::from_pixel(self.width, rows, Rgba([200, 100, 50, 255]));
            let written = buffer.blit(&strip, 0, self.next_row as i32);
            sink.area_updated(written);
            self.next_row += rows;
        }
        Ok(true)
    }

    fn close(&mut self, _sink: &mut dyn DecodeSink) -> Result<()> {
        if self.closed {
            return Err(DarkroomError::Decoder("already closed".into()));
        }
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn release(&mut self) {
        self.closed = true;
        self.buffer = None;
    }
}

/// Serves `len` bytes, sleeping before every read.
pub struct SlowReader {
    remaining: usize,
    delay: Duration,
}

impl SlowReader {
    pub fn new(len: usize, delay: Duration) -> Self {
        Self {
            remaining: len,
            delay,
        }
    }
}

impl Read for SlowReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        std::thread::sleep(self.delay);
        let n = buf.len().min(self.remaining);
        buf[..n].fill(0xAB);
        self.remaining -= n;
        Ok(n)
    }
}

/// Resource that hands out one prepared stream.
pub struct StreamResource(Mutex<Option<ByteStream>>);

impl StreamResource {
    pub fn new(stream: impl Read + Send + 'static) -> Self {
        Self(Mutex::new(Some(Box::new(stream))))
    }
}

impl ImageResource for StreamResource {
    fn open(&self, uri: &ImageUri) -> Result<OpenedResource> {
        let stream = self
            .0
            .lock()
            .take()
            .ok_or_else(|| DarkroomError::NotFound(uri.to_string()))?;
        Ok(OpenedResource {
            stream,
            orientation: Orientation::TopLeft,
        })
    }
}

/// Write a gradient PNG to `path`.
pub fn write_png(path: &Path, width: u32, height: u32) {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    })
    .save(path)
    .expect("failed to write test png");
}

/// Run the dispatcher until a `Completed` event arrives. Returns all events.
pub fn run_until_completed(dispatcher: &Dispatcher, rx: &Receiver<LoaderEvent>) -> Vec<LoaderEvent> {
    let mut events = Vec::new();
    let done = dispatcher.run_until(TIMEOUT, || {
        events.extend(rx.try_iter());
        events.iter().any(|e| matches!(e, LoaderEvent::Completed(_)))
    });
    assert!(done, "load never completed, saw {:?}", events);
    events
}

/// Bounding box of every `AreaUpdated` in `events`.
pub fn damage_union(events: &[LoaderEvent]) -> Rect {
    events.iter().fold(Rect::ZERO, |acc, event| match event {
        LoaderEvent::AreaUpdated(area) => acc.union(*area),
        _ => acc,
    })
}
