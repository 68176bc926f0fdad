//! Image resources: resolving a URI to a byte stream and orientation.

use darkroom_core::{DarkroomError, Orientation, Result};
use image::{ImageDecoder, ImageReader};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Identifies an image resource: a `file://` URI or a plain path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageUri(String);

impl ImageUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Build a `file://` URI for a local path. Relative paths are resolved
    /// against the current directory; reserved and non-ASCII bytes are
    /// percent-encoded.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        Self(format!("file://{}", percent_encode(&absolute.to_string_lossy())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local filesystem path, if this URI names one.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        match self.0.strip_prefix("file://") {
            Some(rest) => {
                let rest = rest.strip_prefix("localhost").unwrap_or(rest);
                if !rest.starts_with('/') {
                    return None;
                }
                percent_decode(rest).map(PathBuf::from)
            }
            None if self.0.contains("://") => None,
            None => Some(PathBuf::from(&self.0)),
        }
    }
}

impl fmt::Display for ImageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageUri {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Bytes left as-is in a path: RFC 3986 unreserved characters and `/`.
fn is_path_safe(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'/')
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &byte in input.as_bytes() {
        if is_path_safe(byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Source stream handed to a loading session.
pub type ByteStream = Box<dyn Read + Send>;

/// An opened resource: its byte stream and display orientation.
pub struct OpenedResource {
    pub stream: ByteStream,
    pub orientation: Orientation,
}

/// Resolves image URIs to readable streams.
pub trait ImageResource: Send + Sync {
    /// Open the resource for reading.
    fn open(&self, uri: &ImageUri) -> Result<OpenedResource>;
}

/// Local files, with orientation read from embedded EXIF data.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileResource;

impl FileResource {
    /// Read the EXIF orientation of a local image.
    pub fn read_orientation(path: &Path) -> Result<Orientation> {
        let mut decoder = ImageReader::open(path)?
            .with_guessed_format()?
            .into_decoder()?;
        Ok(decoder.orientation()?.into())
    }
}

impl ImageResource for FileResource {
    fn open(&self, uri: &ImageUri) -> Result<OpenedResource> {
        let path = uri
            .to_file_path()
            .ok_or_else(|| DarkroomError::InvalidUri(uri.to_string()))?;

        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DarkroomError::NotFound(path.display().to_string()),
            _ => DarkroomError::Io(e),
        })?;

        let orientation = match Self::read_orientation(&path) {
            Ok(orientation) => orientation,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No orientation, assuming top-left");
                Orientation::TopLeft
            }
        };

        Ok(OpenedResource {
            stream: Box::new(BufReader::new(file)),
            orientation,
        })
    }
}

#[derive(Clone)]
struct MemoryEntry {
    bytes: Arc<[u8]>,
    orientation: Orientation,
}

/// In-memory resources keyed by URI.
#[derive(Default)]
pub struct MemoryResource {
    entries: RwLock<HashMap<ImageUri, MemoryEntry>>,
}

impl MemoryResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes under `uri` with the default orientation.
    pub fn insert(&self, uri: impl Into<ImageUri>, bytes: impl Into<Vec<u8>>) {
        self.insert_with_orientation(uri, bytes, Orientation::TopLeft);
    }

    pub fn insert_with_orientation(
        &self,
        uri: impl Into<ImageUri>,
        bytes: impl Into<Vec<u8>>,
        orientation: Orientation,
    ) {
        let bytes: Vec<u8> = bytes.into();
        self.entries.write().insert(
            uri.into(),
            MemoryEntry {
                bytes: Arc::from(bytes),
                orientation,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ImageResource for MemoryResource {
    fn open(&self, uri: &ImageUri) -> Result<OpenedResource> {
        let entry = self
            .entries
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| DarkroomError::NotFound(uri.to_string()))?;

        Ok(OpenedResource {
            stream: Box::new(Cursor::new(entry.bytes)),
            orientation: entry.orientation,
        })
    }
}
