//! Incremental image loading session.
//!
//! An [`ImageLoader`] decodes one image. A worker thread reads the source
//! stream chunk by chunk and feeds the decoder under the session lock;
//! after each chunk it posts a flush to the dispatcher, which delivers the
//! accumulated notifications on the dispatch thread:
//!
//! ```text
//! worker thread                         dispatch thread
//! ─────────────                         ───────────────
//! read chunk
//! lock session ─ decoder.write ─┐
//!                 area_prepared │ pending.prepared = true
//!                 area_updated  │ pending.damage ∪= area
//! unlock ───────────────────────┘
//! post(flush) ────────────────────────▶ take pending under lock
//! read chunk ...                        AreaPrepared (thumbnail released first)
//! 0 bytes: close, pending.completed     AreaUpdated(damage)
//! post(flush) ────────────────────────▶ Completed, then close() again
//! ```
//!
//! Disposal sets a flag that every mutation and emission checks. A read
//! already in flight finishes, sees the flag, and stops; the decoder is
//! never written to afterwards.

use crate::config::LoaderConfig;
use crate::decoder::{BufferedImageDecoder, DecodeSink, IncrementalDecoder};
use crate::dispatch::DispatchHandle;
use crate::listener::{Listeners, LoadOutcome, LoaderEvent, LoaderListener};
use crate::resource::{ByteStream, FileResource, ImageResource, ImageUri};
use crate::thumbnail::{NoThumbnails, ThumbnailCache};
use darkroom_core::{DarkroomError, Orientation, PixelBuffer, Rect, Result};
use parking_lot::{Mutex, ReentrantMutex};
use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Collaborators shared by loading sessions.
#[derive(Clone)]
pub struct LoaderContext {
    /// Where notifications are delivered.
    pub dispatch: DispatchHandle,
    /// Resolves URIs to byte streams.
    pub resources: Arc<dyn ImageResource>,
    /// Preview lookup for the thumbnail fast path.
    pub thumbnails: Arc<dyn ThumbnailCache>,
    pub config: LoaderConfig,
}

impl LoaderContext {
    /// Local files, no thumbnail cache, default config.
    pub fn new(dispatch: DispatchHandle) -> Self {
        Self {
            dispatch,
            resources: Arc::new(FileResource),
            thumbnails: Arc::new(NoThumbnails),
            config: LoaderConfig::default(),
        }
    }

    pub fn with_resources(mut self, resources: Arc<dyn ImageResource>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_thumbnails(mut self, thumbnails: Arc<dyn ThumbnailCache>) -> Self {
        self.thumbnails = thumbnails;
        self
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }
}

/// Decoder progress not yet delivered to listeners.
#[derive(Debug, Default)]
struct Pending {
    /// Union of updated regions since the last flush.
    damage: Rect,
    prepared: bool,
    completed: Option<LoadOutcome>,
}

impl Pending {
    fn add_damage(&mut self, area: Rect) {
        self.damage = self.damage.union(area);
    }

    /// Hand everything over and reset to empty.
    fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// Everything guarded by the session lock.
struct DecodeState {
    decoder: Box<dyn IncrementalDecoder>,
    pending: Pending,
}

impl DecodeState {
    fn write(&mut self, session: &Session, bytes: &[u8]) -> Result<bool> {
        let mut sink = SessionSink {
            pending: &mut self.pending,
            session,
        };
        self.decoder.write(bytes, &mut sink)
    }

    fn close(&mut self, session: &Session) -> Result<()> {
        let mut sink = SessionSink {
            pending: &mut self.pending,
            session,
        };
        self.decoder.close(&mut sink)
    }
}

/// Routes decoder callbacks into the pending state.
struct SessionSink<'a> {
    pending: &'a mut Pending,
    session: &'a Session,
}

impl DecodeSink for SessionSink<'_> {
    fn area_prepared(&mut self, buffer: &PixelBuffer) {
        if self.session.is_disposed() {
            return;
        }
        self.session.prepared.store(true, Ordering::SeqCst);
        *self.session.decoded.lock() = Some(buffer.clone());
        self.pending.prepared = true;
        self.pending.damage = Rect::ZERO;
    }

    fn area_updated(&mut self, area: Rect) {
        if self.session.is_disposed() {
            return;
        }
        self.pending.add_damage(area);
    }
}

struct Session {
    id: Uuid,
    ctx: LoaderContext,
    listeners: Listeners,
    uri: Mutex<Option<ImageUri>>,
    state: Mutex<DecodeState>,
    stream: Mutex<Option<ByteStream>>,
    thumbnail: Mutex<Option<PixelBuffer>>,
    decoded: Mutex<Option<PixelBuffer>>,
    orientation: Mutex<Orientation>,
    started: AtomicBool,
    loading: AtomicBool,
    prepared: AtomicBool,
    disposed: AtomicBool,
    /// Held while listeners run; `dispose` takes it so that no event is
    /// delivered once it returns. Reentrant so listeners may dispose.
    emit_guard: ReentrantMutex<()>,
}

impl Session {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Deliver to listeners until the session is disposed, which a
    /// listener may do mid-delivery.
    fn emit(&self, event: LoaderEvent) {
        self.listeners.emit(&event, || !self.is_disposed());
    }

    /// Show a cached preview, if any, before the stream is opened.
    fn show_cached_thumbnail(&self, uri: &ImageUri) {
        let config = &self.ctx.config;
        if !config.use_thumbnails {
            return;
        }
        let Some(thumb) = self.ctx.thumbnails.lookup(uri, config.thumbnail_size) else {
            return;
        };

        let bounds = thumb.bounds();
        debug!(session = %self.id, width = bounds.width, height = bounds.height, "Using cached thumbnail");
        *self.orientation.lock() = Orientation::TopLeft;
        *self.thumbnail.lock() = Some(thumb);

        let _guard = self.emit_guard.lock();
        self.emit(LoaderEvent::AreaPrepared { reduced: true });
        self.emit(LoaderEvent::AreaUpdated(bounds));
    }

    fn read_loop(self: Arc<Self>) {
        let mut buffer = vec![0u8; self.ctx.config.read_chunk_size];
        loop {
            if self.is_disposed() {
                self.drop_stream();
                break;
            }
            let read = self.read_chunk(&mut buffer);
            let more = self.handle_read(read, &buffer);
            self.schedule_flush();
            if !more {
                break;
            }
        }
        debug!(session = %self.id, "Reader finished");
    }

    /// Blocking read of the next chunk. The only suspension point.
    fn read_chunk(&self, buffer: &mut [u8]) -> io::Result<usize> {
        let mut stream = self.stream.lock();
        let Some(stream) = stream.as_mut() else {
            return Err(io::Error::new(ErrorKind::NotConnected, "stream closed"));
        };
        loop {
            match stream.read(buffer) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    /// Commit one read to the decoder. Returns whether to keep reading.
    fn handle_read(&self, read: io::Result<usize>, buffer: &[u8]) -> bool {
        if self.is_disposed() {
            self.drop_stream();
            return false;
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        match read {
            Ok(0) => {
                self.drop_stream();
                let outcome = if state.decoder.is_closed() {
                    LoadOutcome::Finished
                } else {
                    match state.close(self) {
                        Ok(()) => LoadOutcome::Finished,
                        Err(e) => {
                            warn!(session = %self.id, error = %e, "Decoding failed at end of stream");
                            LoadOutcome::Failed(e.to_string())
                        }
                    }
                };
                self.loading.store(false, Ordering::SeqCst);
                state.pending.completed = Some(outcome);
                false
            }
            Ok(n) => {
                if self.is_disposed() {
                    return false;
                }
                match state.write(self, &buffer[..n]) {
                    Ok(true) => true,
                    Ok(false) => {
                        self.fail(state, "decoder declined further data".into());
                        false
                    }
                    Err(e) => {
                        // Errors after disposal are expected and discarded.
                        if !self.is_disposed() {
                            self.fail(state, e.to_string());
                        }
                        false
                    }
                }
            }
            Err(e) => {
                self.fail(state, format!("read failed: {}", e));
                false
            }
        }
    }

    /// Terminate an active load with a failure outcome.
    fn fail(&self, state: &mut DecodeState, reason: String) {
        warn!(session = %self.id, reason = %reason, "Load failed");
        self.drop_stream();
        if !state.decoder.is_closed() {
            let _ = state.close(self);
        }
        self.loading.store(false, Ordering::SeqCst);
        state.pending.completed = Some(LoadOutcome::Failed(reason));
    }

    fn drop_stream(&self) {
        self.stream.lock().take();
    }

    fn schedule_flush(self: &Arc<Self>) {
        let session = Arc::clone(self);
        if !self.ctx.dispatch.post(move || session.flush()) {
            debug!(session = %self.id, "Dispatcher gone, dropping notifications");
        }
    }

    /// Deliver pending notifications. Runs on the dispatch thread.
    fn flush(&self) {
        let _guard = self.emit_guard.lock();
        if self.is_disposed() {
            return;
        }
        let pending = self.state.lock().pending.take();

        if pending.prepared {
            // Real dimensions are known; the preview has served its purpose.
            if self.thumbnail.lock().take().is_some() {
                debug!(session = %self.id, "Released thumbnail preview");
            }
            self.emit(LoaderEvent::AreaPrepared { reduced: false });
        }

        if !pending.damage.is_empty() {
            self.emit(LoaderEvent::AreaUpdated(pending.damage));
        }

        if let Some(outcome) = pending.completed {
            info!(session = %self.id, success = outcome.is_success(), "Load completed");
            self.emit(LoaderEvent::Completed(outcome));
            self.close();
        }
    }

    fn close(&self) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.close(self) {
            Ok(()) => true,
            Err(e) => {
                debug!(session = %self.id, error = %e, "Decoder close reported an error");
                false
            }
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _guard = self.emit_guard.lock();

        // A read in flight holds the stream; the worker drops it once the read returns.
        if let Some(mut stream) = self.stream.try_lock() {
            stream.take();
        }
        // Release before closing so the decoder doesn't finish work nobody will see.
        self.state.lock().decoder.release();
        self.close();
        self.loading.store(false, Ordering::SeqCst);
        self.thumbnail.lock().take();
        self.decoded.lock().take();
        self.listeners.clear();

        info!(session = %self.id, "Session disposed");
    }
}

/// Decodes one image incrementally and notifies listeners on the dispatch
/// thread. Dropping the loader disposes it.
pub struct ImageLoader {
    session: Arc<Session>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ImageLoader {
    /// Loader using the `image` crate decoder.
    pub fn new(ctx: LoaderContext) -> Self {
        let decoder = BufferedImageDecoder::new(ctx.config.max_decoded_pixels);
        Self::with_decoder(ctx, Box::new(decoder))
    }

    /// Loader driving a custom decoder.
    pub fn with_decoder(ctx: LoaderContext, decoder: Box<dyn IncrementalDecoder>) -> Self {
        let session = Session {
            id: Uuid::new_v4(),
            ctx,
            listeners: Listeners::default(),
            uri: Mutex::new(None),
            state: Mutex::new(DecodeState {
                decoder,
                pending: Pending::default(),
            }),
            stream: Mutex::new(None),
            thumbnail: Mutex::new(None),
            decoded: Mutex::new(None),
            orientation: Mutex::new(Orientation::TopLeft),
            started: AtomicBool::new(false),
            loading: AtomicBool::new(false),
            prepared: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            emit_guard: ReentrantMutex::new(()),
        };
        Self {
            session: Arc::new(session),
            worker: Mutex::new(None),
        }
    }

    /// Session identifier used in log output.
    pub fn id(&self) -> Uuid {
        self.session.id
    }

    /// The URI passed to [`load`](Self::load), once called.
    pub fn uri(&self) -> Option<ImageUri> {
        self.session.uri.lock().clone()
    }

    /// Register a listener. Notifications arrive on the dispatch thread,
    /// except the thumbnail preview, which is delivered from `load`.
    pub fn subscribe(&self, listener: Arc<dyn LoaderListener>) {
        self.session.listeners.subscribe(listener);
    }

    /// Start loading `uri`.
    ///
    /// A cached thumbnail is announced synchronously, before the stream is
    /// opened. Each loader loads at most one image.
    pub fn load(&self, uri: &ImageUri) -> Result<()> {
        let session = &self.session;
        if session.is_disposed() {
            return Err(DarkroomError::Disposed);
        }
        session.ctx.config.validate()?;
        if session.started.swap(true, Ordering::SeqCst) {
            return Err(DarkroomError::InvalidState(format!(
                "session {} has already started loading",
                session.id
            )));
        }
        *session.uri.lock() = Some(uri.clone());
        info!(session = %session.id, uri = %uri, "Loading image");

        session.show_cached_thumbnail(uri);
        if session.is_disposed() {
            return Err(DarkroomError::Disposed);
        }

        let opened = session.ctx.resources.open(uri).map_err(|e| {
            warn!(session = %session.id, uri = %uri, error = %e, "Cannot open image");
            e
        })?;
        *session.orientation.lock() = opened.orientation;
        *session.stream.lock() = Some(opened.stream);
        session.loading.store(true, Ordering::SeqCst);

        let reader = Arc::clone(session);
        let handle = std::thread::Builder::new()
            .name("darkroom-load".into())
            .spawn(move || reader.read_loop())
            .map_err(|e| {
                session.loading.store(false, Ordering::SeqCst);
                session.drop_stream();
                DarkroomError::Io(e)
            })?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// The image to display: the thumbnail preview while one is active,
    /// otherwise the decoder's buffer (partially filled while loading).
    pub fn current_image(&self) -> Option<PixelBuffer> {
        if let Some(thumb) = self.session.thumbnail.lock().clone() {
            return Some(thumb);
        }
        self.session.decoded.lock().clone()
    }

    /// True while the thumbnail preview stands in for the real image.
    pub fn has_preview(&self) -> bool {
        self.session.thumbnail.lock().is_some()
    }

    /// Orientation of the current image.
    pub fn orientation(&self) -> Orientation {
        *self.session.orientation.lock()
    }

    pub fn is_loading(&self) -> bool {
        self.session.loading.load(Ordering::SeqCst)
    }

    /// True once the decoder has reported real dimensions.
    pub fn is_prepared(&self) -> bool {
        self.session.prepared.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.session.is_disposed()
    }

    /// True when no worker is running (never started, or finished).
    pub fn reader_finished(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// Close the decoder. Safe to call repeatedly; decoder errors are
    /// swallowed and reported as `false`.
    pub fn close(&self) -> bool {
        self.session.close()
    }

    /// Stop loading and release every buffer. Idempotent. No notification
    /// is delivered after this returns.
    ///
    /// A read already blocked in the source stream is not interrupted: the
    /// worker keeps the stream until that read returns, then drops it. A
    /// source that never returns from `read` pins its stream and worker
    /// thread for as long as it blocks.
    pub fn dispose(&self) {
        self.session.dispose();
    }
}

impl Drop for ImageLoader {
    fn drop(&mut self) {
        self.session.dispose();
    }
}
