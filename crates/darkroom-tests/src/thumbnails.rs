//! Thumbnail fast path against an on-disk cache.

use crate::support::{run_until_completed, write_png};
use darkroom_core::{Orientation, Rect, Result};
use darkroom_loader::{
    ChannelListener, DiskThumbnailCache, Dispatcher, FileResource, ImageLoader, ImageResource,
    ImageUri, LoadOutcome, LoaderConfig, LoaderContext, LoaderEvent, LoaderListener,
    OpenedResource, ThumbnailSize,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts every event it sees.
#[derive(Default)]
struct Counter(AtomicUsize);

impl LoaderListener for Counter {
    fn area_prepared(&self, _reduced: bool) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn area_updated(&self, _area: Rect) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn completed(&self, _outcome: &LoadOutcome) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Local files, remembering how many events had been delivered when the
/// stream was opened.
struct OpenProbe {
    counter: Arc<Counter>,
    events_at_open: AtomicUsize,
}

impl ImageResource for OpenProbe {
    fn open(&self, uri: &ImageUri) -> Result<OpenedResource> {
        self.events_at_open
            .store(self.counter.0.load(Ordering::SeqCst), Ordering::SeqCst);
        FileResource.open(uri)
    }
}

fn cache_with_thumbnail(root: &Path, source: &Path) -> (DiskThumbnailCache, ImageUri) {
    let cache = DiskThumbnailCache::new(root.join("thumbs"));
    let uri = ImageUri::from_path(source);
    let full = image::open(source).expect("source image").to_rgba8();
    cache
        .store(&uri, ThumbnailSize::Large, &full)
        .expect("store thumbnail");
    (cache, uri)
}

fn config_for(cache: &DiskThumbnailCache) -> LoaderConfig {
    LoaderConfig {
        read_chunk_size: 4096,
        thumbnail_dir: Some(cache.root().to_path_buf()),
        ..LoaderConfig::default()
    }
}

#[test]
fn cached_thumbnail_is_announced_before_stream_opens() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let source = tmp.path().join("photo.png");
    write_png(&source, 512, 512);
    let (cache, uri) = cache_with_thumbnail(tmp.path(), &source);

    let counter = Arc::new(Counter::default());
    let probe = Arc::new(OpenProbe {
        counter: Arc::clone(&counter),
        events_at_open: AtomicUsize::new(usize::MAX),
    });

    let dispatcher = Dispatcher::new();
    let ctx = LoaderContext::new(dispatcher.handle())
        .with_resources(probe.clone())
        .with_thumbnails(Arc::new(cache.clone()))
        .with_config(config_for(&cache));

    let loader = ImageLoader::new(ctx);
    let (listener, rx) = ChannelListener::channel();
    loader.subscribe(counter);
    loader.subscribe(listener);
    loader.load(&uri).unwrap();

    assert_eq!(probe.events_at_open.load(Ordering::SeqCst), 2);
    let early: Vec<_> = rx.try_iter().collect();
    assert_eq!(
        early,
        vec![
            LoaderEvent::AreaPrepared { reduced: true },
            LoaderEvent::AreaUpdated(Rect::new(0, 0, 256, 256)),
        ]
    );
    assert!(loader.has_preview());
    assert_eq!(loader.orientation(), Orientation::TopLeft);
    assert_eq!(loader.current_image().unwrap().width(), 256);
}

#[test]
fn thumbnail_released_at_first_real_prepare() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let source = tmp.path().join("photo.png");
    write_png(&source, 512, 384);
    let (cache, uri) = cache_with_thumbnail(tmp.path(), &source);

    let dispatcher = Dispatcher::new();
    let ctx = LoaderContext::new(dispatcher.handle())
        .with_thumbnails(Arc::new(cache.clone()))
        .with_config(config_for(&cache));

    let loader = ImageLoader::new(ctx);
    let (listener, rx) = ChannelListener::channel();
    loader.subscribe(listener);
    loader.load(&uri).unwrap();

    let preview = loader.current_image().unwrap();
    assert_eq!((preview.width(), preview.height()), (256, 192));

    let events = run_until_completed(&dispatcher, &rx);
    let prepared: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            LoaderEvent::AreaPrepared { reduced } => Some(*reduced),
            _ => None,
        })
        .collect();
    assert_eq!(prepared, vec![true, false]);
    assert_eq!(
        events.last(),
        Some(&LoaderEvent::Completed(LoadOutcome::Finished))
    );

    assert!(!loader.has_preview());
    let full = loader.current_image().unwrap();
    assert!(!full.ptr_eq(&preview));
    assert_eq!((full.width(), full.height()), (512, 384));
    // Only the test still holds the preview.
    assert_eq!(preview.handle_count(), 1);
}

#[test]
fn other_size_class_misses() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let source = tmp.path().join("photo.png");
    write_png(&source, 300, 300);
    let (cache, uri) = cache_with_thumbnail(tmp.path(), &source);

    let dispatcher = Dispatcher::new();
    let config = LoaderConfig {
        thumbnail_size: ThumbnailSize::Normal,
        ..config_for(&cache)
    };
    let ctx = LoaderContext::new(dispatcher.handle())
        .with_thumbnails(Arc::new(cache))
        .with_config(config);

    let loader = ImageLoader::new(ctx);
    let (listener, rx) = ChannelListener::channel();
    loader.subscribe(listener);
    loader.load(&uri).unwrap();
    assert!(!loader.has_preview());

    let events = run_until_completed(&dispatcher, &rx);
    assert_eq!(events[0], LoaderEvent::AreaPrepared { reduced: false });
}

#[test]
fn dispose_drops_preview() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let source = tmp.path().join("photo.png");
    write_png(&source, 400, 400);
    let (cache, uri) = cache_with_thumbnail(tmp.path(), &source);

    let dispatcher = Dispatcher::new();
    let ctx = LoaderContext::new(dispatcher.handle())
        .with_thumbnails(Arc::new(cache.clone()))
        .with_config(config_for(&cache));

    let loader = ImageLoader::new(ctx);
    let (listener, rx) = ChannelListener::channel();
    loader.subscribe(listener);
    loader.load(&uri).unwrap();
    assert_eq!(rx.try_iter().count(), 2);

    loader.dispose();
    assert!(!loader.has_preview());
    assert!(loader.current_image().is_none());

    dispatcher.run_until(std::time::Duration::from_millis(100), || loader.reader_finished());
    dispatcher.run_pending();
    assert_eq!(rx.try_iter().count(), 0);
}
