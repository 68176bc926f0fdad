//! Darkroom Viewer - load one image and report progress
//!
//! Usage: `darkroom-viewer <path> [--write-thumbnail]`

use anyhow::{bail, Context, Result};
use darkroom_core::Rect;
use darkroom_loader::{
    DiskThumbnailCache, DispatchHandle, Dispatcher, ImageLoader, ImageUri, LoadOutcome,
    LoaderConfig, LoaderContext, LoaderListener,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Environment variable naming an optional JSON config file.
const CONFIG_ENV: &str = "DARKROOM_CONFIG";

struct Args {
    path: PathBuf,
    write_thumbnail: bool,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut path = None;
        let mut write_thumbnail = false;
        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--write-thumbnail" => write_thumbnail = true,
                flag if flag.starts_with("--") => bail!("unknown option {}", flag),
                _ if path.is_some() => bail!("only one image path may be given"),
                _ => path = Some(PathBuf::from(arg)),
            }
        }
        let Some(path) = path else {
            bail!("usage: darkroom-viewer <path> [--write-thumbnail]");
        };
        Ok(Self {
            path,
            write_thumbnail,
        })
    }
}

/// Logs every notification and stops the dispatcher once the load is over.
struct ProgressLog {
    dispatch: DispatchHandle,
    updates: Mutex<(usize, Rect)>,
    outcome: Mutex<Option<LoadOutcome>>,
}

impl LoaderListener for ProgressLog {
    fn area_prepared(&self, reduced: bool) {
        if reduced {
            info!("Showing cached thumbnail");
        } else {
            info!("Image dimensions known");
        }
    }

    fn area_updated(&self, area: Rect) {
        let mut updates = self.updates.lock();
        updates.0 += 1;
        updates.1 = updates.1.union(area);
        info!(x = area.x, y = area.y, width = area.width, height = area.height, "Area updated");
    }

    fn completed(&self, outcome: &LoadOutcome) {
        match outcome {
            LoadOutcome::Finished => info!("Load finished"),
            LoadOutcome::Failed(reason) => warn!(reason = %reason, "Load failed"),
        }
        *self.outcome.lock() = Some(outcome.clone());
        self.dispatch.quit();
    }
}

fn load_config() -> Result<LoaderConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => LoaderConfig::load(&path)
            .with_context(|| format!("reading {} from {:?}", CONFIG_ENV, path)),
        None => Ok(LoaderConfig::default()),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    darkroom_loader::init();

    let args = Args::parse()?;
    let config = load_config()?;
    let thumbnail_size = config.thumbnail_size;
    let cache = config.resolved_thumbnail_dir().map(DiskThumbnailCache::new);

    let dispatcher = Dispatcher::new();
    let mut ctx = LoaderContext::new(dispatcher.handle()).with_config(config);
    if let Some(cache) = &cache {
        info!(root = %cache.root().display(), "Using thumbnail cache");
        ctx = ctx.with_thumbnails(Arc::new(cache.clone()));
    }

    let uri = ImageUri::from_path(&args.path);
    let log = Arc::new(ProgressLog {
        dispatch: dispatcher.handle(),
        updates: Mutex::new((0, Rect::ZERO)),
        outcome: Mutex::new(None),
    });

    let loader = ImageLoader::new(ctx);
    loader.subscribe(log.clone());
    loader
        .load(&uri)
        .with_context(|| format!("opening {}", args.path.display()))?;

    dispatcher.run();

    let (count, covered) = *log.updates.lock();
    info!(updates = count, width = covered.width, height = covered.height, "Damage covered");

    let outcome = log.outcome.lock().take();
    match outcome {
        Some(LoadOutcome::Finished) => {}
        Some(LoadOutcome::Failed(reason)) => bail!("failed to load {}: {}", uri, reason),
        None => bail!("load of {} ended without completing", uri),
    }

    let image = loader
        .current_image()
        .context("decoder produced no image")?;
    println!(
        "{}: {}x{} {:?}",
        args.path.display(),
        image.width(),
        image.height(),
        loader.orientation()
    );

    if args.write_thumbnail {
        let Some(cache) = &cache else {
            bail!("no cache directory available for thumbnails");
        };
        let path = cache.store(&uri, thumbnail_size, &image.snapshot())?;
        info!(path = %path.display(), "Thumbnail written");
    }

    loader.dispose();
    Ok(())
}
