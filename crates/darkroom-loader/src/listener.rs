//! Loader notifications and subscription.

use crossbeam_channel::{Receiver, Sender};
use darkroom_core::Rect;
use parking_lot::RwLock;
use std::sync::Arc;

/// How a load ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The stream was consumed and the decoder finished.
    Finished,
    /// Reading or decoding failed; no further updates will follow.
    Failed(String),
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// A notification delivered on the dispatch thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderEvent {
    /// Dimensions are known. `reduced` is true for a thumbnail preview.
    AreaPrepared { reduced: bool },
    /// New pixels are available in this region of the current image.
    AreaUpdated(Rect),
    /// The load is over.
    Completed(LoadOutcome),
}

/// Observer for a loading session. All methods default to no-ops.
pub trait LoaderListener: Send + Sync {
    fn area_prepared(&self, _reduced: bool) {}

    fn area_updated(&self, _area: Rect) {}

    fn completed(&self, _outcome: &LoadOutcome) {}
}

/// Forwards every event into a channel.
pub struct ChannelListener {
    tx: Sender<LoaderEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel.
    pub fn channel() -> (Arc<Self>, Receiver<LoaderEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Arc::new(Self { tx }), rx)
    }

    fn send(&self, event: LoaderEvent) {
        // Receiver gone means nobody is interested any more.
        let _ = self.tx.send(event);
    }
}

impl LoaderListener for ChannelListener {
    fn area_prepared(&self, reduced: bool) {
        self.send(LoaderEvent::AreaPrepared { reduced });
    }

    fn area_updated(&self, area: Rect) {
        self.send(LoaderEvent::AreaUpdated(area));
    }

    fn completed(&self, outcome: &LoadOutcome) {
        self.send(LoaderEvent::Completed(outcome.clone()));
    }
}

/// Subscribed listeners, notified in subscription order.
#[derive(Default)]
pub(crate) struct Listeners {
    inner: RwLock<Vec<Arc<dyn LoaderListener>>>,
}

impl Listeners {
    pub(crate) fn subscribe(&self, listener: Arc<dyn LoaderListener>) {
        self.inner.write().push(listener);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub(crate) fn clear(&self) {
        self.inner.write().clear();
    }

    /// Deliver `event` to each listener in turn while `active` holds. It is
    /// checked before every call, so a listener that stops delivery also
    /// stops it for those after it.
    pub(crate) fn emit(&self, event: &LoaderEvent, active: impl Fn() -> bool) {
        // Snapshot so a listener may subscribe others without deadlocking.
        let listeners = self.inner.read().clone();
        for listener in &listeners {
            if !active() {
                return;
            }
            match event {
                LoaderEvent::AreaPrepared { reduced } => listener.area_prepared(*reduced),
                LoaderEvent::AreaUpdated(area) => listener.area_updated(*area),
                LoaderEvent::Completed(outcome) => listener.completed(outcome),
            }
        }
    }
}
