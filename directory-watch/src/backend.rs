//! The platform watch facility the directory watch is built on.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::Result;
use crate::event::{ChangeKind, Signal};

/// An open OS watch resource. Dropping the handle closes it.
pub trait WatchHandle: Send {}

impl<T: Send + 'static> WatchHandle for T {}

/// Opens OS-level watch handles on directories.
pub trait WatchBackend: Send + Sync + 'static {
    /// Open a non-recursive watch on `path` and report every raw notification
    /// to `sink` until the returned handle is dropped.
    fn open(&self, path: &Path, sink: EventSink) -> Result<Box<dyn WatchHandle>>;
}

/// Backend using the platform's recommended `notify` watcher
/// (inotify, FSEvents, kqueue or ReadDirectoryChangesW).
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyBackend;

impl WatchBackend for NotifyBackend {
    fn open(&self, path: &Path, sink: EventSink) -> Result<Box<dyn WatchHandle>> {
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                sink.deliver(res);
            })?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        Ok(Box::new(watcher))
    }
}

/// Enqueue side of a watch session, handed to the backend.
///
/// Delivering never blocks: signals go onto an unbounded queue drained by the
/// session's delivery thread. Once the session is cancelled, deliveries are
/// dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Signal>,
    cancelled: Arc<AtomicBool>,
    path: PathBuf,
    debug: bool,
}

impl EventSink {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<Signal>,
        cancelled: Arc<AtomicBool>,
        path: PathBuf,
        debug: bool,
    ) -> Self {
        Self {
            tx,
            cancelled,
            path,
            debug,
        }
    }

    /// Report one raw backend notification.
    pub fn deliver(&self, res: notify::Result<notify::Event>) {
        if self.is_cancelled() {
            return;
        }

        if self.debug {
            match &res {
                Ok(event) => match ChangeKind::classify(event.kind) {
                    Some(kind) => debug!(
                        path = %self.path.display(),
                        ?kind,
                        entries = ?event.paths,
                        "directory changed"
                    ),
                    None => trace!(path = %self.path.display(), kind = ?event.kind, "ignoring event"),
                },
                Err(e) => debug!(path = %self.path.display(), "backend error: {e}"),
            }
        }

        if let Some(signal) = Signal::from_raw(res) {
            // Fails only once the delivery thread has exited.
            let _ = self.tx.send(signal);
        }
    }

    /// Whether the session this sink belongs to has been stopped.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind;
    use notify::event::{AccessKind, CreateKind};

    fn sink() -> (EventSink, mpsc::UnboundedReceiver<Signal>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let sink = EventSink::new(tx, cancelled.clone(), PathBuf::from("/watched"), true);
        (sink, rx, cancelled)
    }

    #[test]
    fn test_deliver_enqueues_changes_in_order() {
        let (sink, mut rx, _) = sink();

        sink.deliver(Ok(notify::Event::new(EventKind::Create(CreateKind::File))));
        sink.deliver(Err(notify::Error::generic("overflow")));
        sink.deliver(Ok(notify::Event::new(EventKind::Access(AccessKind::Any))));

        assert!(matches!(rx.try_recv(), Ok(Signal::Changed)));
        assert!(matches!(rx.try_recv(), Ok(Signal::Failed(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_deliver_after_cancel_is_dropped() {
        let (sink, mut rx, cancelled) = sink();
        cancelled.store(true, Ordering::Release);

        assert!(sink.is_cancelled());
        sink.deliver(Ok(notify::Event::new(EventKind::Create(CreateKind::File))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_notify_backend_opens_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let (sink, _rx, _) = sink();

        let handle = NotifyBackend.open(temp_dir.path(), sink);
        assert!(handle.is_ok());
    }

    #[test]
    fn test_notify_backend_rejects_missing_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let (sink, _rx, _) = sink();

        let missing = temp_dir.path().join("gone");
        assert!(NotifyBackend.open(&missing, sink).is_err());
    }
}
