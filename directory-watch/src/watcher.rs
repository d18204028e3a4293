//! Directory watch implementation.

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::{EventSink, NotifyBackend, WatchBackend, WatchHandle};
use crate::config::WatchOptions;
use crate::error::{Result, WatchError};
use crate::event::Signal;

/// Handler invoked once per change to the watched directory.
pub type ChangeHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// Handler invoked when the backend reports an error while watching.
pub type ErrorHandler = Arc<dyn Fn(&WatchError) + Send + Sync + 'static>;

const DELIVERY_THREAD_NAME: &str = "directory-watch-delivery";

/// Lifecycle state of a [`DirectoryWatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// No watch handle is open.
    Idle,

    /// A watch handle is open and changes are being delivered.
    Active,
}

/// Watches a single directory and calls a handler whenever its contents change.
///
/// Changes are detected on the backend's event thread and delivered on a
/// dedicated delivery thread, in the order the OS reported them. Each raw
/// notification produces its own call; some platforms report a single file
/// creation as several notifications.
///
/// Dropping the watch stops it.
pub struct DirectoryWatch {
    /// The watched directory.
    path: PathBuf,

    /// Options given at construction.
    options: WatchOptions,

    /// Opens OS watch handles.
    backend: Arc<dyn WatchBackend>,

    /// Handlers, shared weakly with the delivery thread.
    handlers: Arc<Handlers>,

    /// Current state; holds the open session while active.
    slot: Mutex<Slot>,
}

enum Slot {
    Idle,
    Active(Session),
}

/// Everything owned by one `start`..`stop` cycle.
struct Session {
    handle: Box<dyn WatchHandle>,
    cancelled: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Signal>,
    delivery: JoinHandle<()>,
}

#[derive(Default)]
struct Handlers {
    on_change: RwLock<Option<ChangeHandler>>,
    on_error: RwLock<Option<ErrorHandler>>,
}

impl DirectoryWatch {
    /// Create a watch on `path`, which must name an existing directory.
    pub fn new(path: impl Into<PathBuf>, options: WatchOptions) -> Result<Self> {
        Self::with_backend(path, options, NotifyBackend)
    }

    /// Create a watch on `path` with default options.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(path, WatchOptions::default())
    }

    /// Create a watch on `path` that opens its handles through `backend`.
    pub fn with_backend(
        path: impl Into<PathBuf>,
        options: WatchOptions,
        backend: impl WatchBackend,
    ) -> Result<Self> {
        let path = path.into();
        validate_directory(&path)?;

        Ok(Self {
            path,
            options,
            backend: Arc::new(backend),
            handlers: Arc::new(Handlers::default()),
            slot: Mutex::new(Slot::Idle),
        })
    }

    /// Start watching. Does nothing if the watch is already active.
    ///
    /// The OS handle is fully registered before this returns. If it cannot be
    /// opened the watch stays idle and the error is returned.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Active(_)) {
            return Ok(());
        }

        self.log_lifecycle("about to start watching");
        *slot = Slot::Active(self.open_session()?);
        Ok(())
    }

    /// Stop watching. Does nothing if the watch is idle.
    ///
    /// The OS handle is closed while the state lock is held, so a concurrent
    /// `start` never sees `Idle` while the old handle is still open. Unless
    /// called from the change handler itself, it also waits for an in-flight
    /// handler call to finish, so no handler call begins after it returns.
    pub fn stop(&self) {
        let delivery = {
            let mut slot = self.slot.lock();
            match std::mem::replace(&mut *slot, Slot::Idle) {
                Slot::Active(session) => session.cancel(),
                Slot::Idle => return,
            }
        };

        join_delivery(delivery, &self.path);
        self.log_lifecycle("stopped watching");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WatchState {
        match *self.slot.lock() {
            Slot::Idle => WatchState::Idle,
            Slot::Active(_) => WatchState::Active,
        }
    }

    /// Whether a watch handle is open.
    pub fn is_active(&self) -> bool {
        self.state() == WatchState::Active
    }

    /// Whether no watch handle is open.
    pub fn is_idle(&self) -> bool {
        self.state() == WatchState::Idle
    }

    /// The watched directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Options given at construction.
    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    /// Set the handler called on every change. Replaces any previous handler
    /// and takes effect for the next delivered change.
    pub fn set_on_change<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.handlers.on_change.write() = Some(Arc::new(handler));
    }

    /// Remove the change handler. Changes are still observed but dropped.
    pub fn clear_on_change(&self) {
        *self.handlers.on_change.write() = None;
    }

    /// Set the handler called when the backend reports an error while the
    /// watch is active. Without one, errors are logged.
    pub fn set_on_error<F>(&self, handler: F)
    where
        F: Fn(&WatchError) + Send + Sync + 'static,
    {
        *self.handlers.on_error.write() = Some(Arc::new(handler));
    }

    /// Remove the error handler.
    pub fn clear_on_error(&self) {
        *self.handlers.on_error.write() = None;
    }

    fn open_session(&self) -> Result<Session> {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let sink = EventSink::new(
            tx.clone(),
            cancelled.clone(),
            self.path.clone(),
            self.options.debug,
        );

        let handle = self.backend.open(&self.path, sink).inspect_err(|e| {
            warn!(path = %self.path.display(), "failed to open directory watch: {e}");
        })?;

        let handlers = Arc::downgrade(&self.handlers);
        let delivery_cancelled = cancelled.clone();
        let delivery = thread::Builder::new()
            .name(DELIVERY_THREAD_NAME.to_string())
            .spawn(move || run_delivery(rx, delivery_cancelled, handlers));

        match delivery {
            Ok(delivery) => Ok(Session {
                handle,
                cancelled,
                tx,
                delivery,
            }),
            Err(e) => {
                cancelled.store(true, Ordering::Release);
                drop(handle);
                warn!(path = %self.path.display(), "failed to spawn delivery thread: {e}");
                Err(e.into())
            }
        }
    }

    fn log_lifecycle(&self, message: &str) {
        if self.options.debug {
            debug!(path = %self.path.display(), "{message}");
        }
    }
}

impl Drop for DirectoryWatch {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for DirectoryWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryWatch")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Close the OS handle and tell the delivery thread to exit. Returns the
    /// delivery thread so the caller can join it outside the state lock.
    fn cancel(self) -> JoinHandle<()> {
        let Session {
            handle,
            cancelled,
            tx,
            delivery,
        } = self;

        cancelled.store(true, Ordering::Release);
        drop(handle);
        let _ = tx.send(Signal::Shutdown);
        delivery
    }
}

fn join_delivery(delivery: JoinHandle<()>, path: &Path) {
    // Joining from the delivery thread would wait on ourselves.
    if delivery.thread().id() != thread::current().id() && delivery.join().is_err() {
        warn!(path = %path.display(), "delivery thread panicked");
    }
}

impl Handlers {
    fn changed(&self) {
        let handler = self.on_change.read().clone();
        let Some(handler) = handler else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(handler.as_ref())).is_err() {
            warn!("change handler panicked; continuing delivery");
        }
    }

    fn failed(&self, err: &WatchError) {
        let handler = self.on_error.read().clone();
        match handler {
            Some(handler) => {
                if panic::catch_unwind(AssertUnwindSafe(|| handler(err))).is_err() {
                    warn!("error handler panicked; continuing delivery");
                }
            }
            None => warn!("directory watch error: {err}"),
        }
    }
}

fn run_delivery(
    mut rx: mpsc::UnboundedReceiver<Signal>,
    cancelled: Arc<AtomicBool>,
    handlers: Weak<Handlers>,
) {
    while let Some(signal) = rx.blocking_recv() {
        if cancelled.load(Ordering::Acquire) {
            break;
        }
        // The watch itself is gone.
        let Some(live) = handlers.upgrade() else {
            break;
        };

        match signal {
            Signal::Changed => live.changed(),
            Signal::Failed(err) => live.failed(&err),
            Signal::Shutdown => break,
        }
    }
}

fn validate_directory(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(WatchError::NotADirectory(path.to_path_buf())),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            Err(WatchError::PathNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
