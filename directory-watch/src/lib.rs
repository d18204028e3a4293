//! # Directory Watch
//!
//! Notifies a consumer whenever the contents of one directory change: an entry
//! is created, removed, renamed, or written.
//!
//! ## Features
//!
//! - **Validated Construction**: the path must name an existing directory
//! - **Idempotent Lifecycle**: `start`/`stop` never open or close a handle twice
//! - **Decoupled Delivery**: detection never waits on the change handler
//! - **Guaranteed Cleanup**: dropping the watch releases the OS handle
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Directory Watch                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WatchBackend ──► EventSink ──► delivery thread ──► on_change   │
//! │   (OS events)     (classify)      (in order)          │         │
//! │                       │                               ▼         │
//! │                       └──────── errors ──────────► on_error     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use directory_watch::DirectoryWatch;
//!
//! # fn main() -> directory_watch::Result<()> {
//! let watch = DirectoryWatch::open("/tmp/inbox")?;
//! watch.set_on_change(|| println!("inbox changed"));
//! watch.start()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod watcher;

pub use backend::{EventSink, NotifyBackend, WatchBackend, WatchHandle};
pub use config::WatchOptions;
pub use error::{Result, WatchError};
pub use event::ChangeKind;
pub use watcher::{ChangeHandler, DirectoryWatch, ErrorHandler, WatchState};
