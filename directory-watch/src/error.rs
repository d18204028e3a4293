//! Error types for the directory watch.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for directory watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur while creating or running a directory watch.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Nothing exists at the requested path.
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// Something exists at the requested path, but it is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The platform watch facility failed to open, register, or report.
    #[error("watch backend error: {0}")]
    Backend(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
