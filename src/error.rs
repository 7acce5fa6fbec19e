//! Error types for the tailing engine.

use thiserror::Error;

/// The main error type for tailing operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors when opening, seeking, or reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watching errors from the notify crate.
    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// The notification channel ended while the session was still running.
    #[error("File watcher stopped: {path}")]
    WatcherStopped { path: String },

    /// File path errors.
    #[error("Invalid file path: {message}")]
    InvalidPath { message: String },

    /// Rejected configuration values.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The path does not exist.
    #[error("File not found: {path}")]
    NotFound { path: String },

    /// The initial attach did not complete within the configured window.
    #[error("Timed out attaching to {path}")]
    Timeout {
        path: String,
        last: Option<Box<Error>>,
    },
}

impl Error {
    /// Returns true when the error means the path was absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// The most recent attach failure observed before a timeout, if any.
    pub fn last_error(&self) -> Option<&Error> {
        match self {
            Error::Timeout { last, .. } => last.as_deref(),
            _ => None,
        }
    }
}

/// A convenient Result type for tailing operations.
pub type Result<T> = std::result::Result<T, Error>;
