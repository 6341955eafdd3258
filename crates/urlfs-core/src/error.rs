//! Error types for the URL file system layer

use std::fmt;

use thiserror::Error;

/// Result type alias using the urlfs Error
pub type Result<T> = std::result::Result<T, Error>;

/// Capabilities a file system backend may or may not provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    OpenReader,
    OpenWriter,
    OpenAppender,
    ListEntries,
    WatchFile,
    Remove,
}

impl Operation {
    /// Stable lowercase name, used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::OpenReader => "open_reader",
            Operation::OpenWriter => "open_writer",
            Operation::OpenAppender => "open_appender",
            Operation::ListEntries => "list_entries",
            Operation::WatchFile => "watch_file",
            Operation::Remove => "remove",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for the URL file system layer
///
/// Three conditions must be told apart by callers: [`Error::NoFileSystem`]
/// (nothing registered for the scheme, only ever produced by dispatch),
/// [`Error::Unsupported`] (the backend lacks the capability), and everything
/// else, which backends produce and the core forwards untouched.
/// End-of-stream is not an error; it is a read returning `Ok(0)`.
#[derive(Error, Debug)]
pub enum Error {
    // Dispatch errors
    #[error("No file system loaded for URL scheme: {scheme}")]
    NoFileSystem { scheme: String },

    #[error("File system does not support this operation: {operation}")]
    Unsupported { operation: Operation },

    // Context errors
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    // Storage errors
    #[error("Storage path not found: {path}")]
    PathNotFound { path: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Channel errors
    #[error("Channel closed: {channel}")]
    ChannelClosed { channel: String },
}

impl Error {
    /// Shorthand for the unsupported-capability sentinel
    pub fn unsupported(operation: Operation) -> Self {
        Error::Unsupported { operation }
    }

    /// Returns true if no backend was registered for the URL's scheme
    pub fn is_no_filesystem(&self) -> bool {
        matches!(self, Error::NoFileSystem { .. })
    }

    /// Returns true if the backend does not implement the operation
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }

    /// Returns true if the error came from a cancelled or expired context
    pub fn is_context_error(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Hands an error to `std::io` based callers.
///
/// An [`Error::Io`] is unwrapped back to the original `io::Error`; every other
/// variant travels as the source of the resulting error and can be recovered
/// with `io::Error::get_ref` / `into_inner`.
impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(inner) => inner,
            Error::PathNotFound { .. } => std::io::Error::new(std::io::ErrorKind::NotFound, e),
            Error::Unsupported { .. } => std::io::Error::new(std::io::ErrorKind::Unsupported, e),
            Error::DeadlineExceeded => std::io::Error::new(std::io::ErrorKind::TimedOut, e),
            Error::Cancelled => std::io::Error::new(std::io::ErrorKind::Interrupted, e),
            other => std::io::Error::other(other),
        }
    }
}
