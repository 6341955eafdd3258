//! File system backend trait definition
//!
//! Defines the async interface every backend registers under a URL scheme.

use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;
use urlfs_core::{Context, Error, Operation, Result};

use crate::{BoxReadCloser, BoxWriteCloser};

/// Callback invoked once per detected change of a watched file
///
/// Receives the URL of the changed file and a fresh reader over its new
/// contents. The reader may be dropped without ever being read.
pub type FileWatchFn = Arc<dyn Fn(Url, BoxReadCloser) + Send + Sync>;

/// One-shot function that stops a watch
pub type CancelWatchFn = Box<dyn FnOnce() -> Result<()> + Send>;

/// Async trait for file system backends
///
/// A backend implements the subset of operations its storage supports. The
/// default body of every method fails with [`Error::Unsupported`], so
/// capabilities a backend leaves out are reported uniformly.
///
/// The context passed to the `open_*` methods governs opening the object,
/// not the later reads and writes, which take their own context.
#[async_trait]
pub trait FileSystem: Send + Sync + Debug {
    /// Open the object at `url` for reading
    async fn open_reader(&self, _ctx: &Context, _url: &Url) -> Result<BoxReadCloser> {
        Err(Error::unsupported(Operation::OpenReader))
    }

    /// Open the object at `url` for writing, replacing previous contents
    ///
    /// Backends may defer all visible changes until the writer is closed.
    async fn open_writer(&self, _ctx: &Context, _url: &Url) -> Result<BoxWriteCloser> {
        Err(Error::unsupported(Operation::OpenWriter))
    }

    /// Open the object at `url` for appending, creating it if missing
    async fn open_appender(&self, _ctx: &Context, _url: &Url) -> Result<BoxWriteCloser> {
        Err(Error::unsupported(Operation::OpenAppender))
    }

    /// List the entries beneath `url`
    ///
    /// Returns names relative to `url`, without `.`, `..` or whatever the
    /// storage's equivalent is.
    async fn list_entries(&self, _ctx: &Context, _url: &Url) -> Result<Vec<String>> {
        Err(Error::unsupported(Operation::ListEntries))
    }

    /// Call `watcher` on every change of the file at `url`
    ///
    /// The context governs the registration only; the watch lasts until
    /// [`Watch::cancel`] is called.
    async fn watch_file(&self, _ctx: &Context, _url: &Url, _watcher: FileWatchFn) -> Result<Watch> {
        Err(Error::unsupported(Operation::WatchFile))
    }

    /// Delete the object at `url`
    ///
    /// Success means the object is gone; on error it may or may not remain.
    async fn remove(&self, _ctx: &Context, _url: &Url) -> Result<()> {
        Err(Error::unsupported(Operation::Remove))
    }
}

/// Handle on an active watch subscription
///
/// Errors the backend hits while watching arrive on [`errors`](Watch::errors)
/// until the watch is cancelled, after which the channel closes.
pub struct Watch {
    cancel: CancelWatchFn,
    errors: mpsc::Receiver<Error>,
}

impl Watch {
    pub fn new(cancel: CancelWatchFn, errors: mpsc::Receiver<Error>) -> Self {
        Self { cancel, errors }
    }

    /// Asynchronous error channel of this watch
    pub fn errors(&mut self) -> &mut mpsc::Receiver<Error> {
        &mut self.errors
    }

    /// Stop watching, running the backend's cleanup
    pub fn cancel(self) -> Result<()> {
        (self.cancel)()
    }

    /// Split into the cancel function and the error channel
    pub fn into_parts(self) -> (CancelWatchFn, mpsc::Receiver<Error>) {
        (self.cancel, self.errors)
    }
}

impl Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch").finish_non_exhaustive()
    }
}
