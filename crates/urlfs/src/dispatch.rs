//! URL dispatch facade
//!
//! Each operation resolves the URL's scheme through the [`Registry`] and
//! forwards the call, context included, to the backend found there. Results
//! come back exactly as the backend produced them; the only error synthesized
//! here is [`Error::NoFileSystem`] for a scheme nobody registered.

use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;
use urlfs_core::{Context, Error, Result};

use crate::{BoxReadCloser, BoxWriteCloser, FileSystem, FileWatchFn, Registry, Watch};

impl Registry {
    fn resolve(&self, url: &Url) -> Result<Arc<dyn FileSystem>> {
        self.lookup(url).ok_or_else(|| {
            debug!(scheme = url.scheme(), "No file system registered");
            Error::NoFileSystem {
                scheme: url.scheme().to_string(),
            }
        })
    }

    /// Open the object at `url` for reading
    #[instrument(skip(self, ctx), fields(url = %url))]
    pub async fn open_reader(&self, ctx: &Context, url: &Url) -> Result<BoxReadCloser> {
        self.resolve(url)?.open_reader(ctx, url).await
    }

    /// Open the object at `url` for writing, overwriting previous contents
    ///
    /// Backends may make no change visible before the writer is closed.
    #[instrument(skip(self, ctx), fields(url = %url))]
    pub async fn open_writer(&self, ctx: &Context, url: &Url) -> Result<BoxWriteCloser> {
        self.resolve(url)?.open_writer(ctx, url).await
    }

    /// Open the object at `url` for appending, creating it if it is missing
    #[instrument(skip(self, ctx), fields(url = %url))]
    pub async fn open_appender(&self, ctx: &Context, url: &Url) -> Result<BoxWriteCloser> {
        self.resolve(url)?.open_appender(ctx, url).await
    }

    /// Relative names of the entries beneath `url`
    #[instrument(skip(self, ctx), fields(url = %url))]
    pub async fn list_entries(&self, ctx: &Context, url: &Url) -> Result<Vec<String>> {
        self.resolve(url)?.list_entries(ctx, url).await
    }

    /// Invoke `watcher` whenever the file at `url` changes
    #[instrument(skip(self, ctx, watcher), fields(url = %url))]
    pub async fn watch_file(&self, ctx: &Context, url: &Url, watcher: FileWatchFn) -> Result<Watch> {
        self.resolve(url)?.watch_file(ctx, url, watcher).await
    }

    /// Delete the object at `url`
    #[instrument(skip(self, ctx), fields(url = %url))]
    pub async fn remove(&self, ctx: &Context, url: &Url) -> Result<()> {
        self.resolve(url)?.remove(ctx, url).await
    }
}
