//! urlfs - URL-addressed file systems with pluggable backends
//!
//! The scheme of a URL selects the backend; the path names the object and the
//! query may carry backend-specific metadata. Unlike plain `std::io`, every
//! operation that can block takes a [`Context`] carrying cancellation and a
//! deadline, down to each individual read and write.
//!
//! Provides:
//! - [`ReadCloser`] / [`WriteCloser`]: context-aware streams
//! - [`LimitedReadCloser`]: caps the bytes delivered by a reader
//! - [`compat`]: `tokio::io` views of the streams for context-ignorant callers
//! - [`Registry`]: scheme → [`FileSystem`] mapping plus the dispatch operations
//! - [`LocalFileSystem`]: local disk backend (default `local` feature)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use url::Url;
//! use urlfs::{Context, LocalFileSystem, ReadCloser, ReadCloserExt, Registry};
//!
//! # async fn example() -> urlfs::Result<()> {
//! let registry = Registry::new();
//! registry.register("file", Arc::new(LocalFileSystem::new()));
//!
//! let ctx = Context::background().with_timeout(Duration::from_secs(5));
//! let url = Url::parse("file:///etc/hostname").unwrap();
//! let mut reader = registry.open_reader(&ctx, &url).await?.take(1024);
//! let mut contents = Vec::new();
//! reader.read_to_end(&ctx, &mut contents).await?;
//! reader.close(&ctx).await?;
//! # Ok(())
//! # }
//! ```

pub mod compat;
pub mod dispatch;
mod filesystem;
mod limited;
mod registry;
mod stream;

#[cfg(feature = "local")]
mod local;

#[cfg(test)]
mod testing;

pub use compat::{to_io_reader, to_io_writer, IoCompatReader, IoCompatWriter};
pub use filesystem::{CancelWatchFn, FileSystem, FileWatchFn, Watch};
pub use limited::LimitedReadCloser;
pub use registry::{Registry, RegistryHandle};
pub use stream::{
    BoxReadCloser, BoxWriteCloser, ReadCloser, ReadCloserExt, WriteCloser, WriteCloserExt,
};
pub use urlfs_core::{Context, Error, LocalConfig, Operation, Result, UrlfsConfig};

#[cfg(feature = "local")]
pub use local::LocalFileSystem;

