//! Local filesystem backend
//!
//! Serves `file:` URLs (or whichever scheme it is registered under) from the
//! local disk, with:
//! - Atomic overwrites (write to .tmp, then rename on close)
//! - Rollback of the read position when a read is cancelled
//! - Truncation back to the committed length when a write is cancelled
//! - Polling-based file watches, stopped by cancelling or dropping the `Watch`
//!
//! Rollback and truncation are best effort: they are attempted once after the
//! interrupted call and their own failures are only logged.

use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;
use urlfs_core::{Context, Error, LocalConfig, Result};
use uuid::Uuid;

use crate::{
    BoxReadCloser, BoxWriteCloser, FileSystem, FileWatchFn, ReadCloser, Watch, WriteCloser,
};

/// Local filesystem backend
///
/// Without a root, the URL path is used as an absolute local path. With a
/// root, URL paths resolve beneath it and `..` components are rejected.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    /// Directory URL paths are resolved beneath
    root: Option<PathBuf>,

    /// Poll period for file watches
    watch_interval: Duration,

    /// Capacity of each watch's error channel
    watch_error_capacity: usize,
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::from_config(&LocalConfig::default())
    }
}

impl LocalFileSystem {
    /// Create a backend that maps URL paths to absolute local paths
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend confined to `root`
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: Some(root.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Create a backend from configuration
    pub fn from_config(config: &LocalConfig) -> Self {
        Self {
            root: config.root.clone(),
            watch_interval: config.watch_interval,
            watch_error_capacity: config.watch_error_capacity.max(1),
        }
    }

    /// Override the poll period for file watches
    pub fn watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    /// Get the root directory, if confined
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Resolve a URL to a local path
    fn resolve_path(&self, url: &Url) -> Result<PathBuf> {
        let path = url.to_file_path().map_err(|()| Error::InvalidUrl {
            url: url.to_string(),
            reason: "not a local path".to_string(),
        })?;

        let Some(root) = &self.root else {
            return Ok(path);
        };

        let mut resolved = root.clone();
        for component in path.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    return Err(Error::InvalidUrl {
                        url: url.to_string(),
                        reason: "path escapes the root directory".to_string(),
                    })
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        Ok(resolved)
    }

    /// Generate a unique temporary file path next to `full_path`
    fn temp_path(full_path: &Path) -> PathBuf {
        let temp_name = format!(
            ".{}.{}.tmp",
            full_path.file_name().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4()
        );
        full_path.with_file_name(temp_name)
    }
}

/// Map an I/O failure on `url` to the storage error taxonomy
fn io_error(url: &Url, action: &str, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::PathNotFound {
            path: url.path().to_string(),
        }
    } else {
        Error::Storage {
            message: format!("Failed to {} {}: {}", action, url, e),
        }
    }
}

async fn create_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Storage {
                message: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
    }
    Ok(())
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    #[instrument(skip(self, ctx), fields(backend = "local", url = %url))]
    async fn open_reader(&self, ctx: &Context, url: &Url) -> Result<BoxReadCloser> {
        let full_path = self.resolve_path(url)?;
        debug!(?full_path, "Opening file for reading");

        let file = ctx
            .run(async {
                fs::File::open(&full_path)
                    .await
                    .map_err(|e| io_error(url, "open", e))
            })
            .await?;

        Ok(Box::new(LocalReader {
            file,
            path: full_path,
            position: 0,
        }))
    }

    #[instrument(skip(self, ctx), fields(backend = "local", url = %url))]
    async fn open_writer(&self, ctx: &Context, url: &Url) -> Result<BoxWriteCloser> {
        let full_path = self.resolve_path(url)?;
        let temp_path = Self::temp_path(&full_path);
        debug!(?full_path, ?temp_path, "Opening file for atomic overwrite");

        let file = ctx
            .run(async {
                create_parent_dirs(&full_path).await?;
                fs::File::create(&temp_path)
                    .await
                    .map_err(|e| Error::Storage {
                        message: format!("Failed to create temp file {:?}: {}", temp_path, e),
                    })
            })
            .await?;

        Ok(Box::new(LocalWriter {
            file,
            path: full_path,
            temp_path: Some(temp_path),
            committed_len: 0,
            closed: false,
        }))
    }

    #[instrument(skip(self, ctx), fields(backend = "local", url = %url))]
    async fn open_appender(&self, ctx: &Context, url: &Url) -> Result<BoxWriteCloser> {
        let full_path = self.resolve_path(url)?;
        debug!(?full_path, "Opening file for appending");

        let (file, committed_len) = ctx
            .run(async {
                create_parent_dirs(&full_path).await?;
                let file = fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&full_path)
                    .await
                    .map_err(|e| io_error(url, "open", e))?;
                let len = file
                    .metadata()
                    .await
                    .map_err(|e| io_error(url, "stat", e))?
                    .len();
                Ok::<_, Error>((file, len))
            })
            .await?;

        Ok(Box::new(LocalWriter {
            file,
            path: full_path,
            temp_path: None,
            committed_len,
            closed: false,
        }))
    }

    #[instrument(skip(self, ctx), fields(backend = "local", url = %url))]
    async fn list_entries(&self, ctx: &Context, url: &Url) -> Result<Vec<String>> {
        let dir = self.resolve_path(url)?;
        debug!(?dir, "Listing directory");

        let mut entries = ctx
            .run(async { fs::read_dir(&dir).await.map_err(|e| io_error(url, "list", e)) })
            .await?;

        let mut names = Vec::new();
        while let Some(entry) = ctx
            .run(async {
                entries
                    .next_entry()
                    .await
                    .map_err(|e| io_error(url, "list", e))
            })
            .await?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        names.sort();
        debug!(count = names.len(), "Found entries");
        Ok(names)
    }

    #[instrument(skip(self, ctx, watcher), fields(backend = "local", url = %url))]
    async fn watch_file(&self, ctx: &Context, url: &Url, watcher: FileWatchFn) -> Result<Watch> {
        let full_path = self.resolve_path(url)?;
        let initial = ctx.run(FileStamp::read(&full_path, url)).await?;

        let token = CancellationToken::new();
        let (error_tx, error_rx) = mpsc::channel(self.watch_error_capacity);

        tokio::spawn(watch_loop(
            full_path,
            url.clone(),
            initial,
            self.watch_interval,
            watcher,
            error_tx,
            token.clone(),
        ));

        debug!(interval = ?self.watch_interval, "Watch started");
        Ok(Watch::new(
            Box::new(move || {
                token.cancel();
                Ok(())
            }),
            error_rx,
        ))
    }

    #[instrument(skip(self, ctx), fields(backend = "local", url = %url))]
    async fn remove(&self, ctx: &Context, url: &Url) -> Result<()> {
        let full_path = self.resolve_path(url)?;
        debug!(?full_path, "Removing");

        ctx.run(async {
            let metadata = fs::symlink_metadata(&full_path)
                .await
                .map_err(|e| io_error(url, "stat", e))?;
            let removed = if metadata.is_dir() {
                fs::remove_dir(&full_path).await
            } else {
                fs::remove_file(&full_path).await
            };
            removed.map_err(|e| io_error(url, "remove", e))
        })
        .await
    }
}

/// Reader over a local file
///
/// Tracks the logical position so an interrupted read can seek back to where
/// it started.
#[derive(Debug)]
struct LocalReader {
    file: fs::File,
    path: PathBuf,
    position: u64,
}

#[async_trait]
impl ReadCloser for LocalReader {
    async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> Result<usize> {
        let result = ctx
            .run(async { self.file.read(buf).await.map_err(Error::from) })
            .await;

        match result {
            Ok(n) => {
                self.position += n as u64;
                Ok(n)
            }
            Err(e) => {
                if e.is_context_error() {
                    if let Err(seek_err) = self.file.seek(SeekFrom::Start(self.position)).await {
                        warn!(path = ?self.path, error = %seek_err, "Failed to roll back read position");
                    }
                }
                Err(e)
            }
        }
    }

    async fn close(&mut self, _ctx: &Context) -> Result<()> {
        // Dropping the handle releases the descriptor; nothing can block here.
        debug!(path = ?self.path, "Closing reader");
        Ok(())
    }
}

/// Writer over a local file
///
/// Overwrites go to a temp file that `close` renames into place; appends go
/// straight to the target. `committed_len` is the length the file had after
/// the last successful write.
#[derive(Debug)]
struct LocalWriter {
    file: fs::File,
    path: PathBuf,
    temp_path: Option<PathBuf>,
    committed_len: u64,
    closed: bool,
}

impl LocalWriter {
    fn written_path(&self) -> &Path {
        self.temp_path.as_deref().unwrap_or(&self.path)
    }

    /// Drop bytes of an interrupted write: truncate to the committed length
    /// and put the cursor back there, so the next write does not leave a hole
    async fn roll_back(&mut self) {
        debug!(path = ?self.written_path(), len = self.committed_len, "Truncating after interrupted write");
        let result = async {
            self.file.set_len(self.committed_len).await?;
            self.file.seek(SeekFrom::Start(self.committed_len)).await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        if let Err(e) = result {
            warn!(path = ?self.written_path(), error = %e, "Failed to roll back interrupted write");
        }
    }
}

#[async_trait]
impl WriteCloser for LocalWriter {
    async fn write(&mut self, ctx: &Context, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Storage {
                message: format!("Write to closed file {:?}", self.path),
            });
        }

        let result = ctx
            .run(async {
                let n = self.file.write(buf).await?;
                self.file.flush().await?;
                Ok::<_, Error>(n)
            })
            .await;

        match result {
            Ok(n) => {
                self.committed_len += n as u64;
                Ok(n)
            }
            Err(e) => {
                if e.is_context_error() {
                    self.roll_back().await;
                }
                Err(e)
            }
        }
    }

    async fn close(&mut self, _ctx: &Context) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        // Cleanup runs to completion even for a cancelled context, so a
        // half-committed overwrite is never left behind. A failed close
        // leaves the writer open so a retry redoes every step.
        self.file.flush().await?;
        self.file.sync_all().await.map_err(|e| Error::Storage {
            message: format!("Failed to sync file: {}", e),
        })?;

        if let Some(temp_path) = &self.temp_path {
            fs::rename(temp_path, &self.path)
                .await
                .map_err(|e| Error::Storage {
                    message: format!("Failed to rename {:?} to {:?}: {}", temp_path, self.path, e),
                })?;
            self.temp_path = None;
        }
        self.closed = true;

        debug!(path = ?self.path, size = self.committed_len, "File written successfully");
        Ok(())
    }
}

impl Drop for LocalWriter {
    fn drop(&mut self) {
        if let Some(temp_path) = self.temp_path.take() {
            // Abandoned overwrite: the target keeps its old contents.
            let _ = std::fs::remove_file(temp_path);
        }
    }
}

/// What a watch compares between polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    async fn read(path: &Path, url: &Url) -> Result<Self> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| io_error(url, "stat", e))?;
        Ok(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

async fn watch_loop(
    path: PathBuf,
    url: Url,
    mut last: FileStamp,
    interval: Duration,
    watcher: FileWatchFn,
    errors: mpsc::Sender<Error>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial stamp covers it.
    ticker.tick().await;
    // Set while the same failure repeats; reported once per failure streak
    let mut failing = false;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            // Nobody holds the Watch anymore
            _ = errors.closed() => break,
            _ = ticker.tick() => {}
        }

        let outcome = match FileStamp::read(&path, &url).await {
            Ok(stamp) if stamp == last => {
                failing = false;
                continue;
            }
            Ok(stamp) => fs::File::open(&path)
                .await
                .map(|file| (stamp, file))
                .map_err(|e| io_error(&url, "open", e)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((stamp, file)) => {
                last = stamp;
                failing = false;
                debug!(?path, "Watched file changed");
                let reader = LocalReader {
                    file,
                    path: path.clone(),
                    position: 0,
                };
                watcher(url.clone(), Box::new(reader));
            }
            Err(_) if failing => {}
            Err(e) => {
                failing = true;
                if let Err(mpsc::error::TrySendError::Full(dropped)) = errors.try_send(e) {
                    warn!(?path, error = %dropped, "Watch error channel full, dropping error");
                }
            }
        }
    }

    debug!(?path, "Watch stopped");
}
