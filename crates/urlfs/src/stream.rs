//! Context-aware stream traits
//!
//! Counterparts of `Read`/`Write` whose every call carries a [`Context`], so
//! that deadlines and cancellation reach the backend doing the I/O.

use async_trait::async_trait;
use urlfs_core::{Context, Result};

use crate::LimitedReadCloser;

/// Boxed reader as handed out by file system backends
pub type BoxReadCloser = Box<dyn ReadCloser>;

/// Boxed writer as handed out by file system backends
pub type BoxWriteCloser = Box<dyn WriteCloser>;

/// Context-aware readable stream over one object
///
/// Callers close a stream exactly once; using it afterwards is
/// backend-defined.
#[async_trait]
pub trait ReadCloser: Send {
    /// Read up to `buf.len()` bytes into `buf`
    ///
    /// `Ok(0)` for a non-empty buffer signals end-of-stream. If `ctx` is
    /// cancelled or expires while the read is in flight the call returns the
    /// context's error, and the backend should leave the stream position
    /// where it was before the call rather than silently drop data.
    async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> Result<usize>;

    /// Release the handle
    ///
    /// Must be callable with an already cancelled context; backends make a
    /// best effort to finish cleanup regardless.
    async fn close(&mut self, ctx: &Context) -> Result<()>;
}

/// Context-aware writable stream over one object
#[async_trait]
pub trait WriteCloser: Send {
    /// Write up to `buf.len()` bytes from `buf`, returning how many were taken
    ///
    /// If `ctx` expires during the write the backend should truncate the
    /// object back to its length before the call instead of leaving partial
    /// bytes visible.
    async fn write(&mut self, ctx: &Context, buf: &[u8]) -> Result<usize>;

    /// Commit and release the handle
    ///
    /// Backends may defer making any change visible until close.
    async fn close(&mut self, ctx: &Context) -> Result<()>;
}

#[async_trait]
impl<R: ReadCloser + ?Sized> ReadCloser for Box<R> {
    async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> Result<usize> {
        (**self).read(ctx, buf).await
    }

    async fn close(&mut self, ctx: &Context) -> Result<()> {
        (**self).close(ctx).await
    }
}

#[async_trait]
impl<W: WriteCloser + ?Sized> WriteCloser for Box<W> {
    async fn write(&mut self, ctx: &Context, buf: &[u8]) -> Result<usize> {
        (**self).write(ctx, buf).await
    }

    async fn close(&mut self, ctx: &Context) -> Result<()> {
        (**self).close(ctx).await
    }
}

/// Convenience methods for every [`ReadCloser`]
#[async_trait]
pub trait ReadCloserExt: ReadCloser {
    /// Cap the total bytes delivered by this reader at `limit`
    fn take(self, limit: u64) -> LimitedReadCloser<Self>
    where
        Self: Sized,
    {
        LimitedReadCloser::new(self, limit)
    }

    /// Read until end-of-stream, appending to `out`
    ///
    /// Returns the number of bytes appended. Every underlying read observes
    /// `ctx`; on error the bytes read so far stay in `out`.
    async fn read_to_end(&mut self, ctx: &Context, out: &mut Vec<u8>) -> Result<usize> {
        let mut chunk = [0u8; 8 * 1024];
        let mut total = 0;
        loop {
            let n = self.read(ctx, &mut chunk).await?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&chunk[..n]);
            total += n;
        }
    }
}

impl<R: ReadCloser + ?Sized> ReadCloserExt for R {}

/// Convenience methods for every [`WriteCloser`]
#[async_trait]
pub trait WriteCloserExt: WriteCloser {
    /// Write the whole buffer, retrying short writes
    async fn write_all(&mut self, ctx: &Context, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(ctx, buf).await?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}

impl<W: WriteCloser + ?Sized> WriteCloserExt for W {}
