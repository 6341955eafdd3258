//! Length-limiting reader decorator

use async_trait::async_trait;
use urlfs_core::{Context, Result};

use crate::ReadCloser;

/// Reader that delivers at most a fixed number of bytes from its inner reader
///
/// The context-aware equivalent of `std::io::Take`. Once the budget is spent
/// every read reports end-of-stream (`Ok(0)`) without touching the inner
/// reader. No buffering or read-ahead takes place, and errors from the inner
/// reader are returned as they are.
#[derive(Debug)]
pub struct LimitedReadCloser<R> {
    inner: R,
    remaining: u64,
}

impl<R> LimitedReadCloser<R> {
    /// Wrap `inner`, allowing at most `limit` bytes through
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }

    /// Bytes that may still be delivered
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[async_trait]
impl<R: ReadCloser> ReadCloser for LimitedReadCloser<R> {
    async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }

        let max = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        let len = buf.len().min(max);
        let buf = &mut buf[..len];

        let n = self.inner.read(ctx, buf).await?;
        self.remaining = self.remaining.saturating_sub(n as u64);
        Ok(n)
    }

    async fn close(&mut self, ctx: &Context) -> Result<()> {
        self.inner.close(ctx).await
    }
}
