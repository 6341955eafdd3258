//! In-memory streams and a recording file system shared by unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;
use urlfs_core::{Context, Error, Result};

use crate::{BoxReadCloser, FileSystem, ReadCloser, WriteCloser};

/// Reader over a byte vector that yields to the scheduler before each read
pub struct MemoryReader {
    data: Vec<u8>,
    pos: usize,
    pub closed: Arc<AtomicBool>,
    /// Set if any call saw a context that could be cancelled or expire
    pub saw_live_context: Arc<AtomicBool>,
}

impl MemoryReader {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            closed: Arc::new(AtomicBool::new(false)),
            saw_live_context: Arc::new(AtomicBool::new(false)),
        }
    }

    fn inspect(&self, ctx: &Context) {
        if ctx.deadline().is_some() {
            self.saw_live_context.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ReadCloser for MemoryReader {
    async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> Result<usize> {
        self.inspect(ctx);
        tokio::task::yield_now().await;
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    async fn close(&mut self, ctx: &Context) -> Result<()> {
        self.inspect(ctx);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Writer appending into a shared buffer
pub struct MemoryWriter {
    pub data: Arc<Mutex<Vec<u8>>>,
    pub closed: Arc<AtomicBool>,
    pub fail_close: bool,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            fail_close: false,
        }
    }
}

#[async_trait]
impl WriteCloser for MemoryWriter {
    async fn write(&mut self, ctx: &Context, buf: &[u8]) -> Result<usize> {
        tokio::task::yield_now().await;
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        self.data.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn close(&mut self, _ctx: &Context) -> Result<()> {
        if self.fail_close {
            return Err(Error::Storage {
                message: "close failed".to_string(),
            });
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Read-only file system that counts every call it receives
#[derive(Debug, Default)]
pub struct RecordingFs {
    pub name: &'static str,
    pub calls: AtomicUsize,
}

impl RecordingFs {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSystem for RecordingFs {
    async fn open_reader(&self, ctx: &Context, url: &Url) -> Result<BoxReadCloser> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ctx.run(async { Ok(()) }).await?;
        let body = format!("{}:{}", self.name, url.path());
        Ok(Box::new(MemoryReader::new(body)))
    }

    async fn list_entries(&self, _ctx: &Context, _url: &Url) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![self.name.to_string()])
    }

    async fn remove(&self, _ctx: &Context, url: &Url) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::PathNotFound {
            path: url.path().to_string(),
        })
    }
}
