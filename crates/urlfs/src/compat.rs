//! Adapters from context-aware streams to `tokio::io`
//!
//! The adapters issue every call with [`Context::background`]: whatever
//! deadline or cancellation the caller had in mind is dropped for as long as
//! the adapter is used. They exist for handing streams to code that only
//! speaks [`AsyncRead`]/[`AsyncWrite`], such as `tokio::io::copy`.
//!
//! Errors pass through the `From<Error> for io::Error` conversion: an
//! [`Error::Io`](urlfs_core::Error::Io) comes back as the original
//! `io::Error`, any other error rides along as its source.

use std::io;
use std::mem;
use std::ops::Range;
use std::pin::Pin;
use std::task::{self, Poll};

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use urlfs_core::{Context, Error, Result};

use crate::{ReadCloser, WriteCloser};

/// Upper bound on the scratch buffer used for a single forwarded call
const MAX_CHUNK: usize = 64 * 1024;

/// Wrap a reader for use as [`AsyncRead`], ignoring deadlines and cancellation
pub fn to_io_reader<R>(reader: R) -> IoCompatReader<R>
where
    R: ReadCloser + Unpin + 'static,
{
    IoCompatReader {
        state: ReadState::Idle(reader, Vec::new(), 0..0),
    }
}

/// Wrap a writer for use as [`AsyncWrite`], ignoring deadlines and cancellation
pub fn to_io_writer<W>(writer: W) -> IoCompatWriter<W>
where
    W: WriteCloser + Unpin + 'static,
{
    IoCompatWriter {
        state: WriteState::Idle(writer, Vec::new()),
    }
}

fn poisoned() -> io::Error {
    io::Error::other("stream adapter lost its inner stream to a panic")
}

enum ReadState<R> {
    /// Reader, scratch buffer and the range of it not yet handed out
    Idle(R, Vec<u8>, Range<usize>),
    Reading(BoxFuture<'static, (R, Vec<u8>, Result<usize>)>),
    Poisoned,
}

/// [`AsyncRead`] view of a [`ReadCloser`]; see [`to_io_reader`]
pub struct IoCompatReader<R> {
    state: ReadState<R>,
}

impl<R> IoCompatReader<R>
where
    R: ReadCloser + Unpin + 'static,
{
    /// Close the wrapped reader, finishing any read still in flight first
    pub async fn close(self) -> Result<()> {
        let ctx = Context::background();
        let mut reader = match self.state {
            ReadState::Idle(reader, _, _) => reader,
            ReadState::Reading(fut) => fut.await.0,
            ReadState::Poisoned => return Err(Error::Io(poisoned())),
        };
        reader.close(&ctx).await
    }

    /// The wrapped reader, unless a read is still in flight
    ///
    /// Bytes already read from it but not yet returned are discarded.
    pub fn into_inner(self) -> Option<R> {
        match self.state {
            ReadState::Idle(reader, _, _) => Some(reader),
            _ => None,
        }
    }
}

impl<R> AsyncRead for IoCompatReader<R>
where
    R: ReadCloser + Unpin + 'static,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match mem::replace(&mut this.state, ReadState::Poisoned) {
                ReadState::Idle(reader, scratch, pending) if !pending.is_empty() => {
                    // Leftover from a read started with a larger buffer
                    let n = pending.len().min(buf.remaining());
                    buf.put_slice(&scratch[pending.start..pending.start + n]);
                    this.state = ReadState::Idle(reader, scratch, pending.start + n..pending.end);
                    return Poll::Ready(Ok(()));
                }
                ReadState::Idle(mut reader, mut scratch, _) => {
                    if buf.remaining() == 0 {
                        this.state = ReadState::Idle(reader, scratch, 0..0);
                        return Poll::Ready(Ok(()));
                    }
                    scratch.resize(buf.remaining().min(MAX_CHUNK), 0);
                    this.state = ReadState::Reading(Box::pin(async move {
                        let result = reader.read(&Context::background(), &mut scratch).await;
                        (reader, scratch, result)
                    }));
                }
                ReadState::Reading(mut fut) => match fut.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.state = ReadState::Reading(fut);
                        return Poll::Pending;
                    }
                    Poll::Ready((reader, scratch, result)) => match result {
                        // End-of-stream
                        Ok(0) => {
                            this.state = ReadState::Idle(reader, scratch, 0..0);
                            return Poll::Ready(Ok(()));
                        }
                        // The caller's buffer may have shrunk since the read
                        // started; the next loop turn copies what fits
                        Ok(n) => {
                            let n = n.min(scratch.len());
                            this.state = ReadState::Idle(reader, scratch, 0..n);
                        }
                        Err(e) => {
                            this.state = ReadState::Idle(reader, scratch, 0..0);
                            return Poll::Ready(Err(e.into()));
                        }
                    },
                },
                ReadState::Poisoned => return Poll::Ready(Err(poisoned())),
            }
        }
    }
}

enum WriteState<W> {
    Idle(W, Vec<u8>),
    Writing(BoxFuture<'static, (W, Vec<u8>, Result<usize>)>),
    Closing(BoxFuture<'static, (W, Result<()>)>),
    Closed(W),
    Poisoned,
}

/// [`AsyncWrite`] view of a [`WriteCloser`]; see [`to_io_writer`]
///
/// `poll_shutdown` forwards to [`WriteCloser::close`]. `poll_flush` only
/// waits for an in-flight write, since the context-aware contract has no
/// separate flush.
pub struct IoCompatWriter<W> {
    state: WriteState<W>,
}

impl<W> IoCompatWriter<W>
where
    W: WriteCloser + Unpin + 'static,
{
    /// The wrapped writer, unless a write or close is still in flight
    pub fn into_inner(self) -> Option<W> {
        match self.state {
            WriteState::Idle(writer, _) | WriteState::Closed(writer) => Some(writer),
            _ => None,
        }
    }
}

impl<W> AsyncWrite for IoCompatWriter<W>
where
    W: WriteCloser + Unpin + 'static,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            match mem::replace(&mut this.state, WriteState::Poisoned) {
                WriteState::Idle(mut writer, mut scratch) => {
                    if buf.is_empty() {
                        this.state = WriteState::Idle(writer, scratch);
                        return Poll::Ready(Ok(0));
                    }
                    scratch.clear();
                    scratch.extend_from_slice(&buf[..buf.len().min(MAX_CHUNK)]);
                    this.state = WriteState::Writing(Box::pin(async move {
                        let result = writer.write(&Context::background(), &scratch).await;
                        (writer, scratch, result)
                    }));
                }
                WriteState::Writing(mut fut) => match fut.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.state = WriteState::Writing(fut);
                        return Poll::Pending;
                    }
                    Poll::Ready((writer, scratch, result)) => {
                        this.state = WriteState::Idle(writer, scratch);
                        return Poll::Ready(result.map_err(io::Error::from));
                    }
                },
                state @ (WriteState::Closing(_) | WriteState::Closed(_)) => {
                    this.state = state;
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "write after shutdown",
                    )));
                }
                WriteState::Poisoned => return Poll::Ready(Err(poisoned())),
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match mem::replace(&mut this.state, WriteState::Poisoned) {
            WriteState::Writing(mut fut) => match fut.as_mut().poll(cx) {
                Poll::Pending => {
                    this.state = WriteState::Writing(fut);
                    Poll::Pending
                }
                Poll::Ready((writer, scratch, result)) => {
                    this.state = WriteState::Idle(writer, scratch);
                    Poll::Ready(result.map(|_| ()).map_err(io::Error::from))
                }
            },
            WriteState::Poisoned => Poll::Ready(Err(poisoned())),
            state => {
                this.state = state;
                Poll::Ready(Ok(()))
            }
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match mem::replace(&mut this.state, WriteState::Poisoned) {
                WriteState::Idle(mut writer, _) => {
                    this.state = WriteState::Closing(Box::pin(async move {
                        let result = writer.close(&Context::background()).await;
                        (writer, result)
                    }));
                }
                WriteState::Writing(mut fut) => match fut.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.state = WriteState::Writing(fut);
                        return Poll::Pending;
                    }
                    Poll::Ready((writer, scratch, result)) => {
                        this.state = WriteState::Idle(writer, scratch);
                        if let Err(e) = result {
                            return Poll::Ready(Err(e.into()));
                        }
                    }
                },
                WriteState::Closing(mut fut) => match fut.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.state = WriteState::Closing(fut);
                        return Poll::Pending;
                    }
                    Poll::Ready((writer, result)) => {
                        this.state = WriteState::Closed(writer);
                        return Poll::Ready(result.map_err(io::Error::from));
                    }
                },
                WriteState::Closed(writer) => {
                    this.state = WriteState::Closed(writer);
                    return Poll::Ready(Ok(()));
                }
                WriteState::Poisoned => return Poll::Ready(Err(poisoned())),
            }
        }
    }
}
