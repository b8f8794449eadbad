//! Transport over any tokio byte stream.

use std::future::poll_fn;
use std::pin::Pin;
use std::task::Poll;

use log::trace;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

use super::{LinkEndpoint, Transport};
use crate::error::{Result, TransportError};

/// Upper bound on reads performed by a single discard.
const MAX_DISCARD_READS: usize = 64;

/// [`Transport`] over an `AsyncRead + AsyncWrite` stream.
///
/// Reads never wait: the stream is polled once and a pending poll is reported
/// as "nothing available". The serial transport is built on this, and tests
/// drive it with in-memory streams.
pub struct StreamTransport<S> {
    io: S,
    endpoint: LinkEndpoint,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a stream, recording where external tools can reach it.
    pub fn new(io: S, endpoint: LinkEndpoint) -> Self {
        Self { io, endpoint }
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.io
    }

    /// Get a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.io
    }

    /// Poll the stream exactly once, returning `None` if it would block.
    async fn try_read(&mut self, max_bytes: usize) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; max_bytes.max(1)];
        let mut read_buf = ReadBuf::new(&mut buf);
        let io = &mut self.io;

        let polled = poll_fn(|cx| match Pin::new(&mut *io).poll_read(cx, &mut read_buf) {
            Poll::Pending => Poll::Ready(None),
            Poll::Ready(res) => Poll::Ready(Some(res)),
        })
        .await;

        match polled {
            None => Ok(None),
            Some(Err(e)) => Err(TransportError::Io(e).into()),
            Some(Ok(())) => {
                let n = read_buf.filled().len();
                if n == 0 {
                    return Err(TransportError::Disconnected.into());
                }
                buf.truncate(n);
                Ok(Some(buf))
            }
        }
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_available(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        Ok(self.try_read(max_bytes).await?.unwrap_or_default())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.io.write_all(data).await.map_err(TransportError::Io)?;
        self.io.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn discard_buffers(&mut self) -> Result<()> {
        let mut dropped = 0usize;
        for _ in 0..MAX_DISCARD_READS {
            match self.try_read(4096).await? {
                Some(chunk) => dropped += chunk.len(),
                None => break,
            }
        }
        if dropped > 0 {
            trace!("discarded {} pending bytes", dropped);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.io.shutdown().await.map_err(TransportError::Io)?;
        Ok(())
    }

    fn endpoint(&self) -> &LinkEndpoint {
        &self.endpoint
    }
}
