//! Transport layer: the raw byte channel to the target.
//!
//! A [`Transport`] is owned by exactly one session at a time. The only
//! sanctioned exception is the transfer handoff, where an external tool is
//! pointed at the same device through the [`LinkEndpoint`].

pub mod config;
mod lock;
mod serial;
mod stream;

pub use config::SerialConfig;
pub use lock::PortLock;
pub use serial::SerialTransport;
pub use stream::StreamTransport;

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Bidirectional byte channel to the target.
pub trait Transport: Send {
    /// Return whatever bytes are ready, up to `max_bytes`, without waiting.
    ///
    /// An empty vector means nothing was pending. End of stream is reported
    /// as [`TransportError::Disconnected`](crate::error::TransportError::Disconnected).
    fn read_available(&mut self, max_bytes: usize) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Write all of `data` and flush it to the link.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Drop anything pending in the input and output buffers.
    fn discard_buffers(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Close the link.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Where an external tool can attach to the same raw channel.
    fn endpoint(&self) -> &LinkEndpoint;
}

/// Location of the raw channel behind a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEndpoint {
    path: PathBuf,
}

impl LinkEndpoint {
    /// Create an endpoint for a device node or other openable path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the device node.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for LinkEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
