//! Serial console transport built on tokio-serial.

use std::io;

use log::{debug, info};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};

use super::config::SerialConfig;
use super::lock::PortLock;
use super::stream::StreamTransport;
use super::{LinkEndpoint, Transport};
use crate::error::{Result, TransportError};

/// Serial port transport holding the port's advisory lock.
pub struct SerialTransport {
    inner: StreamTransport<SerialStream>,
    config: SerialConfig,
    _lock: PortLock,
}

impl SerialTransport {
    /// Lock and open the port described by `config`.
    ///
    /// The lock is taken first, so a second invocation against the same
    /// device fails with [`TransportError::PortAlreadyInUse`] before touching
    /// the line settings. Must be called from within a tokio runtime.
    pub fn open(config: SerialConfig) -> Result<Self> {
        let lock = PortLock::acquire(&config.port)?;

        #[allow(unused_mut)]
        let mut stream = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open_native_async()
            .map_err(|e| TransportError::PortUnavailable {
                port: config.port.clone(),
                source: io::Error::from(e),
            })?;

        // The transfer tools open the device themselves, so TIOCEXCL must
        // stay off; exclusivity comes from the advisory lock instead.
        #[cfg(unix)]
        stream
            .set_exclusive(false)
            .map_err(|e| TransportError::Io(io::Error::from(e)))?;

        info!("opened {}", config.connection_info());

        Ok(Self {
            inner: StreamTransport::new(stream, LinkEndpoint::new(&config.port)),
            config,
            _lock: lock,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl Transport for SerialTransport {
    async fn read_available(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        self.inner.read_available(max_bytes).await
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write(data).await
    }

    async fn discard_buffers(&mut self) -> Result<()> {
        self.inner
            .get_mut()
            .clear(ClearBuffer::All)
            .map_err(|e| TransportError::Io(io::Error::from(e)))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        debug!("closing {}", self.config.port);
        self.inner.close().await
    }

    fn endpoint(&self) -> &LinkEndpoint {
        self.inner.endpoint()
    }
}
