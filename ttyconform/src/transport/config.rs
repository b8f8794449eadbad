//! Serial link configuration.

use std::time::Duration;

/// Serial connection configuration.
///
/// The line is always driven as 8N1 without flow control, which is what
/// embedded debug consoles expect.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path (e.g., `/dev/ttyUSB0`).
    pub port: String,

    /// Baud rate (default: 115200).
    pub baud_rate: u32,

    /// Base timeout applied to blocking port operations.
    pub timeout: Duration,
}

impl SerialConfig {
    /// Create a configuration for `port` at `baud_rate`.
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            timeout: Duration::from_secs(1),
        }
    }

    /// Set the base timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human readable summary, e.g. `/dev/ttyUSB0 @ 115200 baud (8N1)`.
    pub fn connection_info(&self) -> String {
        format!("{} @ {} baud (8N1)", self.port, self.baud_rate)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttyUSB0", 115200)
    }
}
