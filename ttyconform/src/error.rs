//! Error types for ttyconform.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for ttyconform operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Serial link errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Pattern matching errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Login and command execution errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Bulk file transfer errors
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Test suite packaging and profile errors
    #[error("Suite error: {0}")]
    Suite(#[from] SuiteError),
}

/// Transport layer errors (port acquisition, link I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// The port could not be opened
    #[error("Serial port {port} is unavailable: {source}")]
    PortUnavailable {
        port: String,
        #[source]
        source: io::Error,
    },

    /// Another process holds the port lock
    #[error("Serial port {port} is already in use")]
    PortAlreadyInUse { port: String },

    /// The link reported end of stream
    #[error("Unexpected end of stream from the target")]
    Disconnected,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (pattern matching).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// None of the expected patterns showed up in time
    #[error("None of [{expected}] seen within {waited:?}")]
    PatternTimeout { expected: String, waited: Duration },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Session layer errors (login, command execution).
#[derive(Error, Debug)]
pub enum SessionError {
    /// The target asked for a password and none was configured
    #[error("Password is required for login")]
    PasswordRequired,

    /// The target rejected the credentials
    #[error("Failed to login as '{user}', check your credentials")]
    LoginFailed { user: String },

    /// A command was issued before the shell was ready
    #[error("Session is not at a ready prompt (state: {state})")]
    NotReady { state: String },

    /// The status probe did not print a number
    #[error("Could not parse exit code from '{line}'")]
    ExitCodeUnparsable { line: String },

    /// Invalid configuration in the session builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Bulk transfer errors.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The transfer tool could not be started
    #[error("Failed to start '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The transfer tool exited unsuccessfully
    #[error("'{tool}' failed with exit code {code:?}")]
    ToolFailed { tool: String, code: Option<i32> },

    /// The transfer tool ran past its deadline and was killed
    #[error("'{tool}' did not finish within {after:?}")]
    Timeout { tool: String, after: Duration },

    /// A local file needed for the transfer is missing or unreadable
    #[error("Local file {path:?}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Test suite errors (archives, profiles).
#[derive(Error, Debug)]
pub enum SuiteError {
    /// Packing a bundle failed
    #[error("Failed to archive {source_dir:?}: {message}")]
    Archive { source_dir: PathBuf, message: String },

    /// A suite profile could not be loaded
    #[error("Invalid suite profile {path:?}: {message}")]
    Profile { path: PathBuf, message: String },
}

impl Error {
    /// Whether this error means the target's console went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Error::Transport(TransportError::Disconnected))
    }
}

/// Result type alias using ttyconform's Error.
pub type Result<T> = std::result::Result<T, Error>;
