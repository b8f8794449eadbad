//! Builder for console sessions.

use std::time::Duration;

use super::prompts::ShellPrompts;
use super::session::{Session, SessionConfig};
use super::state::Credentials;
use crate::channel::{MatcherConfig, PatternMatcher};
use crate::error::{ChannelError, Result, SessionError};
use crate::transport::Transport;

/// Builder for constructing a [`Session`] around an open transport.
///
/// # Example
///
/// ```rust,no_run
/// use ttyconform::transport::{SerialConfig, SerialTransport};
/// use ttyconform::driver::SessionBuilder;
///
/// # async fn example() -> Result<(), ttyconform::Error> {
/// let transport = SerialTransport::open(SerialConfig::new("/dev/ttyUSB0", 115200))?;
/// let session = SessionBuilder::new()
///     .username("root")
///     .password("secret")
///     .build(transport)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionBuilder {
    credentials: Credentials,
    prompts: Option<ShellPrompts>,
    command_timeout: Duration,
    arm_delay: Duration,
    matcher: MatcherConfig,
    cleanup_dir: String,
    cleanup_paths: Vec<String>,
}

impl SessionBuilder {
    /// Create a builder with `root` as the user and no password.
    pub fn new() -> Self {
        Self {
            credentials: Credentials::default(),
            prompts: None,
            command_timeout: Duration::from_secs(30),
            arm_delay: Duration::from_secs(1),
            matcher: MatcherConfig::default(),
            cleanup_dir: "/tmp".to_string(),
            cleanup_paths: Vec::new(),
        }
    }

    /// Set the username for the login prompt.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.credentials.username = username.into();
        self
    }

    /// Set the password for the password prompt. Empty means none.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.credentials = self.credentials.with_password(password);
        self
    }

    /// Set both username and password.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Use custom prompt patterns.
    pub fn prompts(mut self, prompts: ShellPrompts) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Deadline for ordinary commands (default: 30s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Pause between arming the remote transfer tool and the handoff (default: 1s).
    pub fn arm_delay(mut self, delay: Duration) -> Self {
        self.arm_delay = delay;
        self
    }

    /// Tune the pattern matcher.
    pub fn matcher(mut self, config: MatcherConfig) -> Self {
        self.matcher = config;
        self
    }

    /// Remote directory the cleanup command runs from (default: `/tmp`).
    pub fn cleanup_dir(mut self, dir: impl Into<String>) -> Self {
        self.cleanup_dir = dir.into();
        self
    }

    /// Remote paths removed by [`Session::cleanup`].
    pub fn cleanup_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cleanup_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Build the session. Nothing is sent until the first operation.
    pub fn build<T: Transport>(self, transport: T) -> Result<Session<T>> {
        if self.credentials.username.trim().is_empty() {
            return Err(SessionError::InvalidConfig {
                message: "Username is required".to_string(),
            }
            .into());
        }

        let prompts = match self.prompts {
            Some(prompts) => prompts,
            None => ShellPrompts::linux().map_err(ChannelError::InvalidPattern)?,
        };

        let config = SessionConfig {
            command_timeout: self.command_timeout,
            arm_delay: self.arm_delay,
            cleanup_dir: self.cleanup_dir,
            cleanup_paths: self.cleanup_paths,
        };

        Ok(Session::new(
            PatternMatcher::with_config(transport, self.matcher),
            prompts,
            self.credentials,
            config,
        ))
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
