//! Session state and login credentials.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Where the remote console is in the login sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing observed yet.
    Unknown,
    /// A login prompt was seen.
    Unauthenticated,
    /// The username was accepted and a password prompt was seen.
    AwaitingPassword,
    /// A shell prompt was seen; commands may run.
    Ready,
    /// Login was rejected. Terminal.
    Failed,
}

impl SessionState {
    /// Whether commands may be issued.
    pub fn is_ready(self) -> bool {
        self == SessionState::Ready
    }

    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Unknown, Ready)
                | (Unknown, Unauthenticated)
                | (Unauthenticated, AwaitingPassword)
                | (Unauthenticated, Ready)
                | (AwaitingPassword, Ready)
                | (AwaitingPassword, Failed)
                // a transport error drops any live session back to unknown
                | (Unauthenticated | AwaitingPassword | Ready, Unknown)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unknown => "unknown",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::AwaitingPassword => "awaiting-password",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Login credentials for the console.
#[derive(Clone)]
pub struct Credentials {
    /// Username sent at the login prompt.
    pub username: String,

    /// Password sent at the password prompt, if any.
    pub password: Option<SecretString>,
}

impl Credentials {
    /// Credentials with a username and no password.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
        }
    }

    /// Set the password. An empty password counts as none.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password: String = password.into();
        self.password = if password.is_empty() {
            None
        } else {
            Some(SecretString::from(password))
        };
        self
    }

    /// The password, if a non-empty one is configured.
    pub(crate) fn password(&self) -> Option<&str> {
        self.password
            .as_ref()
            .map(|p| p.expose_secret())
            .filter(|p| !p.is_empty())
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("root")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}
