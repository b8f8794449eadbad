//! Console prompt patterns.
//!
//! The defaults fit a BusyBox or systemd getty on an embedded Linux target:
//! `user@host:~#` shells, `login:` banners and `Password:` prompts.

use regex::bytes::Regex;

use crate::channel::PatternSet;

/// Label for the shell prompt.
pub const READY: &str = "ready-prompt";
/// Label for the getty login prompt.
pub const LOGIN: &str = "login-prompt";
/// Label for the password prompt.
pub const PASSWORD: &str = "password-prompt";
/// Label for a rejected login.
pub const LOGIN_INCORRECT: &str = "login-incorrect";

/// The prompts the session state machine recognises.
#[derive(Debug, Clone)]
pub struct ShellPrompts {
    /// Shell prompt signalling readiness for a new command.
    pub ready: Regex,

    /// Unauthenticated login prompt.
    pub login: Regex,

    /// Password prompt after the username.
    pub password: Regex,

    /// Message printed when credentials are rejected.
    pub login_incorrect: Regex,
}

impl ShellPrompts {
    /// Prompts for a standard embedded Linux console.
    pub fn linux() -> Result<Self, regex::Error> {
        Ok(Self {
            ready: Regex::new(r"(\S*)@\S*:.+(#|\$)")?,
            login: Regex::new(r"login:")?,
            password: Regex::new(r"Password:")?,
            login_incorrect: Regex::new(r"Login incorrect")?,
        })
    }

    /// Replace the shell prompt pattern.
    pub fn with_ready(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.ready = Regex::new(pattern)?;
        Ok(self)
    }

    /// Replace the login prompt pattern.
    pub fn with_login(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.login = Regex::new(pattern)?;
        Ok(self)
    }

    /// Replace the password prompt pattern.
    pub fn with_password(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.password = Regex::new(pattern)?;
        Ok(self)
    }

    /// Replace the rejected-login pattern.
    pub fn with_login_incorrect(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.login_incorrect = Regex::new(pattern)?;
        Ok(self)
    }

    /// Probe answer: a shell or a login banner.
    pub(crate) fn probe_set(&self) -> PatternSet {
        PatternSet::new()
            .with_regex(READY, self.ready.clone())
            .with_regex(LOGIN, self.login.clone())
    }

    /// Answer to the username: a password prompt or straight to a shell.
    pub(crate) fn username_set(&self) -> PatternSet {
        PatternSet::new()
            .with_regex(PASSWORD, self.password.clone())
            .with_regex(READY, self.ready.clone())
    }

    /// Answer to the password: a shell or a rejection.
    pub(crate) fn password_set(&self) -> PatternSet {
        PatternSet::new()
            .with_regex(READY, self.ready.clone())
            .with_regex(LOGIN_INCORRECT, self.login_incorrect.clone())
    }

    /// Just the shell prompt.
    pub(crate) fn ready_set(&self) -> PatternSet {
        PatternSet::new().with_regex(READY, self.ready.clone())
    }
}
