//! Interactive console session: login detection and command execution.

use std::time::Duration;

use log::{debug, info, warn};
use regex::bytes::Regex;
use tokio::time::Instant;

use super::prompts::{self, ShellPrompts};
use super::response::{CommandOutput, is_echo};
use super::state::{Credentials, SessionState};
use crate::channel::{LineAssembler, Match, MatchResult, PatternMatcher, PatternSet};
use crate::error::{ChannelError, Error, Result, SessionError};
use crate::transport::Transport;

/// Command used to read back the previous command's status.
const STATUS_COMMAND: &str = "echo $?";

/// Printed by the cleanup command once removal finished.
const CLEANUP_MARKER: &str = "Cleanup done";

/// Session tuning, filled in by [`SessionBuilder`](super::SessionBuilder).
#[derive(Debug, Clone)]
pub(crate) struct SessionConfig {
    pub command_timeout: Duration,
    pub arm_delay: Duration,
    pub cleanup_dir: String,
    pub cleanup_paths: Vec<String>,
}

/// A console session over an exclusively owned transport.
///
/// The session tracks login state and only runs commands once a shell
/// prompt has been seen. Every wait is bounded by a caller supplied deadline.
pub struct Session<T> {
    matcher: PatternMatcher<T>,
    prompts: ShellPrompts,
    credentials: Credentials,
    config: SessionConfig,
    state: SessionState,
    history: Vec<SessionState>,
}

impl<T: Transport> Session<T> {
    pub(crate) fn new(
        matcher: PatternMatcher<T>,
        prompts: ShellPrompts,
        credentials: Credentials,
        config: SessionConfig,
    ) -> Self {
        Self {
            matcher,
            prompts,
            credentials,
            config,
            state: SessionState::Unknown,
            history: vec![SessionState::Unknown],
        }
    }

    /// Current login state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state the session has been in, oldest first.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Get the prompt patterns.
    pub fn prompts(&self) -> &ShellPrompts {
        &self.prompts
    }

    /// Deadline for an ordinary command started now.
    pub fn command_deadline(&self) -> Instant {
        Instant::now() + self.config.command_timeout
    }

    /// Replace the remote paths removed by [`cleanup`](Self::cleanup).
    pub fn set_cleanup_paths<I, S>(&mut self, dir: impl Into<String>, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.cleanup_dir = dir.into();
        self.config.cleanup_paths = paths.into_iter().map(Into::into).collect();
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("session state {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Drop back to `Unknown` when the link itself failed.
    fn track<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(Error::Transport(_)) = &result {
            if self.state != SessionState::Unknown && self.state != SessionState::Failed {
                self.transition(SessionState::Unknown);
            }
        }
        result
    }

    pub(crate) fn ensure_ready(&self) -> Result<()> {
        if self.state.is_ready() {
            Ok(())
        } else {
            Err(SessionError::NotReady {
                state: self.state.to_string(),
            }
            .into())
        }
    }

    async fn send(&mut self, line: &str) -> Result<()> {
        debug!(">> {}", line);
        self.matcher.send_line(line).await
    }

    /// Bring the console to a shell prompt, logging in if needed.
    ///
    /// A blank probe line is sent first. If nothing recognisable answers
    /// before `deadline`, the target is assumed to already sit at a shell
    /// whose prompt we cannot see, and the session continues as ready.
    pub async fn detect_state(&mut self, deadline: Instant) -> Result<SessionState> {
        let result = self.detect_state_inner(deadline).await;
        self.track(result)
    }

    async fn detect_state_inner(&mut self, deadline: Instant) -> Result<SessionState> {
        match self.state {
            SessionState::Ready => return Ok(self.state),
            SessionState::Failed => {
                return Err(SessionError::LoginFailed {
                    user: self.credentials.username.clone(),
                }
                .into());
            }
            SessionState::Unauthenticated | SessionState::AwaitingPassword => {
                // an earlier attempt stalled mid-login, start over
                self.transition(SessionState::Unknown);
            }
            SessionState::Unknown => {}
        }

        info!("Detecting target state...");
        self.send("").await?;

        let probe = self.prompts.probe_set();
        let answer = match self.matcher.await_match(&probe, deadline).await? {
            MatchResult::Matched(m) => m,
            MatchResult::TimedOut { waited } => {
                warn!(
                    "Unable to detect target state after {:?}, continuing anyway",
                    waited
                );
                self.transition(SessionState::Ready);
                return Ok(self.state);
            }
        };

        if answer.is(prompts::READY) {
            self.transition(SessionState::Ready);
            info!("Target already at a shell prompt");
            return Ok(self.state);
        }

        self.transition(SessionState::Unauthenticated);
        let username = self.credentials.username.clone();
        self.send(&username).await?;

        let answer = self
            .matcher
            .expect(&self.prompts.username_set(), deadline)
            .await?;

        if answer.is(prompts::PASSWORD) {
            self.transition(SessionState::AwaitingPassword);

            let Some(password) = self.credentials.password().map(str::to_owned) else {
                self.transition(SessionState::Failed);
                return Err(SessionError::PasswordRequired.into());
            };

            debug!(">> ********");
            self.matcher.send_line(&password).await?;

            let answer = self
                .matcher
                .expect(&self.prompts.password_set(), deadline)
                .await?;

            if answer.is(prompts::LOGIN_INCORRECT) {
                self.transition(SessionState::Failed);
                return Err(SessionError::LoginFailed { user: username }.into());
            }
        }

        self.transition(SessionState::Ready);
        info!("Login successful");
        Ok(self.state)
    }

    /// Run `text` and collect its output up to the next shell prompt.
    pub async fn run_command(&mut self, text: &str, deadline: Instant) -> Result<CommandOutput> {
        self.ensure_ready()?;
        let result = self.run_command_inner(text, deadline).await;
        self.track(result)
    }

    async fn run_command_inner(&mut self, text: &str, deadline: Instant) -> Result<CommandOutput> {
        let start = Instant::now();
        self.send(text).await?;
        let prompt = self.matcher.expect(&self.prompts.ready_set(), deadline).await?;
        Ok(CommandOutput::from_raw(text, &prompt.before, start.elapsed()))
    }

    /// Run `text`, wait for `marker` in its output, then probe the exit status.
    ///
    /// The marker delimits the program's own output from shell noise; the
    /// shell prompt following it is awaited under the same deadline. The
    /// status is read back with a second `echo $?` command.
    pub async fn run_command_capture_output_then_status(
        &mut self,
        text: &str,
        marker: &PatternSet,
        deadline: Instant,
    ) -> Result<CommandOutput> {
        self.run_command_stream_output_then_status(text, marker, deadline, |_: &str| {})
            .await
    }

    /// Like
    /// [`run_command_capture_output_then_status`](Self::run_command_capture_output_then_status),
    /// also handing each complete output line to `on_line` as it arrives.
    ///
    /// The echoed command is not passed on.
    pub async fn run_command_stream_output_then_status<F>(
        &mut self,
        text: &str,
        marker: &PatternSet,
        deadline: Instant,
        on_line: F,
    ) -> Result<CommandOutput>
    where
        F: FnMut(&str) + Send,
    {
        self.ensure_ready()?;
        let result = self
            .capture_then_status_inner(text, marker, deadline, on_line)
            .await;
        self.track(result)
    }

    async fn capture_then_status_inner<F>(
        &mut self,
        text: &str,
        marker: &PatternSet,
        deadline: Instant,
        mut on_line: F,
    ) -> Result<CommandOutput>
    where
        F: FnMut(&str) + Send,
    {
        let start = Instant::now();
        self.send(text).await?;

        let mut lines = LineAssembler::new();
        let mut first_line = true;
        let mut tap = |chunk: &[u8]| {
            for line in lines.push(chunk) {
                if std::mem::take(&mut first_line) && is_echo(&line, text) {
                    continue;
                }
                on_line(&line);
            }
        };

        let seen = self.matcher.expect_with(marker, deadline, &mut tap).await?;
        let prompt = self
            .matcher
            .expect_with(&self.prompts.ready_set(), deadline, &mut tap)
            .await?;

        let mut raw = seen.before.clone();
        raw.extend_from_slice(seen.matched().as_bytes());
        raw.extend_from_slice(&prompt.before);
        let output = CommandOutput::from_raw(text, &raw, start.elapsed());

        let deadline = self.command_deadline();
        let code = self.exit_status_inner(deadline).await?;
        Ok(output.with_exit_code(code))
    }

    /// Run `text` to the next prompt, then probe its exit status.
    pub async fn run_command_then_status(
        &mut self,
        text: &str,
        deadline: Instant,
    ) -> Result<CommandOutput> {
        self.ensure_ready()?;
        let result = async {
            let output = self.run_command_inner(text, deadline).await?;
            let deadline = self.command_deadline();
            let code = self.exit_status_inner(deadline).await?;
            Ok::<_, Error>(output.with_exit_code(code))
        }
        .await;
        self.track(result)
    }

    /// Exit status of the previous command.
    pub async fn exit_status(&mut self, deadline: Instant) -> Result<i32> {
        self.ensure_ready()?;
        let result = self.exit_status_inner(deadline).await;
        self.track(result)
    }

    async fn exit_status_inner(&mut self, deadline: Instant) -> Result<i32> {
        self.send(STATUS_COMMAND).await?;

        let status = status_pattern()?;
        let found = self.matcher.expect(&status, deadline).await?;
        self.matcher.expect(&self.prompts.ready_set(), deadline).await?;

        parse_exit_code(&found)
    }

    /// Remove the configured transient paths from the target.
    ///
    /// Returns `Ok(false)` when the target did not confirm in time; that is
    /// logged and left for the next run's cleanup. Link failures still
    /// propagate.
    pub async fn cleanup(&mut self, deadline: Instant) -> Result<bool> {
        if self.config.cleanup_paths.is_empty() {
            return Ok(true);
        }
        if !self.state.is_ready() {
            warn!("Skipping cleanup, session is {}", self.state);
            return Ok(false);
        }

        let command = format!(
            "cd {} && rm -rf {} && echo '{}'",
            self.config.cleanup_dir,
            self.config.cleanup_paths.join(" "),
            CLEANUP_MARKER
        );
        let result = async {
            self.send(&command).await?;
            let done = line_marker("cleanup-done", CLEANUP_MARKER)?;
            self.matcher.expect(&done, deadline).await?;
            self.matcher.expect(&self.prompts.ready_set(), deadline).await?;
            Ok::<_, Error>(())
        }
        .await;

        match self.track(result) {
            Ok(()) => Ok(true),
            Err(Error::Channel(ChannelError::PatternTimeout { waited, .. })) => {
                warn!("Failed to clean up test files on target within {:?}", waited);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.matcher.transport_mut().close().await
    }

    /// Consume the session, returning the transport.
    pub fn into_transport(self) -> T {
        self.matcher.into_inner()
    }

    pub(crate) fn matcher_mut(&mut self) -> &mut PatternMatcher<T> {
        &mut self.matcher
    }

    pub(crate) fn arm_delay(&self) -> Duration {
        self.config.arm_delay
    }

    pub(crate) async fn send_line(&mut self, line: &str) -> Result<()> {
        self.send(line).await
    }

    pub(crate) async fn expect_prompt(&mut self, deadline: Instant) -> Result<Match> {
        let ready = self.prompts.ready_set();
        let result = self.matcher.expect(&ready, deadline).await;
        self.track(result)
    }

    pub(crate) fn track_result<R>(&mut self, result: Result<R>) -> Result<R> {
        self.track(result)
    }
}

/// A pattern matching `text` alone on its own line.
///
/// Anchoring keeps the shell's echo of `echo '<text>'` from matching.
pub fn line_marker(label: &str, text: &str) -> Result<PatternSet> {
    let pattern = format!(r"(?m)^{}\r?$", regex::escape(text));
    PatternSet::new()
        .with(label, &pattern)
        .map_err(|e| ChannelError::InvalidPattern(e).into())
}

fn status_pattern() -> Result<PatternSet> {
    let regex =
        Regex::new(r"(?m)^[ \t]*(-?\d+)[ \t]*\r?$").map_err(ChannelError::InvalidPattern)?;
    Ok(PatternSet::new().with_regex("exit-status", regex))
}

fn parse_exit_code(found: &Match) -> Result<i32> {
    let text = found.group(1).unwrap_or_default();
    text.parse::<i32>().map_err(|_| {
        SessionError::ExitCodeUnparsable {
            line: found.matched().trim().to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_marker_ignores_echo() {
        let set = line_marker("done", "Cleanup done").unwrap();
        let (_, regex) = set.iter().next().unwrap();
        assert!(!regex.is_match(b"cd /tmp && rm -rf x && echo 'Cleanup done'\r\n"));
        assert!(regex.is_match(b"echo 'Cleanup done'\r\nCleanup done\r\n"));
    }

    #[test]
    fn test_status_pattern() {
        let set = status_pattern().unwrap();
        let (_, regex) = set.iter().next().unwrap();
        assert!(!regex.is_match(b"echo $?\r\n"));
        let caps = regex.captures(b"echo $?\r\n3\r\nroot@b:~# ").unwrap();
        assert_eq!(&caps[1], b"3");
    }

    #[test]
    fn test_parse_exit_code() {
        let found = Match {
            label: "exit-status".to_string(),
            groups: vec![Some("127\r".to_string()), Some("127".to_string())],
            before: Vec::new(),
        };
        assert_eq!(parse_exit_code(&found).unwrap(), 127);

        let found = Match {
            label: "exit-status".to_string(),
            groups: vec![Some("99999999999".to_string()), Some("99999999999".to_string())],
            before: Vec::new(),
        };
        assert!(matches!(
            parse_exit_code(&found),
            Err(Error::Session(SessionError::ExitCodeUnparsable { .. }))
        ));
    }
}
