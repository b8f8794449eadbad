//! Lending the console link to a transfer tool.

use std::path::{Path, PathBuf};

use log::{debug, info};
use tokio::time::Instant;

use super::BulkTransfer;
use crate::channel::PatternMatcher;
use crate::driver::{Session, line_marker};
use crate::error::{Result, SessionError};
use crate::transport::{LinkEndpoint, Transport};

/// Holds the session's matcher while an external tool owns the link.
///
/// The matcher is mutably borrowed for the guard's lifetime, so no pattern
/// matching can happen until [`Handoff::resume`] gives it back.
struct Handoff<'a, T> {
    matcher: &'a mut PatternMatcher<T>,
    endpoint: LinkEndpoint,
}

impl<'a, T: Transport> Handoff<'a, T> {
    fn begin(matcher: &'a mut PatternMatcher<T>) -> Self {
        let endpoint = matcher.transport().endpoint().clone();
        debug!("handing {} to transfer tool", endpoint);
        Self { matcher, endpoint }
    }

    fn endpoint(&self) -> &LinkEndpoint {
        &self.endpoint
    }

    /// Take the link back. Whatever was buffered before the transfer is stale.
    fn resume(self) {
        self.matcher.clear_buffer();
        debug!("reclaimed {}", self.endpoint);
    }
}

impl<T: Transport> Session<T> {
    /// Upload `local_path` into `remote_dir` on the target.
    ///
    /// The target's receiver is armed first, then the host tool runs
    /// against the raw link until it exits or `deadline` passes. A failed
    /// tool is fatal for the session's purposes: the partially written file
    /// is left for the next cleanup.
    pub async fn send_file<B: BulkTransfer>(
        &mut self,
        tool: &B,
        local_path: &Path,
        remote_dir: &str,
        deadline: Instant,
    ) -> Result<()> {
        self.ensure_ready()?;

        let arm = tool.remote_receive_command(remote_dir);
        let result = self.send_line(&arm).await;
        self.track_result(result)?;
        tokio::time::sleep(self.arm_delay()).await;

        let handoff = Handoff::begin(self.matcher_mut());
        let sent = tool.send(handoff.endpoint(), local_path, deadline).await;
        handoff.resume();
        sent?;

        let deadline = self.command_deadline();
        self.expect_prompt(deadline).await?;
        info!("Sent {} to {}", local_path.display(), remote_dir);
        Ok(())
    }

    /// Download `remote_path` from the target into `local_dir`.
    ///
    /// After the host tool exits, `completion` is echoed on the target and
    /// awaited so that any trailing transfer noise is flushed before the
    /// next command. Returns the path of the received file.
    pub async fn receive_file<B: BulkTransfer>(
        &mut self,
        tool: &B,
        remote_path: &str,
        local_dir: &Path,
        completion: &str,
        deadline: Instant,
    ) -> Result<PathBuf> {
        self.ensure_ready()?;

        let (remote_dir, file_name) = split_remote(remote_path)?;
        let command = tool.remote_send_command(remote_dir, file_name);
        let result = self.send_line(&command).await;
        self.track_result(result)?;

        let handoff = Handoff::begin(self.matcher_mut());
        let received = tool.receive(handoff.endpoint(), local_dir, deadline).await;
        handoff.resume();
        received?;

        let marker = line_marker("transfer-complete", completion)?;
        let result = self.send_line(&format!("echo '{}'", completion)).await;
        self.track_result(result)?;

        let deadline = self.command_deadline();
        let result = self.matcher_mut().expect(&marker, deadline).await;
        self.track_result(result)?;
        self.expect_prompt(deadline).await?;

        let local = local_dir.join(file_name);
        info!("Received {} into {}", remote_path, local.display());
        Ok(local)
    }
}

fn split_remote(remote_path: &str) -> Result<(&str, &str)> {
    match remote_path.rsplit_once('/') {
        Some((dir, name)) if !name.is_empty() => Ok((if dir.is_empty() { "/" } else { dir }, name)),
        None if !remote_path.is_empty() => Ok((".", remote_path)),
        _ => Err(SessionError::InvalidConfig {
            message: format!("'{}' does not name a remote file", remote_path),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_remote() {
        assert_eq!(
            split_remote("/tmp/conformance_tests/cukinia-tests/report.xml").unwrap(),
            ("/tmp/conformance_tests/cukinia-tests", "report.xml")
        );
        assert_eq!(split_remote("/report.xml").unwrap(), ("/", "report.xml"));
        assert_eq!(split_remote("report.xml").unwrap(), (".", "report.xml"));
        assert!(split_remote("/tmp/").is_err());
    }
}
