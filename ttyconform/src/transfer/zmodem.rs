//! ZMODEM transfers through the lrzsz `sz`/`rz` programs.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, info, warn};
use tokio::process::Command;
use tokio::time::Instant;

use super::BulkTransfer;
use crate::error::{Result, TransferError};
use crate::transport::LinkEndpoint;

/// ZMODEM via lrzsz, on both the host and the target.
#[derive(Debug, Clone)]
pub struct ZmodemTool {
    sz: PathBuf,
    rz: PathBuf,
}

impl ZmodemTool {
    /// Use `sz` and `rz` from `PATH`.
    pub fn new() -> Self {
        Self::with_programs("sz", "rz")
    }

    /// Use specific host programs.
    pub fn with_programs(sz: impl Into<PathBuf>, rz: impl Into<PathBuf>) -> Self {
        Self {
            sz: sz.into(),
            rz: rz.into(),
        }
    }
}

impl Default for ZmodemTool {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkTransfer for ZmodemTool {
    fn remote_receive_command(&self, remote_dir: &str) -> String {
        format!("cd {} && rz -y --zmodem", remote_dir)
    }

    fn remote_send_command(&self, remote_dir: &str, file_name: &str) -> String {
        format!("cd {} && sz -vy {} --zmodem", remote_dir, file_name)
    }

    async fn send(&self, link: &LinkEndpoint, local_path: &Path, deadline: Instant) -> Result<()> {
        tokio::fs::metadata(local_path)
            .await
            .map_err(|source| TransferError::LocalFile {
                path: local_path.to_path_buf(),
                source,
            })?;

        info!("Sending {} over {}", local_path.display(), link);
        let mut command = Command::new(&self.sz);
        command.arg(local_path).arg("--zmodem");
        run_attached(command, &self.sz, link, deadline).await
    }

    async fn receive(
        &self,
        link: &LinkEndpoint,
        local_dir: &Path,
        deadline: Instant,
    ) -> Result<()> {
        tokio::fs::create_dir_all(local_dir)
            .await
            .map_err(|source| TransferError::LocalFile {
                path: local_dir.to_path_buf(),
                source,
            })?;

        info!("Receiving into {} over {}", local_dir.display(), link);
        let mut command = Command::new(&self.rz);
        command.args(["-y", "--zmodem"]).current_dir(local_dir);
        run_attached(command, &self.rz, link, deadline).await
    }
}

/// Run `command` with stdin and stdout on the link until it exits or
/// `deadline` passes, killing it in the latter case.
async fn run_attached(
    mut command: Command,
    program: &Path,
    link: &LinkEndpoint,
    deadline: Instant,
) -> Result<()> {
    let tool = program.display().to_string();
    let spawn_error = |source| TransferError::Spawn {
        tool: tool.clone(),
        source,
    };

    let (input, output) = open_link(link.path()).map_err(spawn_error)?;
    command
        .stdin(Stdio::from(input))
        .stdout(Stdio::from(output))
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let budget = deadline.saturating_duration_since(Instant::now());
    let mut child = command.spawn().map_err(spawn_error)?;
    debug!("started {} (pid {:?})", tool, child.id());

    let waited = tokio::time::timeout_at(deadline, child.wait()).await;
    match waited {
        Ok(Ok(status)) if status.success() => {
            debug!("{} finished", tool);
            Ok(())
        }
        Ok(Ok(status)) => Err(TransferError::ToolFailed {
            tool,
            code: status.code(),
        }
        .into()),
        Ok(Err(source)) => Err(spawn_error(source).into()),
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", tool, e);
            }
            Err(TransferError::Timeout { tool, after: budget }.into())
        }
    }
}

/// Separate read and write handles on the device, as the tools expect.
fn open_link(path: &Path) -> io::Result<(File, File)> {
    let mut read = OpenOptions::new();
    read.read(true);
    let mut write = OpenOptions::new();
    write.write(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        read.custom_flags(nix::libc::O_NOCTTY);
        write.custom_flags(nix::libc::O_NOCTTY);
    }

    Ok((read.open(path)?, write.open(path)?))
}
