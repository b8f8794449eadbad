//! Bulk file transfer over the console link.
//!
//! The console has no framing of its own, so files move through an
//! external transfer tool attached directly to the device node. The
//! session arms the matching program on the target, steps aside for the
//! duration of the transfer, and then resumes prompt matching.

mod handoff;
mod zmodem;

pub use zmodem::ZmodemTool;

use std::future::Future;
use std::path::Path;

use tokio::time::Instant;

use crate::error::Result;
use crate::transport::LinkEndpoint;

/// A file transfer protocol driven by external programs.
///
/// Implementations provide the shell commands that arm the target side
/// and run the host side against the raw link. Both host operations must
/// return once the tool has exited, and must not outlive `deadline`.
pub trait BulkTransfer: Send + Sync {
    /// Shell command that makes the target wait for a file in `remote_dir`.
    fn remote_receive_command(&self, remote_dir: &str) -> String;

    /// Shell command that makes the target send `file_name` from `remote_dir`.
    fn remote_send_command(&self, remote_dir: &str, file_name: &str) -> String;

    /// Push `local_path` to the armed target.
    fn send(
        &self,
        link: &LinkEndpoint,
        local_path: &Path,
        deadline: Instant,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Pull the file the target is sending into `local_dir`.
    fn receive(
        &self,
        link: &LinkEndpoint,
        local_dir: &Path,
        deadline: Instant,
    ) -> impl Future<Output = Result<()>> + Send;
}
