//! Process-exclusive advisory lock on a serial device.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::TransportError;

/// Exclusive advisory lock on a device path.
///
/// Acquisition never blocks: if another process holds the lock the call
/// fails with [`TransportError::PortAlreadyInUse`]. The lock is released
/// when the guard is dropped, on every exit path.
pub struct PortLock {
    path: PathBuf,
    #[cfg(unix)]
    _guard: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

impl PortLock {
    /// Try to take the lock on `path`.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let port = path.display().to_string();

        let file = open_for_lock(path).map_err(|source| TransportError::PortUnavailable {
            port: port.clone(),
            source,
        })?;

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::fcntl::{Flock, FlockArg};

            let guard = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(guard) => guard,
                Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                    return Err(TransportError::PortAlreadyInUse { port });
                }
                Err((_, errno)) => {
                    return Err(TransportError::PortUnavailable {
                        port,
                        source: io::Error::from(errno),
                    });
                }
            };

            debug!("acquired exclusive lock on {}", port);
            Ok(Self {
                path: path.to_path_buf(),
                _guard: guard,
            })
        }

        #[cfg(not(unix))]
        {
            debug!("serial ports are exclusive on this platform, holding {}", port);
            Ok(Self {
                path: path.to_path_buf(),
                _file: file,
            })
        }
    }

    /// The locked path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for PortLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortLock").field("path", &self.path).finish()
    }
}

impl Drop for PortLock {
    fn drop(&mut self) {
        debug!("releasing lock on {}", self.path.display());
    }
}

#[cfg(unix)]
fn open_for_lock(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    // O_NOCTTY keeps the console from becoming our controlling terminal,
    // O_NONBLOCK avoids waiting on carrier detect.
    OpenOptions::new()
        .read(true)
        .custom_flags(nix::libc::O_NOCTTY | nix::libc::O_NONBLOCK)
        .open(path)
}

#[cfg(not(unix))]
fn open_for_lock(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).open(path)
}
