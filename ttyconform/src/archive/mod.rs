//! Packing local test directories into transportable bundles.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, info};
use tokio::process::Command;

use crate::error::{Result, SuiteError};

/// Produces a compressed archive from a directory tree.
pub trait Archiver: Send + Sync {
    /// Pack `source_dir` into `archive`, keeping the directory's own name
    /// as the top-level entry.
    fn pack(&self, source_dir: &Path, archive: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// Gzipped tarballs through the host's `tar`.
#[derive(Debug, Clone)]
pub struct TarArchiver {
    program: PathBuf,
}

impl TarArchiver {
    /// Use `tar` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("tar"),
        }
    }

    /// Use a specific tar binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for TarArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Archiver for TarArchiver {
    async fn pack(&self, source_dir: &Path, archive: &Path) -> Result<()> {
        let failed = |message: String| SuiteError::Archive {
            source_dir: source_dir.to_path_buf(),
            message,
        };

        if !tokio::fs::metadata(source_dir)
            .await
            .is_ok_and(|meta| meta.is_dir())
        {
            return Err(failed("not a directory".to_string()).into());
        }

        let (Some(parent), Some(name)) = (source_dir.parent(), source_dir.file_name()) else {
            return Err(failed("cannot archive a filesystem root".to_string()).into());
        };
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };

        debug!("packing {} into {}", source_dir.display(), archive.display());
        let output = Command::new(&self.program)
            .arg("-czf")
            .arg(archive)
            .arg("-C")
            .arg(parent)
            .arg(name)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| failed(format!("cannot run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(stderr.trim().to_string()).into());
        }

        info!("Packed {}", archive.display());
        Ok(())
    }
}
