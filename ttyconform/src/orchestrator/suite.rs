//! Test suite profiles: what gets uploaded, where, and how it is run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SuiteError};

/// A local directory shipped to the target as a gzipped tarball.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Directory to pack, relative to the run's root directory.
    pub source: PathBuf,
}

impl Bundle {
    /// Create a bundle for `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Directory name, which is also the top-level entry of the archive.
    pub fn name(&self) -> Option<&str> {
        self.source.file_name().and_then(|name| name.to_str())
    }

    fn checked_name(&self) -> Result<&str> {
        self.name().ok_or_else(|| {
            SuiteError::Profile {
                path: self.source.clone(),
                message: "bundle source must end in a UTF-8 directory name".to_string(),
            }
            .into()
        })
    }

    /// File name of the packed archive.
    pub fn archive_name(&self) -> Result<String> {
        Ok(format!("{}.tar.gz", self.checked_name()?))
    }
}

/// Everything that distinguishes one conformance suite from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteProfile {
    /// Human readable suite name, for logs.
    pub name: String,

    /// The test runner (cukinia).
    pub runner: Bundle,

    /// The test definitions.
    pub tests: Bundle,

    /// Remote directory archives are uploaded to.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,

    /// Remote directory both bundles are unpacked into.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Runner executable, relative to the unpacked runner bundle.
    #[serde(default = "default_runner_program")]
    pub runner_program: String,

    /// Runner configuration, relative to the unpacked tests bundle.
    #[serde(default = "default_runner_config")]
    pub runner_config: String,

    /// JUnit report written next to the runner configuration.
    pub report_file: String,

    /// Text the runner prints when all tests have run.
    pub completion_marker: String,

    /// Output before the first line containing this text is not shown.
    #[serde(default)]
    pub display_from: Option<String>,

    /// Host environment variables passed on to the runner.
    #[serde(default)]
    pub forward_env: Vec<String>,

    /// Pass the host's current UTC time as `CURRENT_DATE_UTC`.
    #[serde(default)]
    pub inject_date: bool,
}

fn default_staging_dir() -> String {
    "/tmp".to_string()
}

fn default_work_dir() -> String {
    "/tmp/conformance_tests".to_string()
}

fn default_runner_program() -> String {
    "cukinia".to_string()
}

fn default_runner_config() -> String {
    "cukinia.conf".to_string()
}

impl SuiteProfile {
    /// GEISA application programming interface tests.
    pub fn api() -> Self {
        Self {
            name: "GEISA API conformance".to_string(),
            runner: Bundle::new("src/cukinia"),
            tests: Bundle::new("src/cukinia-tests"),
            staging_dir: default_staging_dir(),
            work_dir: default_work_dir(),
            runner_program: default_runner_program(),
            runner_config: default_runner_config(),
            report_file: "geisa-conformance-report.xml".to_string(),
            completion_marker: "GEISA conformance tests".to_string(),
            display_from: None,
            forward_env: Vec::new(),
            inject_date: false,
        }
    }

    /// GEISA Linux execution environment tests.
    pub fn lee() -> Self {
        Self {
            name: "GEISA LEE conformance".to_string(),
            runner: Bundle::new("src/cukinia"),
            tests: Bundle::new("src/GEISA-LEE-tests"),
            staging_dir: default_staging_dir(),
            work_dir: default_work_dir(),
            runner_program: default_runner_program(),
            runner_config: default_runner_config(),
            report_file: "geisa-lee-conformance-report.xml".to_string(),
            completion_marker: "GEISA LEE conformance tests".to_string(),
            display_from: Some("--- GEISA LEE conformance tests ---".to_string()),
            forward_env: vec!["GLEE_TESTS".to_string()],
            inject_date: true,
        }
    }

    /// Load a profile from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let profile_error = |message: String| SuiteError::Profile {
            path: path.to_path_buf(),
            message,
        };

        let text = std::fs::read_to_string(path).map_err(|e| profile_error(e.to_string()))?;
        let profile: Self = toml::from_str(&text).map_err(|e| profile_error(e.to_string()))?;
        profile.validate().map_err(|e| profile_error(e.to_string()))?;
        Ok(profile)
    }

    /// Check that every path the run derives from this profile is usable.
    pub fn validate(&self) -> Result<()> {
        self.runner.checked_name()?;
        self.tests.checked_name()?;

        for (field, value) in [
            ("staging_dir", &self.staging_dir),
            ("work_dir", &self.work_dir),
        ] {
            if !value.starts_with('/') {
                return Err(SuiteError::Profile {
                    path: PathBuf::from(value),
                    message: format!("{} must be an absolute remote path", field),
                }
                .into());
            }
        }

        if self.completion_marker.trim().is_empty() {
            return Err(SuiteError::Profile {
                path: PathBuf::from(&self.name),
                message: "completion_marker must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Remote path of an uploaded archive.
    pub fn staged_archive(&self, bundle: &Bundle) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.staging_dir.trim_end_matches('/'),
            bundle.archive_name()?
        ))
    }

    /// Remote directory a bundle unpacks into.
    pub fn unpacked_dir(&self, bundle: &Bundle) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.work_dir.trim_end_matches('/'),
            bundle.checked_name()?
        ))
    }

    /// Remote path of the runner executable.
    pub fn runner_path(&self) -> Result<String> {
        Ok(format!("{}/{}", self.unpacked_dir(&self.runner)?, self.runner_program))
    }

    /// Remote path of the runner configuration.
    pub fn config_path(&self) -> Result<String> {
        Ok(format!("{}/{}", self.unpacked_dir(&self.tests)?, self.runner_config))
    }

    /// Remote path of the JUnit report.
    pub fn report_path(&self) -> Result<String> {
        Ok(format!("{}/{}", self.unpacked_dir(&self.tests)?, self.report_file))
    }

    /// Everything a run leaves on the target.
    pub fn transient_paths(&self) -> Result<Vec<String>> {
        Ok(vec![
            self.work_dir.clone(),
            self.staged_archive(&self.runner)?,
            self.staged_archive(&self.tests)?,
        ])
    }
}
