//! End-to-end conformance run against one target.
//!
//! The orchestrator packs the suite, logs in, uploads and unpacks both
//! bundles, runs the test runner and optionally pulls back its JUnit
//! report, cleaning the target before and after.

mod command;
mod suite;

pub use command::RemoteCommand;
pub use suite::{Bundle, SuiteProfile};

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use log::info;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::archive::Archiver;
use crate::channel::PatternSet;
use crate::driver::{CommandOutput, Session};
use crate::error::{ChannelError, Result, SessionError};
use crate::transfer::BulkTransfer;
use crate::transport::Transport;

/// Echoed on the target after a report download.
pub const TRANSFER_COMPLETE: &str = "Transfer complete";

/// Environment variable carrying the host's clock to the target.
pub const CURRENT_DATE_VAR: &str = "CURRENT_DATE_UTC";

/// Receives the runner's displayed output lines while the tests run.
pub type OutputSink = mpsc::UnboundedSender<String>;

/// Per-run settings that are not part of the suite itself.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Fetch a JUnit report instead of showing the runner's output.
    pub reports: bool,

    /// Local directory bundle sources are resolved against.
    pub root: PathBuf,

    /// Local directory reports are written to.
    pub reports_dir: PathBuf,

    /// Budget for reaching a shell prompt.
    pub detect_timeout: Duration,

    /// Budget for the whole test run.
    pub test_timeout: Duration,

    /// Budget for each file transfer.
    pub transfer_timeout: Duration,

    /// Values for the profile's forwarded variables.
    pub environment: IndexMap<String, String>,
}

impl RunOptions {
    /// Defaults rooted at `root`, with reports in `root/reports`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            reports: true,
            reports_dir: root.join("reports"),
            root,
            detect_timeout: Duration::from_secs(10),
            test_timeout: Duration::from_secs(4 * 60 * 60),
            transfer_timeout: Duration::from_secs(10 * 60),
            environment: IndexMap::new(),
        }
    }

    /// Enable or disable report retrieval.
    pub fn reports(mut self, enabled: bool) -> Self {
        self.reports = enabled;
        self
    }

    /// Set the whole-run test budget.
    pub fn test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    /// Set the per-transfer budget.
    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    /// Set the login budget.
    pub fn detect_timeout(mut self, timeout: Duration) -> Self {
        self.detect_timeout = timeout;
        self
    }

    /// Set a forwarded variable explicitly.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(name.into(), value.into());
        self
    }

    /// Pick up the profile's forwarded variables from the host environment.
    /// Unset variables forward as empty strings.
    pub fn forward_host_env(mut self, names: &[String]) -> Self {
        for name in names {
            let value = std::env::var(name).unwrap_or_default();
            self.environment.insert(name.clone(), value);
        }
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The runner's exit status.
    pub exit_code: i32,

    /// Runner output as captured.
    pub output: CommandOutput,

    /// Runner output from the display marker on, as sent to the output sink.
    pub displayed: Vec<String>,

    /// Local path of the fetched report, if reports were enabled.
    pub report: Option<PathBuf>,
}

/// Runs a suite through a session using the given archiver and transfer tool.
pub struct Orchestrator<A, B> {
    profile: SuiteProfile,
    archiver: A,
    transfer: B,
    options: RunOptions,
    output: Option<OutputSink>,
}

impl<A: Archiver, B: BulkTransfer> Orchestrator<A, B> {
    /// Create an orchestrator.
    pub fn new(profile: SuiteProfile, archiver: A, transfer: B, options: RunOptions) -> Self {
        Self {
            profile,
            archiver,
            transfer,
            options,
            output: None,
        }
    }

    /// Stream the runner's output to `sink` in plain-output mode.
    ///
    /// Lines before the profile's display marker are held back, the rest are
    /// sent in order as they arrive. A closed receiver is ignored.
    pub fn with_output(mut self, sink: OutputSink) -> Self {
        self.output = Some(sink);
        self
    }

    /// Get the suite profile.
    pub fn profile(&self) -> &SuiteProfile {
        &self.profile
    }

    /// Get the run options.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run the suite. Any error aborts the remaining steps.
    pub async fn run<T: Transport>(&self, session: &mut Session<T>) -> Result<RunReport> {
        let profile = &self.profile;
        profile.validate()?;

        let archives = self.pack_bundles().await?;

        let deadline = Instant::now() + self.options.detect_timeout;
        session.detect_state(deadline).await?;

        session.set_cleanup_paths(&profile.staging_dir, profile.transient_paths()?);
        info!("Cleaning previous test results on target");
        let deadline = session.command_deadline();
        session.cleanup(deadline).await?;

        info!("Copying conformance test files to target");
        for archive in &archives {
            let deadline = Instant::now() + self.options.transfer_timeout;
            session
                .send_file(&self.transfer, archive, &profile.staging_dir, deadline)
                .await?;
        }
        self.unpack_bundles(session).await?;

        info!("Launching tests...");
        let output = self.run_tests(session).await?;
        let exit_code = output
            .exit_code
            .ok_or_else(|| SessionError::ExitCodeUnparsable {
                line: String::new(),
            })?;

        let report = if self.options.reports {
            info!("Copying tests report to host");
            let deadline = Instant::now() + self.options.transfer_timeout;
            let local = session
                .receive_file(
                    &self.transfer,
                    &profile.report_path()?,
                    &self.options.reports_dir,
                    TRANSFER_COMPLETE,
                    deadline,
                )
                .await?;
            Some(local)
        } else {
            None
        };

        info!("Cleaning up test files on target");
        let deadline = session.command_deadline();
        session.cleanup(deadline).await?;

        let displayed = self.displayed_lines(&output);
        Ok(RunReport {
            exit_code,
            output,
            displayed,
            report,
        })
    }

    async fn pack_bundles(&self) -> Result<Vec<PathBuf>> {
        let mut archives = Vec::with_capacity(2);
        for bundle in [&self.profile.runner, &self.profile.tests] {
            let source = self.options.root.join(&bundle.source);
            let archive = self.options.root.join(bundle.archive_name()?);
            self.archiver.pack(&source, &archive).await?;
            archives.push(archive);
        }
        Ok(archives)
    }

    async fn unpack_bundles<T: Transport>(&self, session: &mut Session<T>) -> Result<()> {
        let profile = &self.profile;

        let deadline = session.command_deadline();
        session
            .run_command(&format!("mkdir -p {}", profile.work_dir), deadline)
            .await?;

        for bundle in [&profile.runner, &profile.tests] {
            let command = format!(
                "cd {} && tar -xzf {} -C {}",
                profile.staging_dir,
                bundle.archive_name()?,
                profile.work_dir
            );
            let deadline = session.command_deadline();
            session.run_command(&command, deadline).await?;
        }
        Ok(())
    }

    async fn run_tests<T: Transport>(&self, session: &mut Session<T>) -> Result<CommandOutput> {
        let command = self.runner_command()?.render();
        let deadline = Instant::now() + self.options.test_timeout;

        if self.options.reports {
            session.run_command_then_status(&command, deadline).await
        } else {
            let marker = PatternSet::literal("completion-marker", &self.profile.completion_marker)
                .map_err(ChannelError::InvalidPattern)?;
            let mut display = DisplayFilter::new(self.profile.display_from.as_deref());
            let sink = self.output.as_ref();
            session
                .run_command_stream_output_then_status(&command, &marker, deadline, |line| {
                    if let Some(sink) = sink.filter(|_| display.admits(line)) {
                        let _ = sink.send(line.to_string());
                    }
                })
                .await
        }
    }

    /// The runner invocation for the configured mode.
    pub fn runner_command(&self) -> Result<RemoteCommand> {
        let profile = &self.profile;
        let mut command = RemoteCommand::new(profile.runner_path()?);

        if profile.inject_date {
            let date = match self.options.environment.get(CURRENT_DATE_VAR) {
                Some(date) => date.clone(),
                None => chrono::Utc::now().format("%Y-%m-%d_%H:%M").to_string(),
            };
            command = command.env(CURRENT_DATE_VAR, date);
        }
        for name in &profile.forward_env {
            let value = self.options.environment.get(name).cloned().unwrap_or_default();
            command = command.env(name.clone(), value);
        }

        if self.options.reports {
            command = command
                .arg("-f")
                .arg("junitxml")
                .arg("-o")
                .arg(profile.report_path()?);
        }
        Ok(command.arg(profile.config_path()?))
    }

    fn displayed_lines(&self, output: &CommandOutput) -> Vec<String> {
        let mut display = DisplayFilter::new(self.profile.display_from.as_deref());
        output
            .lines
            .iter()
            .filter(|line| display.admits(line))
            .cloned()
            .collect()
    }

    /// Local path reports are written under.
    pub fn reports_dir(&self) -> &Path {
        &self.options.reports_dir
    }
}

/// Passes lines from the first one containing the marker on, or every line
/// when there is no marker.
struct DisplayFilter<'a> {
    marker: Option<&'a str>,
    started: bool,
}

impl<'a> DisplayFilter<'a> {
    fn new(marker: Option<&'a str>) -> Self {
        Self {
            marker,
            started: false,
        }
    }

    fn admits(&mut self, line: &str) -> bool {
        if !self.started {
            self.started = self.marker.is_none_or(|marker| line.contains(marker));
        }
        self.started
    }
}
