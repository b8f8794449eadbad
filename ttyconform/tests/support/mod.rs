#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use ttyconform::archive::Archiver;
use ttyconform::driver::{Session, SessionBuilder, ShellPrompts};
use ttyconform::error::{Result, TransferError, TransportError};
use ttyconform::transfer::BulkTransfer;
use ttyconform::transport::{LinkEndpoint, Transport};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Lines the simulated target received, shared with the test body.
#[derive(Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<String>>>);

impl CommandLog {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(needle)).count()
    }

    fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Console {
    Shell,
    Login,
    Password,
    Silent,
}

/// A serial console simulated in memory: a getty, then a POSIX-ish shell.
pub struct SimulatedTarget {
    endpoint: LinkEndpoint,
    input: Vec<u8>,
    output: VecDeque<u8>,
    log: CommandLog,
    console: Console,
    prompt: String,
    password: Option<String>,
    canned: HashMap<String, (String, i32)>,
    ignored: Vec<String>,
    hangup_on: Option<String>,
    hung_up: bool,
    runner_output: Vec<String>,
    runner_exit: i32,
    last_status: i32,
}

impl SimulatedTarget {
    /// A target already sitting at a shell prompt.
    pub fn at_prompt(prompt: &str) -> Self {
        Self {
            endpoint: LinkEndpoint::new("/dev/ttySIM0"),
            input: Vec::new(),
            output: VecDeque::new(),
            log: CommandLog::default(),
            console: Console::Shell,
            prompt: prompt.to_string(),
            password: None,
            canned: HashMap::new(),
            ignored: Vec::new(),
            hangup_on: None,
            hung_up: false,
            runner_output: vec!["--- GEISA conformance tests ---".to_string()],
            runner_exit: 0,
            last_status: 0,
        }
    }

    /// A target showing a login prompt. `password: None` logs in on the
    /// username alone.
    pub fn at_login(prompt: &str, password: Option<&str>) -> Self {
        Self {
            console: Console::Login,
            password: password.map(str::to_string),
            ..Self::at_prompt(prompt)
        }
    }

    /// A target that never answers.
    pub fn silent() -> Self {
        Self {
            console: Console::Silent,
            ..Self::at_prompt("ready# ")
        }
    }

    pub fn with_output(mut self, command: &str, output: &str, status: i32) -> Self {
        self.canned
            .insert(command.to_string(), (output.to_string(), status));
        self
    }

    pub fn with_runner(mut self, output: &[&str], exit_code: i32) -> Self {
        self.runner_output = output.iter().map(|l| l.to_string()).collect();
        self.runner_exit = exit_code;
        self
    }

    /// Commands containing `needle` get no reply at all.
    pub fn ignoring(mut self, needle: &str) -> Self {
        self.ignored.push(needle.to_string());
        self
    }

    /// The link drops once a command containing `needle` is sent.
    pub fn hangup_on(mut self, needle: &str) -> Self {
        self.hangup_on = Some(needle.to_string());
        self
    }

    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    fn respond(&mut self, line: &str) {
        self.log.push(line.to_string());

        if self.console == Console::Silent {
            return;
        }
        if let Some(needle) = &self.hangup_on {
            if line.contains(needle.as_str()) {
                self.hung_up = true;
                return;
            }
        }
        if self.ignored.iter().any(|n| line.contains(n.as_str())) {
            return;
        }

        // passwords are not echoed
        if self.console != Console::Password {
            self.emit(&format!("{}\r\n", line));
        }

        match self.console {
            Console::Login => {
                if line.is_empty() {
                    self.emit("board login: ");
                } else if self.password.is_some() {
                    self.console = Console::Password;
                    self.emit("Password: ");
                } else {
                    self.console = Console::Shell;
                    self.emit_prompt();
                }
            }
            Console::Password => {
                if self.password.as_deref() == Some(line) {
                    self.console = Console::Shell;
                    self.emit("\r\n");
                    self.emit_prompt();
                } else {
                    self.console = Console::Login;
                    self.emit("\r\nLogin incorrect\r\nboard login: ");
                }
            }
            Console::Shell => self.shell(line),
            Console::Silent => {}
        }
    }

    fn shell(&mut self, line: &str) {
        if let Some((output, status)) = self.canned.get(line).cloned() {
            self.emit(&output);
            self.last_status = status;
        } else if line == "echo $?" {
            let status = self.last_status;
            self.emit(&format!("{}\r\n", status));
            self.last_status = 0;
        } else if let Some(text) = line
            .rsplit_once("echo '")
            .and_then(|(_, rest)| rest.strip_suffix('\''))
        {
            self.emit(&format!("{}\r\n", text));
            self.last_status = 0;
        } else if line.contains("cukinia.conf") {
            for out in self.runner_output.clone() {
                self.emit(&format!("{}\r\n", out));
            }
            self.last_status = self.runner_exit;
        } else {
            self.last_status = 0;
        }
        self.emit_prompt();
    }

    fn emit(&mut self, text: &str) {
        self.output.extend(text.as_bytes());
    }

    fn emit_prompt(&mut self) {
        let prompt = self.prompt.clone();
        self.emit(&prompt);
    }
}

impl Transport for SimulatedTarget {
    async fn read_available(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        if self.hung_up {
            return Err(TransportError::Disconnected.into());
        }
        let n = max_bytes.min(self.output.len());
        Ok(self.output.drain(..n).collect())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.hung_up {
            return Err(TransportError::Disconnected.into());
        }
        self.input.extend_from_slice(data);
        while let Some(pos) = self.input.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.input.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            self.respond(&line);
        }
        Ok(())
    }

    async fn discard_buffers(&mut self) -> Result<()> {
        self.output.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn endpoint(&self) -> &LinkEndpoint {
        &self.endpoint
    }
}

/// A session on `target` with the `ready# ` prompt and short timeouts.
pub fn ready_session(target: SimulatedTarget) -> Session<SimulatedTarget> {
    let prompts = ShellPrompts::linux().unwrap().with_ready(r"ready# ").unwrap();
    SessionBuilder::new()
        .prompts(prompts)
        .command_timeout(Duration::from_secs(2))
        .arm_delay(Duration::ZERO)
        .build(target)
        .unwrap()
}

pub fn deadline_in(millis: u64) -> Instant {
    Instant::now() + Duration::from_millis(millis)
}

/// What a fake transfer was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCall {
    Send(PathBuf),
    Receive(PathBuf),
}

/// In-process stand-in for the ZMODEM tools.
#[derive(Clone, Default)]
pub struct FakeTransfer {
    calls: Arc<Mutex<Vec<TransferCall>>>,
    fail_sends: bool,
    received_name: Option<String>,
}

impl FakeTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send reports a non-zero tool exit.
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    /// Receives write an empty file with this name.
    pub fn receiving(name: &str) -> Self {
        Self {
            received_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<TransferCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl BulkTransfer for FakeTransfer {
    fn remote_receive_command(&self, remote_dir: &str) -> String {
        format!("cd {} && rz -y --zmodem", remote_dir)
    }

    fn remote_send_command(&self, remote_dir: &str, file_name: &str) -> String {
        format!("cd {} && sz -vy {} --zmodem", remote_dir, file_name)
    }

    async fn send(
        &self,
        _link: &LinkEndpoint,
        local_path: &Path,
        _deadline: Instant,
    ) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(TransferCall::Send(local_path.to_path_buf()));
        if self.fail_sends {
            return Err(TransferError::ToolFailed {
                tool: "sz".to_string(),
                code: Some(128),
            }
            .into());
        }
        Ok(())
    }

    async fn receive(
        &self,
        _link: &LinkEndpoint,
        local_dir: &Path,
        _deadline: Instant,
    ) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(TransferCall::Receive(local_dir.to_path_buf()));
        if let Some(name) = &self.received_name {
            std::fs::create_dir_all(local_dir).unwrap();
            std::fs::write(local_dir.join(name), b"<testsuites/>").unwrap();
        }
        Ok(())
    }
}

/// Records pack requests without touching the filesystem.
#[derive(Clone, Default)]
pub struct FakeArchiver {
    packed: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
}

impl FakeArchiver {
    pub fn packed(&self) -> Vec<(PathBuf, PathBuf)> {
        self.packed.lock().unwrap().clone()
    }
}

impl Archiver for FakeArchiver {
    async fn pack(&self, source_dir: &Path, archive: &Path) -> Result<()> {
        self.packed
            .lock()
            .unwrap()
            .push((source_dir.to_path_buf(), archive.to_path_buf()));
        Ok(())
    }
}
