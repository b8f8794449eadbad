//! Result type for command execution.

use std::time::Duration;

use crate::channel::clean_lines;

/// Output of one command run on the console.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// The command that was sent.
    pub command: String,

    /// Output lines received before the prompt, echo removed.
    pub lines: Vec<String>,

    /// Exit status, when it was probed.
    pub exit_code: Option<i32>,

    /// Time taken to execute the command.
    pub elapsed: Duration,
}

impl CommandOutput {
    /// Build the record from raw console bytes, dropping the echoed command.
    pub fn from_raw(command: impl Into<String>, raw: &[u8], elapsed: Duration) -> Self {
        let command = command.into();
        let mut lines = clean_lines(raw);

        let echoed = lines
            .first()
            .is_some_and(|first| is_echo(first, &command));
        if echoed {
            lines.remove(0);
        }

        Self {
            command,
            lines,
            exit_code: None,
            elapsed,
        }
    }

    /// Attach the probed exit status.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Whether the command exited with status zero.
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Output joined with newlines.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Check if any output line contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.lines.iter().any(|l| l.contains(pattern))
    }
}

impl std::fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// The console echoes input, sometimes after a partial prompt.
pub(crate) fn is_echo(line: &str, command: &str) -> bool {
    let command = command.trim();
    !command.is_empty() && line.trim_end().ends_with(command)
}
