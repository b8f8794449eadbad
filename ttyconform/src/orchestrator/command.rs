//! Rendering of the remote runner invocation.

use indexmap::IndexMap;

/// A shell command line with environment assignments prefixed.
///
/// Variables render in insertion order as `NAME="value"`, quoted for a
/// POSIX shell. Program and arguments are emitted verbatim.
#[derive(Debug, Clone, Default)]
pub struct RemoteCommand {
    env: IndexMap<String, String>,
    program: String,
    args: Vec<String>,
}

impl RemoteCommand {
    /// Start a command running `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Set an environment variable for this invocation only.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The full command line.
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.env.len() + self.args.len() + 1);
        for (name, value) in &self.env {
            parts.push(format!("{}=\"{}\"", name, escape_double_quoted(value)));
        }
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

impl std::fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

fn escape_double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
