//! Display cleanup for console output.
//!
//! Pattern matching always runs on raw bytes; this is only used when turning
//! captured output into lines for callers and logs.

use vte::{Parser, Perform};

/// Collects printable text and line structure, dropping escape sequences.
#[derive(Default)]
struct TextCollector {
    text: String,
}

impl Perform for TextCollector {
    fn print(&mut self, c: char) {
        self.text.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.text.push('\n'),
            b'\t' => self.text.push('\t'),
            b'\x08' => {
                self.text.pop();
            }
            _ => {}
        }
    }
}

/// Decode raw console bytes into plain text.
///
/// ANSI escape sequences and control bytes are removed, carriage returns
/// dropped, and invalid UTF-8 replaced with U+FFFD.
pub fn strip_ansi(data: &[u8]) -> String {
    let mut parser = Parser::new();
    let mut collector = TextCollector::default();
    parser.advance(&mut collector, data);
    collector.text
}

/// Decode raw console bytes and split them into lines.
pub fn clean_lines(data: &[u8]) -> Vec<String> {
    strip_ansi(data).lines().map(str::to_string).collect()
}

/// Turns console output arriving in arbitrary chunks into complete,
/// cleaned lines.
#[derive(Debug, Default)]
pub struct LineAssembler {
    partial: Vec<u8>,
}

impl LineAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the lines it completes.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(data);
        let Some(last) = self.partial.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let complete: Vec<u8> = self.partial.drain(..=last).collect();
        complete[..last].split(|&b| b == b'\n').map(strip_ansi).collect()
    }

    /// Bytes of the line still waiting for its newline.
    pub fn pending(&self) -> &[u8] {
        &self.partial
    }
}
