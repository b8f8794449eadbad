//! Ordered pattern sets and match results.

use std::time::Duration;

use regex::bytes::Regex;

/// An ordered list of labelled patterns submitted to one wait.
///
/// Order is priority: when several patterns match the buffered output, the
/// one added first wins, regardless of where each occurs in the stream.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<(String, Regex)>,
}

impl PatternSet {
    /// Create an empty pattern set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and append a pattern.
    pub fn with(mut self, label: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        self.patterns.push((label.into(), Regex::new(pattern)?));
        Ok(self)
    }

    /// Append an already compiled pattern.
    pub fn with_regex(mut self, label: impl Into<String>, regex: Regex) -> Self {
        self.patterns.push((label.into(), regex));
        self
    }

    /// Build a set that matches a literal string.
    pub fn literal(label: impl Into<String>, text: &str) -> Result<Self, regex::Error> {
        Self::new().with(label, &regex::escape(text))
    }

    /// Iterate over `(label, regex)` pairs in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Regex)> {
        self.patterns.iter().map(|(label, re)| (label.as_str(), re))
    }

    /// Label of the pattern at `index`.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.patterns.get(index).map(|(label, _)| label.as_str())
    }

    /// Comma separated labels, for diagnostics.
    pub fn describe(&self) -> String {
        self.patterns
            .iter()
            .map(|(label, _)| label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// A successful match.
#[derive(Debug, Clone)]
pub struct Match {
    /// Label of the pattern that matched.
    pub label: String,

    /// Capture groups, lossily decoded (group 0 is the whole match).
    pub groups: Vec<Option<String>>,

    /// Raw bytes received before the match started.
    pub before: Vec<u8>,
}

impl Match {
    /// Whether the match came from the pattern labelled `label`.
    pub fn is(&self, label: &str) -> bool {
        self.label == label
    }

    /// Text of capture group `index`.
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    /// The whole matched text.
    pub fn matched(&self) -> &str {
        self.group(0).unwrap_or_default()
    }
}

/// Outcome of waiting for a pattern set.
#[derive(Debug, Clone)]
pub enum MatchResult {
    /// A pattern matched before the deadline.
    Matched(Match),

    /// The deadline passed first.
    TimedOut {
        /// How long the wait lasted.
        waited: Duration,
    },
}

impl MatchResult {
    /// Label of the matched pattern, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            MatchResult::Matched(m) => Some(&m.label),
            MatchResult::TimedOut { .. } => None,
        }
    }

    /// Whether the wait timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MatchResult::TimedOut { .. })
    }
}
