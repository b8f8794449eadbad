//! Accumulation buffer with pattern search.
//!
//! Each search covers the whole buffer, so a match is found wherever it
//! starts and the winning pattern depends only on submission order. The
//! buffer is reset at the start of every logical wait, and a search only
//! runs when new bytes arrived since the previous one.

use bytes::BytesMut;

use super::patterns::PatternSet;

/// A pattern hit inside the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    /// Position of the pattern in its set.
    pub index: usize,

    /// Absolute byte offset where the match starts.
    pub start: usize,

    /// Absolute byte offset where the match ends.
    pub end: usize,

    /// Capture groups (group 0 is the whole match).
    pub groups: Vec<Option<Vec<u8>>>,
}

/// Buffer for accumulating raw output and searching it for patterns.
#[derive(Debug)]
pub struct PatternBuffer {
    /// The accumulated raw bytes, undecoded.
    buffer: BytesMut,

    /// Whether the contents changed since the last search.
    dirty: bool,
}

impl PatternBuffer {
    /// Create an empty pattern buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            dirty: true,
        }
    }

    /// Append raw bytes.
    pub fn extend(&mut self, data: &[u8]) {
        if !data.is_empty() {
            self.buffer.extend_from_slice(data);
            self.dirty = true;
        }
    }

    /// Whether a search could find something the previous one did not.
    pub fn has_unsearched(&self) -> bool {
        self.dirty
    }

    /// Find the first pattern, in submission order, that matches anywhere
    /// in the buffer.
    pub fn find_first(&self, patterns: &PatternSet) -> Option<Hit> {
        patterns.iter().enumerate().find_map(|(index, (_, regex))| {
            let caps = regex.captures(&self.buffer[..])?;
            let whole = caps.get(0)?;
            Some(Hit {
                index,
                start: whole.start(),
                end: whole.end(),
                groups: caps
                    .iter()
                    .map(|g| g.map(|m| m.as_bytes().to_vec()))
                    .collect(),
            })
        })
    }

    /// Record that everything currently buffered has been searched.
    pub fn mark_scanned(&mut self) {
        self.dirty = false;
    }

    /// Remove everything up to `end` and return it, keeping the remainder.
    ///
    /// Bytes after a match belong to the same logical wait and stay
    /// available to the next search.
    pub fn consume_through(&mut self, end: usize) -> Vec<u8> {
        let end = end.min(self.buffer.len());
        self.dirty = true;
        self.buffer.split_to(end).to_vec()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.dirty = true;
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[(&str, &str)]) -> PatternSet {
        let mut set = PatternSet::new();
        for (label, pattern) in patterns {
            set = set.with(*label, pattern).unwrap();
        }
        set
    }

    #[test]
    fn test_basic_extend() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"Hello, world!");
        assert_eq!(buffer.as_slice(), b"Hello, world!");
    }

    #[test]
    fn test_raw_bytes_kept() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"\xff\xfeok\x1b[0m");
        assert_eq!(buffer.len(), 8);
        assert!(buffer.find_first(&set(&[("ok", "ok")])).is_some());
    }

    #[test]
    fn test_submission_order_wins() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"login: \nroot@board:~# ");

        let hit = buffer
            .find_first(&set(&[("prompt", r"\S*@\S*:.+#"), ("login", r"login:")]))
            .unwrap();
        assert_eq!(hit.index, 0);

        let hit = buffer
            .find_first(&set(&[("login", r"login:"), ("prompt", r"\S*@\S*:.+#")]))
            .unwrap();
        assert_eq!(hit.index, 0);
        assert_eq!(hit.start, 0);
    }

    #[test]
    fn test_pattern_spanning_reads() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"Passw");
        let patterns = set(&[("password", "Password:")]);
        assert!(buffer.find_first(&patterns).is_none());
        buffer.mark_scanned();

        buffer.extend(b"ord: ");
        assert!(buffer.find_first(&patterns).is_some());
    }

    #[test]
    fn test_unchanged_buffer_not_searched_again() {
        let mut buffer = PatternBuffer::new();
        assert!(buffer.has_unsearched());
        buffer.extend(b"booting");
        buffer.mark_scanned();
        assert!(!buffer.has_unsearched());

        buffer.extend(b"");
        assert!(!buffer.has_unsearched());
        buffer.extend(b"...");
        assert!(buffer.has_unsearched());
    }

    #[test]
    fn test_long_match_keeps_priority() {
        let mut buffer = PatternBuffer::new();
        let patterns = set(&[("block", r"(?s)BEGIN.*END"), ("end", "END")]);

        buffer.extend(b"BEGIN");
        buffer.extend(&[b'x'; 5000]);
        assert!(buffer.find_first(&patterns).is_none());
        buffer.mark_scanned();

        buffer.extend(b"END\n");
        let hit = buffer.find_first(&patterns).unwrap();
        assert_eq!(hit.index, 0);
        assert_eq!(hit.start, 0);
    }

    #[test]
    fn test_captures_are_absolute() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"echo $?\r\n42\r\n");

        let hit = buffer
            .find_first(&set(&[("status", r"(?m)^(\d+)\r?$")]))
            .unwrap();
        assert_eq!(&buffer.as_slice()[hit.start..hit.end], b"42\r");
        assert_eq!(hit.groups[1].as_deref(), Some(&b"42"[..]));
    }

    #[test]
    fn test_consume_keeps_remainder() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"done\nroot# ");

        let taken = buffer.consume_through(5);
        assert_eq!(taken, b"done\n");
        assert_eq!(buffer.as_slice(), b"root# ");
    }

    #[test]
    fn test_clear() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"test data");
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
