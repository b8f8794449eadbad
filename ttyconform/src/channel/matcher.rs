//! Deadline-bounded pattern matching over a transport.

use std::time::Duration;

use log::{debug, trace};
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use super::patterns::{Match, MatchResult, PatternSet};
use crate::error::{ChannelError, Result};
use crate::transport::Transport;

/// Configuration for pattern matching behavior.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Sleep between polls when the link has nothing pending.
    pub poll_interval: Duration,

    /// Maximum bytes taken from the link per poll.
    pub read_chunk: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            read_chunk: 4096,
        }
    }
}

/// Owns a transport and waits on it for pattern sets.
///
/// A logical wait starts with [`send_line`](Self::send_line) (or an explicit
/// [`begin_wait`](Self::begin_wait)): pending input is discarded and the
/// buffer reset. Consecutive [`await_match`](Self::await_match) calls inside
/// one wait share the buffer, so text received after one match is still seen
/// by the next.
pub struct PatternMatcher<T> {
    transport: T,
    buffer: PatternBuffer,
    config: MatcherConfig,
}

impl<T: Transport> PatternMatcher<T> {
    /// Create a matcher with default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, MatcherConfig::default())
    }

    /// Create a matcher with the given configuration.
    pub fn with_config(transport: T, config: MatcherConfig) -> Self {
        Self {
            buffer: PatternBuffer::new(),
            transport,
            config,
        }
    }

    /// Start a new logical wait: drop stale input and reset the buffer.
    pub async fn begin_wait(&mut self) -> Result<()> {
        self.transport.discard_buffers().await?;
        self.buffer.clear();
        Ok(())
    }

    /// Forget buffered output without touching the link.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Start a new logical wait and send `line` followed by a newline.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.begin_wait().await?;
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.transport.write(&data).await
    }

    /// Wait until a pattern in `patterns` matches or `deadline` passes.
    ///
    /// The first pattern by submission order wins. The wait overshoots the
    /// deadline by at most one poll interval.
    pub async fn await_match(
        &mut self,
        patterns: &PatternSet,
        deadline: Instant,
    ) -> Result<MatchResult> {
        self.await_match_with(patterns, deadline, &mut |_: &[u8]| {}).await
    }

    /// Like [`await_match`](Self::await_match), handing every chunk read
    /// from the link to `on_data` as it arrives.
    pub async fn await_match_with<F>(
        &mut self,
        patterns: &PatternSet,
        deadline: Instant,
        on_data: &mut F,
    ) -> Result<MatchResult>
    where
        F: FnMut(&[u8]) + Send,
    {
        let started = Instant::now();
        // a different pattern set may match bytes an earlier wait left behind
        let mut first_pass = true;

        loop {
            let hit = if std::mem::take(&mut first_pass) || self.buffer.has_unsearched() {
                self.buffer.find_first(patterns)
            } else {
                None
            };
            if let Some(hit) = hit {
                let label = patterns.label(hit.index).unwrap_or_default().to_string();
                let groups = hit
                    .groups
                    .iter()
                    .map(|g| g.as_deref().map(|b| String::from_utf8_lossy(b).into_owned()))
                    .collect();

                let consumed = self.buffer.consume_through(hit.end);
                let before = consumed[..hit.start].to_vec();

                debug!("matched '{}' after {:?}", label, started.elapsed());
                return Ok(MatchResult::Matched(Match {
                    label,
                    groups,
                    before,
                }));
            }
            self.buffer.mark_scanned();

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    "no match for [{}] after {:?}",
                    patterns.describe(),
                    now - started
                );
                trace!("unmatched buffer: {:?}", self.buffer.as_str_lossy());
                return Ok(MatchResult::TimedOut {
                    waited: now - started,
                });
            }

            let chunk = self.transport.read_available(self.config.read_chunk).await?;
            if chunk.is_empty() {
                let nap = self.config.poll_interval.min(deadline - now);
                tokio::time::sleep(nap).await;
                continue;
            }

            trace!("<< {:?}", String::from_utf8_lossy(&chunk));
            on_data(&chunk);
            self.buffer.extend(&chunk);
        }
    }

    /// Like [`await_match`](Self::await_match), but a timeout is an error.
    pub async fn expect(&mut self, patterns: &PatternSet, deadline: Instant) -> Result<Match> {
        self.expect_with(patterns, deadline, &mut |_: &[u8]| {}).await
    }

    /// Like [`await_match_with`](Self::await_match_with), but a timeout is an
    /// error.
    pub async fn expect_with<F>(
        &mut self,
        patterns: &PatternSet,
        deadline: Instant,
        on_data: &mut F,
    ) -> Result<Match>
    where
        F: FnMut(&[u8]) + Send,
    {
        match self.await_match_with(patterns, deadline, on_data).await? {
            MatchResult::Matched(m) => Ok(m),
            MatchResult::TimedOut { waited } => Err(ChannelError::PatternTimeout {
                expected: patterns.describe(),
                waited,
            }
            .into()),
        }
    }

    /// Bytes buffered but not yet consumed by a match.
    pub fn pending(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Get the configuration.
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the matcher, returning the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }
}
