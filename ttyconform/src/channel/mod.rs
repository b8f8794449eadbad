//! Channel layer: pattern matching over the raw console stream.
//!
//! The console offers no framing, so every interaction is phrased as
//! "wait until one of these patterns shows up, or give up at a deadline".

mod ansi;
mod buffer;
mod matcher;
mod patterns;

pub use ansi::{LineAssembler, clean_lines, strip_ansi};
pub use buffer::{Hit, PatternBuffer};
pub use matcher::{MatcherConfig, PatternMatcher};
pub use patterns::{Match, MatchResult, PatternSet};
