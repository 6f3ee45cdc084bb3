//! Format signatures used by plugins
//!
//! A [`BinaryFormat`] couples a compiled [`Pattern`] with the minimal amount of data
//! a recognizer needs. Failed checks report where the signature can next appear so
//! the scanner can skip ahead instead of probing every byte.

use crate::pattern::{Pattern, PatternSyntaxError};

/// Outcome of probing a format at one offset.
///
/// Exactly one field is meaningful: a positive `matched_size`, or the
/// `lookahead_offset` of the next position worth re-checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionResult {
    matched_size: usize,
    lookahead_offset: usize,
}

impl DetectionResult {
    /// Data matched here and `size` bytes belong to it.
    pub fn matched(size: usize) -> Self {
        debug_assert!(size > 0);
        Self {
            matched_size: size,
            lookahead_offset: 0,
        }
    }

    /// Nothing here; `lookahead` is the next candidate offset (may equal the data size).
    pub fn unmatched(lookahead: usize) -> Self {
        Self {
            matched_size: 0,
            lookahead_offset: lookahead,
        }
    }

    /// Bytes claimed by the match, `0` if unmatched.
    pub fn matched_size(&self) -> usize {
        self.matched_size
    }

    /// Next candidate offset, `0` if matched.
    pub fn lookahead_offset(&self) -> usize {
        self.lookahead_offset
    }

    /// Whether the probe succeeded.
    pub fn is_matched(&self) -> bool {
        self.matched_size > 0
    }
}

/// Signature of a binary format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFormat {
    pattern: Pattern,
    min_size: usize,
}

impl BinaryFormat {
    /// Format whose minimal size is the pattern length.
    pub fn new(pattern: &str) -> Result<Self, PatternSyntaxError> {
        Self::with_min_size(pattern, 0)
    }

    /// Format requiring at least `min_size` bytes (never less than the pattern length).
    pub fn with_min_size(pattern: &str, min_size: usize) -> Result<Self, PatternSyntaxError> {
        let pattern = Pattern::compile(pattern)?;
        let min_size = min_size.max(pattern.min_length());
        Ok(Self { pattern, min_size })
    }

    /// Underlying pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Bytes needed before the format can match.
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Signature matches at the start of `data`.
    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() >= self.min_size && self.pattern.matches(data)
    }

    /// First offset after 0 where the format could match, or `data.len()`.
    pub fn next_match_offset(&self, data: &[u8]) -> usize {
        if data.len() <= 1 {
            return data.len();
        }
        let found = 1 + self.pattern.search(&data[1..]);
        if found < data.len() && data.len() - found >= self.min_size {
            found
        } else {
            data.len()
        }
    }

    /// Probe the start of `data` with the signature alone.
    pub fn detect(&self, data: &[u8]) -> DetectionResult {
        if self.matches(data) {
            DetectionResult::matched(self.pattern.min_length())
        } else {
            DetectionResult::unmatched(self.next_match_offset(data))
        }
    }
}
