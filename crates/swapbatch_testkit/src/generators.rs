//! Property-based test generators using proptest.
//!
//! Provides strategies for generating lines and batch sizes that a
//! [`BatchSequence`](swapbatch_core::BatchSequence) can store.

use crate::fixtures::line_footprint;
use proptest::prelude::*;
use swapbatch_core::HEADER_SIZE;

/// Longest line produced by [`line_strategy`].
pub const MAX_LINE_LEN: usize = 40;

/// Strategy for generating a single line (no newline, possibly empty).
pub fn line_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 .,:_-]{0,40}").expect("Invalid regex")
}

/// Strategy for generating a list of lines.
pub fn lines_strategy(max_lines: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(line_strategy(), 0..max_lines)
}

/// Strategy for generating batch sizes that hold between one and `max_lines`
/// of the longest generated lines.
///
/// Sizes are multiples of [`HEADER_SIZE`], so every generated line fits in
/// an empty batch.
pub fn batch_size_strategy(max_lines: usize) -> impl Strategy<Value = usize> {
    let largest = line_footprint(MAX_LINE_LEN);
    (1..=max_lines.max(1), 0..largest / HEADER_SIZE)
        .prop_map(move |(lines, extra)| HEADER_SIZE + lines * largest + extra * HEADER_SIZE)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
