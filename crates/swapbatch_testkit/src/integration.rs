//! Cross-crate integration test helpers.
//!
//! Provides a harness that tracks what was written to a sequence and
//! scenario checks that exercise the storage and core crates together.

use crate::fixtures::{lines_input, TempBatches};
use swapbatch_core::{BatchSequence, CoreResult, Line};

/// A test harness for integration testing.
pub struct LineHarness {
    /// The sequence under test.
    pub seq: BatchSequence<Line>,
    /// Lines appended so far, for verification.
    expected: Vec<String>,
    /// Keeps the batch directory alive.
    fixture: TempBatches,
}

impl LineHarness {
    /// Creates a harness over a fresh sequence with batches of
    /// `batch_size` bytes.
    pub fn new(batch_size: usize) -> Self {
        let fixture = TempBatches::new();
        Self {
            seq: fixture.sequence(batch_size),
            expected: Vec::new(),
            fixture,
        }
    }

    /// Appends lines and tracks them for later verification.
    pub fn append(&mut self, lines: &[&str]) {
        let stored = self
            .seq
            .read_all(&mut lines_input(lines))
            .expect("Failed to append lines");
        assert_eq!(stored, lines.len(), "Not every line was stored");
        self.expected.extend(lines.iter().map(|line| line.to_string()));
    }

    /// Verifies that enumeration and iteration both return the tracked
    /// lines, in order.
    pub fn verify_all(&mut self) {
        let mut visited = Vec::new();
        let count = self
            .seq
            .enumerate(|line| visited.push(line.text().into_owned()))
            .expect("Failed to enumerate");
        assert_eq!(count, self.expected.len());
        assert_eq!(visited, self.expected, "Enumerated lines mismatch");

        let iterated: Vec<String> = self
            .seq
            .iter()
            .collect::<CoreResult<_>>()
            .expect("Failed to iterate");
        assert_eq!(iterated, self.expected, "Iterated lines mismatch");
        assert_eq!(self.seq.len(), self.expected.len());
    }

    /// Returns the count of tracked lines.
    pub fn tracked_count(&self) -> usize {
        self.expected.len()
    }

    /// The batch directory.
    pub fn fixture(&self) -> &TempBatches {
        &self.fixture
    }
}

/// Rollover behaviour.
pub mod rollover {
    use super::*;
    use crate::fixtures::batch_size_for;
    use swapbatch_core::CoreError;

    /// Five short lines in batches of two land as (2, 2, 1).
    pub fn test_two_per_batch() {
        let mut harness = LineHarness::new(batch_size_for(2, 1));
        harness.append(&["a", "b", "c", "d", "e"]);

        assert_eq!(harness.seq.n_batches(), 3);
        assert_eq!(
            harness.seq.records_per_batch().expect("Failed to count"),
            [2, 2, 1]
        );
        harness.verify_all();
    }

    /// Input that ends exactly as a batch fills opens no further batch.
    pub fn test_full_batch_at_end_of_input() {
        let mut harness = LineHarness::new(batch_size_for(2, 1));
        harness.append(&["a", "b", "c", "d"]);

        assert_eq!(harness.seq.n_batches(), 2);
        assert_eq!(
            harness.seq.records_per_batch().expect("Failed to count"),
            [2, 2]
        );
        assert_eq!(harness.fixture().files().len(), 2);
        harness.verify_all();
    }

    /// A line larger than a batch fails and leaves the batch count alone.
    pub fn test_oversize_record() {
        let mut harness = LineHarness::new(batch_size_for(2, 1));
        harness.append(&["a"]);
        let before = harness.seq.n_batches();

        let long = "x".repeat(batch_size_for(4, 1));
        let result = harness.seq.append(&mut lines_input(&[long]));
        assert!(matches!(result, Err(CoreError::RecordTooLarge { .. })));
        assert_eq!(harness.seq.n_batches(), before);

        harness.append(&["b"]);
        harness.verify_all();
    }
}

/// File lifecycle.
pub mod lifecycle {
    use super::*;

    /// Dropping an autodeleting sequence removes every batch file.
    pub fn test_autodelete_leaves_no_files() {
        let fixture = TempBatches::new();
        {
            let mut seq = fixture.sequence(crate::fixtures::batch_size_for(1, 1));
            seq.read_all(&mut lines_input(&["a", "b", "c"]))
                .expect("Failed to read lines");
            assert_eq!(fixture.files().len(), 3);
        }
        assert!(fixture.files().is_empty());
    }

    /// Preserved batches survive the sequence and can each be reloaded.
    pub fn test_preserve_and_reopen() {
        let fixture = TempBatches::new();
        let batch_size = crate::fixtures::batch_size_for(2, 1);
        {
            let mut seq = fixture.sequence(batch_size);
            seq.read_all(&mut lines_input(&["a", "b", "c"]))
                .expect("Failed to read lines");
            seq.preserve();
        }
        assert_eq!(fixture.files().len(), 2);

        let mut seq = fixture.reopen(batch_size);
        assert_eq!(seq.len(), 3);
        for batch in 0..seq.n_batches() {
            seq.load_batch(batch).expect("Failed to load batch");
        }
        let lines: Vec<String> = seq
            .iter()
            .collect::<CoreResult<_>>()
            .expect("Failed to iterate");
        assert_eq!(lines, ["a", "b", "c"]);

        seq.discard().expect("Failed to discard");
        assert!(fixture.files().is_empty());
    }
}

/// Chain validation.
pub mod corruption {
    use super::*;
    use swapbatch_core::{CoreError, HEADER_SIZE};

    /// A damaged chain header is reported, not followed.
    pub fn test_corrupt_header_detected() {
        let fixture = TempBatches::new();
        {
            let mut seq = fixture.sequence(4096);
            seq.read_all(&mut lines_input(&["a", "b"]))
                .expect("Failed to read lines");
            seq.preserve();
        }

        // Point the first header far past the end of the batch.
        let path = fixture.config(4096).batch_path(0);
        let mut bytes = std::fs::read(&path).expect("Failed to read batch");
        bytes[..HEADER_SIZE].copy_from_slice(&(usize::MAX / HEADER_SIZE).to_ne_bytes());
        std::fs::write(&path, bytes).expect("Failed to write batch");

        let result = BatchSequence::<Line>::open(fixture.config(4096));
        assert!(matches!(result, Err(CoreError::CorruptBatch { batch: 0, .. })));
    }
}
