//! Sequence statistics.
//!
//! ```rust,ignore
//! let stats = seq.stats();
//! println!("{stats}");
//! // 5 items in 3 batches of 4096 bytes, stored in /tmp/lines.N
//! ```

use std::fmt;
use std::path::PathBuf;

/// A point-in-time summary of a [`BatchSequence`](crate::BatchSequence).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStats {
    /// Records stored.
    pub items: usize,
    /// Batch files created.
    pub batches: usize,
    /// Capacity of each batch in bytes.
    pub batch_size: usize,
    /// Prefix of every batch file name.
    pub basename: PathBuf,
}

impl BatchStats {
    /// Bytes reserved on disk by all batches.
    #[must_use]
    pub fn reserved_bytes(&self) -> u64 {
        self.batches as u64 * self.batch_size as u64
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items in {} batches of {} bytes, stored in {}N",
            self.items,
            self.batches,
            self.batch_size,
            self.basename.display()
        )
    }
}
