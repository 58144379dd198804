//! Test fixtures and sequence helpers.
//!
//! Provides scratch directories for batch files and the arithmetic needed to
//! size batches for a known set of lines.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use swapbatch_core::{BatchConfig, BatchSequence, Line, HEADER_SIZE};
use tempfile::TempDir;

/// A scratch directory holding the batch files of one basename.
pub struct TempBatches {
    basename: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    dir: TempDir,
}

impl TempBatches {
    /// Creates a fresh directory with basename `<dir>/batch.`.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let basename = dir.path().join("batch.");
        Self { basename, dir }
    }

    /// The scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path prefix for batch files.
    pub fn basename(&self) -> &Path {
        &self.basename
    }

    /// A configuration for batches of `batch_size` bytes in this directory.
    pub fn config(&self, batch_size: usize) -> BatchConfig {
        BatchConfig::new(&self.basename, batch_size)
    }

    /// Creates a line sequence in this directory.
    pub fn sequence(&self, batch_size: usize) -> BatchSequence<Line> {
        BatchSequence::create(self.config(batch_size)).expect("Failed to create sequence")
    }

    /// Reattaches to preserved batches in this directory.
    pub fn reopen(&self, batch_size: usize) -> BatchSequence<Line> {
        BatchSequence::open(self.config(batch_size)).expect("Failed to open sequence")
    }

    /// Files currently in the directory, sorted by name.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(self.dir.path())
            .expect("Failed to read temp directory")
            .map(|entry| entry.expect("Failed to read directory entry").path())
            .collect();
        files.sort();
        files
    }
}

impl Default for TempBatches {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a temporary line sequence.
///
/// # Example
///
/// ```rust,ignore
/// use swapbatch_testkit::{lines_input, with_temp_sequence};
///
/// with_temp_sequence(4096, |seq| {
///     seq.read_all(&mut lines_input(&["one"])).unwrap();
/// });
/// ```
pub fn with_temp_sequence<F, R>(batch_size: usize, f: F) -> R
where
    F: FnOnce(&mut BatchSequence<Line>) -> R,
{
    let fixture = TempBatches::new();
    let mut seq = fixture.sequence(batch_size);
    f(&mut seq)
}

/// Input stream holding `lines`, each newline-terminated.
pub fn lines_input<S: AsRef<str>>(lines: &[S]) -> Cursor<Vec<u8>> {
    let mut data = Vec::new();
    for line in lines {
        data.extend_from_slice(line.as_ref().as_bytes());
        data.push(b'\n');
    }
    Cursor::new(data)
}

/// Bytes a line of `len` bytes occupies in a batch, header included.
pub fn line_footprint(len: usize) -> usize {
    HEADER_SIZE + size_of::<Line>() + len.next_multiple_of(HEADER_SIZE)
}

/// A batch size that holds exactly `count` lines of `len` bytes each.
pub fn batch_size_for(count: usize, len: usize) -> usize {
    HEADER_SIZE + count * line_footprint(len)
}

/// Records per batch that storing `lines` in batches of `batch_size` bytes
/// produces: a batch is closed only when the next line does not fit.
///
/// `batch_size` must be a multiple of [`HEADER_SIZE`] and large enough for
/// every line on its own.
pub fn expected_distribution<S: AsRef<str>>(lines: &[S], batch_size: usize) -> Vec<usize> {
    let mut counts = vec![0];
    let mut used = HEADER_SIZE;
    for line in lines {
        let footprint = line_footprint(line.as_ref().len());
        if used + footprint > batch_size {
            counts.push(0);
            used = HEADER_SIZE;
        }
        used += footprint;
        if let Some(last) = counts.last_mut() {
            *last += 1;
        }
    }
    counts
}
