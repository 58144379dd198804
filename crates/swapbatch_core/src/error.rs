//! Error types for SwapBatch core.

use crate::arena::ArenaError;
use std::io;
use std::path::PathBuf;
use swapbatch_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in batch sequence operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Creating, resizing, mapping, or removing a batch file failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Querying or repositioning the input stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An arena reservation did not fit.
    #[error(transparent)]
    Overflow(#[from] ArenaError),

    /// A single record needs more space than an empty batch provides.
    #[error("record exceeds batch capacity of {batch_size} bytes")]
    RecordTooLarge {
        /// The configured batch capacity.
        batch_size: usize,
    },

    /// The input ended mid-record or a record reader rejected it.
    #[error("corrupt input: {message}")]
    CorruptInput {
        /// Description of the problem.
        message: String,
    },

    /// A batch index outside `[0, n_batches)` was requested.
    #[error("batch index {index} out of range ({n_batches} batches)")]
    BatchOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of batches in the sequence.
        n_batches: usize,
    },

    /// A batch's header chain is inconsistent.
    #[error("batch {batch} corrupted at offset {offset}: {message}")]
    CorruptBatch {
        /// The batch index.
        batch: usize,
        /// Byte offset of the offending header.
        offset: usize,
        /// Description of the corruption.
        message: String,
    },

    /// The configuration cannot describe a usable batch sequence.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// No batch files exist for the basename.
    #[error("no batch files found for {}", basename.display())]
    NotFound {
        /// The basename that was searched.
        basename: PathBuf,
    },

    /// An operation needed a mapped batch but none is loaded.
    #[error("no batch is loaded")]
    NoBatchLoaded,

    /// A cursor at the end state was dereferenced.
    #[error("cursor is past the last record")]
    CursorAtEnd,
}

impl CoreError {
    /// Creates a corrupt input error.
    pub fn corrupt_input(message: impl Into<String>) -> Self {
        Self::CorruptInput {
            message: message.into(),
        }
    }

    /// Creates a corrupt batch error.
    pub fn corrupt_batch(batch: usize, offset: usize, message: impl Into<String>) -> Self {
        Self::CorruptBatch {
            batch,
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns `true` for the errors that a caller may recover from by
    /// skipping the offending item and continuing with the same sequence.
    #[must_use]
    pub fn is_item_error(&self) -> bool {
        matches!(self, Self::RecordTooLarge { .. } | Self::CorruptInput { .. })
    }
}
