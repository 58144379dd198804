//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while creating, mapping, or removing batch files.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Creating, resizing, or mapping a backing file failed.
    #[error("failed to map {}: {source}", path.display())]
    Mapping {
        /// The backing file.
        path: PathBuf,
        /// Platform error code, when the OS reported one.
        code: Option<i32>,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An existing backing file does not have the expected size.
    #[error("size mismatch for {}: expected {expected} bytes, found {actual}", path.display())]
    SizeMismatch {
        /// The backing file.
        path: PathBuf,
        /// The configured region size.
        expected: u64,
        /// The size found on disk.
        actual: u64,
    },

    /// The region was mapped read-only but a write was requested.
    #[error("region {} is mapped read-only", path.display())]
    ReadOnly {
        /// The backing file.
        path: PathBuf,
    },

    /// Removing a backing file failed.
    #[error("failed to remove {}: {source}", path.display())]
    Remove {
        /// The file that could not be removed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Creates a mapping error, capturing the platform error code of `source`.
    pub fn mapping(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Mapping {
            path: path.into(),
            code: source.raw_os_error(),
            source,
        }
    }

    /// Returns the platform error code carried by a mapping or removal error.
    #[must_use]
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Mapping { code, .. } => *code,
            Self::Remove { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
