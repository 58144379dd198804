//! Batch sequence configuration.

use crate::chain::HEADER_SIZE;
use crate::error::{CoreError, CoreResult};
use std::path::PathBuf;
use swapbatch_storage::{indexed_path, RegionOptions};

/// Configuration for creating or opening a batch sequence.
///
/// Batch `i` lives in the file `<basename><i>`; every batch file is exactly
/// `batch_size` bytes.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Path prefix shared by all batch files.
    pub basename: PathBuf,

    /// Capacity of each batch file in bytes.
    pub batch_size: usize,

    /// Whether batch files are removed when the sequence is dropped.
    pub autodelete: bool,

    /// Preferred mapping address; advisory only.
    pub base_hint: Option<usize>,

    /// Whether to reserve disk blocks for each batch when it is created.
    pub preallocate: bool,
}

impl BatchConfig {
    /// Default batch capacity.
    pub const DEFAULT_BATCH_SIZE: usize = 64 * 1024 * 1024; // 64 MB

    /// Smallest usable batch: one record header plus its terminator.
    pub const MIN_BATCH_SIZE: usize = 2 * HEADER_SIZE;

    /// Creates a configuration for batches named `<basename><i>` of
    /// `batch_size` bytes each.
    #[must_use]
    pub fn new(basename: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self {
            basename: basename.into(),
            batch_size,
            autodelete: true,
            base_hint: None,
            preallocate: false,
        }
    }

    /// Sets whether batch files are removed on drop.
    #[must_use]
    pub fn autodelete(mut self, value: bool) -> Self {
        self.autodelete = value;
        self
    }

    /// Sets the advisory mapping address.
    #[must_use]
    pub fn base_hint(mut self, hint: Option<usize>) -> Self {
        self.base_hint = hint;
        self
    }

    /// Sets whether batch files are preallocated on disk.
    #[must_use]
    pub fn preallocate(mut self, value: bool) -> Self {
        self.preallocate = value;
        self
    }

    /// Returns the path of batch `index`.
    #[must_use]
    pub fn batch_path(&self, index: usize) -> PathBuf {
        indexed_path(&self.basename, index)
    }

    /// Checks that the configuration describes a usable sequence.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the basename is empty or the
    /// batch size cannot hold an empty chain plus one header.
    pub fn validate(&self) -> CoreResult<()> {
        if self.basename.as_os_str().is_empty() {
            return Err(CoreError::invalid_config("basename must not be empty"));
        }
        if self.batch_size < Self::MIN_BATCH_SIZE {
            return Err(CoreError::invalid_config(format!(
                "batch size {} is below the minimum of {} bytes",
                self.batch_size,
                Self::MIN_BATCH_SIZE
            )));
        }
        Ok(())
    }

    pub(crate) fn region_options(&self) -> RegionOptions {
        RegionOptions {
            base_hint: self.base_hint,
            preallocate: self.preallocate,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        let basename = std::env::temp_dir().join(format!("swapbatch-{}.", std::process::id()));
        Self::new(basename, Self::DEFAULT_BATCH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = BatchConfig::default();
        assert!(config.autodelete);
        assert!(config.base_hint.is_none());
        assert_eq!(config.batch_size, BatchConfig::DEFAULT_BATCH_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = BatchConfig::new("/tmp/swap", 4096)
            .autodelete(false)
            .base_hint(Some(0xA000_0000))
            .preallocate(true);

        assert!(!config.autodelete);
        assert_eq!(config.base_hint, Some(0xA000_0000));
        assert!(config.preallocate);
        assert_eq!(config.batch_path(2), PathBuf::from("/tmp/swap2"));
    }

    #[test]
    fn rejects_tiny_batches() {
        let config = BatchConfig::new("/tmp/swap", HEADER_SIZE);
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
        assert!(BatchConfig::new("/tmp/swap", BatchConfig::MIN_BATCH_SIZE)
            .validate()
            .is_ok());
    }

    #[test]
    fn rejects_empty_basename() {
        assert!(BatchConfig::new("", 4096).validate().is_err());
    }
}
