//! # SwapBatch Storage
//!
//! Memory-mapped, fixed-size batch files for SwapBatch.
//!
//! This crate provides the lowest layer of the batch store: creating a file
//! of a fixed size, mapping it into memory, and removing it again. Regions
//! are **opaque byte ranges** - they do not interpret the chain headers or
//! records that the core crate writes into them.
//!
//! ## Example
//!
//! ```no_run
//! use swapbatch_storage::{indexed_path, MappedRegion, RegionOptions};
//! use std::path::Path;
//!
//! let path = indexed_path(Path::new("/tmp/swap"), 0);
//! let region = MappedRegion::create(&path, 1 << 20, RegionOptions::default())?;
//! assert_eq!(region.len(), 1 << 20);
//! # Ok::<(), swapbatch_storage::StorageError>(())
//! ```

#![warn(missing_docs)]

mod error;
mod file;
mod region;

pub use error::{StorageError, StorageResult};
pub use file::{create_sized_file, indexed_path, open_sized_file, remove_if_exists};
pub use region::{MappedRegion, RegionOptions};
