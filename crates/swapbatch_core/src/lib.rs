//! # SwapBatch Core
//!
//! Out-of-core storage for large sequences of records.
//!
//! Records are read from an input stream and written into fixed-size batch
//! files that are memory-mapped one at a time. Within a batch, records form
//! a chain: every record is preceded by a header holding the distance, in
//! header-sized words, to the next header, and a zero header ends the chain.
//! When the current batch is full, a new batch file is created and the
//! record is read again into it.
//!
//! This crate provides:
//! - [`BumpArena`] - a bounds-checked bump allocator over a byte range
//! - [`RecordReader`] - how a record type reads itself into the arena
//! - [`BatchSequence`] - the batch files, the chain, and their lifecycle
//! - [`BatchIter`] and [`Cursor`] - lazy forward iteration
//!
//! ## Example
//!
//! ```no_run
//! use swapbatch_core::{BatchConfig, BatchSequence, Line};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let config = BatchConfig::new("/tmp/words.", 64 << 20);
//! let mut seq = BatchSequence::<Line>::create(config)?;
//! seq.read_all(&mut BufReader::new(File::open("words.txt")?))?;
//! println!("{}", seq.stats());
//!
//! for line in seq.iter() {
//!     println!("{}", line?);
//! }
//! # Ok::<(), swapbatch_core::CoreError>(())
//! ```
//!
//! Batch files are not portable: headers and records are stored in native
//! width and byte order.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod arena;
mod chain;
mod config;
mod error;
mod iter;
mod record;
mod sequence;
mod stats;

pub use arena::{ArenaError, BumpArena, EndMark, Slot, Span};
pub use chain::HEADER_SIZE;
pub use config::BatchConfig;
pub use error::{CoreError, CoreResult};
pub use iter::{BatchIter, Cursor};
pub use record::{Line, RecordError, RecordReader, RecordView};
pub use sequence::{BatchSequence, SequenceState};
pub use stats::BatchStats;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
