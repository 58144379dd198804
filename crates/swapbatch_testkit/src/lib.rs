//! # SwapBatch Testkit
//!
//! Test utilities for SwapBatch.
//!
//! This crate provides:
//! - Temporary batch directories and sizing helpers
//! - Property-based test generators using proptest
//! - Cross-crate integration scenarios
//!
//! ## Usage
//!
//! ```rust,ignore
//! use swapbatch_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_sequence() {
//!     with_temp_sequence(4096, |seq| {
//!         seq.read_all(&mut lines_input(&["a", "b"])).unwrap();
//!         assert_eq!(seq.len(), 2);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
