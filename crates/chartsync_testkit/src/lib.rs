//! # chartsync testkit
//!
//! Test utilities for chartsync.
//!
//! This crate provides:
//! - Record and wire-payload builders
//! - A sample clinic data set and seeded stores
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chartsync_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     let store = seeded_store(&[patient("p1")]);
//!     // ... run a sync against it
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
