//! # EntiMap Testkit
//!
//! Test utilities for EntiMap.
//!
//! This crate provides:
//! - A fixture schema covering every relationship shape
//! - Store and record helpers
//! - Property-based test generators using proptest
//! - Temporary workspaces for file-based tests
//!
//! ## Usage
//!
//! ```rust
//! use entimap_testkit::prelude::*;
//!
//! with_test_store(|store| {
//!     store.seed("User", &[1, 2, 3]);
//!     assert_eq!(store.keys("User"), vec![1, 2, 3]);
//! });
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
