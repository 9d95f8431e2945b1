//! Shared test utilities for the curvilinear-wms workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic curvilinear grid generators with known ground truth
//! - In-memory `Layer` / `Dataset` fixtures
//! - Temporary data files with controllable modification times
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in integration tests (not in `#[cfg(test)]` modules of a
//! crate this one depends on, whose types would not unify):
//!
//! ```ignore
//! use test_utils::{RotatedGrid, TestLayer};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
