//! Test utilities for kvbench.
//!
//! This crate provides utilities shared by the test suites of the kvbench crates. See the
//! modules for all available utilities.

pub mod tracing;
