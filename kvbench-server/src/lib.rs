//! Command line runner for the kvbench load generator.
//!
//! This wires the [`kvbench_engine`] to a real store: it loads the [`config`], connects to Redis
//! through [`store`], sets up logging, error reporting and metrics submission, and drives a run
//! until it is interrupted or its duration elapses.
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod concurrency;
pub mod config;
pub mod observability;
pub mod run;
pub mod store;
