//! The `kvbench` binary.
//!
//! Presets a key-value store to a target dataset size and then drives a rate-limited mix of reads
//! and updates against it. See [`kvbench_server::config`] for all options.
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    kvbench_server::cli::execute()
}
