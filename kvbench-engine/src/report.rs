//! Human-readable output of aggregated metrics.

use std::fmt;
use std::time::Duration;

use bytesize::ByteSize;
use sketches_ddsketch::DDSketch;
use yansi::Paint;

use crate::metrics::{MetricsSnapshot, OperationKind, OperationMetrics};
use crate::worker::WorkerStats;

/// Latency quantiles of one operation kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Latencies {
    pub avg: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p99: Duration,
}

impl Latencies {
    /// Computes quantiles from a sketch of latencies in seconds, or `None` if it is empty.
    pub fn from_sketch(sketch: &DDSketch) -> Option<Self> {
        let count = sketch.count();
        if count == 0 {
            return None;
        }

        let quantile = |q| {
            let secs = sketch.quantile(q).ok().flatten().unwrap_or_default();
            Duration::from_secs_f64(secs.max(0.0))
        };
        let avg = sketch.sum().unwrap_or_default() / count as f64;

        Some(Self {
            avg: Duration::from_secs_f64(avg.max(0.0)),
            p50: quantile(0.5),
            p90: quantile(0.9),
            p99: quantile(0.99),
        })
    }
}

/// Logs one line per operation kind with throughput and latency since the last progress report.
pub fn log_progress(snapshot: &MetricsSnapshot, elapsed: Duration) {
    for kind in [OperationKind::Read, OperationKind::Update, OperationKind::Preset] {
        let metrics = snapshot.get(kind);
        let ops = metrics.successes() + metrics.failures;
        if ops == 0 {
            continue;
        }

        let ops_per_sec = ops as f64 / elapsed.as_secs_f64();
        match Latencies::from_sketch(&metrics.timing) {
            Some(latency) => tracing::info!(
                op = kind.as_str(),
                ops_per_sec = %format!("{ops_per_sec:.1}"),
                failures = metrics.failures,
                p50 = ?latency.p50,
                p99 = ?latency.p99,
                "progress"
            ),
            None => tracing::info!(
                op = kind.as_str(),
                ops_per_sec = %format!("{ops_per_sec:.1}"),
                failures = metrics.failures,
                "progress"
            ),
        }
    }
}

/// Prints the final summary of a run to stdout.
pub fn print_summary(snapshot: &MetricsSnapshot, stats: &WorkerStats, duration: Duration) {
    println!();
    println!(
        "{} ({} attempted, {} throttled, {} idle)",
        "## STEADY STATE".bold(),
        stats.attempted.bold(),
        stats.throttled,
        stats.idle
    );
    print_operation("READ:", &snapshot.read, duration);
    print_operation("UPDATE:", &snapshot.update, duration);

    if snapshot.preset.successes() + snapshot.preset.failures > 0 {
        println!();
        println!("{}", "## PRESET".bold());
        print_operation("WRITE:", &snapshot.preset, Duration::ZERO);
    }
}

fn print_operation(label: &str, metrics: &OperationMetrics, duration: Duration) {
    let ops = metrics.successes();
    if ops == 0 {
        if metrics.failures > 0 {
            println!(
                "{}",
                format!("{label} {} FAILURES", metrics.failures).bold().red()
            );
        }
        return;
    }

    print!("{} ({} ops", label.bold().green(), ops.bold());
    if metrics.failures > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", metrics.failures).bold().red()
        );
    }
    println!(")");

    if !duration.is_zero() {
        print_ops(ops, duration);
        print_throughput(metrics.bytes, duration);
    }
    if let Some(latency) = Latencies::from_sketch(&metrics.timing) {
        print_percentiles(&latency);
    }
}

fn print_percentiles(latency: &Latencies) {
    println!(
        "  avg: {:.2?}; p50: {:.2?}; p90: {:.2?}; p99: {:.2?}",
        latency.avg.bold(),
        latency.p50,
        latency.p90,
        latency.p99
    );
}

fn print_ops(ops: u64, duration: Duration) {
    let ops_ps = ops as f64 / duration.as_secs_f64();
    print!("  {:.2} operations/s", ops_ps.bold());
}

fn print_throughput(total: u64, duration: Duration) {
    let throughput = (total as f64 / duration.as_secs_f64()) as u64;
    println!(", {:.2}/s", ByteSize::b(throughput).bold());
}

impl fmt::Display for Latencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg {:.2?}, p50 {:.2?}, p90 {:.2?}, p99 {:.2?}",
            self.avg, self.p50, self.p90, self.p99
        )
    }
}
