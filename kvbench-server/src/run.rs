//! The `run` and `scan` commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use kvbench_engine::metrics::{BoxedSink, MerniSink, MetricsSnapshot, SketchSink};
use kvbench_engine::{Engine, report};
use tokio::signal::unix::SignalKind;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::store;

/// Boots the engine against the configured store and runs until interrupted.
///
/// The steady state ends on SIGINT, SIGTERM, SIGHUP or SIGQUIT, or once the configured duration
/// has elapsed. Workers then finish their in-flight calls and a summary is printed to stdout.
pub async fn run(config: Config) -> Result<()> {
    tracing::info!("Starting benchmark");

    let store = store::connect(&config.store).await?;
    let sketches = SketchSink::new();
    let sink: BoxedSink = if config.metrics.datadog_key.is_some() {
        Arc::new((sketches.clone(), MerniSink))
    } else {
        Arc::new(sketches.clone())
    };

    let engine = Engine::new(config.workload.engine_config(), store, sink)?;
    let running = engine.boot().await.context("failed to boot")?;
    merni::counter!("run.start": 1);

    // Everything recorded so far belongs to the preset.
    let mut totals = sketches.take();
    let start = Instant::now();

    let progress_cancel = CancellationToken::new();
    let progress = tokio::spawn(report_progress(
        sketches,
        config.metrics.report_interval,
        progress_cancel.clone(),
    ));

    wait_for_stop(config.workload.duration).await;

    tracing::info!("Stopping workers ...");
    let stats = running.stop_timeout(config.workload.stop_timeout).await;
    let duration = start.elapsed();

    progress_cancel.cancel();
    totals.merge(&progress.await?);

    report::print_summary(&totals, &stats, duration);
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Counts the keys in the configured store without writing anything.
pub async fn scan(config: Config) -> Result<()> {
    let store = store::connect(&config.store).await?;
    let keys = store
        .scan_all_keys(config.workload.scan_count)
        .await
        .context("failed to scan keys")?;

    let prefix = &config.workload.key_prefix;
    let generated = keys.iter().filter(|key| key.starts_with(prefix)).count();
    println!(
        "{} keys, {generated} with prefix {prefix:?} (target {})",
        keys.len(),
        config.workload.data_set_size
    );
    Ok(())
}

async fn wait_for_stop(duration: Option<Duration>) {
    let departure = async {
        elegant_departure::tokio::depart()
            .on_termination()
            .on_sigint()
            .on_signal(SignalKind::hangup())
            .on_signal(SignalKind::quit())
            .await
    };

    match duration {
        Some(duration) => {
            tokio::select! {
                _ = departure => tracing::info!("Received shutdown signal"),
                _ = tokio::time::sleep(duration) => {
                    tracing::info!(?duration, "Run duration elapsed");
                }
            }
        }
        None => departure.await,
    }
}

/// Logs throughput and latency every `interval` until cancelled.
///
/// The sink is drained on every tick, so each line covers one interval. Returns everything that
/// was drained, including what was recorded after the last tick.
async fn report_progress(
    sink: SketchSink,
    interval: Duration,
    cancel: CancellationToken,
) -> MetricsSnapshot {
    let mut totals = MetricsSnapshot::default();

    if !interval.is_zero() {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        let mut last = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let snapshot = sink.take();
            report::log_progress(&snapshot, last.elapsed());
            last = Instant::now();
            totals.merge(&snapshot);
        }
    } else {
        cancel.cancelled().await;
    }

    totals.merge(&sink.take());
    totals
}
