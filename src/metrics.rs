//! Internal metrics for the workers, and the exporter used to publish them.
//! Check the docs on [`init_metrics`].

use crate::sampler::ChannelKind;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::{sync::LazyLock, time::Duration};

const TICKS: &str = "proc_stats.ticks";
const TICKS_DESC: &str = "The total number of completed worker ticks";

const TICK_DURATION: &str = "proc_stats.tick_duration_seconds";
const TICK_DURATION_DESC: &str = "Time taken by one sample-update-persist cycle";

const SAMPLE_FAILURES: &str = "proc_stats.sample_failures";
const SAMPLE_FAILURES_DESC: &str = "Telemetry provider calls that failed, by channel";

const SNAPSHOT_FAILURES: &str = "proc_stats.snapshot_failures";
const SNAPSHOT_FAILURES_DESC: &str = "Snapshots that could not be written";

const TRACKED: &str = "proc_stats.tracked_processes";
const TRACKED_DESC: &str = "Processes currently tracked";

const COMPLETED: &str = "proc_stats.completed_processes";
const COMPLETED_DESC: &str = "Completed processes currently retained";

const CHANNEL_LEN: &str = "proc_stats.channel_len";
const CHANNEL_LEN_DESC: &str = "Readings held per stats channel";

static DESCRIBE: LazyLock<()> = LazyLock::new(|| {
    metrics::describe_counter!(TICKS, TICKS_DESC);
    metrics::describe_histogram!(TICK_DURATION, metrics::Unit::Seconds, TICK_DURATION_DESC);
    metrics::describe_counter!(SAMPLE_FAILURES, SAMPLE_FAILURES_DESC);
    metrics::describe_counter!(SNAPSHOT_FAILURES, SNAPSHOT_FAILURES_DESC);
    metrics::describe_gauge!(TRACKED, TRACKED_DESC);
    metrics::describe_gauge!(COMPLETED, COMPLETED_DESC);
    metrics::describe_gauge!(CHANNEL_LEN, CHANNEL_LEN_DESC);
});

pub(crate) fn record_tick(worker: &'static str, took: Duration) {
    counter!(TICKS, "worker" => worker).increment(1);
    histogram!(TICK_DURATION, "worker" => worker).record(took.as_secs_f64());
}

pub(crate) fn record_sample_failure(channel: ChannelKind) {
    counter!(SAMPLE_FAILURES, "channel" => channel.as_str()).increment(1);
}

pub(crate) fn record_snapshot_failure(worker: &'static str) {
    counter!(SNAPSHOT_FAILURES, "worker" => worker).increment(1);
}

pub(crate) fn record_tracker(tracked: usize, completed: usize) {
    gauge!(TRACKED).set(tracked as f64);
    gauge!(COMPLETED).set(completed as f64);
}

pub(crate) fn record_channel_len(channel: ChannelKind, len: usize) {
    gauge!(CHANNEL_LEN, "channel" => channel.as_str()).set(len as f64);
}

/// Install a Prometheus exporter serving on the given port, or 9000 if
/// `None`, and return the port.
///
/// The library itself only talks to the [`metrics`] facade; without an
/// installed recorder every call above is a no-op. Binaries that want the
/// numbers call this once at startup, then scrape `http://host:port/`.
///
/// Exported:
/// - `proc_stats.ticks` (counter, `worker`)
/// - `proc_stats.tick_duration_seconds` (histogram, `worker`)
/// - `proc_stats.sample_failures` (counter, `channel`)
/// - `proc_stats.snapshot_failures` (counter, `worker`)
/// - `proc_stats.tracked_processes`, `proc_stats.completed_processes` (gauges)
/// - `proc_stats.channel_len` (gauge, `channel`)
pub fn init_metrics(port: Option<u16>) -> Result<u16, BuildError> {
    LazyLock::force(&DESCRIBE);
    let port = port.unwrap_or(9000);
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    Ok(port)
}
