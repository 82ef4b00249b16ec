//! Background telemetry workers.
//!
//! Two independent workers sample the local host on a fixed interval and
//! persist their latest state to a well-known JSON file, so a UI or CLI can
//! read the newest snapshot without talking to the worker:
//!
//! - the **process tracer** polls the process table and sorts processes into
//!   *tracked* (running now, with peak CPU and memory since first seen) and
//!   *completed* (tracked once, gone from a later poll). Output goes to
//!   `proc-tracer-data.json` by default.
//! - the **stats collector** polls CPU, memory, network, disk I/O and disk
//!   capacity into five bounded histories. Output goes to `stats-data.json`
//!   by default.
//!
//! Each worker is the same pipeline: a [`Scheduler`] fires a tick, the
//! [`Sampler`] asks the injected [`TelemetryProvider`] for readings, the
//! domain component ([`ProcessTracker`] or [`StatsAggregator`]) folds them
//! into memory, and the [`SnapshotSink`] atomically replaces the output
//! file. Ticks of one worker never overlap. A failing provider call only
//! drops that reading for that tick, and a failed write only skips that
//! tick's snapshot; neither stops the loop.
//!
//! Workers are inert until started:
//!
//! ```no_run
//! use proc_stats_workers::{Config, ProcessTracerWorker, SysinfoProvider};
//!
//! # async fn demo() -> Result<(), proc_stats_workers::WorkerError> {
//! let config = Config::default();
//! let mut tracer = ProcessTracerWorker::process_tracer(SysinfoProvider::new(), &config.tracer);
//! tracer.start();
//! // ...
//! tracer.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`start_workers`] does the above for both workers over
//! [`SysinfoProvider`]. [`init_tracing`] and [`init_metrics`] set up the
//! ambient subscriber and exporter for binaries.

pub mod config;
pub use config::{CollectorConfig, Config, LogConfig, TracerConfig};

pub mod error;
pub use error::{ConfigError, PersistError, SampleError, WorkerError};

pub(crate) mod metrics;
pub use metrics::init_metrics;

mod provider;
pub use provider::{SysinfoProvider, TelemetryProvider};

mod readings;
pub use readings::{
    CoreLoad, CpuLoad, DiskIoRates, FilesystemUsage, MemoryInfo, MetricReading,
    NetworkInterfaceInfo, ProcessList, ProcessReading, ProcessState,
};

mod sampler;
pub use sampler::{ChannelKind, Sampler, StatsBundle};

mod scheduler;
pub use scheduler::{Scheduler, SchedulerHandle, Tick};

mod sink;
pub use sink::{SnapshotSink, StatsSnapshot, TracerSnapshot, read_snapshot};

mod stats;
pub use stats::{Channel, StatsAggregator};

mod trace;
pub use trace::init_tracing;

mod tracker;
pub use tracker::{CompletedProcess, ProcessTracker, TrackedProcess, TrackerView};

mod worker;
pub use worker::{
    ProcessTracer, ProcessTracerWorker, StatsCollector, StatsCollectorWorker, Worker,
};

/// Both workers, started over the local host.
#[derive(Debug)]
pub struct Workers {
    pub tracer: ProcessTracerWorker,
    pub collector: StatsCollectorWorker,
}

impl Workers {
    /// Stop both workers, waiting for in-flight ticks to finish.
    pub async fn stop(&mut self) -> Result<(), WorkerError> {
        let (tracer, collector) = tokio::join!(self.tracer.stop(), self.collector.stop());
        tracer.and(collector)
    }
}

/// Build both workers over [`SysinfoProvider`] and start them. Each worker
/// gets its own provider, so they share nothing.
///
/// Must be called from within a tokio runtime.
pub fn start_workers(config: &Config) -> Workers {
    let mut tracer = ProcessTracerWorker::process_tracer(SysinfoProvider::new(), &config.tracer);
    let mut collector =
        StatsCollectorWorker::stats_collector(SysinfoProvider::new(), &config.collector);

    tracer.start();
    collector.start();

    Workers { tracer, collector }
}
