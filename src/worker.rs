//! The two telemetry workers and the start/stop wrapper they share.

use crate::{
    ProcessTracker, Sampler, SnapshotSink, StatsAggregator, TelemetryProvider,
    config::{CollectorConfig, TracerConfig},
    error::WorkerError,
    scheduler::{Scheduler, SchedulerHandle, Tick},
};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Samples the process table and tracks process lifecycles.
#[derive(Debug)]
pub struct ProcessTracer {
    sampler: Sampler,
    tracker: ProcessTracker,
    sink: SnapshotSink,
}

impl ProcessTracer {
    pub fn new(sampler: Sampler, tracker: ProcessTracker, sink: SnapshotSink) -> Self {
        Self {
            sampler,
            tracker,
            sink,
        }
    }

    pub fn tracker(&self) -> &ProcessTracker {
        &self.tracker
    }

    pub fn sink(&self) -> &SnapshotSink {
        &self.sink
    }
}

#[async_trait]
impl Tick for ProcessTracer {
    fn name(&self) -> &'static str {
        "process_tracer"
    }

    async fn tick(&mut self) {
        let now = Utc::now();

        // A missing sample leaves the sets alone; completing everything on a
        // failed poll would be wrong.
        match self.sampler.processes().await {
            Some(list) => {
                self.tracker.update(&list.list, now);
            }
            None => debug!("no process sample this tick, tracker unchanged"),
        }

        persist(self.name(), &self.sink, &self.tracker.view()).await;
    }
}

/// Samples system-wide resource counters into bounded histories.
#[derive(Debug)]
pub struct StatsCollector {
    sampler: Sampler,
    stats: StatsAggregator,
    sink: SnapshotSink,
}

impl StatsCollector {
    pub fn new(sampler: Sampler, stats: StatsAggregator, sink: SnapshotSink) -> Self {
        Self {
            sampler,
            stats,
            sink,
        }
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn sink(&self) -> &SnapshotSink {
        &self.sink
    }
}

#[async_trait]
impl Tick for StatsCollector {
    fn name(&self) -> &'static str {
        "stats_collector"
    }

    async fn tick(&mut self) {
        let now = Utc::now();
        let bundle = self.sampler.stats().await;
        self.stats.record(bundle, now);

        persist(self.name(), &self.sink, &self.stats).await;
    }
}

async fn persist<T>(worker: &'static str, sink: &SnapshotSink, state: &T)
where
    T: serde::Serialize + Sync + ?Sized,
{
    if let Err(error) = sink.persist(state).await {
        warn!(
            worker,
            %error,
            path = %sink.path().display(),
            "snapshot not written, will retry next tick"
        );
        crate::metrics::record_snapshot_failure(worker);
    }
}

/// A pipeline plus the scheduler that drives it.
///
/// Nothing runs until [`Worker::start`] is called. [`Worker::stop`] hands
/// the pipeline back, so the worker can be inspected or started again with
/// its in-memory state intact.
#[derive(Debug)]
pub struct Worker<T: Tick> {
    scheduler: Scheduler,
    idle: Option<T>,
    running: Option<SchedulerHandle<T>>,
}

impl<T: Tick> Worker<T> {
    pub fn new(pipeline: T, every: Duration) -> Self {
        Self {
            scheduler: Scheduler::new(every),
            idle: Some(pipeline),
            running: None,
        }
    }

    /// Begin ticking. Returns `false` if the worker is already running.
    pub fn start(&mut self) -> bool {
        let Some(pipeline) = self.idle.take() else {
            return false;
        };
        info!(
            worker = pipeline.name(),
            every_ms = self.scheduler.every().as_millis() as u64,
            "starting worker"
        );
        self.running = Some(self.scheduler.start(pipeline));
        true
    }

    /// Cancel future ticks and wait for any in-flight tick to finish.
    /// Stopping an idle worker is a no-op.
    pub async fn stop(&mut self) -> Result<(), WorkerError> {
        let Some(handle) = self.running.take() else {
            return Ok(());
        };
        let pipeline = handle.shutdown().await.map_err(|source| WorkerError::Join {
            worker: std::any::type_name::<T>(),
            source,
        })?;
        info!(worker = pipeline.name(), "worker stopped");
        self.idle = Some(pipeline);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// The pipeline, available while the worker is stopped.
    pub fn pipeline(&self) -> Option<&T> {
        self.idle.as_ref()
    }
}

pub type ProcessTracerWorker = Worker<ProcessTracer>;
pub type StatsCollectorWorker = Worker<StatsCollector>;

impl Worker<ProcessTracer> {
    /// Build an idle process tracer worker over `provider`.
    pub fn process_tracer(provider: impl TelemetryProvider + 'static, config: &TracerConfig) -> Self {
        let pipeline = ProcessTracer::new(
            Sampler::new(provider),
            ProcessTracker::new(config.completed_capacity),
            SnapshotSink::new(&config.output_path),
        );
        Self::new(pipeline, config.interval())
    }
}

impl Worker<StatsCollector> {
    /// Build an idle stats collector worker over `provider`.
    pub fn stats_collector(
        provider: impl TelemetryProvider + 'static,
        config: &CollectorConfig,
    ) -> Self {
        let pipeline = StatsCollector::new(
            Sampler::new(provider),
            StatsAggregator::new(config.retention),
            SnapshotSink::new(&config.output_path),
        );
        Self::new(pipeline, config.interval())
    }
}
