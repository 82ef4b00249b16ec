//! Fixed-interval tick driver. This module contains the [`Scheduler`].

use async_trait::async_trait;
use std::time::Duration;
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
    time::MissedTickBehavior,
};
use tracing::{Instrument, debug, info_span, trace};

/// One unit of scheduled work: sample, update, persist.
///
/// A tick must not fail. Anything that goes wrong inside it is logged and
/// absorbed so the loop keeps running.
#[async_trait]
pub trait Tick: Send + 'static {
    /// Name used for spans, logs and metric labels.
    fn name(&self) -> &'static str;

    async fn tick(&mut self);
}

/// Fires a [`Tick`] immediately and then once per interval.
///
/// Ticks never overlap: the next one is not started until the previous one
/// has returned. If a tick overruns the interval the schedule is delayed
/// rather than bursting to catch up.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    every: Duration,
}

impl Scheduler {
    pub fn new(every: Duration) -> Self {
        Self { every }
    }

    pub fn every(&self) -> Duration {
        self.every
    }

    /// Spawn the tick loop for `task` onto the current tokio runtime.
    pub fn start<T: Tick>(&self, mut task: T) -> SchedulerHandle<T> {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let every = self.every;

        let handle = tokio::spawn(async move {
            let name = task.name();
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut counter: u64 = 0;

            debug!(worker = name, every_ms = every.as_millis() as u64, "scheduler started");

            loop {
                // Only waiting is raced against shutdown. Once a tick has
                // started it runs to completion.
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {}
                }

                let span = info_span!("tick", worker = name, tick_id = counter);
                let started = tokio::time::Instant::now();
                task.tick().instrument(span).await;
                crate::metrics::record_tick(name, started.elapsed());

                counter = counter.wrapping_add(1);
            }

            trace!(worker = name, ticks = counter, "scheduler stopped");
            task
        });

        SchedulerHandle { shutdown, handle }
    }
}

/// Handle to a running tick loop.
#[derive(Debug)]
pub struct SchedulerHandle<T> {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<T>,
}

impl<T> SchedulerHandle<T> {
    /// Cancel future ticks. An in-flight tick is allowed to finish.
    pub fn stop(&self) {
        // The loop holds the receiver until it exits, so a send error only
        // means it has already stopped.
        let _ = self.shutdown.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the loop and wait for it to hand back its task.
    pub async fn shutdown(self) -> Result<T, JoinError> {
        self.stop();
        self.handle.await
    }
}
