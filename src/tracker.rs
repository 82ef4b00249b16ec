//! Process lifecycle tracking: which processes are alive now, and which
//! ones we watched disappear.

use crate::{ProcessReading, ProcessState, readings::finite_or_zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, instrument, trace};

/// A process observed as running, with peaks accumulated since it was first
/// seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedProcess {
    pub pid: u32,
    pub parent_pid: u32,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub peak_cpu_percent: f64,
    pub peak_mem_percent: f64,
    pub last_state: ProcessState,
}

impl TrackedProcess {
    fn first_seen(reading: &ProcessReading, now: DateTime<Utc>) -> Self {
        Self {
            pid: reading.pid,
            parent_pid: reading.parent_pid,
            name: reading.name.clone(),
            started_at: reading.started_at,
            first_seen_at: now,
            last_seen_at: now,
            peak_cpu_percent: finite_or_zero(reading.cpu_percent),
            peak_mem_percent: finite_or_zero(reading.mem_percent),
            last_state: reading.state,
        }
    }

    fn observe(&mut self, reading: &ProcessReading, now: DateTime<Utc>) {
        self.last_seen_at = now;
        // A non-finite reading counts as zero, so it can neither lower a peak
        // nor become one.
        self.peak_cpu_percent = self.peak_cpu_percent.max(finite_or_zero(reading.cpu_percent));
        self.peak_mem_percent = self.peak_mem_percent.max(finite_or_zero(reading.mem_percent));
        self.last_state = reading.state;
    }
}

/// A formerly tracked process that was absent from a poll. Immutable once
/// created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedProcess {
    #[serde(flatten)]
    pub process: TrackedProcess,
    pub ended_at: DateTime<Utc>,
}

/// Owns the tracked and completed sets for the process tracer.
///
/// Tracked entries are keyed by pid, so at most one exists per pid. The
/// completed list is append-only in detection order and bounded; once full,
/// the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ProcessTracker {
    tracked: BTreeMap<u32, TrackedProcess>,
    completed: VecDeque<CompletedProcess>,
    completed_capacity: usize,
}

impl ProcessTracker {
    /// Create a tracker retaining at most `completed_capacity` completed
    /// processes.
    pub fn new(completed_capacity: usize) -> Self {
        Self {
            tracked: BTreeMap::new(),
            completed: VecDeque::new(),
            completed_capacity,
        }
    }

    /// Fold one poll of the process table into the tracked and completed
    /// sets, returning how many processes completed this tick.
    ///
    /// A pid that reappears after completing starts over as a brand-new
    /// tracked process.
    #[instrument(skip(self, readings), fields(readings = readings.len()), name = "Updating tracker")]
    pub fn update(&mut self, readings: &[ProcessReading], now: DateTime<Utc>) -> usize {
        let mut seen = HashSet::with_capacity(readings.len());
        let mut started = 0usize;

        for reading in readings {
            seen.insert(reading.pid);
            match self.tracked.get_mut(&reading.pid) {
                Some(existing) => existing.observe(reading, now),
                None => {
                    trace!(pid = reading.pid, name = %reading.name, "tracking new process");
                    let process = TrackedProcess::first_seen(reading, now);
                    self.tracked.insert(reading.pid, process);
                    started += 1;
                }
            }
        }

        let gone: Vec<u32> = self
            .tracked
            .keys()
            .filter(|pid| !seen.contains(pid))
            .copied()
            .collect();

        for pid in &gone {
            if let Some(process) = self.tracked.remove(pid) {
                trace!(pid, name = %process.name, "process completed");
                self.push_completed(CompletedProcess {
                    process,
                    ended_at: now,
                });
            }
        }

        debug!(
            started,
            completed = gone.len(),
            tracked = self.tracked.len(),
            retained_completed = self.completed.len(),
            "tracker updated"
        );
        crate::metrics::record_tracker(self.tracked.len(), self.completed.len());

        gone.len()
    }

    fn push_completed(&mut self, completed: CompletedProcess) {
        self.completed.push_back(completed);
        while self.completed.len() > self.completed_capacity {
            self.completed.pop_front();
        }
    }

    /// Currently tracked processes, ordered by pid.
    pub fn tracked(&self) -> impl ExactSizeIterator<Item = &TrackedProcess> {
        self.tracked.values()
    }

    /// The tracked entry for `pid`, if any.
    pub fn get(&self, pid: u32) -> Option<&TrackedProcess> {
        self.tracked.get(&pid)
    }

    /// Completed processes in detection order, oldest first.
    pub fn completed(&self) -> &VecDeque<CompletedProcess> {
        &self.completed
    }

    /// A serializable view of both sets for persistence.
    pub fn view(&self) -> TrackerView<'_> {
        TrackerView {
            completed: &self.completed,
            tracked: &self.tracked,
        }
    }
}

/// Borrowed view of a [`ProcessTracker`], serialized as
/// `{"completed": [...], "tracked": [...]}`.
#[derive(Debug, Serialize)]
pub struct TrackerView<'a> {
    completed: &'a VecDeque<CompletedProcess>,
    #[serde(serialize_with = "values_as_seq")]
    tracked: &'a BTreeMap<u32, TrackedProcess>,
}

fn values_as_seq<S: Serializer>(
    map: &&BTreeMap<u32, TrackedProcess>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(map.values())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn reading(pid: u32, cpu: f64, mem: f64) -> ProcessReading {
        ProcessReading {
            pid,
            parent_pid: 1,
            name: "test-process".to_owned(),
            cpu_percent: cpu,
            mem_percent: mem,
            started_at: t(-60),
            state: ProcessState::Running,
        }
    }

    /// A pid may only appear in both sets when the tracked entry is a later
    /// lifecycle that started after the completion.
    fn assert_disjoint(tracker: &ProcessTracker) {
        for done in tracker.completed() {
            if let Some(live) = tracker.get(done.process.pid) {
                assert!(
                    live.first_seen_at > done.ended_at,
                    "pid {} is tracked and completed in the same lifecycle",
                    done.process.pid
                );
            }
        }
    }

    #[test]
    fn tracks_then_completes() {
        let mut tracker = ProcessTracker::new(100);

        tracker.update(&[reading(1234, 10.5, 2.3)], t(0));
        let tracked: Vec<_> = tracker.tracked().collect();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].pid, 1234);
        assert_eq!(tracked[0].first_seen_at, t(0));
        assert_eq!(tracked[0].last_seen_at, t(0));
        assert_eq!(tracked[0].peak_cpu_percent, 10.5);
        assert_eq!(tracked[0].peak_mem_percent, 2.3);
        assert!(tracker.completed().is_empty());

        let completed = tracker.update(&[], t(1));
        assert_eq!(completed, 1);
        assert_eq!(tracker.tracked().len(), 0);
        assert_eq!(tracker.completed().len(), 1);
        assert_eq!(tracker.completed()[0].process.pid, 1234);
        assert_eq!(tracker.completed()[0].ended_at, t(1));
    }

    #[test]
    fn peaks_never_decrease() {
        let mut tracker = ProcessTracker::new(100);
        let samples = [(5.0, 1.0), (20.0, 0.5), (3.0, 4.0), (f64::NAN, 2.0), (1.0, 1.0)];

        let mut last = (f64::MIN, f64::MIN);
        for (i, (cpu, mem)) in samples.into_iter().enumerate() {
            tracker.update(&[reading(7, cpu, mem)], t(i as i64));
            let p = tracker.get(7).unwrap();
            assert!(p.peak_cpu_percent >= last.0);
            assert!(p.peak_mem_percent >= last.1);
            last = (p.peak_cpu_percent, p.peak_mem_percent);
        }
        assert_eq!(last, (20.0, 4.0));
        assert_eq!(tracker.get(7).unwrap().first_seen_at, t(0));
        assert_eq!(tracker.get(7).unwrap().last_seen_at, t(4));
    }

    #[test]
    fn continuously_present_pid_never_completes() {
        let mut tracker = ProcessTracker::new(100);
        for i in 0..10 {
            assert_eq!(tracker.update(&[reading(42, 1.0, 1.0)], t(i)), 0);
        }
        assert!(tracker.completed().is_empty());
        assert_eq!(tracker.tracked().len(), 1);
    }

    #[test]
    fn reused_pid_is_a_new_process() {
        let mut tracker = ProcessTracker::new(100);
        tracker.update(&[reading(9, 50.0, 10.0)], t(0));
        tracker.update(&[], t(1));
        tracker.update(&[reading(9, 1.0, 1.0)], t(2));

        let fresh = tracker.get(9).unwrap();
        assert_eq!(fresh.first_seen_at, t(2));
        assert_eq!(fresh.peak_cpu_percent, 1.0);
        assert_eq!(tracker.completed().len(), 1);
        assert_eq!(tracker.completed()[0].process.peak_cpu_percent, 50.0);
        assert_disjoint(&tracker);

        tracker.update(&[], t(3));
        assert_eq!(tracker.completed().len(), 2);
        assert_eq!(tracker.completed()[1].ended_at, t(3));
    }

    #[test]
    fn tracked_and_completed_stay_disjoint() {
        let mut tracker = ProcessTracker::new(100);
        let polls: [&[u32]; 5] = [&[1, 2, 3], &[2, 3, 4], &[4], &[1, 4, 5], &[]];
        for (i, pids) in polls.iter().enumerate() {
            let readings: Vec<_> = pids.iter().map(|&pid| reading(pid, 1.0, 1.0)).collect();
            tracker.update(&readings, t(i as i64));
            assert_disjoint(&tracker);
        }
        let ended: Vec<_> = tracker.completed().iter().map(|c| c.process.pid).collect();
        assert_eq!(ended, [1, 2, 3, 1, 4, 5]);
    }

    #[test]
    fn completed_list_is_bounded_fifo() {
        let mut tracker = ProcessTracker::new(2);
        for pid in 1..=4 {
            tracker.update(&[reading(pid, 1.0, 1.0)], t(pid as i64 * 2));
            tracker.update(&[], t(pid as i64 * 2 + 1));
        }
        let ended: Vec<_> = tracker.completed().iter().map(|c| c.process.pid).collect();
        assert_eq!(ended, [3, 4]);
    }

    #[test]
    fn view_serializes_both_keys_as_arrays() {
        let mut tracker = ProcessTracker::new(10);
        let empty = serde_json::to_value(tracker.view()).unwrap();
        assert_eq!(empty, serde_json::json!({"completed": [], "tracked": []}));

        tracker.update(&[reading(1234, 10.5, 2.3)], t(0));
        tracker.update(&[reading(77, 0.0, 0.0)], t(1));
        let value = serde_json::to_value(tracker.view()).unwrap();

        assert_eq!(value["tracked"][0]["pid"], 77);
        assert_eq!(value["tracked"][0]["lastState"], "running");
        assert_eq!(value["completed"][0]["pid"], 1234);
        assert_eq!(value["completed"][0]["peakCpuPercent"], 10.5);
        assert!(value["completed"][0]["endedAt"].is_string());
    }

    #[test]
    fn non_finite_first_reading_survives_a_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let sink = crate::SnapshotSink::new(dir.path().join("proc-tracer-data.json"));
        let mut tracker = ProcessTracker::new(10);

        tracker.update(&[reading(5, f64::NAN, f64::INFINITY)], t(0));
        tracker.update(&[reading(6, f64::NEG_INFINITY, 3.0)], t(1));
        sink.write(&tracker.view()).unwrap();

        let back: crate::TracerSnapshot = crate::read_snapshot(sink.path()).unwrap();
        assert_eq!(back.completed.len(), 1);
        assert_eq!(back.completed[0].process.peak_cpu_percent, 0.0);
        assert_eq!(back.completed[0].process.peak_mem_percent, 0.0);
        assert_eq!(back.tracked[0].peak_cpu_percent, 0.0);
        assert_eq!(back.tracked[0].peak_mem_percent, 3.0);
    }
}
