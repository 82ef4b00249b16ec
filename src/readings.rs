//! Typed point-in-time readings produced by a
//! [`TelemetryProvider`](crate::TelemetryProvider).
//!
//! Readings are produced fresh each tick and are not retained themselves;
//! the tracker derives [`TrackedProcess`](crate::TrackedProcess) entries from
//! them and the aggregator wraps them in [`MetricReading`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform counters occasionally come back as NaN or infinite. JSON has no
/// encoding for those (`serde_json` writes `null`), so they are read as zero.
pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Scheduler state of a process as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Running,
    Sleeping,
    /// Uninterruptible wait, usually on disk I/O or a lock.
    Blocked,
    Stopped,
    Zombie,
    Idle,
    #[default]
    Unknown,
}

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReading {
    pub pid: u32,
    /// `0` when the process has no known parent.
    pub parent_pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub started_at: DateTime<Utc>,
    pub state: ProcessState,
}

/// The full process table at one instant, plus per-state counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessList {
    pub all: usize,
    pub running: usize,
    pub blocked: usize,
    pub sleeping: usize,
    pub unknown: usize,
    pub list: Vec<ProcessReading>,
}

impl ProcessList {
    /// Build a list and derive the state counters from its rows.
    pub fn from_readings(list: Vec<ProcessReading>) -> Self {
        let count = |state| list.iter().filter(|p| p.state == state).count();
        Self {
            all: list.len(),
            running: count(ProcessState::Running),
            blocked: count(ProcessState::Blocked),
            sleeping: count(ProcessState::Sleeping),
            unknown: count(ProcessState::Unknown),
            list,
        }
    }
}

/// Load of a single logical core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreLoad {
    pub name: String,
    /// Usage percentage, 0-100.
    pub load: f64,
    pub frequency_mhz: u64,
}

/// System-wide CPU load breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuLoad {
    /// One minute load average.
    pub avg_load: f64,
    pub current_load: f64,
    pub current_load_idle: f64,
    pub cpus: Vec<CoreLoad>,
}

impl CpuLoad {
    pub(crate) fn finite(mut self) -> Self {
        self.avg_load = finite_or_zero(self.avg_load);
        self.current_load = finite_or_zero(self.current_load);
        self.current_load_idle = finite_or_zero(self.current_load_idle);
        for core in &mut self.cpus {
            core.load = finite_or_zero(core.load);
        }
        self
    }
}

/// Memory and swap totals, in bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
}

/// Counters and rates for one network interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceInfo {
    pub iface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    /// Bytes per second received since the previous reading.
    pub rx_sec: f64,
    /// Bytes per second transmitted since the previous reading.
    pub tx_sec: f64,
    pub rx_errors: u64,
    pub tx_errors: u64,
}

impl NetworkInterfaceInfo {
    pub(crate) fn finite(mut self) -> Self {
        self.rx_sec = finite_or_zero(self.rx_sec);
        self.tx_sec = finite_or_zero(self.tx_sec);
        self
    }
}

/// Aggregate disk I/O throughput across all block devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskIoRates {
    pub read_bytes: u64,
    pub written_bytes: u64,
    pub read_sec: f64,
    pub write_sec: f64,
    pub total_sec: f64,
}

impl DiskIoRates {
    pub(crate) fn finite(mut self) -> Self {
        self.read_sec = finite_or_zero(self.read_sec);
        self.write_sec = finite_or_zero(self.write_sec);
        self.total_sec = finite_or_zero(self.total_sec);
        self
    }
}

/// Capacity of one mounted filesystem, in bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemUsage {
    pub fs: String,
    #[serde(rename = "type")]
    pub fs_type: String,
    pub size: u64,
    pub used: u64,
    pub available: u64,
    /// Used share of `size`, 0-100.
    pub use_percent: f64,
    pub mount: String,
    pub rw: bool,
}

impl FilesystemUsage {
    pub(crate) fn finite(mut self) -> Self {
        self.use_percent = finite_or_zero(self.use_percent);
        self
    }
}

/// A channel value stamped with the tick time it was recorded at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReading<T> {
    pub timestamp: DateTime<Utc>,
    pub value: T,
}

impl<T> MetricReading<T> {
    pub fn new(timestamp: DateTime<Utc>, value: T) -> Self {
        Self { timestamp, value }
    }
}
