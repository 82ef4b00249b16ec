#![allow(dead_code)]
//! A scriptable telemetry provider for driving workers in tests.

use async_trait::async_trait;
use proc_stats_workers::{
    ChannelKind, CpuLoad, DiskIoRates, FilesystemUsage, MemoryInfo, NetworkInterfaceInfo,
    ProcessList, ProcessReading, SampleError, TelemetryProvider,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const GIB: u64 = 1024 * 1024 * 1024;
pub const MIB: u64 = 1024 * 1024;

#[derive(Debug, Default)]
struct Inner {
    processes: Vec<ProcessReading>,
    failing: HashSet<ChannelKind>,
    calls: HashMap<ChannelKind, usize>,
}

/// Fake provider. Clones share state, so a test can keep one clone to
/// change the process table or make channels fail while a worker owns the
/// other.
#[derive(Debug, Clone, Default)]
pub struct FakeProvider {
    inner: Arc<Mutex<Inner>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the process table returned from now on.
    pub fn set_processes(&self, processes: Vec<ProcessReading>) {
        self.inner.lock().unwrap().processes = processes;
    }

    pub fn set_fail(&self, channel: ChannelKind, fail: bool) {
        let mut inner = self.inner.lock().unwrap();
        if fail {
            inner.failing.insert(channel);
        } else {
            inner.failing.remove(&channel);
        }
    }

    pub fn calls(&self, channel: ChannelKind) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .get(&channel)
            .copied()
            .unwrap_or(0)
    }

    fn call<T>(&self, channel: ChannelKind, ok: impl FnOnce(&Inner) -> T) -> Result<T, SampleError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.calls.entry(channel).or_default() += 1;
        if inner.failing.contains(&channel) {
            return Err(SampleError::unavailable(
                channel,
                "fake provider configured to fail",
            ));
        }
        Ok(ok(&inner))
    }
}

pub fn cpu_load() -> CpuLoad {
    CpuLoad {
        avg_load: 0.0,
        current_load: 45.5,
        current_load_idle: 54.5,
        cpus: vec![],
    }
}

pub fn memory() -> MemoryInfo {
    MemoryInfo {
        total: 16 * GIB,
        free: 4 * GIB,
        used: 12 * GIB,
        available: 8 * GIB,
        swap_total: 0,
        swap_used: 0,
        swap_free: 0,
    }
}

pub fn network() -> Vec<NetworkInterfaceInfo> {
    vec![NetworkInterfaceInfo {
        iface: "eth0".to_owned(),
        rx_bytes: MIB,
        tx_bytes: 512 * 1024,
        rx_sec: MIB as f64,
        tx_sec: (512 * 1024) as f64,
        rx_errors: 0,
        tx_errors: 0,
    }]
}

pub fn disk_io() -> DiskIoRates {
    DiskIoRates {
        read_bytes: 0,
        written_bytes: 0,
        read_sec: (2 * MIB) as f64,
        write_sec: MIB as f64,
        total_sec: (3 * MIB) as f64,
    }
}

pub fn disk_size() -> Vec<FilesystemUsage> {
    vec![FilesystemUsage {
        fs: "/dev/sda1".to_owned(),
        fs_type: "ext4".to_owned(),
        size: 500 * GIB,
        used: 300 * GIB,
        available: 200 * GIB,
        use_percent: 60.0,
        mount: "/".to_owned(),
        rw: true,
    }]
}

#[async_trait]
impl TelemetryProvider for FakeProvider {
    async fn processes(&mut self) -> Result<ProcessList, SampleError> {
        self.call(ChannelKind::Processes, |inner| {
            ProcessList::from_readings(inner.processes.clone())
        })
    }

    async fn current_load(&mut self) -> Result<CpuLoad, SampleError> {
        self.call(ChannelKind::Cpu, |_| cpu_load())
    }

    async fn mem(&mut self) -> Result<MemoryInfo, SampleError> {
        self.call(ChannelKind::Memory, |_| memory())
    }

    async fn network_stats(&mut self) -> Result<Vec<NetworkInterfaceInfo>, SampleError> {
        self.call(ChannelKind::Network, |_| network())
    }

    async fn fs_stats(&mut self) -> Result<DiskIoRates, SampleError> {
        self.call(ChannelKind::Disk, |_| disk_io())
    }

    async fn fs_size(&mut self) -> Result<Vec<FilesystemUsage>, SampleError> {
        self.call(ChannelKind::DiskSize, |_| disk_size())
    }
}
