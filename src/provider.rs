//! The telemetry provider seam and its `sysinfo` backed implementation.

use crate::{
    CoreLoad, CpuLoad, DiskIoRates, FilesystemUsage, MemoryInfo, NetworkInterfaceInfo,
    ProcessList, ProcessReading, ProcessState, error::SampleError, readings::finite_or_zero,
    sampler::ChannelKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use sysinfo::{Disks, Networks, ProcessStatus, ProcessesToUpdate, System};
use tracing::{Span, instrument, trace};

/// Source of point-in-time platform readings.
///
/// Every call is independently fallible. Implementations are owned by a
/// single [`Sampler`](crate::Sampler), so they may keep state between calls
/// (e.g. to turn cumulative counters into rates).
#[async_trait]
pub trait TelemetryProvider: Send {
    /// The full process table.
    async fn processes(&mut self) -> Result<ProcessList, SampleError>;

    /// System-wide and per-core CPU load.
    async fn current_load(&mut self) -> Result<CpuLoad, SampleError>;

    /// Memory and swap totals.
    async fn mem(&mut self) -> Result<MemoryInfo, SampleError>;

    /// Counters for every network interface.
    async fn network_stats(&mut self) -> Result<Vec<NetworkInterfaceInfo>, SampleError>;

    /// Aggregate disk I/O throughput.
    async fn fs_stats(&mut self) -> Result<DiskIoRates, SampleError>;

    /// Capacity of every mounted filesystem.
    async fn fs_size(&mut self) -> Result<Vec<FilesystemUsage>, SampleError>;
}

/// [`TelemetryProvider`] reading the local host through `sysinfo`.
///
/// CPU usage and I/O rates are deltas between refreshes, so the first
/// reading of each reports zero usage. Refreshing reads `/proc` (or the
/// platform equivalent) synchronously and can take tens of milliseconds on a
/// busy host, so every call runs on tokio's blocking pool.
pub struct SysinfoProvider {
    host: Arc<Mutex<Host>>,
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SysinfoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoProvider").finish_non_exhaustive()
    }
}

impl SysinfoProvider {
    pub fn new() -> Self {
        Self {
            host: Arc::new(Mutex::new(Host::new())),
        }
    }

    /// Run `read` against the sysinfo state on the blocking pool, inside the
    /// caller's span.
    async fn on_host<T, F>(&self, channel: ChannelKind, read: F) -> Result<T, SampleError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Host) -> Result<T, SampleError> + Send + 'static,
    {
        let host = Arc::clone(&self.host);
        let span = Span::current();
        tokio::task::spawn_blocking(move || {
            let _guard = span.enter();
            let mut host = host
                .lock()
                .map_err(|_| SampleError::unavailable(channel, "sysinfo state poisoned"))?;
            read(&mut host)
        })
        .await
        .map_err(|e| SampleError::unavailable(channel, format!("sysinfo task failed: {e}")))?
    }
}

/// The sysinfo handles a [`SysinfoProvider`] refreshes between calls.
struct Host {
    system: System,
    networks: Networks,
    disks: Disks,

    last_network_refresh: Instant,
    last_disk_refresh: Instant,
    /// Set by `fs_stats`, consumed by the `fs_size` that follows it in the
    /// same tick.
    disks_fresh: bool,
}

impl Host {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            system: System::new(),
            networks: Networks::new_with_refreshed_list(),
            disks: Disks::new_with_refreshed_list(),
            last_network_refresh: now,
            last_disk_refresh: now,
            disks_fresh: false,
        }
    }

    fn refresh_disks(&mut self) -> f64 {
        self.disks.refresh(true);
        let elapsed = self.last_disk_refresh.elapsed().as_secs_f64();
        self.last_disk_refresh = Instant::now();
        elapsed
    }

    fn processes(&mut self) -> Result<ProcessList, SampleError> {
        self.system.refresh_memory();
        self.system.refresh_processes(ProcessesToUpdate::All, true);

        trace!("Refreshed process table");

        let total_memory = self.system.total_memory();
        let list: Vec<_> = self
            .system
            .processes()
            .values()
            .map(|process| ProcessReading {
                pid: process.pid().as_u32(),
                parent_pid: process.parent().map_or(0, |parent| parent.as_u32()),
                name: process.name().to_string_lossy().into_owned(),
                cpu_percent: finite_or_zero(process.cpu_usage() as f64),
                mem_percent: if total_memory > 0 {
                    process.memory() as f64 / total_memory as f64 * 100.0
                } else {
                    0.0
                },
                started_at: DateTime::<Utc>::from_timestamp(process.start_time() as i64, 0)
                    .unwrap_or_default(),
                state: process_state(process.status()),
            })
            .collect();

        if list.is_empty() {
            return Err(SampleError::unavailable(
                ChannelKind::Processes,
                "process table is empty",
            ));
        }

        Ok(ProcessList::from_readings(list))
    }

    fn current_load(&mut self) -> Result<CpuLoad, SampleError> {
        self.system.refresh_cpu_all();

        let cpus: Vec<_> = self
            .system
            .cpus()
            .iter()
            .map(|cpu| CoreLoad {
                name: cpu.name().to_owned(),
                load: finite_or_zero(cpu.cpu_usage() as f64),
                frequency_mhz: cpu.frequency(),
            })
            .collect();

        if cpus.is_empty() {
            return Err(SampleError::unavailable(ChannelKind::Cpu, "no cpus reported"));
        }

        let current_load = finite_or_zero(self.system.global_cpu_usage() as f64);
        Ok(CpuLoad {
            avg_load: finite_or_zero(System::load_average().one),
            current_load,
            current_load_idle: (100.0 - current_load).max(0.0),
            cpus,
        })
    }

    fn mem(&mut self) -> Result<MemoryInfo, SampleError> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(SampleError::unavailable(
                ChannelKind::Memory,
                "total memory reported as zero",
            ));
        }

        Ok(MemoryInfo {
            total,
            free: self.system.free_memory(),
            used: self.system.used_memory(),
            available: self.system.available_memory(),
            swap_total: self.system.total_swap(),
            swap_used: self.system.used_swap(),
            swap_free: self.system.free_swap(),
        })
    }

    fn network_stats(&mut self) -> Vec<NetworkInterfaceInfo> {
        self.networks.refresh(true);
        let elapsed = self.last_network_refresh.elapsed().as_secs_f64();
        self.last_network_refresh = Instant::now();

        let mut interfaces: Vec<_> = self
            .networks
            .iter()
            .map(|(iface, data)| NetworkInterfaceInfo {
                iface: iface.clone(),
                rx_bytes: data.total_received(),
                tx_bytes: data.total_transmitted(),
                rx_sec: per_sec(data.received(), elapsed),
                tx_sec: per_sec(data.transmitted(), elapsed),
                rx_errors: data.total_errors_on_received(),
                tx_errors: data.total_errors_on_transmitted(),
            })
            .collect();
        interfaces.sort_by(|a, b| a.iface.cmp(&b.iface));
        interfaces
    }

    fn fs_stats(&mut self) -> Result<DiskIoRates, SampleError> {
        let elapsed = self.refresh_disks();
        self.disks_fresh = true;

        if self.disks.list().is_empty() {
            return Err(SampleError::unavailable(ChannelKind::Disk, "no disks reported"));
        }

        let (read, written, total_read, total_written) = self.disks.list().iter().fold(
            (0u64, 0u64, 0u64, 0u64),
            |(read, written, total_read, total_written), disk| {
                let usage = disk.usage();
                (
                    read.saturating_add(usage.read_bytes),
                    written.saturating_add(usage.written_bytes),
                    total_read.saturating_add(usage.total_read_bytes),
                    total_written.saturating_add(usage.total_written_bytes),
                )
            },
        );

        Ok(DiskIoRates {
            read_bytes: total_read,
            written_bytes: total_written,
            read_sec: per_sec(read, elapsed),
            write_sec: per_sec(written, elapsed),
            total_sec: per_sec(read.saturating_add(written), elapsed),
        })
    }

    fn fs_size(&mut self) -> Vec<FilesystemUsage> {
        if !std::mem::take(&mut self.disks_fresh) {
            self.refresh_disks();
        }

        self.disks
            .list()
            .iter()
            .map(|disk| {
                let size = disk.total_space();
                let available = disk.available_space();
                let used = size.saturating_sub(available);
                FilesystemUsage {
                    fs: disk.name().to_string_lossy().into_owned(),
                    fs_type: disk.file_system().to_string_lossy().into_owned(),
                    size,
                    used,
                    available,
                    use_percent: if size > 0 {
                        used as f64 / size as f64 * 100.0
                    } else {
                        0.0
                    },
                    mount: disk.mount_point().display().to_string(),
                    rw: !disk.is_read_only(),
                }
            })
            .collect()
    }
}

fn per_sec(bytes: u64, elapsed: f64) -> f64 {
    if elapsed > 0.0 {
        bytes as f64 / elapsed
    } else {
        0.0
    }
}

fn process_state(status: ProcessStatus) -> ProcessState {
    match status {
        ProcessStatus::Run | ProcessStatus::Waking => ProcessState::Running,
        ProcessStatus::Sleep | ProcessStatus::Parked => ProcessState::Sleeping,
        ProcessStatus::UninterruptibleDiskSleep | ProcessStatus::LockBlocked => {
            ProcessState::Blocked
        }
        ProcessStatus::Stop | ProcessStatus::Tracing => ProcessState::Stopped,
        ProcessStatus::Zombie | ProcessStatus::Dead => ProcessState::Zombie,
        ProcessStatus::Idle => ProcessState::Idle,
        _ => ProcessState::Unknown,
    }
}

#[async_trait]
impl TelemetryProvider for SysinfoProvider {
    #[instrument(skip(self), name = "sysinfo processes")]
    async fn processes(&mut self) -> Result<ProcessList, SampleError> {
        self.on_host(ChannelKind::Processes, Host::processes).await
    }

    #[instrument(skip(self), name = "sysinfo current_load")]
    async fn current_load(&mut self) -> Result<CpuLoad, SampleError> {
        self.on_host(ChannelKind::Cpu, Host::current_load).await
    }

    #[instrument(skip(self), name = "sysinfo mem")]
    async fn mem(&mut self) -> Result<MemoryInfo, SampleError> {
        self.on_host(ChannelKind::Memory, Host::mem).await
    }

    #[instrument(skip(self), name = "sysinfo network_stats")]
    async fn network_stats(&mut self) -> Result<Vec<NetworkInterfaceInfo>, SampleError> {
        self.on_host(ChannelKind::Network, |host| Ok(host.network_stats()))
            .await
    }

    #[instrument(skip(self), name = "sysinfo fs_stats")]
    async fn fs_stats(&mut self) -> Result<DiskIoRates, SampleError> {
        self.on_host(ChannelKind::Disk, Host::fs_stats).await
    }

    #[instrument(skip(self), name = "sysinfo fs_size")]
    async fn fs_size(&mut self) -> Result<Vec<FilesystemUsage>, SampleError> {
        self.on_host(ChannelKind::DiskSize, |host| Ok(host.fs_size()))
            .await
    }
}
