//! Per-tick sampling with failures isolated to the channel that produced
//! them.

use crate::{
    CpuLoad, DiskIoRates, FilesystemUsage, MemoryInfo, NetworkInterfaceInfo, ProcessList,
    TelemetryProvider, error::SampleError,
};
use std::fmt;
use tracing::{debug, instrument, warn};

/// One metric category a provider call feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Processes,
    Cpu,
    Memory,
    Network,
    Disk,
    DiskSize,
}

impl ChannelKind {
    /// The five channels kept by the stats collector, in snapshot order.
    pub const STATS: [ChannelKind; 5] = [
        ChannelKind::Cpu,
        ChannelKind::Memory,
        ChannelKind::Network,
        ChannelKind::Disk,
        ChannelKind::DiskSize,
    ];

    /// The key this channel uses in snapshots, logs and metric labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Processes => "processes",
            ChannelKind::Cpu => "cpu",
            ChannelKind::Memory => "memory",
            ChannelKind::Network => "network",
            ChannelKind::Disk => "disk",
            ChannelKind::DiskSize => "diskSize",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readings for the stats channels taken during one tick. A `None` field
/// means that channel's provider call failed this tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsBundle {
    pub cpu: Option<CpuLoad>,
    pub memory: Option<MemoryInfo>,
    pub network: Option<Vec<NetworkInterfaceInfo>>,
    pub disk: Option<DiskIoRates>,
    pub disk_size: Option<Vec<FilesystemUsage>>,
}

impl StatsBundle {
    /// Channels with no reading in this bundle.
    pub fn missing(&self) -> Vec<ChannelKind> {
        let present = [
            self.cpu.is_some(),
            self.memory.is_some(),
            self.network.is_some(),
            self.disk.is_some(),
            self.disk_size.is_some(),
        ];
        ChannelKind::STATS
            .into_iter()
            .zip(present)
            .filter_map(|(channel, present)| (!present).then_some(channel))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Calls the injected [`TelemetryProvider`] for a tick and normalizes the
/// results. A failing call is logged and counted, then dropped; it never
/// fails the tick. Non-finite rates and loads are read as zero.
pub struct Sampler {
    provider: Box<dyn TelemetryProvider>,
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler").finish_non_exhaustive()
    }
}

impl Sampler {
    pub fn new(provider: impl TelemetryProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
        }
    }

    /// Sample the process table, or `None` if the provider call failed.
    #[instrument(skip(self), name = "Sampling processes")]
    pub async fn processes(&mut self) -> Option<ProcessList> {
        let list = settle(ChannelKind::Processes, self.provider.processes().await)?;
        debug!(
            all = list.all,
            running = list.running,
            sleeping = list.sleeping,
            blocked = list.blocked,
            unknown = list.unknown,
            "sampled process table"
        );
        Some(list)
    }

    /// Sample every stats channel. Each call is made regardless of how the
    /// previous ones went.
    #[instrument(skip(self), name = "Sampling stats")]
    pub async fn stats(&mut self) -> StatsBundle {
        let bundle = StatsBundle {
            cpu: settle(ChannelKind::Cpu, self.provider.current_load().await).map(CpuLoad::finite),
            memory: settle(ChannelKind::Memory, self.provider.mem().await),
            network: settle(ChannelKind::Network, self.provider.network_stats().await)
                .map(|ifaces| ifaces.into_iter().map(NetworkInterfaceInfo::finite).collect()),
            disk: settle(ChannelKind::Disk, self.provider.fs_stats().await).map(DiskIoRates::finite),
            disk_size: settle(ChannelKind::DiskSize, self.provider.fs_size().await)
                .map(|fs| fs.into_iter().map(FilesystemUsage::finite).collect()),
        };

        if !bundle.is_complete() {
            debug!(missing = ?bundle.missing(), "partial stats sample");
        }
        bundle
    }
}

fn settle<T>(channel: ChannelKind, result: Result<T, SampleError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(%channel, %error, "sample failed, skipping channel this tick");
            crate::metrics::record_sample_failure(channel);
            None
        }
    }
}
