//! Bounded per-channel histories. Read [`StatsAggregator`] first.

use crate::{
    CpuLoad, DiskIoRates, FilesystemUsage, MemoryInfo, MetricReading, NetworkInterfaceInfo,
    StatsBundle, sampler::ChannelKind,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, instrument};

/// An ordered, bounded history of readings for one channel.
///
/// Appends go to the back. When an append takes the history past its
/// capacity, entries are evicted from the front until it fits again.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Channel<T> {
    entries: VecDeque<MetricReading<T>>,
    #[serde(skip)]
    capacity: usize,
}

impl<T> Channel<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest entries past capacity.
    pub fn push(&mut self, reading: MetricReading<T>) {
        self.entries.push_back(reading);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &MetricReading<T>> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&MetricReading<T>> {
        self.entries.back()
    }
}

/// Owns the five channel histories of the stats collector.
///
/// Channels share a retention cap value but nothing else: each one appends
/// and evicts on its own, and a missing reading only skips its own channel.
///
/// Serializes as `{"cpu": [...], "memory": [...], "network": [...],
/// "disk": [...], "diskSize": [...]}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsAggregator {
    cpu: Channel<CpuLoad>,
    memory: Channel<MemoryInfo>,
    network: Channel<Vec<NetworkInterfaceInfo>>,
    disk: Channel<DiskIoRates>,
    disk_size: Channel<Vec<FilesystemUsage>>,
}

impl StatsAggregator {
    /// Create an aggregator keeping at most `retention` readings per channel.
    pub fn new(retention: usize) -> Self {
        Self {
            cpu: Channel::new(retention),
            memory: Channel::new(retention),
            network: Channel::new(retention),
            disk: Channel::new(retention),
            disk_size: Channel::new(retention),
        }
    }

    /// Append every reading present in `bundle`, stamped with `now`, and
    /// return the channels that were appended to.
    #[instrument(skip(self, bundle), name = "Recording stats")]
    pub fn record(&mut self, bundle: StatsBundle, now: DateTime<Utc>) -> Vec<ChannelKind> {
        let mut appended = Vec::with_capacity(ChannelKind::STATS.len());

        if let Some(cpu) = bundle.cpu {
            self.cpu.push(MetricReading::new(now, cpu));
            appended.push(ChannelKind::Cpu);
        }
        if let Some(memory) = bundle.memory {
            self.memory.push(MetricReading::new(now, memory));
            appended.push(ChannelKind::Memory);
        }
        if let Some(network) = bundle.network {
            self.network.push(MetricReading::new(now, network));
            appended.push(ChannelKind::Network);
        }
        if let Some(disk) = bundle.disk {
            self.disk.push(MetricReading::new(now, disk));
            appended.push(ChannelKind::Disk);
        }
        if let Some(disk_size) = bundle.disk_size {
            self.disk_size.push(MetricReading::new(now, disk_size));
            appended.push(ChannelKind::DiskSize);
        }

        for channel in ChannelKind::STATS {
            crate::metrics::record_channel_len(channel, self.len(channel));
        }
        debug!(?appended, "stats recorded");

        appended
    }

    /// Number of readings currently held for `channel`. Always zero for
    /// [`ChannelKind::Processes`], which this aggregator does not keep.
    pub fn len(&self, channel: ChannelKind) -> usize {
        match channel {
            ChannelKind::Cpu => self.cpu.len(),
            ChannelKind::Memory => self.memory.len(),
            ChannelKind::Network => self.network.len(),
            ChannelKind::Disk => self.disk.len(),
            ChannelKind::DiskSize => self.disk_size.len(),
            ChannelKind::Processes => 0,
        }
    }

    pub fn cpu(&self) -> &Channel<CpuLoad> {
        &self.cpu
    }

    pub fn memory(&self) -> &Channel<MemoryInfo> {
        &self.memory
    }

    pub fn network(&self) -> &Channel<Vec<NetworkInterfaceInfo>> {
        &self.network
    }

    pub fn disk(&self) -> &Channel<DiskIoRates> {
        &self.disk
    }

    pub fn disk_size(&self) -> &Channel<Vec<FilesystemUsage>> {
        &self.disk_size
    }
}
