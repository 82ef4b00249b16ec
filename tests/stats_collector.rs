mod helpers;

use helpers::fake_provider::{FakeProvider, GIB};
use proc_stats_workers::{
    ChannelKind, CollectorConfig, StatsCollectorWorker, StatsSnapshot, read_snapshot,
};
use std::time::Duration;
use tempfile::TempDir;

fn config(dir: &TempDir, retention: usize) -> CollectorConfig {
    CollectorConfig {
        interval_ms: 1000,
        output_path: dir.path().join("stats-data.json"),
        retention,
    }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn first_tick_fills_every_channel() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, 60);
    let provider = FakeProvider::new();

    let mut worker = StatsCollectorWorker::stats_collector(provider.clone(), &config);
    worker.start();
    advance(500).await;
    worker.stop().await.unwrap();

    for channel in ChannelKind::STATS {
        assert_eq!(provider.calls(channel), 1, "{channel}");
    }

    let raw = std::fs::read_to_string(&config.output_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 5);
    for key in ["cpu", "memory", "network", "disk", "diskSize"] {
        assert_eq!(object[key].as_array().map(Vec::len), Some(1), "{key}");
    }

    let snapshot: StatsSnapshot = read_snapshot(&config.output_path).unwrap();
    let memory = &snapshot.memory[0].value;
    assert_eq!(memory.total, 16 * GIB);
    assert_eq!(memory.used, 12 * GIB);
    assert_eq!(memory.available, 8 * GIB);
    assert_eq!(snapshot.network[0].value[0].iface, "eth0");
    assert_eq!(snapshot.disk_size[0].value[0].mount, "/");
    assert_eq!(snapshot.cpu[0].value.current_load, 45.5);
}

#[tokio::test(start_paused = true)]
async fn failing_channel_leaves_others_appending() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, 60);
    let provider = FakeProvider::new();
    provider.set_fail(ChannelKind::Memory, true);

    let mut worker = StatsCollectorWorker::stats_collector(provider.clone(), &config);
    worker.start();
    advance(2500).await;

    let partial: StatsSnapshot = read_snapshot(&config.output_path).unwrap();
    assert!(partial.memory.is_empty());
    assert_eq!(partial.cpu.len(), 3);
    assert_eq!(partial.network.len(), 3);
    assert_eq!(partial.disk.len(), 3);
    assert_eq!(partial.disk_size.len(), 3);

    provider.set_fail(ChannelKind::Memory, false);
    advance(1000).await;
    worker.stop().await.unwrap();

    let recovered: StatsSnapshot = read_snapshot(&config.output_path).unwrap();
    assert_eq!(recovered.memory.len(), 1);
    assert_eq!(recovered.cpu.len(), 4);
    assert_eq!(
        recovered.memory[0].timestamp,
        recovered.cpu[3].timestamp,
        "a recovered channel is stamped with the tick it was sampled in"
    );
}

#[tokio::test(start_paused = true)]
async fn histories_are_capped_at_retention() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, 3);
    let provider = FakeProvider::new();

    let mut worker = StatsCollectorWorker::stats_collector(provider.clone(), &config);
    worker.start();
    advance(4500).await;
    worker.stop().await.unwrap();

    assert_eq!(provider.calls(ChannelKind::Cpu), 5);

    let collector = worker.pipeline().unwrap();
    for channel in ChannelKind::STATS {
        assert_eq!(collector.stats().len(channel), 3, "{channel}");
    }

    let snapshot: StatsSnapshot = read_snapshot(&config.output_path).unwrap();
    assert_eq!(snapshot.cpu.len(), 3);
    assert!(
        snapshot
            .cpu
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp),
        "readings stay in append order"
    );
}
