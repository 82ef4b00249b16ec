//! Run both workers against the local host until Ctrl-C.
//!
//! ```sh
//! cargo run --example run_workers -- proc-stats.toml
//! ```
//!
//! The config path is optional. Snapshots land in `proc-tracer-data.json`
//! and `stats-data.json` in the working directory unless configured
//! otherwise.

use proc_stats_workers::{Config, init_metrics, init_tracing, start_workers};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let provider = init_tracing(&config.log)?;
    if let Some(port) = config.metrics_port {
        let port = init_metrics(Some(port))?;
        info!(port, "prometheus exporter listening");
    }

    let mut workers = start_workers(&config);
    info!(
        tracer_output = %config.tracer.output_path.display(),
        collector_output = %config.collector.output_path.display(),
        "workers running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    workers.stop().await?;

    // Flush any buffered spans before exiting.
    if let Some(provider) = provider {
        provider.shutdown()?;
    }
    Ok(())
}
