//! Snapshot persistence. Writes go through a temporary file in the
//! destination directory and are renamed into place, so a reader sees either
//! the previous snapshot or the new one, never a partial document.

use crate::{
    CompletedProcess, CpuLoad, DiskIoRates, FilesystemUsage, MemoryInfo, MetricReading,
    NetworkInterfaceInfo, TrackedProcess, error::PersistError,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Writes whole-state snapshots to a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotSink {
    path: PathBuf,
}

impl SnapshotSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn io_err(&self, source: std::io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Serialize `state` and atomically replace the file at [`Self::path`].
    ///
    /// On error the previous snapshot, if any, is left untouched. This does
    /// blocking file I/O; inside a tick use [`Self::persist`].
    pub fn write<T: Serialize + ?Sized>(&self, state: &T) -> Result<usize, PersistError> {
        let encoded = serde_json::to_vec(state)?;
        self.replace(&encoded)
    }

    /// Like [`Self::write`], but the file work (create, fsync, rename) runs
    /// on tokio's blocking pool so it does not stall the runtime thread.
    /// Encoding happens up front, on the caller's task.
    pub async fn persist<T: Serialize + ?Sized>(&self, state: &T) -> Result<usize, PersistError> {
        let encoded = serde_json::to_vec(state)?;
        let sink = self.clone();
        tokio::task::spawn_blocking(move || sink.replace(&encoded))
            .await
            .map_err(PersistError::Blocking)?
    }

    #[instrument(skip_all, fields(path = %self.path.display()), name = "Writing snapshot")]
    fn replace(&self, encoded: &[u8]) -> Result<usize, PersistError> {
        let dir = self.dir();
        std::fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(encoded).map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;

        debug!(bytes = encoded.len(), "snapshot written");
        Ok(encoded.len())
    }
}

/// Read and decode a snapshot file written by a [`SnapshotSink`].
pub fn read_snapshot<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, PersistError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| PersistError::Deserialize {
        path: path.to_path_buf(),
        source,
    })
}

/// Owned form of the process tracer's output file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TracerSnapshot {
    pub completed: Vec<CompletedProcess>,
    pub tracked: Vec<TrackedProcess>,
}

/// Owned form of the stats collector's output file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub cpu: Vec<MetricReading<CpuLoad>>,
    pub memory: Vec<MetricReading<MemoryInfo>>,
    pub network: Vec<MetricReading<Vec<NetworkInterfaceInfo>>>,
    pub disk: Vec<MetricReading<DiskIoRates>>,
    pub disk_size: Vec<MetricReading<Vec<FilesystemUsage>>>,
}
