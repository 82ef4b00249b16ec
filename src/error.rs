//! Error types for sampling, persistence, configuration and worker control.

use crate::sampler::ChannelKind;
use thiserror::Error;

/// A single telemetry provider call failed.
///
/// Scoped to one channel; the rest of the tick carries on without it.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("{channel} reading unavailable: {reason}")]
    Unavailable {
        channel: ChannelKind,
        reason: String,
    },

    #[error("{channel} provider call failed")]
    Io {
        channel: ChannelKind,
        #[source]
        source: std::io::Error,
    },
}

impl SampleError {
    /// Shorthand for [`SampleError::Unavailable`].
    pub fn unavailable(channel: ChannelKind, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            channel,
            reason: reason.into(),
        }
    }

    /// The channel whose reading failed.
    pub fn channel(&self) -> ChannelKind {
        match self {
            Self::Unavailable { channel, .. } | Self::Io { channel, .. } => *channel,
        }
    }
}

/// A snapshot could not be written (or read back).
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to encode snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to decode snapshot at {path}")]
    Deserialize {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot write task failed")]
    Blocking(#[source] tokio::task::JoinError),

    #[error("snapshot io error at {path}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration could not be loaded or is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] figment::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A worker task could not be stopped cleanly.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{worker} task failed to join")]
    Join {
        worker: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}
