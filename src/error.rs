//! Error types shared across the collector.
//!
//! Only [`FatalError`] crosses component boundaries. Every component returns
//! it instead of terminating the process, and `main` is the one place that
//! turns it into an exit status.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Failure to convert between a [`crate::core::WindowState`] and its bytes.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode window state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed window state: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("inconsistent window state: total is {total} but frequencies sum to {sum}")]
    Inconsistent { total: u64, sum: u64 },
}

/// Why the cache could not be turned back into a window at startup.
///
/// Never fatal: the caller falls back to an empty window.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("failed to read cache file: {0}")]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Decode(#[from] CodecError),
    #[error("cached window was already finalized")]
    Finalized,
}

/// The step of a cache rewrite that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStage {
    Truncate,
    Seek,
    Write,
    Sync,
}

impl fmt::Display for CacheStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            CacheStage::Truncate => "truncate",
            CacheStage::Seek => "seek",
            CacheStage::Write => "write",
            CacheStage::Sync => "sync",
        };
        f.write_str(stage)
    }
}

/// Conditions that end the process with a non-zero status.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to set up cache at {path}: {source}")]
    CacheSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode cache snapshot: {0}")]
    CacheEncode(#[source] CodecError),

    #[error("failed to {stage} cache file {path}: {source}")]
    CacheWrite {
        stage: CacheStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set up destination directory {path}: {source}")]
    DestinationSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode finished window: {0}")]
    FlushEncode(#[source] CodecError),

    #[error("failed to write window file {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no free file name left for window {stem} in {dir}")]
    FlushCollision { dir: PathBuf, stem: String },

    #[error("failed to bind event channel {path}: {reason}")]
    ChannelBind { path: PathBuf, reason: String },

    #[error("failed to open auxiliary writer for {path}: {source}")]
    AuxiliaryWriter {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to resolve group '{name}': {reason}")]
    Group { name: String, reason: String },

    #[error("failed to apply ownership to {path}: {source}")]
    Ownership {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install signal handler: {0}")]
    SignalHandler(#[from] ctrlc::Error),

    #[error("event channel closed")]
    SourceClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_write_message_names_stage() {
        let err = FatalError::CacheWrite {
            stage: CacheStage::Truncate,
            path: PathBuf::from("/tmp/partial_map.json"),
            source: std::io::Error::other("disk gone"),
        };
        let message = err.to_string();
        assert!(message.contains("truncate"));
        assert!(message.contains("partial_map.json"));
        assert!(message.contains("disk gone"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: FatalError = ConfigError::CapacityTooSmall { value: 0 }.into();
        assert!(matches!(err, FatalError::Config(_)));
    }
}
