//! Crash-recovery cache for the open window.
//!
//! The cache file always holds exactly one encoded window. It is rewritten
//! in place (truncate, rewind, write, sync) and read back once at startup.

use crate::core::codec;
use crate::core::window::WindowState;
use crate::error::{CacheStage, FatalError, RecoveryError};
use std::fs::{DirBuilder, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

/// Permission bits for the cache directory.
const CACHE_DIR_MODE: u32 = 0o700;

/// Permission bits for the cache file.
const CACHE_FILE_MODE: u32 = 0o600;

/// Owns the open cache file handle.
pub struct CachePersister {
    path: PathBuf,
    file: File,
}

impl CachePersister {
    /// Open (creating if needed) the cache file and its parent directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FatalError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            DirBuilder::new()
                .recursive(true)
                .mode(CACHE_DIR_MODE)
                .create(parent)
                .map_err(|source| FatalError::CacheSetup {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(CACHE_FILE_MODE)
            .open(&path)
            .map_err(|source| FatalError::CacheSetup {
                path: path.clone(),
                source,
            })?;

        Ok(Self { path, file })
    }

    /// Load the cached window, or start a fresh one if the cache is unusable.
    pub fn recover(&mut self) -> WindowState {
        match self.read_snapshot() {
            Ok(state) => {
                tracing::info!(
                    path = %self.path.display(),
                    total = state.total(),
                    start = %state.start_time(),
                    "Resumed partial window from cache"
                );
                state
            }
            Err(e) => {
                tracing::info!(
                    path = %self.path.display(),
                    "Could not parse cache on startup; starting with empty state"
                );
                tracing::debug!(error = %e, "Cache parse error");
                WindowState::new()
            }
        }
    }

    fn read_snapshot(&mut self) -> Result<WindowState, RecoveryError> {
        self.file.seek(SeekFrom::Start(0))?;

        let mut content = Vec::new();
        self.file.read_to_end(&mut content)?;

        let state = codec::decode(&content)?;
        if !state.is_open() {
            return Err(RecoveryError::Finalized);
        }
        Ok(state)
    }

    /// Replace the cache content with `state`.
    ///
    /// The window is encoded before the file is touched, so an encoding
    /// failure leaves the previous snapshot intact.
    pub fn write(&mut self, state: &WindowState) -> Result<(), FatalError> {
        let bytes = codec::encode(state).map_err(FatalError::CacheEncode)?;

        self.file
            .set_len(0)
            .map_err(|source| self.write_error(CacheStage::Truncate, source))?;

        // set_len does not move the cursor.
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|source| self.write_error(CacheStage::Seek, source))?;

        self.file
            .write_all(&bytes)
            .map_err(|source| self.write_error(CacheStage::Write, source))?;

        self.file
            .sync_data()
            .map_err(|source| self.write_error(CacheStage::Sync, source))?;

        Ok(())
    }

    fn write_error(&self, stage: CacheStage, source: std::io::Error) -> FatalError {
        FatalError::CacheWrite {
            stage,
            path: self.path.clone(),
            source,
        }
    }

    /// Path of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache").join("partial_map.json");

        let cache = CachePersister::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cache.path(), path.as_path());
    }

    #[test]
    fn test_empty_cache_recovers_fresh_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = CachePersister::open(dir.path().join("partial_map.json")).unwrap();

        let state = cache.recover();
        assert!(state.is_empty());
        assert!(state.is_open());
    }

    #[test]
    fn test_malformed_cache_recovers_fresh_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial_map.json");
        fs::write(&path, b"{\"start_ts\": 12, oops").unwrap();

        let state = CachePersister::open(&path).unwrap().recover();
        assert!(state.is_empty());
    }

    #[test]
    fn test_finalized_cache_recovers_fresh_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial_map.json");

        let mut window = WindowState::new();
        window.record("a");
        let finalized = window.finalize(chrono::Utc::now());
        fs::write(&path, codec::encode(finalized.state()).unwrap()).unwrap();

        let state = CachePersister::open(&path).unwrap().recover();
        assert!(state.is_empty());
        assert!(state.is_open());
    }

    #[test]
    fn test_write_then_recover() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial_map.json");

        let mut window = WindowState::new();
        window.record("x");
        window.record("x");

        let mut cache = CachePersister::open(&path).unwrap();
        cache.write(&window).unwrap();
        drop(cache);

        let recovered = CachePersister::open(&path).unwrap().recover();
        assert_eq!(recovered, window);
    }

    #[test]
    fn test_failed_truncate_is_fatal() {
        // /dev/full cannot be truncated. Never recover from it: reads never end.
        let mut cache = CachePersister::open("/dev/full").unwrap();

        let err = cache.write(&WindowState::new()).unwrap_err();
        assert!(matches!(
            err,
            FatalError::CacheWrite {
                stage: CacheStage::Truncate,
                ..
            }
        ));
    }

    #[test]
    fn test_shorter_rewrite_leaves_no_trailing_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = CachePersister::open(dir.path().join("partial_map.json")).unwrap();

        let mut long = WindowState::new();
        for token in ["KeyA", "KeyB", "KeyC", "KeyD", "KeyE"] {
            long.record(token);
        }
        cache.write(&long).unwrap();

        let short = WindowState::new();
        cache.write(&short).unwrap();

        let on_disk = fs::read(cache.path()).unwrap();
        assert_eq!(codec::decode(&on_disk).unwrap(), short);
        assert_eq!(cache.recover(), short);
    }
}
