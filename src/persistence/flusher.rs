//! Writes finished windows as immutable files.
//!
//! Each window becomes `{start}_to_{end}.json` (Unix seconds) in the
//! destination directory. Files are created exclusively and never reopened.
//! When two windows share the same second boundaries the later one is
//! written as `{start}_to_{end}_{n}.json`.

use crate::core::codec::{self, FILE_EXTENSION};
use crate::core::window::FinalizedWindow;
use crate::error::FatalError;
use crate::persistence::Ownership;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// How many numbered alternatives are tried before a collision is fatal.
pub const MAX_COLLISION_SUFFIX: u32 = 64;

/// Writes finished windows into the destination directory.
#[derive(Debug, Clone)]
pub struct WindowFlusher {
    dir: PathBuf,
    ownership: Ownership,
}

impl WindowFlusher {
    /// Make sure the destination directory exists and carries the
    /// configured group.
    pub fn prepare(dir: impl Into<PathBuf>, ownership: Ownership) -> Result<Self, FatalError> {
        let dir = dir.into();

        fs::create_dir_all(&dir).map_err(|source| FatalError::DestinationSetup {
            path: dir.clone(),
            source,
        })?;
        ownership.apply_group(&dir)?;

        Ok(Self { dir, ownership })
    }

    /// File name for a window without collision suffix.
    pub fn file_name(window: &FinalizedWindow) -> String {
        format!("{}.{FILE_EXTENSION}", Self::file_stem(window))
    }

    fn file_stem(window: &FinalizedWindow) -> String {
        format!(
            "{}_to_{}",
            window.start_time().timestamp(),
            window.end_time().timestamp()
        )
    }

    /// Write `window` to a new file and return its path.
    pub fn flush(&self, window: &FinalizedWindow) -> Result<PathBuf, FatalError> {
        let bytes = codec::encode(window.state()).map_err(FatalError::FlushEncode)?;
        let stem = Self::file_stem(window);

        for attempt in 0..=MAX_COLLISION_SUFFIX {
            let name = if attempt == 0 {
                format!("{stem}.{FILE_EXTENSION}")
            } else {
                format!("{stem}_{attempt}.{FILE_EXTENSION}")
            };
            let path = self.dir.join(name);

            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(self.ownership.mode())
                .open(&path)
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::warn!(file = %path.display(), "Window file already exists; trying next name");
                    continue;
                }
                Err(source) => return Err(FatalError::Flush { path, source }),
            };

            file.write_all(&bytes)
                .and_then(|()| file.sync_data())
                .map_err(|source| FatalError::Flush {
                    path: path.clone(),
                    source,
                })?;
            self.ownership.apply(&path)?;

            tracing::info!(
                file = %path.display(),
                total = window.total(),
                "Wrote full window"
            );
            return Ok(path);
        }

        Err(FatalError::FlushCollision {
            dir: self.dir.clone(),
            stem,
        })
    }

    /// Destination directory for window files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
