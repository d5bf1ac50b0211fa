//! The windowing state machine.
//!
//! The aggregator owns the single open window. Each token is counted into
//! it, and once the window holds `capacity` tokens it is finalized, written
//! out through the [`WindowFlusher`] and replaced by a fresh window before
//! the next token is looked at.

use crate::core::window::WindowState;
use crate::error::FatalError;
use crate::persistence::{CachePersister, WindowFlusher};
use chrono::Utc;
use std::num::NonZeroU64;
use std::path::PathBuf;

/// Owns the open window and decides when it is complete.
pub struct Aggregator {
    /// Tokens per window
    capacity: NonZeroU64,
    /// The open window
    window: WindowState,
    /// Whether the window changed since the last cache write
    dirty: bool,
    /// Destination for finished windows
    flusher: WindowFlusher,
}

impl Aggregator {
    /// Create an aggregator that continues counting into `initial`.
    pub fn new(capacity: NonZeroU64, initial: WindowState, flusher: WindowFlusher) -> Self {
        Self {
            capacity,
            window: initial,
            dirty: false,
            flusher,
        }
    }

    /// Count one token.
    ///
    /// Returns the path of the window file when this token completed the
    /// window. A flush failure is returned before any further token is
    /// accepted. After a rotation the cache should be rewritten with
    /// [`Aggregator::persist_if_dirty`] before the next token.
    pub fn apply(&mut self, token: &str) -> Result<Option<PathBuf>, FatalError> {
        self.window.record(token);
        self.dirty = true;

        if self.window.total() >= self.capacity.get() {
            return self.rotate().map(Some);
        }

        Ok(None)
    }

    /// Finalize the open window, write it out and start a new one.
    fn rotate(&mut self) -> Result<PathBuf, FatalError> {
        let now = Utc::now();
        let finished =
            std::mem::replace(&mut self.window, WindowState::starting_at(now)).finalize(now);

        // The cache may still hold part of the finished window. It stays
        // dirty; callers persist right after a rotation.
        self.flusher.flush(&finished)
    }

    /// Write the open window to the cache if it changed since the last write.
    ///
    /// Returns whether a write happened.
    pub fn persist_if_dirty(&mut self, cache: &mut CachePersister) -> Result<bool, FatalError> {
        if !self.dirty {
            return Ok(false);
        }

        cache.write(&self.window)?;
        self.dirty = false;
        Ok(true)
    }

    /// Get the open window.
    pub fn state(&self) -> &WindowState {
        &self.window
    }

    /// Whether the open window differs from the last cache write.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Tokens per window.
    pub fn capacity(&self) -> NonZeroU64 {
        self.capacity
    }
}
