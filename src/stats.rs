//! Collection statistics for the current session.
//!
//! Counts what the collector did, never what was typed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for one process lifetime.
#[derive(Debug)]
pub struct CollectorStats {
    /// Number of tokens counted into a window
    tokens_ingested: AtomicU64,
    /// Number of windows written to the destination directory
    windows_flushed: AtomicU64,
    /// Number of cache rewrites
    snapshots_written: AtomicU64,
    /// Number of timer ticks with nothing to write
    idle_ticks: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
}

impl CollectorStats {
    /// Start counting from zero now.
    pub fn new() -> Self {
        Self {
            tokens_ingested: AtomicU64::new(0),
            windows_flushed: AtomicU64::new(0),
            snapshots_written: AtomicU64::new(0),
            idle_ticks: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    /// Record a counted token.
    pub fn record_token(&self) {
        self.tokens_ingested.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a window written to disk.
    pub fn record_window_flushed(&self) {
        self.windows_flushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache rewrite.
    pub fn record_snapshot_written(&self) {
        self.snapshots_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tick that found nothing to write.
    pub fn record_idle_tick(&self) {
        self.idle_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            tokens_ingested: self.tokens_ingested.load(Ordering::Relaxed),
            windows_flushed: self.windows_flushed.load(Ordering::Relaxed),
            snapshots_written: self.snapshots_written.load(Ordering::Relaxed),
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Tokens ingested: {}\n\
             - Windows flushed: {}\n\
             - Cache snapshots written: {}\n\
             - Idle cache ticks: {}\n\
             - Session duration: {} seconds",
            stats.tokens_ingested,
            stats.windows_flushed,
            stats.snapshots_written,
            stats.idle_ticks,
            stats.session_duration_secs
        )
    }
}

impl Default for CollectorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub tokens_ingested: u64,
    pub windows_flushed: u64,
    pub snapshots_written: u64,
    pub idle_ticks: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Statistics shared between the control loop and `main`.
pub type SharedStats = Arc<CollectorStats>;

/// Create a new shared statistics instance.
pub fn create_shared_stats() -> SharedStats {
    Arc::new(CollectorStats::new())
}
