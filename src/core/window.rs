//! The counting structure for one window of keypresses.
//!
//! A window is open from creation until [`WindowState::finalize`] consumes it
//! and hands back a [`FinalizedWindow`], which only exposes read access. The
//! type split keeps finished windows from ever being counted into again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counts for the window currently being filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    /// When the window started
    #[serde(rename = "start_ts")]
    start_time: DateTime<Utc>,

    /// When the window ended; `None` while the window is open
    #[serde(rename = "end_ts", default, with = "end_time_serde")]
    end_time: Option<DateTime<Utc>>,

    /// Sum of all values in `frequencies`
    total: u64,

    /// How often each token was seen
    frequencies: HashMap<String, u64>,
}

impl WindowState {
    /// Create an empty window starting now.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create an empty window starting at the given time.
    pub fn starting_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time: None,
            total: 0,
            frequencies: HashMap::new(),
        }
    }

    /// Count one occurrence of `token`.
    pub fn record(&mut self, token: &str) {
        debug_assert!(self.is_open(), "recorded into a finalized window");

        match self.frequencies.get_mut(token) {
            Some(count) => *count += 1,
            None => {
                self.frequencies.insert(token.to_owned(), 1);
            }
        }
        self.total += 1;
    }

    /// Stamp the end time and freeze the window.
    pub fn finalize(mut self, end_time: DateTime<Utc>) -> FinalizedWindow {
        self.end_time = Some(end_time);
        FinalizedWindow(self)
    }

    /// Whether the window still accepts tokens.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// When the window started.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// When the window ended, `None` while open.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Number of tokens recorded into this window.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// How often `token` was recorded. Unknown tokens count as zero.
    pub fn count(&self, token: &str) -> u64 {
        self.frequencies.get(token).copied().unwrap_or(0)
    }

    /// Per-token counts.
    pub fn frequencies(&self) -> &HashMap<String, u64> {
        &self.frequencies
    }

    /// Whether no token has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Sum of the per-token counts, `None` on overflow.
    pub(crate) fn frequency_sum(&self) -> Option<u64> {
        self.frequencies
            .values()
            .try_fold(0u64, |acc, count| acc.checked_add(*count))
    }
}

impl Default for WindowState {
    fn default() -> Self {
        Self::new()
    }
}

/// A window whose end time has been stamped. Read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedWindow(WindowState);

impl FinalizedWindow {
    /// Get the underlying window.
    pub fn state(&self) -> &WindowState {
        &self.0
    }

    /// When the window started.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.0.start_time
    }

    /// When the window was finalized.
    pub fn end_time(&self) -> DateTime<Utc> {
        // Only `WindowState::finalize` builds this type, and it always sets the end.
        self.0.end_time.unwrap_or(self.0.start_time)
    }

    /// Number of tokens in the window.
    pub fn total(&self) -> u64 {
        self.0.total
    }
}

/// Serde support for the optional end time.
///
/// Older caches mark an open window with the zero time
/// `0001-01-01T00:00:00Z` instead of `null`; both decode as `None`.
mod end_time_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Unix seconds of `0001-01-01T00:00:00Z`.
    const ZERO_TIME_SECS: i64 = -62_135_596_800;

    pub fn serialize<S>(end: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        end.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let end = Option::<DateTime<Utc>>::deserialize(deserializer)?;
        Ok(end.filter(|t| t.timestamp() != ZERO_TIME_SECS))
    }
}
