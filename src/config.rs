//! Configuration for the keypress collector.

use serde::Serialize;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Smallest accepted cache write interval.
pub const MIN_CACHE_WRITE_INTERVAL: Duration = Duration::from_secs(5);

/// Largest accepted permission value (setuid/setgid/sticky plus rwx bits).
const MAX_MODE: u32 = 0o7777;

/// Immutable configuration, built once at startup and passed to every
/// component constructor.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// How many keypresses to accumulate before a window is closed
    pub max_keypresses_per_window: u64,

    /// Path of the named pipe tokens arrive on
    pub fifo_path: PathBuf,

    /// Group to assign to the named pipe
    pub fifo_group: Option<String>,

    /// Permission bits for the named pipe
    pub fifo_mode: u32,

    /// Snapshot of the open window, rewritten in place
    pub cache_file_path: PathBuf,

    /// How often the snapshot is rewritten (when dirty)
    #[serde(with = "duration_serde")]
    pub cache_write_interval: Duration,

    /// Directory finished windows are written into
    pub destination_dir_path: PathBuf,

    /// Group to assign to the destination directory and window files
    pub destination_dir_group: Option<String>,

    /// Permission bits for window files
    pub destination_dir_mode: u32,

    /// Capacity of the hand-off queue between the reader and the control loop
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_keypresses_per_window: 100_000,
            fifo_path: PathBuf::from("/run/kmonad-keylogger.sock"),
            fifo_group: None,
            fifo_mode: 0o620,
            cache_file_path: PathBuf::from("/var/cache/kmonad-keylogger/partial_map.json"),
            cache_write_interval: Duration::from_secs(30),
            destination_dir_path: PathBuf::from("/var/local/kmonad-keylogger"),
            destination_dir_group: None,
            destination_dir_mode: 0o440,
            queue_capacity: 1024,
        }
    }
}

impl Config {
    /// Check every option that has a constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_write_interval < MIN_CACHE_WRITE_INTERVAL {
            return Err(ConfigError::IntervalBelowFloor {
                interval: self.cache_write_interval,
                floor: MIN_CACHE_WRITE_INTERVAL,
            });
        }

        self.window_capacity()?;

        if self.queue_capacity == 0 {
            return Err(ConfigError::QueueCapacity);
        }

        for mode in [self.fifo_mode, self.destination_dir_mode] {
            if mode > MAX_MODE {
                return Err(ConfigError::InvalidMode {
                    value: format!("{mode:o}"),
                });
            }
        }

        Ok(())
    }

    /// Window capacity as a non-zero count.
    pub fn window_capacity(&self) -> Result<NonZeroU64, ConfigError> {
        NonZeroU64::new(self.max_keypresses_per_window).ok_or(ConfigError::CapacityTooSmall {
            value: self.max_keypresses_per_window,
        })
    }
}

/// Parse a permission value written in octal (`0620`, `620` or `0o620`).
pub fn parse_mode(s: &str) -> Result<u32, ConfigError> {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);

    let mode = u32::from_str_radix(digits, 8).map_err(|_| ConfigError::InvalidMode {
        value: s.to_string(),
    })?;

    if mode > MAX_MODE {
        return Err(ConfigError::InvalidMode {
            value: s.to_string(),
        });
    }

    Ok(mode)
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max keypresses per window must be a positive integer, got {value}")]
    CapacityTooSmall { value: u64 },

    #[error("cache write interval {interval:?} is below the {floor:?} floor")]
    IntervalBelowFloor { interval: Duration, floor: Duration },

    #[error("queue capacity must be at least 1")]
    QueueCapacity,

    #[error("invalid file mode '{value}', expected octal permission bits")]
    InvalidMode { value: String },
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }
}
