//! Core functionality for the keypress collector.
//!
//! This module contains:
//! - The window counting structure
//! - The JSON codec used for the cache and window files
//! - The aggregator state machine that rotates full windows

pub mod aggregator;
pub mod codec;
pub mod window;

// Re-export commonly used types
pub use aggregator::Aggregator;
pub use codec::FILE_EXTENSION;
pub use window::{FinalizedWindow, WindowState};
