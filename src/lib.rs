//! Keypress Collector - crash-safe keypress frequency windows.
//!
//! This library reads key-press tokens from a named pipe, counts them into
//! fixed-capacity windows and writes every full window to its own immutable
//! file. The open window is periodically snapshotted to a cache file so a
//! crash or restart loses at most the tokens since the last snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Keypress Collector                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │    FIFO     │──▶│   Reader    │──▶│ Aggregator  │         │
//! │  │  (tokens)   │   │  (thread)   │   │ (control    │         │
//! │  └─────────────┘   └─────────────┘   │    loop)    │         │
//! │                                      └─────────────┘         │
//! │                              timer tick │       │ full       │
//! │                                         ▼       ▼            │
//! │                              ┌─────────────┐ ┌─────────────┐ │
//! │                              │    Cache    │ │   Window    │ │
//! │                              │  Persister  │ │   Flusher   │ │
//! │                              └─────────────┘ └─────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use keypress_collector::{Aggregator, CachePersister, Ownership, WindowFlusher};
//! use std::num::NonZeroU64;
//!
//! let mut cache = CachePersister::open("/tmp/keypress/partial_map.json").unwrap();
//! let flusher = WindowFlusher::prepare("/tmp/keypress/windows", Ownership::new(0o440)).unwrap();
//! let capacity = NonZeroU64::new(100_000).unwrap();
//!
//! let mut aggregator = Aggregator::new(capacity, cache.recover(), flusher);
//! aggregator.apply("KeyA").unwrap();
//! aggregator.persist_if_dirty(&mut cache).unwrap();
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod error;
pub mod persistence;
pub mod runtime;
pub mod stats;

// Re-export key types at crate root for convenience
pub use collector::{FifoChannel, Token, TokenSource};
pub use config::{Config, ConfigError};
pub use crate::core::{Aggregator, FinalizedWindow, WindowState};
pub use error::{CodecError, FatalError};
pub use persistence::{CachePersister, Ownership, WindowFlusher};
pub use runtime::{Runtime, ShutdownReason};
pub use stats::{CollectorStats, SharedStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
