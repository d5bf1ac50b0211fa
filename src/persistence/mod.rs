//! Durable storage for windows.
//!
//! - The cache holds the open window so a restart can pick it up again
//! - The flusher writes each finished window to its own file

pub mod cache;
pub mod flusher;
pub mod ownership;

pub use cache::CachePersister;
pub use flusher::{WindowFlusher, MAX_COLLISION_SUFFIX};
pub use ownership::Ownership;
