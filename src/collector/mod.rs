//! Token ingestion for the keypress collector.
//!
//! Tokens arrive one per line on a named pipe. A reader thread hands them to
//! the control loop through a bounded queue, preserving arrival order.

pub mod fifo;
pub mod source;

// Re-export commonly used types
pub use fifo::FifoChannel;
pub use source::{Token, TokenSource};
