//! Measurement Ring Buffer
//!
//! Fixed-capacity, pre-allocated storage with a single write cursor. Slots
//! are overwritten in place; nothing is allocated per write.

mod buffer;

pub use buffer::{RingBuffer, RingStats, DEFAULT_CAPACITY};

use thiserror::Error;

/// Ring buffer construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("Ring buffer capacity must be at least 1")]
    ZeroCapacity,
}
