//! provscan Core
//!
//! Core types and utilities shared across the provscan crates.
//!
//! This crate provides:
//! - The detection verdict and evidence input types
//! - Error types and result handling
//! - The scratch buffer pool used by the byte scanners

pub mod buffer;
pub mod error;
pub mod types;

pub use buffer::{BufferPool, PooledBuffer};
pub use error::{Error, Result};
pub use types::{ChannelOutcome, DetectionMethod, DetectionResult, Evidence};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::buffer::BufferPool;
    pub use crate::error::{Error, Result};
    pub use crate::types::{ChannelOutcome, DetectionMethod, DetectionResult, Evidence};
}
