//! provscan Detectors
//!
//! Deterministic AI-provenance detection for images.
//!
//! Four independent evidence channels inspect an image, highest priority first:
//! - `c2pa`: content-credential manifest markers in the raw bytes
//! - `exif`: structured metadata tags, including UTF-16 comment fields
//! - `binary`: high-specificity phrases in the raw bytes
//! - `xmp`: the XMP packet text
//!
//! The [`Dispatcher`] runs them sequentially with short-circuit or all at once
//! under a deadline, and [`ProvenanceDetector`] wraps both behind the public
//! entry points.

pub mod binary;
pub mod c2pa;
pub mod config;
pub mod detector;
pub mod dispatcher;
pub mod engine;
pub mod exif;
pub mod patterns;
pub mod utf16;
pub mod xmp;

pub use binary::{BinaryTextScanner, FastBinaryScanner};
pub use c2pa::ManifestSniffer;
pub use config::{BufferPoolConfig, DetectorConfig};
pub use detector::Detector;
pub use dispatcher::Dispatcher;
pub use engine::{ProvenanceDetector, ScanMode};
pub use patterns::PatternLibrary;
pub use xmp::XmpTextScanner;

// `exif` alone would also name the kamadak-exif crate
pub use crate::exif::MetadataTagExtractor;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::DetectorConfig;
    pub use crate::detector::Detector;
    pub use crate::dispatcher::Dispatcher;
    pub use crate::engine::ProvenanceDetector;
    pub use provscan_core::prelude::*;
}
