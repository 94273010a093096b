//! provscan Telemetry
//!
//! Scan counters and metric descriptions for the provscan detectors.
//!
//! Provides:
//! - An in-process [`MetricsCollector`] with atomic counters and snapshots
//! - Descriptions for the `metrics` facade series the engine emits

pub mod collector;

pub use collector::{describe_metrics, MetricsCollector, MetricsSnapshot};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::collector::{MetricsCollector, MetricsSnapshot};
}
