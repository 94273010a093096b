//! Metrics collection and reporting

use provscan_core::{DetectionMethod, DetectionResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-process scan counters
///
/// Cheap to clone; clones share the same counters.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    total_scans: AtomicU64,
    detections: [AtomicU64; 4],
    deadline_expired: AtomicU64,
    total_latency_us: AtomicU64,
}

fn slot(method: DetectionMethod) -> usize {
    match method {
        DetectionMethod::C2pa => 0,
        DetectionMethod::Exif => 1,
        DetectionMethod::Binary => 2,
        DetectionMethod::Xmp => 3,
    }
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                total_scans: AtomicU64::new(0),
                detections: Default::default(),
                deadline_expired: AtomicU64::new(0),
                total_latency_us: AtomicU64::new(0),
            }),
        }
    }

    /// Record one finished scan and its verdict
    pub fn record_scan(&self, result: &DetectionResult, latency_us: u64) {
        self.inner.total_scans.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
        if let Some(method) = result.method {
            self.inner.detections[slot(method)].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a concurrent scan that hit its deadline
    pub fn record_deadline_expired(&self) {
        self.inner.deadline_expired.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let detections = |m| self.inner.detections[slot(m)].load(Ordering::Relaxed);
        MetricsSnapshot {
            total_scans: self.inner.total_scans.load(Ordering::Relaxed),
            c2pa: detections(DetectionMethod::C2pa),
            exif: detections(DetectionMethod::Exif),
            binary: detections(DetectionMethod::Binary),
            xmp: detections(DetectionMethod::Xmp),
            deadline_expired: self.inner.deadline_expired.load(Ordering::Relaxed),
            total_latency_us: self.inner.total_latency_us.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub total_scans: u64,
    pub c2pa: u64,
    pub exif: u64,
    pub binary: u64,
    pub xmp: u64,
    pub deadline_expired: u64,
    pub total_latency_us: u64,
}

impl MetricsSnapshot {
    /// Scans that produced a match
    pub fn total_detections(&self) -> u64 {
        self.c2pa + self.exif + self.binary + self.xmp
    }

    /// Calculate average latency per scan
    pub fn avg_latency_us(&self) -> u64 {
        if self.total_scans == 0 {
            0
        } else {
            self.total_latency_us / self.total_scans
        }
    }

    /// Fraction of scans that produced a match
    pub fn detection_rate(&self) -> f64 {
        if self.total_scans == 0 {
            0.0
        } else {
            self.total_detections() as f64 / self.total_scans as f64
        }
    }
}

/// Register descriptions for every metric the detectors emit
///
/// Call once after installing a recorder.
pub fn describe_metrics() {
    metrics::describe_counter!("provscan_scans_total", "Total number of scans by entry point");
    metrics::describe_counter!(
        "provscan_detections_total",
        "Total number of positive verdicts by evidence channel"
    );
    metrics::describe_counter!(
        "provscan_deadline_expired_total",
        "Concurrent scans that returned no-match because the deadline passed"
    );
    metrics::describe_histogram!(
        "provscan_scan_latency_us",
        metrics::Unit::Microseconds,
        "Scan latency in microseconds by entry point"
    );
}
