//! Detection engine
//!
//! [`ProvenanceDetector`] owns the channels and exposes the four entry
//! points. None of them return an
//! error: anything that goes wrong inside degrades to "no evidence".

use crate::binary::{BinaryTextScanner, FastBinaryScanner};
use crate::c2pa::ManifestSniffer;
use crate::config::DetectorConfig;
use crate::detector::Detector;
use crate::dispatcher::Dispatcher;
use crate::exif::MetadataTagExtractor;
use crate::xmp::{embedded_packet, XmpTextScanner};
use bytes::Bytes;
use provscan_core::{BufferPool, DetectionResult, Evidence, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Entry point used for a scan, for metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Sequential,
    Concurrent,
    Fast,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Sequential => "sequential",
            ScanMode::Concurrent => "concurrent",
            ScanMode::Fast => "fast",
        }
    }
}

/// AI-provenance detector over the four evidence channels
#[derive(Clone)]
pub struct ProvenanceDetector {
    dispatcher: Dispatcher,
    fast: Arc<FastBinaryScanner>,
}

impl ProvenanceDetector {
    /// Build the engine with the standard channel order c2pa, exif, binary, xmp
    pub fn new(config: DetectorConfig) -> Self {
        let pool = Arc::new(BufferPool::new(
            config.buffer_pool.max_capacity,
            config.buffer_pool.max_buffers,
        ));

        let channels: Vec<Arc<dyn Detector>> = vec![
            Arc::new(ManifestSniffer::new()),
            Arc::new(MetadataTagExtractor::new()),
            Arc::new(
                BinaryTextScanner::new(Arc::clone(&pool))
                    .with_scan_offset(config.binary_scan_offset)
                    .with_generic_terms(config.generic_terms),
            ),
            Arc::new(XmpTextScanner::new().with_generic_terms(config.generic_terms)),
        ];

        let fast = FastBinaryScanner::new(Arc::clone(&pool))
            .with_scan_offset(config.binary_scan_offset)
            .with_min_size(config.fast_min_size);

        info!(
            deadline_ms = config.concurrent_deadline_ms,
            generic_terms = config.generic_terms,
            "provenance detector ready"
        );

        Self {
            dispatcher: Dispatcher::new(channels, config.deadline()),
            fast: Arc::new(fast),
        }
    }

    /// Build the engine around a custom dispatcher (alternate or mock channels)
    pub fn with_dispatcher(config: DetectorConfig, dispatcher: Dispatcher) -> Self {
        let mut engine = Self::new(config);
        engine.dispatcher = dispatcher;
        engine
    }

    /// Read a file and run the channels sequentially
    ///
    /// An XMP packet embedded in the file feeds the xmp channel and the c2pa
    /// vendor refinement. An unreadable file is a no-match.
    pub fn detect(&self, path: impl AsRef<Path>) -> DetectionResult {
        let path = path.as_ref();
        let start = Instant::now();

        let evidence = match Evidence::from_path(path) {
            Ok(evidence) => with_embedded_xmp(evidence),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "input unreadable, treating as no evidence");
                let result = DetectionResult::none();
                record(ScanMode::Sequential, &result, start);
                return result;
            }
        };

        let result = self.dispatcher.run_sequential(&evidence);
        record(ScanMode::Sequential, &result, start);
        result
    }

    /// Run the channels sequentially over caller-supplied bytes
    pub fn detect_from_bytes(&self, image: impl Into<Bytes>, xmp: Option<Bytes>) -> DetectionResult {
        let start = Instant::now();
        let evidence = Evidence::new(image).with_optional_xmp(xmp);
        let result = self.dispatcher.run_sequential(&evidence);
        record(ScanMode::Sequential, &result, start);
        result
    }

    /// High-confidence-only binary scan
    ///
    /// Buffers under the configured minimum size (1024 bytes by default) are
    /// never inspected.
    pub fn detect_fast(&self, image: &[u8]) -> DetectionResult {
        let start = Instant::now();
        let result = self.fast.inspect(image).into_result();
        record(ScanMode::Fast, &result, start);
        result
    }

    /// Run all channels in parallel, waiting at most the configured deadline
    pub async fn detect_concurrent(&self, image: impl Into<Bytes>, xmp: Option<Bytes>) -> DetectionResult {
        self.try_detect_concurrent(image, xmp)
            .await
            .unwrap_or_else(|_| DetectionResult::none())
    }

    /// Like [`Self::detect_concurrent`], but an expired deadline comes back as
    /// [`provscan_core::Error::Timeout`] so callers can count it
    pub async fn try_detect_concurrent(
        &self,
        image: impl Into<Bytes>,
        xmp: Option<Bytes>,
    ) -> Result<DetectionResult> {
        let start = Instant::now();
        let evidence = Evidence::new(image).with_optional_xmp(xmp);
        let outcome = self.dispatcher.try_run_concurrent(evidence).await;

        let result = outcome.as_ref().cloned().unwrap_or_else(|_| DetectionResult::none());
        record(ScanMode::Concurrent, &result, start);
        outcome
    }
}

impl Default for ProvenanceDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

/// Fill in the XMP packet from the image itself when none was supplied
fn with_embedded_xmp(mut evidence: Evidence) -> Evidence {
    if evidence.xmp.is_none() {
        evidence.xmp = embedded_packet(&evidence.image).map(|packet| evidence.image.slice_ref(packet));
    }
    evidence
}

fn record(mode: ScanMode, result: &DetectionResult, start: Instant) {
    metrics::counter!("provscan_scans_total", "mode" => mode.as_str()).increment(1);
    metrics::histogram!("provscan_scan_latency_us", "mode" => mode.as_str())
        .record(start.elapsed().as_micros() as f64);
    if let Some(method) = result.method {
        metrics::counter!("provscan_detections_total", "method" => method.as_str()).increment(1);
    }
}
