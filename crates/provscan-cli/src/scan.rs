//! Per-file scanning for the CLI

use bytes::Bytes;
use clap::ValueEnum;
use provscan_core::{DetectionResult, Error};
use provscan_detectors::ProvenanceDetector;
use provscan_telemetry::MetricsCollector;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Which engine entry point to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Channels one after another, first match wins
    Sequential,
    /// All channels in parallel under the deadline
    Concurrent,
    /// High-confidence binary phrases only
    Fast,
}

/// One output line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub path: PathBuf,
    pub result: DetectionResult,
}

/// Scans files with one engine and accounts for every verdict
pub struct Scanner {
    engine: ProvenanceDetector,
    mode: Mode,
    xmp: Option<Bytes>,
    metrics: MetricsCollector,
}

impl Scanner {
    pub fn new(engine: ProvenanceDetector, mode: Mode, xmp: Option<Bytes>) -> Self {
        Self {
            engine,
            mode,
            xmp,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Scan one file; an unreadable file is reported as no-match
    pub async fn scan(&self, path: &Path) -> ScanReport {
        let start = Instant::now();
        let result = self.verdict(path).await;
        self.metrics
            .record_scan(&result, start.elapsed().as_micros() as u64);

        debug!(path = %path.display(), matched = result.matched, "scanned");
        ScanReport {
            path: path.to_path_buf(),
            result,
        }
    }

    async fn verdict(&self, path: &Path) -> DetectionResult {
        // The path entry point reads the file itself and finds embedded XMP.
        if self.mode == Mode::Sequential && self.xmp.is_none() {
            return self.engine.detect(path);
        }

        let image = match std::fs::read(path) {
            Ok(image) => image,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "input unreadable, treating as no evidence");
                return DetectionResult::none();
            }
        };

        match self.mode {
            Mode::Sequential => self.engine.detect_from_bytes(image, self.xmp.clone()),
            Mode::Fast => self.engine.detect_fast(&image),
            Mode::Concurrent => match self.engine.try_detect_concurrent(image, self.xmp.clone()).await {
                Ok(result) => result,
                Err(Error::Timeout) => {
                    self.metrics.record_deadline_expired();
                    DetectionResult::none()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "concurrent scan failed");
                    DetectionResult::none()
                }
            },
        }
    }
}
