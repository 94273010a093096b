//! Binary-text scanner (channel "binary")
//!
//! Treats the raw image bytes as text and looks for high-specificity
//! phrases: full tool names, full parameter keywords and Midjourney flags.
//! Short or generic terms are left out because opaque compressed payloads
//! produce them by chance.
//!
//! Non-PNG buffers skip their first 1000 bytes, where container headers
//! generate noise. PNG text chunks sit right after the signature, so PNGs are
//! scanned from byte 8.

use crate::detector::Detector;
use crate::patterns::{is_png, provider, PatternLibrary, PhraseMatch, PhraseSet, PNG_SIGNATURE};
use provscan_core::{BufferPool, ChannelOutcome, DetectionMethod, Evidence, Result};
use std::sync::Arc;
use tracing::debug;

/// Bytes skipped at the start of non-PNG buffers
pub const DEFAULT_SCAN_OFFSET: usize = 1000;

/// Buffers smaller than this are never inspected by the fast path
pub const DEFAULT_FAST_MIN_SIZE: usize = 1024;

/// Where phrase scanning begins for `image`
///
/// The offset only applies when the buffer is longer than it.
pub fn scan_start(image: &[u8], offset: usize) -> usize {
    if is_png(image) {
        PNG_SIGNATURE.len()
    } else if image.len() > offset {
        offset
    } else {
        0
    }
}

/// Lower-case `image[start..]` into a pooled scratch buffer and run `f` on it
fn with_lowered<T>(pool: &BufferPool, image: &[u8], start: usize, f: impl FnOnce(&[u8]) -> T) -> T {
    let mut buf = pool.acquire();
    buf.extend(image[start..].iter().map(u8::to_ascii_lowercase));
    f(buf.as_slice())
}

/// Full binary-text detector
pub struct BinaryTextScanner {
    patterns: &'static PatternLibrary,
    pool: Arc<BufferPool>,
    scan_offset: usize,
    generic_terms: bool,
}

impl BinaryTextScanner {
    /// Create a scanner with the default offset and generic terms disabled
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self {
            patterns: PatternLibrary::global(),
            pool,
            scan_offset: DEFAULT_SCAN_OFFSET,
            generic_terms: false,
        }
    }

    /// Override the non-PNG scan offset
    pub fn with_scan_offset(mut self, offset: usize) -> Self {
        self.scan_offset = offset;
        self
    }

    /// Also match broad "AI generated" style terms (higher false-positive rate)
    pub fn with_generic_terms(mut self, enabled: bool) -> Self {
        self.generic_terms = enabled;
        self
    }

    /// Scan raw image bytes
    pub fn inspect(&self, image: &[u8]) -> ChannelOutcome {
        let p = self.patterns;
        let start = scan_start(image, self.scan_offset);

        let (phrase, generic) = with_lowered(&self.pool, image, start, |lowered| {
            let phrase = p.binary_phrases.first_in_order(lowered);
            let generic = if phrase.is_none() && self.generic_terms {
                p.generic_terms.first_in_order(lowered)
            } else {
                None
            };
            (phrase, generic)
        });

        if let Some(hit) = phrase {
            return phrase_outcome(hit, start);
        }

        // UTF-16 keys are searched over the whole buffer, offset or not.
        if let Some(hit) = p.binary_utf16_keys.find(image) {
            return ChannelOutcome::matched(
                provider::SDXL,
                DetectionMethod::Binary,
                format!("{} parameter key \"{}\" in raw bytes", hit.endian.label(), hit.keyword),
            );
        }

        match generic {
            Some(hit) => ChannelOutcome::matched(
                hit.provider,
                DetectionMethod::Binary,
                format!("generic AI term \"{}\" in raw bytes", hit.phrase),
            ),
            None => ChannelOutcome::no_match(),
        }
    }
}

fn phrase_outcome(hit: PhraseMatch, start: usize) -> ChannelOutcome {
    debug!(phrase = hit.phrase, provider = hit.provider, start, "binary phrase hit");
    ChannelOutcome::matched(
        hit.provider,
        DetectionMethod::Binary,
        format!("phrase \"{}\" in raw bytes (scanned from offset {})", hit.phrase, start),
    )
}

impl Detector for BinaryTextScanner {
    fn scan(&self, evidence: &Evidence) -> Result<ChannelOutcome> {
        Ok(self.inspect(&evidence.image))
    }

    fn name(&self) -> &str {
        "binary-text-scanner"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::Binary
    }
}

/// Latency-first variant of [`BinaryTextScanner`]
///
/// Uses only the smallest, highest-confidence phrase set, has no UTF-16 pass
/// and ignores buffers under `min_size` bytes entirely. Misses more than the
/// full scanner.
pub struct FastBinaryScanner {
    phrases: &'static PhraseSet,
    pool: Arc<BufferPool>,
    scan_offset: usize,
    min_size: usize,
}

impl FastBinaryScanner {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self {
            phrases: &PatternLibrary::global().fast_phrases,
            pool,
            scan_offset: DEFAULT_SCAN_OFFSET,
            min_size: DEFAULT_FAST_MIN_SIZE,
        }
    }

    pub fn with_scan_offset(mut self, offset: usize) -> Self {
        self.scan_offset = offset;
        self
    }

    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn inspect(&self, image: &[u8]) -> ChannelOutcome {
        if image.len() < self.min_size {
            return ChannelOutcome::no_match();
        }

        let start = scan_start(image, self.scan_offset);
        with_lowered(&self.pool, image, start, |lowered| self.phrases.first_in_order(lowered))
            .map(|hit| phrase_outcome(hit, start))
            .unwrap_or_else(ChannelOutcome::no_match)
    }
}

impl Detector for FastBinaryScanner {
    fn scan(&self, evidence: &Evidence) -> Result<ChannelOutcome> {
        Ok(self.inspect(&evidence.image))
    }

    fn name(&self) -> &str {
        "fast-binary-scanner"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::Binary
    }
}
