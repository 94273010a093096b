//! Content-credential manifest sniffer (channel "c2pa")
//!
//! Looks for C2PA / JUMBF container markers anywhere in the raw bytes. The
//! manifest itself is not parsed or validated; a marker is enough evidence.
//! When an XMP packet is available, vendor hints in it refine the provider.

use crate::detector::Detector;
use crate::patterns::{provider, PatternLibrary};
use provscan_core::{ChannelOutcome, DetectionMethod, Evidence, Result};
use tracing::debug;

/// Manifest marker detector
pub struct ManifestSniffer {
    patterns: &'static PatternLibrary,
}

impl ManifestSniffer {
    /// Create a sniffer over the global pattern library
    pub fn new() -> Self {
        Self::with_patterns(PatternLibrary::global())
    }

    /// Create a sniffer over a specific pattern library
    pub fn with_patterns(patterns: &'static PatternLibrary) -> Self {
        Self { patterns }
    }

    /// Describe the most specific manifest marker present, if any
    fn find_marker(&self, image: &[u8]) -> Option<String> {
        let literals = self.patterns.manifest_literals.present(image);
        let (urn, jumb, c2pa) = (literals[0], literals[1], literals[2]);

        if urn {
            return Some("C2PA manifest URN (urn:c2pa:)".to_string());
        }
        if jumb && c2pa {
            return Some("JUMBF box labelled c2pa".to_string());
        }

        self.patterns
            .manifest_markers
            .first_in_order(image)
            .map(|m| format!("content credential marker \"{}\"", m.phrase))
    }

    /// Attribute the manifest to a vendor from XMP hints
    fn refine_provider(&self, xmp: Option<&[u8]>) -> (&'static str, Option<&'static str>) {
        xmp.and_then(|x| self.patterns.c2pa_vendor_hints.first_in_order(x))
            .map(|hint| (hint.provider, Some(hint.phrase)))
            .unwrap_or((provider::UNKNOWN_C2PA, None))
    }
}

impl Default for ManifestSniffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for ManifestSniffer {
    fn scan(&self, evidence: &Evidence) -> Result<ChannelOutcome> {
        let Some(marker) = self.find_marker(&evidence.image) else {
            return Ok(ChannelOutcome::no_match());
        };

        let (provider, hint) = self.refine_provider(evidence.xmp_bytes());
        let details = match hint {
            Some(phrase) => format!("{}; XMP vendor hint \"{}\"", marker, phrase),
            None => marker,
        };

        debug!(provider, %details, "manifest marker found");
        Ok(ChannelOutcome::matched(provider, DetectionMethod::C2pa, details))
    }

    fn name(&self) -> &str {
        "manifest-sniffer"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::C2pa
    }
}
