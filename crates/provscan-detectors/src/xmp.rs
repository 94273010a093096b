//! XMP-text scanner (channel "xmp")
//!
//! Rules run over the lower-cased packet in a fixed order and the first one
//! that fires wins. Co-occurrence rules come first so that a bare IPTC
//! trained-media marker only counts when nothing more specific explains it.

use crate::detector::Detector;
use crate::patterns::{provider, PatternLibrary};
use provscan_core::{ChannelOutcome, DetectionMethod, Evidence, Result};
use tracing::debug;

/// Lower-cased tail of the IPTC trained-algorithmic-media URI
///
/// The path segment keeps `compositeWithTrainedAlgorithmicMedia` (partly
/// AI-edited media) from counting as fully generated.
const IPTC_TRAINED_MEDIA: &str = "digitalsourcetype/trainedalgorithmicmedia";

/// Google's credit line on Imagen output
const GOOGLE_AI_CREDIT: &str = "made with google ai";

/// Locate an XMP packet embedded in raw image bytes
///
/// Prefers a full `<?xpacket ...?>` wrapper and falls back to a bare
/// `<x:xmpmeta>` element. Returns `None` when neither is present.
pub fn embedded_packet(image: &[u8]) -> Option<&[u8]> {
    PatternLibrary::global()
        .xmp_packet
        .find(image)
        .map(|m| m.as_bytes())
}

/// XMP packet detector
pub struct XmpTextScanner {
    patterns: &'static PatternLibrary,
    generic_terms: bool,
}

impl XmpTextScanner {
    pub fn new() -> Self {
        Self {
            patterns: PatternLibrary::global(),
            generic_terms: false,
        }
    }

    /// Also match broad "AI generated" style terms as a last resort
    pub fn with_generic_terms(mut self, enabled: bool) -> Self {
        self.generic_terms = enabled;
        self
    }

    /// Evaluate an XMP packet
    pub fn inspect(&self, xmp: &[u8]) -> ChannelOutcome {
        if xmp.is_empty() {
            return ChannelOutcome::no_match();
        }

        let text = String::from_utf8_lossy(xmp).to_lowercase();
        match self.first_rule(&text) {
            Some((provider, details)) => {
                debug!(provider, %details, "xmp rule fired");
                ChannelOutcome::matched(provider, DetectionMethod::Xmp, details)
            }
            None => ChannelOutcome::no_match(),
        }
    }

    fn first_rule(&self, text: &str) -> Option<(&'static str, String)> {
        let p = self.patterns;
        let bytes = text.as_bytes();
        let iptc = text.contains(IPTC_TRAINED_MEDIA);

        if iptc {
            if let Some(guid) = p.guid.find(text) {
                return Some((
                    provider::MIDJOURNEY,
                    format!("IPTC trained media with job GUID {}", guid.as_str()),
                ));
            }
            if text.contains(GOOGLE_AI_CREDIT) {
                return Some((
                    provider::GOOGLE_IMAGEN,
                    "IPTC trained media with \"made with google ai\" credit".to_string(),
                ));
            }
        }

        if let Some(m) = p.grok.find(text) {
            return Some((provider::GROK, format!("Grok mention \"{}\"", m.as_str())));
        }
        if let Some(m) = p.grok_spaced.find(text) {
            return Some((provider::GROK, format!("letter-spaced Grok mention \"{}\"", m.as_str())));
        }

        if p.xmp_prompt_tag.is_match(text) && p.xmp_workflow_tag.is_match(text) {
            return Some((provider::COMFYUI, "paired <prompt>/<workflow> tags".to_string()));
        }
        if let Some(hit) = p.comfyui_keywords.first_in_order(bytes) {
            return Some((hit.provider, format!("ComfyUI keyword \"{}\"", hit.phrase)));
        }

        if let Some(hit) = p.firefly.first_in_order(bytes) {
            return Some((hit.provider, format!("mention of \"{}\"", hit.phrase)));
        }
        if let Some(hit) = p.openai.first_in_order(bytes) {
            return Some((hit.provider, format!("mention of \"{}\"", hit.phrase)));
        }

        if let Some(m) = p.xmp_prompt_keys.find(text) {
            return Some((provider::SDXL, format!("prompt key \"{}\"", m.as_str())));
        }
        if let Some(hit) = p.sdxl_terms.first_in_order(bytes) {
            return Some((hit.provider, format!("diffusion term \"{}\"", hit.phrase)));
        }

        if let Some(m) = p.flux.find(text) {
            return Some((provider::FLUX, format!("FLUX mention \"{}\"", m.as_str())));
        }

        if iptc {
            return Some((
                provider::AI_IPTC,
                "IPTC DigitalSourceType trainedAlgorithmicMedia".to_string(),
            ));
        }

        if let Some(hit) = p.midjourney_mentions.first_in_order(bytes) {
            return Some((hit.provider, format!("Midjourney marker \"{}\"", hit.phrase)));
        }

        if self.generic_terms {
            if let Some(hit) = p.generic_terms.first_in_order(bytes) {
                return Some((hit.provider, format!("generic AI term \"{}\"", hit.phrase)));
            }
        }

        None
    }
}

impl Default for XmpTextScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for XmpTextScanner {
    fn scan(&self, evidence: &Evidence) -> Result<ChannelOutcome> {
        Ok(evidence
            .xmp_bytes()
            .map(|x| self.inspect(x))
            .unwrap_or_else(ChannelOutcome::no_match))
    }

    fn name(&self) -> &str {
        "xmp-text-scanner"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::Xmp
    }
}
