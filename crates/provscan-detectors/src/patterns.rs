//! Pattern library
//!
//! Every phrase list and compiled matcher the channels use lives here. The
//! library is built once per process and only ever read afterwards, so the
//! channels share it without locking.

use crate::utf16::Utf16Needles;
use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use provscan_core::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Provider names reported in verdicts
pub mod provider {
    pub const MIDJOURNEY: &str = "Midjourney";
    pub const OPENAI: &str = "OpenAI";
    pub const STABLE_DIFFUSION: &str = "Stable Diffusion";
    pub const SDXL: &str = "Stable Diffusion (SDXL)";
    pub const FLUX: &str = "FLUX";
    pub const COMFYUI: &str = "ComfyUI";
    pub const GROK: &str = "Grok";
    pub const ADOBE_FIREFLY: &str = "Adobe Firefly";
    pub const GOOGLE_IMAGEN: &str = "Google Imagen";
    pub const UNKNOWN_C2PA: &str = "Unknown C2PA";
    pub const AI_SOFTWARE: &str = "AI (Software)";
    pub const AI_PROMPT_EXIF: &str = "AI (Prompt in EXIF)";
    pub const AI_IPTC: &str = "AI (IPTC Trained Media)";
    pub const AI_GENERIC: &str = "AI (Generic)";
}

use provider::*;

/// IPTC DigitalSourceType value for fully AI-generated media
pub const IPTC_TRAINED_MEDIA_URI: &str =
    "http://cv.iptc.org/newscodes/digitalsourcetype/trainedAlgorithmicMedia";

/// Prefix of C2PA manifest URNs
pub const C2PA_URN_PREFIX: &str = "urn:c2pa:";

/// SwarmUI / SDXL parameter block key
pub const SDXL_PARAMS_KEY: &str = "sui_image_params";

/// Canonical PNG file signature
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// A phrase that matched, with the provider it attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseMatch {
    pub phrase: &'static str,
    pub provider: &'static str,
}

/// Ordered list of literal phrases compiled into one Aho-Corasick automaton
///
/// Each phrase carries the provider it implies. List order is significant:
/// [`PhraseSet::first_in_order`] reports the earliest-listed phrase present
/// anywhere in the haystack, not the leftmost occurrence.
pub struct PhraseSet {
    matcher: AhoCorasick,
    entries: Vec<(&'static str, &'static str)>,
}

impl PhraseSet {
    /// Compile `(phrase, provider)` pairs
    pub fn new(entries: &[(&'static str, &'static str)], case_insensitive: bool) -> Result<Self> {
        let matcher = AhoCorasickBuilder::new()
            .ascii_case_insensitive(case_insensitive)
            .build(entries.iter().map(|(phrase, _)| phrase))
            .map_err(|e| Error::detector(format!("Failed to build pattern matcher: {}", e)))?;

        Ok(Self {
            matcher,
            entries: entries.to_vec(),
        })
    }

    /// Compile phrases that all attribute to the same provider
    pub fn uniform(phrases: &[&'static str], provider: &'static str, case_insensitive: bool) -> Result<Self> {
        let entries: Vec<_> = phrases.iter().map(|p| (*p, provider)).collect();
        Self::new(&entries, case_insensitive)
    }

    /// Whether any phrase occurs in `haystack`
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.matcher.is_match(haystack)
    }

    /// The earliest-listed phrase that occurs anywhere in `haystack`
    pub fn first_in_order(&self, haystack: &[u8]) -> Option<PhraseMatch> {
        let mut best: Option<usize> = None;
        for m in self.matcher.find_overlapping_iter(haystack) {
            let idx = m.pattern().as_usize();
            if best.map_or(true, |b| idx < b) {
                best = Some(idx);
                if idx == 0 {
                    break;
                }
            }
        }

        best.map(|idx| {
            let (phrase, provider) = self.entries[idx];
            PhraseMatch { phrase, provider }
        })
    }

    /// Which phrases occur in `haystack`, indexed like the construction list
    pub fn present(&self, haystack: &[u8]) -> Vec<bool> {
        let mut seen = vec![false; self.entries.len()];
        let mut remaining = seen.len();
        for m in self.matcher.find_overlapping_iter(haystack) {
            let idx = m.pattern().as_usize();
            if !seen[idx] {
                seen[idx] = true;
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }
        }
        seen
    }

    /// Number of phrases in the set
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All matchers used by the four channels
pub struct PatternLibrary {
    // c2pa
    pub manifest_markers: PhraseSet,
    pub manifest_literals: PhraseSet,
    pub c2pa_vendor_hints: PhraseSet,

    // exif
    pub software_providers: PhraseSet,
    pub software_ai_terms: Regex,
    pub known_models: PhraseSet,
    pub prompt_keywords: Regex,
    pub json_ai_keywords: PhraseSet,
    pub midjourney_flags: PhraseSet,
    pub raw_sdxl_key: PhraseSet,
    pub raw_utf16_keys: Utf16Needles,

    // binary
    pub binary_phrases: PhraseSet,
    pub binary_utf16_keys: Utf16Needles,
    pub fast_phrases: PhraseSet,

    // xmp
    pub guid: Regex,
    pub grok: Regex,
    pub grok_spaced: Regex,
    pub xmp_prompt_tag: Regex,
    pub xmp_workflow_tag: Regex,
    pub comfyui_keywords: PhraseSet,
    pub firefly: PhraseSet,
    pub openai: PhraseSet,
    pub xmp_prompt_keys: Regex,
    pub sdxl_terms: PhraseSet,
    pub flux: Regex,
    pub midjourney_mentions: PhraseSet,
    pub xmp_packet: regex::bytes::Regex,

    // opt-in
    pub generic_terms: PhraseSet,
}

static GLOBAL: OnceLock<PatternLibrary> = OnceLock::new();

fn compile(name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::detector(format!("Failed to compile {} regex: {}", name, e)))
}

impl PatternLibrary {
    /// The process-wide library, built on first use
    pub fn global() -> &'static PatternLibrary {
        GLOBAL.get_or_init(|| Self::new().expect("Failed to build built-in pattern library"))
    }

    /// Compile every built-in matcher
    pub fn new() -> Result<Self> {
        Ok(Self {
            manifest_markers: PhraseSet::new(
                &[
                    ("c2pa", "c2pa"),
                    ("jumbf", "jumbf"),
                    ("contentcredentials", "contentcredentials"),
                ],
                true,
            )?,
            manifest_literals: PhraseSet::new(
                &[
                    (C2PA_URN_PREFIX, "urn"),
                    ("jumb", "jumb"),
                    ("c2pa", "c2pa"),
                ],
                false,
            )?,
            c2pa_vendor_hints: PhraseSet::new(
                &[
                    ("openai", OPENAI),
                    ("dall-e", OPENAI),
                    ("dalle", OPENAI),
                    ("chatgpt", OPENAI),
                    ("adobe firefly", ADOBE_FIREFLY),
                    ("firefly", ADOBE_FIREFLY),
                    ("made with google ai", GOOGLE_IMAGEN),
                ],
                true,
            )?,

            software_providers: PhraseSet::new(
                &[
                    ("midjourney", MIDJOURNEY),
                    ("dall-e", OPENAI),
                    ("dalle", OPENAI),
                    ("openai", OPENAI),
                    ("stable diffusion", STABLE_DIFFUSION),
                    ("sdxl", SDXL),
                    ("flux", FLUX),
                    ("black forest labs", FLUX),
                    ("bfl", FLUX),
                ],
                true,
            )?,
            software_ai_terms: compile(
                "software ai terms",
                r"(?i)\b(ai|generative|generated|diffusion|neural|text[- ]to[- ]image|txt2img|img2img)\b",
            )?,
            known_models: PhraseSet::uniform(
                &[
                    "novelai", "leonardo", "ideogram", "playground", "dreamstudio",
                    "automatic1111", "invokeai", "fooocus", "comfyui", "runway",
                    "kandinsky", "nightcafe", "craiyon", "firefly", "imagen",
                    "gemini", "recraft", "dreamshaper", "juggernaut",
                ],
                AI_SOFTWARE,
                true,
            )?,
            // "model" on its own is deliberately absent: camera bodies write it.
            prompt_keywords: compile(
                "prompt keywords",
                r#"(?i)(negative[ _]?prompt|\bprompt\s*[:=]|"prompt"\s*:|\bsampler(?:_name)?\s*[:=]|"sampler(?:_name)?"\s*:|\bsteps\s*[:=]|"steps"\s*:|\bcfg(?:[ _]?scale)?\s*[:=]|"cfg(?:_scale)?"\s*:|\bseed\s*[:=]|"seed"\s*:)"#,
            )?,
            json_ai_keywords: PhraseSet::uniform(
                &["prompt", "seed", "sampler", "steps", "cfg", "workflow", "negative", "checkpoint", "lora"],
                STABLE_DIFFUSION,
                true,
            )?,
            midjourney_flags: PhraseSet::uniform(
                &[
                    "--chaos", "--ar", "--stylize", "--weird", "--v ", "--no ", "--seed",
                    "--profile", "job id:",
                ],
                MIDJOURNEY,
                true,
            )?,
            raw_sdxl_key: PhraseSet::uniform(&[SDXL_PARAMS_KEY], SDXL, false)?,
            raw_utf16_keys: Utf16Needles::new(&[SDXL_PARAMS_KEY, "prompt"])?,

            // Matched against lower-cased bytes, so compiled case-sensitively.
            binary_phrases: PhraseSet::new(
                &[
                    (SDXL_PARAMS_KEY, SDXL),
                    ("midjourney", MIDJOURNEY),
                    ("job id:", MIDJOURNEY),
                    ("--chaos ", MIDJOURNEY),
                    ("--stylize ", MIDJOURNEY),
                    ("--weird ", MIDJOURNEY),
                    ("--ar ", MIDJOURNEY),
                    ("dall-e", OPENAI),
                    ("stable diffusion", STABLE_DIFFUSION),
                    ("negative prompt:", STABLE_DIFFUSION),
                    ("cfg scale:", STABLE_DIFFUSION),
                    ("black forest labs", FLUX),
                    ("comfyui", COMFYUI),
                    ("adobe firefly", ADOBE_FIREFLY),
                    ("made with google ai", GOOGLE_IMAGEN),
                ],
                false,
            )?,
            binary_utf16_keys: Utf16Needles::new(&[SDXL_PARAMS_KEY, "prompt", "cfg_scale"])?,
            fast_phrases: PhraseSet::new(
                &[
                    (SDXL_PARAMS_KEY, SDXL),
                    ("midjourney", MIDJOURNEY),
                    ("dall-e", OPENAI),
                    ("stable diffusion", STABLE_DIFFUSION),
                    ("black forest labs", FLUX),
                ],
                false,
            )?,

            guid: compile(
                "guid",
                r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
            )?,
            grok: compile("grok", r"\bgrok\d*\b")?,
            grok_spaced: compile("grok letter-spaced", r"\bg[\s._-]r[\s._-]o[\s._-]k\b")?,
            xmp_prompt_tag: compile("xmp prompt tag", r"<(?:[\w-]+:)?prompt>")?,
            xmp_workflow_tag: compile("xmp workflow tag", r"<(?:[\w-]+:)?workflow>")?,
            comfyui_keywords: PhraseSet::uniform(
                &["comfyui", "comfy_ui", "class_type", "ksampler"],
                COMFYUI,
                false,
            )?,
            firefly: PhraseSet::uniform(&["adobe firefly", "firefly"], ADOBE_FIREFLY, false)?,
            openai: PhraseSet::uniform(&["openai", "dall-e", "dall·e", "dalle", "chatgpt"], OPENAI, false)?,
            xmp_prompt_keys: compile(
                "xmp prompt keys",
                r#"<(?:[\w-]+:)?(?:negative_?)?prompt>|\b(?:negative[ _]?)?prompt\s*[:=]|"(?:negative_)?prompt"\s*:"#,
            )?,
            sdxl_terms: PhraseSet::uniform(
                &["sdxl", "stable diffusion", "stable-diffusion", "stablediffusion", SDXL_PARAMS_KEY, "automatic1111"],
                SDXL,
                false,
            )?,
            flux: compile(
                "flux",
                r"\bflux(?:\.1)?(?:[-_ ](?:dev|schnell|pro))?\b|black[ -]?forest[ -]?labs",
            )?,
            midjourney_mentions: PhraseSet::uniform(
                &[
                    "midjourney", "--chaos", "--ar ", "--stylize", "--weird", "--v ", "--no ",
                    "--seed", "--profile", "job id:",
                ],
                MIDJOURNEY,
                false,
            )?,
            xmp_packet: regex::bytes::Regex::new(
                r"(?s-u)<\?xpacket begin.*?<\?xpacket end[^>]*>|<x:xmpmeta.*?</x:xmpmeta>",
            )
            .map_err(|e| Error::detector(format!("Failed to compile xmp packet regex: {}", e)))?,

            generic_terms: PhraseSet::uniform(
                &[
                    "ai generated", "ai-generated", "generated by ai", "generated with ai",
                    "made with ai", "text-to-image", "txt2img", "img2img",
                    "artificial intelligence",
                ],
                AI_GENERIC,
                false,
            )?,
        })
    }
}

/// Whether `bytes` starts with the PNG signature
pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_builds() {
        let lib = PatternLibrary::new().unwrap();
        assert!(!lib.binary_phrases.is_empty());
        assert!(lib.fast_phrases.len() < lib.binary_phrases.len());
    }

    #[test]
    fn test_global_is_shared() {
        let a = PatternLibrary::global() as *const _;
        let b = PatternLibrary::global() as *const _;
        assert_eq!(a, b);
    }

    #[test]
    fn test_first_in_order_prefers_list_order() {
        let set = PhraseSet::new(&[("alpha", "A"), ("beta", "B")], false).unwrap();

        // "beta" occurs first in the text but "alpha" is listed first
        let hit = set.first_in_order(b"beta ... alpha").unwrap();
        assert_eq!(hit.provider, "A");

        let hit = set.first_in_order(b"only beta here").unwrap();
        assert_eq!(hit.phrase, "beta");

        assert!(set.first_in_order(b"gamma").is_none());
    }

    #[test]
    fn test_overlapping_phrases_found() {
        let set = PhraseSet::new(&[("dall-e", "OpenAI"), ("all", "X")], false).unwrap();
        assert_eq!(set.first_in_order(b"dall-e 3").unwrap().provider, "OpenAI");
    }

    #[test]
    fn test_case_insensitive_set() {
        let lib = PatternLibrary::global();
        let hit = lib.software_providers.first_in_order(b"MidJourney v6").unwrap();
        assert_eq!(hit.provider, MIDJOURNEY);
    }

    #[test]
    fn test_prompt_keywords_skip_bare_model() {
        let lib = PatternLibrary::global();
        assert!(!lib.prompt_keywords.is_match("Model: Canon EOS R5"));
        assert!(lib.prompt_keywords.is_match("Steps: 30, Sampler: DPM++ 2M, CFG scale: 7"));
        assert!(lib.prompt_keywords.is_match("Negative prompt: blurry"));
        assert!(lib.prompt_keywords.is_match(r#"{"seed": 42}"#));
    }

    #[test]
    fn test_grok_variants() {
        let lib = PatternLibrary::global();
        assert!(lib.grok.is_match("made by grok2"));
        assert!(!lib.grok.is_match("grokking"));
        assert!(lib.grok_spaced.is_match("g-r-o-k"));
        assert!(lib.grok_spaced.is_match("g r o k"));
    }

    #[test]
    fn test_png_signature() {
        assert!(is_png(&PNG_SIGNATURE));
        assert!(!is_png(b"\x89PNG"));
        assert!(!is_png(b"GIF89a......"));
    }
}
