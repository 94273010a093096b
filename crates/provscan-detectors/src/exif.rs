//! Metadata-tag extractor (channel "exif")
//!
//! Pulls the embedded attribute block out of the image (EXIF/TIFF fields via
//! `kamadak-exif`, plus PNG `tEXt`/`iTXt` chunks) and evaluates it in three
//! steps:
//!
//! 1. Raw pre-scan of the undecoded block for the SDXL parameter key, in
//!    ASCII or UTF-16.
//! 2. Per-tag rules, evaluated in tag order. The first rule that fires for a
//!    tag decides the verdict.
//! 3. A generic "AI (Software)" fallback, applied only if no specific rule
//!    fired anywhere in the block.

use crate::detector::Detector;
use crate::patterns::{provider, PatternLibrary, IPTC_TRAINED_MEDIA_URI};
use crate::utf16::{self, Endianness};
use exif::{Context, Field, Reader, Tag, Value};
use provscan_core::{ChannelOutcome, DetectionMethod, Error, Evidence, Result};
use std::io::Cursor;
use tracing::debug;

/// Tags whose values are free-form comments and may be UTF-16
const COMMENT_TAGS: [&str; 3] = ["UserComment", "ImageDescription", "XPComment"];

/// EXIF UserComment character-code headers (8 bytes each)
const HEADER_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const HEADER_UNICODE: &[u8; 8] = b"UNICODE\0";
const HEADER_JIS: &[u8; 8] = b"JIS\0\0\0\0\0";
const HEADER_UNDEFINED: &[u8; 8] = &[0; 8];

/// One flattened tag/value pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTag {
    /// Tag name ("Software", "UserComment", or a PNG text keyword)
    pub name: String,

    /// Best-effort textual rendering of the value
    pub text: String,

    /// Undecoded value bytes, for byte-typed fields
    pub raw: Option<Vec<u8>>,
}

impl MetadataTag {
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            raw: None,
        }
    }

    pub fn bytes(name: impl Into<String>, raw: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            text: lossy_text(&raw),
            raw: Some(raw),
        }
    }
}

/// The embedded metadata of one image
#[derive(Debug, Clone, Default)]
pub struct MetadataBlock {
    /// Undecoded bytes: the TIFF-structured EXIF data followed by PNG text payloads
    pub raw: Vec<u8>,

    /// Flattened tags in file order
    pub tags: Vec<MetadataTag>,

    /// Byte order of the EXIF data, used for header-less UTF-16 comments
    pub byte_order: Option<Endianness>,
}

impl MetadataBlock {
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.tags.is_empty()
    }
}

/// Extract the metadata block from raw image bytes
///
/// Fails only when neither EXIF attributes nor PNG text chunks are present.
pub fn extract_block(image: &[u8]) -> Result<MetadataBlock> {
    let mut block = MetadataBlock::default();

    match Reader::new().read_from_container(&mut Cursor::new(image)) {
        Ok(exif) => {
            block.raw.extend_from_slice(exif.buf());
            block.byte_order = Some(if exif.little_endian() {
                Endianness::Little
            } else {
                Endianness::Big
            });
            block.tags.extend(exif.fields().map(field_to_tag));
        }
        Err(e) => debug!(error = %e, "no EXIF attributes"),
    }

    for chunk in png_text_chunks(image) {
        block.raw.push(b'\n');
        block.raw.extend_from_slice(chunk.payload);
        block.tags.push(chunk.tag);
    }

    if block.is_empty() {
        return Err(Error::metadata("no EXIF attributes or PNG text chunks"));
    }
    Ok(block)
}

fn field_to_tag(field: &Field) -> MetadataTag {
    let name = tag_name(field.tag);
    match &field.value {
        Value::Ascii(parts) => {
            let text = parts
                .iter()
                .map(|p| lossy_text(p))
                .collect::<Vec<_>>()
                .join(" ");
            MetadataTag::text(name, text)
        }
        Value::Byte(bytes) | Value::Undefined(bytes, _) => MetadataTag::bytes(name, bytes.clone()),
        _ => MetadataTag::text(name, field.display_value().to_string()),
    }
}

/// Tag name, with the Windows XP tags that kamadak-exif leaves unnamed
fn tag_name(tag: Tag) -> String {
    if tag.context() == Context::Tiff {
        let xp = match tag.number() {
            0x9c9b => Some("XPTitle"),
            0x9c9c => Some("XPComment"),
            0x9c9d => Some("XPAuthor"),
            0x9c9e => Some("XPKeywords"),
            0x9c9f => Some("XPSubject"),
            _ => None,
        };
        if let Some(name) = xp {
            return name.to_string();
        }
    }
    tag.to_string()
}

fn lossy_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_string()
}

/// A PNG textual chunk as a tag, with its undecoded payload
struct PngText<'a> {
    tag: MetadataTag,
    payload: &'a [u8],
}

/// Walk PNG chunks and collect `tEXt` and uncompressed `iTXt` entries
///
/// CRCs are not verified; a truncated chunk ends the walk.
fn png_text_chunks(image: &[u8]) -> Vec<PngText<'_>> {
    let mut out = Vec::new();
    if !crate::patterns::is_png(image) {
        return out;
    }

    let mut pos = crate::patterns::PNG_SIGNATURE.len();
    while pos + 8 <= image.len() {
        let len = u32::from_be_bytes([image[pos], image[pos + 1], image[pos + 2], image[pos + 3]]) as usize;
        let kind = &image[pos + 4..pos + 8];
        let start = pos + 8;
        let Some(end) = start.checked_add(len).filter(|end| *end <= image.len()) else {
            break;
        };
        let data = &image[start..end];

        match kind {
            b"tEXt" => {
                if let Some(tag) = parse_text_chunk(data) {
                    out.push(PngText { tag, payload: data });
                }
            }
            b"iTXt" => {
                if let Some(tag) = parse_itxt_chunk(data) {
                    out.push(PngText { tag, payload: data });
                }
            }
            b"IEND" => break,
            _ => {}
        }

        // chunk data is followed by a 4-byte CRC
        pos = end + 4;
    }
    out
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn parse_text_chunk(data: &[u8]) -> Option<MetadataTag> {
    let nul = data.iter().position(|&b| b == 0)?;
    Some(MetadataTag::text(latin1(&data[..nul]), latin1(&data[nul + 1..])))
}

fn parse_itxt_chunk(data: &[u8]) -> Option<MetadataTag> {
    let nul = data.iter().position(|&b| b == 0)?;
    let keyword = latin1(&data[..nul]);
    let rest = data.get(nul + 1..)?;
    let (&compressed, rest) = rest.split_first()?;
    if compressed != 0 {
        debug!(%keyword, "skipping compressed iTXt chunk");
        return None;
    }
    // compression method, then NUL-terminated language tag and translated keyword
    let rest = rest.get(1..)?;
    let lang_end = rest.iter().position(|&b| b == 0)?;
    let rest = rest.get(lang_end + 1..)?;
    let translated_end = rest.iter().position(|&b| b == 0)?;
    let text = rest.get(translated_end + 1..)?;
    Some(MetadataTag::text(keyword, String::from_utf8_lossy(text)))
}

/// Per-tag evaluation result
enum TagVerdict {
    Match(ChannelOutcome),
    Nothing,
}

/// EXIF / metadata tag detector
pub struct MetadataTagExtractor {
    patterns: &'static PatternLibrary,
}

impl MetadataTagExtractor {
    /// Create an extractor over the global pattern library
    pub fn new() -> Self {
        Self::with_patterns(PatternLibrary::global())
    }

    /// Create an extractor over a specific pattern library
    pub fn with_patterns(patterns: &'static PatternLibrary) -> Self {
        Self { patterns }
    }

    /// Evaluate an already-extracted block
    pub fn evaluate(&self, block: &MetadataBlock) -> ChannelOutcome {
        if let Some(outcome) = self.raw_prescan(&block.raw) {
            return outcome;
        }

        let mut fallback: Option<ChannelOutcome> = None;
        for tag in &block.tags {
            if fallback.is_none() {
                fallback = self.software_fallback(tag);
            }
            if let TagVerdict::Match(outcome) = self.evaluate_tag(tag, block.byte_order) {
                return outcome;
            }
        }

        fallback.unwrap_or_else(ChannelOutcome::no_match)
    }

    fn raw_prescan(&self, raw: &[u8]) -> Option<ChannelOutcome> {
        if let Some(hit) = self.patterns.raw_sdxl_key.first_in_order(raw) {
            return Some(matched(
                provider::SDXL,
                format!("raw metadata contains \"{}\"", hit.phrase),
            ));
        }

        self.patterns.raw_utf16_keys.find(raw).map(|hit| {
            matched(
                provider::SDXL,
                format!("raw metadata contains {} \"{}\"", hit.endian.label(), hit.keyword),
            )
        })
    }

    /// Rules in fixed order; the first that fires for this tag wins
    fn evaluate_tag(&self, tag: &MetadataTag, byte_order: Option<Endianness>) -> TagVerdict {
        let p = self.patterns;

        if tag.name == "Software" {
            if let Some(hit) = p.software_providers.first_in_order(tag.text.as_bytes()) {
                return TagVerdict::Match(matched(
                    hit.provider,
                    format!("Software tag \"{}\" names {}", tag.text, hit.provider),
                ));
            }
        }

        if p.prompt_keywords.is_match(&tag.text) {
            return TagVerdict::Match(matched(
                provider::AI_PROMPT_EXIF,
                format!("{} carries generation parameters", tag.name),
            ));
        }

        let is_comment = COMMENT_TAGS.contains(&tag.name.as_str());
        let decoded = if is_comment {
            tag.raw
                .as_deref()
                .and_then(|raw| decode_comment(raw, byte_order))
        } else {
            None
        };

        if is_comment {
            if let Some(outcome) = self.evaluate_comment(tag, decoded.as_ref()) {
                return TagVerdict::Match(outcome);
            }
        }

        let mentions_grok = |s: &str| s.to_ascii_lowercase().contains("grok");
        if mentions_grok(tag.name.as_str())
            || mentions_grok(tag.text.as_str())
            || decoded.as_ref().is_some_and(|(text, _)| mentions_grok(text.as_str()))
        {
            return TagVerdict::Match(matched(
                provider::GROK,
                format!("{} mentions Grok", tag.name),
            ));
        }

        if tag.name.eq_ignore_ascii_case("prompt") || tag.name.eq_ignore_ascii_case("workflow") {
            return TagVerdict::Match(matched(
                provider::COMFYUI,
                format!("{} tag present", tag.name),
            ));
        }

        if tag.name == "DigitalSourceType" && tag.text.trim() == IPTC_TRAINED_MEDIA_URI {
            return TagVerdict::Match(matched(
                provider::AI_IPTC,
                "DigitalSourceType is trainedAlgorithmicMedia",
            ));
        }

        TagVerdict::Nothing
    }

    /// Deferred generic match for AI-ish Software values
    fn software_fallback(&self, tag: &MetadataTag) -> Option<ChannelOutcome> {
        if tag.name != "Software" {
            return None;
        }
        let p = self.patterns;
        if p.software_providers.is_match(tag.text.as_bytes()) {
            return None;
        }
        if p.software_ai_terms.is_match(&tag.text) || p.known_models.is_match(tag.text.as_bytes()) {
            return Some(matched(
                provider::AI_SOFTWARE,
                format!("Software tag \"{}\" looks AI-related", tag.text),
            ));
        }
        None
    }

    /// Decode a comment field and look for generation evidence in it
    ///
    /// The decoded text is tried first; if it yields nothing, the original
    /// rendering gets a second look.
    fn evaluate_comment(
        &self,
        tag: &MetadataTag,
        decoded: Option<&(String, &'static str)>,
    ) -> Option<ChannelOutcome> {
        if let Some((text, encoding)) = decoded {
            if let Some(outcome) = self.comment_evidence(&tag.name, text, encoding) {
                return Some(outcome);
            }
        }
        self.comment_evidence(&tag.name, &tag.text, "raw")
    }

    fn comment_evidence(&self, name: &str, text: &str, encoding: &str) -> Option<ChannelOutcome> {
        let p = self.patterns;
        let flag = p.midjourney_flags.first_in_order(text.as_bytes());
        let json = is_json_with_ai_keyword(p, text);
        let params = p.prompt_keywords.is_match(text);

        if let Some(flag) = flag {
            return Some(matched(
                provider::MIDJOURNEY,
                format!("{} ({}) carries Midjourney flag \"{}\"", name, encoding, flag.phrase),
            ));
        }
        if json {
            return Some(matched(
                provider::STABLE_DIFFUSION,
                format!("{} ({}) holds JSON generation parameters", name, encoding),
            ));
        }
        if params {
            return Some(matched(
                provider::STABLE_DIFFUSION,
                format!("{} ({}) holds generation parameters", name, encoding),
            ));
        }
        None
    }
}

impl Default for MetadataTagExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for MetadataTagExtractor {
    fn scan(&self, evidence: &Evidence) -> Result<ChannelOutcome> {
        let block = extract_block(&evidence.image)?;
        let outcome = self.evaluate(&block);
        if outcome.matched {
            debug!(provider = %outcome.result.provider, details = %outcome.result.details, "metadata tag evidence");
        }
        Ok(outcome)
    }

    fn name(&self) -> &str {
        "metadata-tag-extractor"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::Exif
    }
}

fn matched(provider: &str, details: impl Into<String>) -> ChannelOutcome {
    ChannelOutcome::matched(provider, DetectionMethod::Exif, details)
}

fn is_json_with_ai_keyword(patterns: &PatternLibrary, text: &str) -> bool {
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return false;
    }
    serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
        && patterns.json_ai_keywords.is_match(trimmed.as_bytes())
}

/// Decode a byte-typed comment value
///
/// Values longer than 8 bytes that open with an EXIF character-code header
/// have it stripped first. Falls back to decoding the whole value as UTF-16.
/// Returns the text and a label for the encoding that worked.
fn decode_comment(raw: &[u8], byte_order: Option<Endianness>) -> Option<(String, &'static str)> {
    if raw.len() > 8 {
        let (header, body) = raw.split_at(8);
        if header == HEADER_ASCII || header == HEADER_JIS {
            return Some((lossy_text(body), "ASCII"));
        }
        if header == HEADER_UNICODE || header == HEADER_UNDEFINED {
            if let Some(decoded) = decode_utf16_body(body, byte_order) {
                return Some(decoded);
            }
        }
    }

    decode_utf16_body(raw, None)
}

fn decode_utf16_body(body: &[u8], byte_order: Option<Endianness>) -> Option<(String, &'static str)> {
    let endian = utf16::detect_bom(body).or(byte_order);
    let decoded = match (utf16::detect_bom(body), endian) {
        (Some(_), _) | (None, None) => utf16::decode(body),
        (None, Some(order)) => utf16::decode_with(body, order),
    };
    match decoded {
        Ok(text) if !text.is_empty() => Some((text, endian.unwrap_or(Endianness::Little).label())),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "comment is not UTF-16");
            None
        }
    }
}
