//! UTF-16 codec for width-encoded metadata text
//!
//! EXIF comment fields and Windows `XP*` tags frequently carry UTF-16,
//! and some generators embed their parameter keys that way inside otherwise
//! binary payloads. Decoding is BOM-aware and defaults to little-endian.

use aho_corasick::AhoCorasick;
use provscan_core::{Error, Result};

/// Byte order of a UTF-16 span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Little => "UTF-16LE",
            Self::Big => "UTF-16BE",
        }
    }
}

/// Read a byte-order mark from the start of `bytes`
pub fn detect_bom(bytes: &[u8]) -> Option<Endianness> {
    match bytes {
        [0xFF, 0xFE, ..] => Some(Endianness::Little),
        [0xFE, 0xFF, ..] => Some(Endianness::Big),
        _ => None,
    }
}

/// Decode `bytes` as UTF-16, honouring a leading BOM and defaulting to LE.
///
/// Fails on odd-length input and on unpaired surrogates. Trailing NUL
/// terminators are dropped.
pub fn decode(bytes: &[u8]) -> Result<String> {
    match detect_bom(bytes) {
        Some(endian) => decode_with(&bytes[2..], endian),
        None => decode_with(bytes, Endianness::Little),
    }
}

/// Decode `bytes` as UTF-16 in a fixed byte order (no BOM handling)
pub fn decode_with(bytes: &[u8], endian: Endianness) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::decode(format!(
            "odd-length UTF-16 input ({} bytes)",
            bytes.len()
        )));
    }

    let units = bytes.chunks_exact(2).map(|pair| match endian {
        Endianness::Little => u16::from_le_bytes([pair[0], pair[1]]),
        Endianness::Big => u16::from_be_bytes([pair[0], pair[1]]),
    });

    let mut text = char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::decode(format!("invalid {}: {}", endian.label(), e)))?;

    let trimmed = text.trim_end_matches('\0').len();
    text.truncate(trimmed);
    Ok(text)
}

/// Encode `text` as UTF-16 without a BOM
pub fn encode(text: &str, endian: Endianness) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        let pair = match endian {
            Endianness::Little => unit.to_le_bytes(),
            Endianness::Big => unit.to_be_bytes(),
        };
        out.extend_from_slice(&pair);
    }
    out
}

/// A keyword located in UTF-16 form inside a byte buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utf16Hit {
    pub keyword: &'static str,
    pub endian: Endianness,
}

/// Pre-encoded LE and BE needles for a fixed keyword set
pub struct Utf16Needles {
    matcher: AhoCorasick,
    keywords: Vec<&'static str>,
}

impl Utf16Needles {
    /// Encode every keyword in both byte orders and compile one matcher
    pub fn new(keywords: &[&'static str]) -> Result<Self> {
        let needles: Vec<Vec<u8>> = keywords
            .iter()
            .flat_map(|k| [encode(k, Endianness::Little), encode(k, Endianness::Big)])
            .collect();

        let matcher = AhoCorasick::new(&needles).map_err(|e| {
            Error::detector(format!("Failed to build UTF-16 matcher: {}", e))
        })?;

        Ok(Self {
            matcher,
            keywords: keywords.to_vec(),
        })
    }

    /// First UTF-16 keyword occurrence in `haystack`
    pub fn find(&self, haystack: &[u8]) -> Option<Utf16Hit> {
        let m = self.matcher.find(haystack)?;
        let idx = m.pattern().as_usize();
        Some(Utf16Hit {
            keyword: self.keywords[idx / 2],
            endian: if idx % 2 == 0 {
                Endianness::Little
            } else {
                Endianness::Big
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_defaults_to_little_endian() {
        let bytes = encode("Steps: 30", Endianness::Little);
        assert_eq!(decode(&bytes).unwrap(), "Steps: 30");
    }

    #[test]
    fn test_decode_honours_bom() {
        let mut be = vec![0xFE, 0xFF];
        be.extend(encode("prompt", Endianness::Big));
        assert_eq!(decode(&be).unwrap(), "prompt");

        let mut le = vec![0xFF, 0xFE];
        le.extend(encode("prompt", Endianness::Little));
        assert_eq!(decode(&le).unwrap(), "prompt");
    }

    #[test]
    fn test_decode_strips_nul_terminator() {
        let mut bytes = encode("grok", Endianness::Little);
        bytes.extend([0, 0, 0, 0]);
        assert_eq!(decode(&bytes).unwrap(), "grok");
    }

    #[test]
    fn test_odd_length_is_error() {
        let err = decode(&[0x41, 0x00, 0x42]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_unpaired_surrogate_is_error() {
        // High surrogate with no trailing low surrogate
        let bytes = [0x3D, 0xD8, 0x41, 0x00];
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_non_ascii_round_trip() {
        let text = "夜の猫 🐈";
        let bytes = encode(text, Endianness::Big);
        assert_eq!(decode_with(&bytes, Endianness::Big).unwrap(), text);
    }

    #[test]
    fn test_needles_report_endianness() {
        let needles = Utf16Needles::new(&["sui_image_params", "prompt"]).unwrap();

        let mut hay = vec![0x89u8; 40];
        hay.extend(encode("prompt", Endianness::Big));
        let hit = needles.find(&hay).unwrap();
        assert_eq!(hit.keyword, "prompt");
        assert_eq!(hit.endian, Endianness::Big);

        let hay = encode("sui_image_params", Endianness::Little);
        let hit = needles.find(&hay).unwrap();
        assert_eq!(hit.keyword, "sui_image_params");
        assert_eq!(hit.endian, Endianness::Little);

        assert!(needles.find(b"prompt in plain ascii").is_none());
    }
}
