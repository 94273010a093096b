//! Core types for provscan

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Evidence channel that produced a verdict.
///
/// Declaration order is the aggregation priority: when several channels
/// match at once, the earliest variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    /// Content-credential / JUMBF manifest markers
    C2pa,
    /// Structured EXIF tags and PNG text chunks
    Exif,
    /// Raw byte scan for high-specificity phrases
    Binary,
    /// XMP packet text
    Xmp,
}

impl DetectionMethod {
    /// All channels in priority order
    pub const ALL: [DetectionMethod; 4] = [Self::C2pa, Self::Exif, Self::Binary, Self::Xmp];

    /// Stable lowercase name, as persisted by callers
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C2pa => "c2pa",
            Self::Exif => "exif",
            Self::Binary => "binary",
            Self::Xmp => "xmp",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final verdict for one image
///
/// A no-match always carries an empty provider, no method and empty details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Whether any channel found provenance evidence
    pub matched: bool,

    /// Attributed tool or provider ("Midjourney", "Unknown C2PA", ...)
    #[serde(default)]
    pub provider: String,

    /// Channel that produced the verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<DetectionMethod>,

    /// Human-readable summary of the evidence
    #[serde(default)]
    pub details: String,
}

impl DetectionResult {
    /// The no-evidence verdict
    pub fn none() -> Self {
        Self::default()
    }

    /// A positive verdict. An empty provider is recorded as "Unknown".
    pub fn detected(
        provider: impl Into<String>,
        method: DetectionMethod,
        details: impl Into<String>,
    ) -> Self {
        let provider = provider.into();
        Self {
            matched: true,
            provider: if provider.is_empty() {
                "Unknown".to_string()
            } else {
                provider
            },
            method: Some(method),
            details: details.into(),
        }
    }
}

/// What a single channel reports back to the dispatcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelOutcome {
    pub matched: bool,
    pub result: DetectionResult,
}

impl ChannelOutcome {
    /// Channel found nothing
    pub fn no_match() -> Self {
        Self::default()
    }

    /// Channel found evidence
    pub fn matched(
        provider: impl Into<String>,
        method: DetectionMethod,
        details: impl Into<String>,
    ) -> Self {
        Self {
            matched: true,
            result: DetectionResult::detected(provider, method, details),
        }
    }

    /// Consume into the verdict, normalising no-match to the empty result
    pub fn into_result(self) -> DetectionResult {
        if self.matched {
            self.result
        } else {
            DetectionResult::none()
        }
    }
}

/// Inputs for one detection call
///
/// Buffers are reference-counted so the concurrent dispatcher can hand the
/// same allocation to every channel without copying.
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    /// Raw image bytes
    pub image: Bytes,

    /// Extracted XMP packet, if the caller has one
    pub xmp: Option<Bytes>,

    /// Where the bytes came from, for log context only
    pub source: Option<PathBuf>,
}

impl Evidence {
    /// Create evidence from raw image bytes
    pub fn new(image: impl Into<Bytes>) -> Self {
        Self {
            image: image.into(),
            xmp: None,
            source: None,
        }
    }

    /// Attach an XMP packet
    pub fn with_xmp(mut self, xmp: impl Into<Bytes>) -> Self {
        self.xmp = Some(xmp.into());
        self
    }

    /// Attach an optional XMP packet
    pub fn with_optional_xmp(mut self, xmp: Option<Bytes>) -> Self {
        self.xmp = xmp;
        self
    }

    /// Read evidence from a file on disk
    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let image = std::fs::read(path)?;
        Ok(Self {
            image: Bytes::from(image),
            xmp: None,
            source: Some(path.to_path_buf()),
        })
    }

    /// XMP bytes, treating an empty packet as absent
    pub fn xmp_bytes(&self) -> Option<&[u8]> {
        self.xmp.as_deref().filter(|x| !x.is_empty())
    }
}
