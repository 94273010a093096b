//! Error types for provscan

/// Result type alias using provscan's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for provscan operations
///
/// None of these cross the public detection entry points: every channel
/// degrades an error to "no evidence" before a verdict is returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Text could not be decoded (odd-length or broken UTF-16, bad charset)
    #[error("decode error: {0}")]
    Decode(String),

    /// Embedded metadata block is absent or corrupt
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Detector execution errors
    #[error("detector error: {0}")]
    Detector(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// File IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Deadline elapsed before the channels reported
    #[error("operation timed out")]
    Timeout,
}

impl Error {
    /// Create a new decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new metadata error
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// Create a new detector error
    pub fn detector(msg: impl Into<String>) -> Self {
        Self::Detector(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
