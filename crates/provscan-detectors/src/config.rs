//! Configuration for the detection engine

use crate::binary::{DEFAULT_FAST_MIN_SIZE, DEFAULT_SCAN_OFFSET};
use provscan_core::buffer::{DEFAULT_MAX_BUFFERS, DEFAULT_MAX_CAPACITY};
use provscan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// How long the concurrent dispatcher waits before failing open
    #[serde(default = "default_deadline_ms")]
    pub concurrent_deadline_ms: u64,

    /// Bytes the binary scanner skips at the start of non-PNG buffers
    #[serde(default = "default_scan_offset")]
    pub binary_scan_offset: usize,

    /// Buffers below this size are never inspected by the fast path
    #[serde(default = "default_fast_min_size")]
    pub fast_min_size: usize,

    /// Enable broad "AI generated" style terms in the binary and xmp channels
    #[serde(default)]
    pub generic_terms: bool,

    /// Scratch buffer pool limits
    #[serde(default)]
    pub buffer_pool: BufferPoolConfig,
}

/// Scratch buffer pool limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferPoolConfig {
    /// Buffers that grew past this many bytes are dropped on release
    #[serde(default = "default_max_capacity")]
    pub max_capacity: usize,

    /// Idle buffers retained at most
    #[serde(default = "default_max_buffers")]
    pub max_buffers: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            concurrent_deadline_ms: default_deadline_ms(),
            binary_scan_offset: default_scan_offset(),
            fast_min_size: default_fast_min_size(),
            generic_terms: false,
            buffer_pool: BufferPoolConfig::default(),
        }
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            max_buffers: default_max_buffers(),
        }
    }
}

impl DetectorConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Invalid detector config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.concurrent_deadline_ms == 0 {
            return Err(Error::config("concurrent_deadline_ms must be greater than zero"));
        }
        if self.buffer_pool.max_capacity == 0 {
            return Err(Error::config("buffer_pool.max_capacity must be greater than zero"));
        }
        Ok(())
    }

    /// Concurrent dispatch deadline
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.concurrent_deadline_ms)
    }
}

fn default_deadline_ms() -> u64 {
    5_000
}

fn default_scan_offset() -> usize {
    DEFAULT_SCAN_OFFSET
}

fn default_fast_min_size() -> usize {
    DEFAULT_FAST_MIN_SIZE
}

fn default_max_capacity() -> usize {
    DEFAULT_MAX_CAPACITY
}

fn default_max_buffers() -> usize {
    DEFAULT_MAX_BUFFERS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.deadline(), Duration::from_secs(5));
        assert_eq!(config.binary_scan_offset, 1000);
        assert_eq!(config.fast_min_size, 1024);
        assert!(!config.generic_terms);
        assert_eq!(config.buffer_pool.max_capacity, 2 * 1024 * 1024);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
concurrent_deadline_ms: 250
generic_terms: true
buffer_pool:
  max_buffers: 4
"#;
        let config = DetectorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.deadline(), Duration::from_millis(250));
        assert!(config.generic_terms);
        assert_eq!(config.buffer_pool.max_buffers, 4);
        assert_eq!(config.buffer_pool.max_capacity, DEFAULT_MAX_CAPACITY);
        assert_eq!(config.binary_scan_offset, 1000);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(DetectorConfig::from_yaml("{}").unwrap(), DetectorConfig::default());
    }

    #[test]
    fn test_zero_deadline_rejected() {
        let err = DetectorConfig::from_yaml("concurrent_deadline_ms: 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provscan.yaml");
        std::fs::write(&path, "fast_min_size: 2048\n").unwrap();

        let config = DetectorConfig::from_file(&path).unwrap();
        assert_eq!(config.fast_min_size, 2048);

        assert!(DetectorConfig::from_file(dir.path().join("missing.yaml")).is_err());
    }
}
