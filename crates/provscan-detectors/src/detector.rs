//! Detector trait shared by the evidence channels

use provscan_core::{ChannelOutcome, DetectionMethod, Evidence, Result};

/// One evidence channel
///
/// Channels are synchronous, CPU-bound and never suspend mid-scan. An `Err`
/// means "this channel could not look"; the dispatcher treats it exactly like
/// a no-match.
pub trait Detector: Send + Sync {
    /// Inspect the evidence
    fn scan(&self, evidence: &Evidence) -> Result<ChannelOutcome>;

    /// Detector name, for logs
    fn name(&self) -> &str;

    /// Channel this detector reports as
    fn method(&self) -> DetectionMethod;
}
