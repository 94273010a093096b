//! Channel dispatcher
//!
//! Runs the evidence channels either one after another with short-circuit,
//! or all at once with a bounded wait. In both modes the channel list order
//! is the priority order, so the verdict never depends on which task
//! happens to finish first.

use crate::detector::Detector;
use futures::future::join_all;
use provscan_core::{ChannelOutcome, DetectionResult, Error, Evidence, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default bound on the concurrent wait
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Ordered set of channels plus the concurrent deadline
#[derive(Clone)]
pub struct Dispatcher {
    channels: Vec<Arc<dyn Detector>>,
    deadline: Duration,
}

impl Dispatcher {
    /// Create a dispatcher; `channels` are listed highest priority first
    pub fn new(channels: Vec<Arc<dyn Detector>>, deadline: Duration) -> Self {
        Self { channels, deadline }
    }

    /// Run channels in priority order, stopping at the first match
    pub fn run_sequential(&self, evidence: &Evidence) -> DetectionResult {
        for channel in &self.channels {
            let outcome = run_channel(channel.as_ref(), evidence);
            if outcome.matched {
                return outcome.into_result();
            }
        }
        DetectionResult::none()
    }

    /// Run every channel in parallel and wait at most [`Self::deadline`]
    ///
    /// Channels run on the blocking pool. When the deadline passes the
    /// verdict is no-match; unfinished channels keep running in the
    /// background and their results are dropped.
    pub async fn run_concurrent(&self, evidence: Evidence) -> DetectionResult {
        self.try_run_concurrent(evidence)
            .await
            .unwrap_or_else(|_| DetectionResult::none())
    }

    /// Like [`Self::run_concurrent`] but reports deadline expiry as
    /// [`Error::Timeout`] instead of folding it into no-match
    pub async fn try_run_concurrent(&self, evidence: Evidence) -> Result<DetectionResult> {
        let evidence = Arc::new(evidence);

        let handles = self.channels.iter().map(|channel| {
            let channel = Arc::clone(channel);
            let evidence = Arc::clone(&evidence);
            tokio::task::spawn_blocking(move || run_channel(channel.as_ref(), &evidence))
        });

        let joined = match tokio::time::timeout(self.deadline, join_all(handles)).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    deadline_ms = self.deadline.as_millis() as u64,
                    source = ?evidence.source,
                    "channel deadline expired, returning no-match"
                );
                metrics::counter!("provscan_deadline_expired_total").increment(1);
                return Err(Error::Timeout);
            }
        };

        let outcomes = joined
            .into_iter()
            .zip(&self.channels)
            .map(|(joined, channel)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(channel = channel.name(), error = %e, "channel task failed");
                    ChannelOutcome::no_match()
                }
            });

        Ok(select_by_priority(outcomes))
    }
}

/// First matched outcome in iteration order
pub fn select_by_priority(outcomes: impl IntoIterator<Item = ChannelOutcome>) -> DetectionResult {
    outcomes
        .into_iter()
        .find(|o| o.matched)
        .map(ChannelOutcome::into_result)
        .unwrap_or_else(DetectionResult::none)
}

/// Run one channel, degrading an error to no-match
fn run_channel(channel: &dyn Detector, evidence: &Evidence) -> ChannelOutcome {
    let start = Instant::now();
    let outcome = match channel.scan(evidence) {
        Ok(outcome) => outcome,
        Err(e) => {
            debug!(channel = channel.name(), error = %e, "channel could not scan");
            ChannelOutcome::no_match()
        }
    };

    debug!(
        channel = channel.name(),
        matched = outcome.matched,
        latency_us = start.elapsed().as_micros() as u64,
        "channel finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use provscan_core::DetectionMethod;

    struct Fixed {
        method: DetectionMethod,
        provider: Option<&'static str>,
    }

    impl Detector for Fixed {
        fn scan(&self, _evidence: &Evidence) -> Result<ChannelOutcome> {
            Ok(match self.provider {
                Some(p) => ChannelOutcome::matched(p, self.method, "fixed"),
                None => ChannelOutcome::no_match(),
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn method(&self) -> DetectionMethod {
            self.method
        }
    }

    struct Failing;

    impl Detector for Failing {
        fn scan(&self, _evidence: &Evidence) -> Result<ChannelOutcome> {
            Err(Error::metadata("corrupt block"))
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn method(&self) -> DetectionMethod {
            DetectionMethod::Exif
        }
    }

    fn fixed(method: DetectionMethod, provider: Option<&'static str>) -> Arc<dyn Detector> {
        Arc::new(Fixed { method, provider })
    }

    #[test]
    fn test_sequential_short_circuit_and_priority() {
        let d = Dispatcher::new(
            vec![
                fixed(DetectionMethod::C2pa, None),
                Arc::new(Failing),
                fixed(DetectionMethod::Binary, Some("Midjourney")),
                fixed(DetectionMethod::Xmp, Some("OpenAI")),
            ],
            DEFAULT_DEADLINE,
        );

        let r = d.run_sequential(&Evidence::default());
        assert_eq!(r.provider, "Midjourney");
        assert_eq!(r.method, Some(DetectionMethod::Binary));
    }

    #[test]
    fn test_sequential_all_quiet() {
        let d = Dispatcher::new(vec![Arc::new(Failing), fixed(DetectionMethod::Xmp, None)], DEFAULT_DEADLINE);
        assert_eq!(d.run_sequential(&Evidence::default()), DetectionResult::none());
    }

    #[tokio::test]
    async fn test_concurrent_uses_list_priority() {
        let d = Dispatcher::new(
            vec![
                fixed(DetectionMethod::C2pa, Some("Unknown C2PA")),
                fixed(DetectionMethod::Exif, Some("Midjourney")),
            ],
            DEFAULT_DEADLINE,
        );

        let r = d.run_concurrent(Evidence::default()).await;
        assert_eq!(r.method, Some(DetectionMethod::C2pa));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_try_run_reports_timeout() {
        struct Stalled;

        impl Detector for Stalled {
            fn scan(&self, _evidence: &Evidence) -> Result<ChannelOutcome> {
                std::thread::sleep(Duration::from_millis(200));
                Ok(ChannelOutcome::no_match())
            }

            fn name(&self) -> &str {
                "stalled"
            }

            fn method(&self) -> DetectionMethod {
                DetectionMethod::Exif
            }
        }

        let d = Dispatcher::new(vec![Arc::new(Stalled)], Duration::from_millis(20));
        let err = d.try_run_concurrent(Evidence::default()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(d.run_concurrent(Evidence::default()).await, DetectionResult::none());
    }

    #[test]
    fn test_select_by_priority() {
        let picked = select_by_priority(vec![
            ChannelOutcome::no_match(),
            ChannelOutcome::matched("FLUX", DetectionMethod::Binary, "a"),
            ChannelOutcome::matched("Grok", DetectionMethod::Xmp, "b"),
        ]);
        assert_eq!(picked.provider, "FLUX");
        assert_eq!(select_by_priority(Vec::new()), DetectionResult::none());
    }
}
