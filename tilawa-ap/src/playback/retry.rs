//! Retry policy for verse loads
//!
//! Network-class failures while loading are retried locally up to a bound;
//! everything else surfaces as `Phase::Error`.

use crate::playback::primitive::PrimitiveFault;
use tilawa_common::events::{ErrorKind, LoadFailure};

/// Default number of reloads attempted after a transient failure
pub const DEFAULT_MAX_RETRIES: u8 = 3;

/// Words that mark an otherwise unclassified failure as network/timeout class
const TRANSIENT_MARKERS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "connection",
    "unreachable",
    "dns",
    "temporarily",
    "502",
    "503",
    "504",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u8,
}

impl RetryPolicy {
    pub fn new(max_retries: u8) -> Self {
        Self { max_retries }
    }

    /// Map a primitive failure onto the engine's error taxonomy
    pub fn classify(&self, fault: &PrimitiveFault) -> ErrorKind {
        match fault {
            PrimitiveFault::Network(_) | PrimitiveFault::Timeout => {
                ErrorKind::LoadFailed(LoadFailure::Transient)
            }
            PrimitiveFault::NotFound(_) | PrimitiveFault::UnsupportedFormat(_) => {
                ErrorKind::LoadFailed(LoadFailure::Permanent)
            }
            PrimitiveFault::Device(_) => ErrorKind::PlaybackDeviceError,
            PrimitiveFault::Unloaded => ErrorKind::PrimitiveLost,
            PrimitiveFault::Other(text) => {
                if is_transient_text(text) {
                    ErrorKind::LoadFailed(LoadFailure::Transient)
                } else {
                    ErrorKind::LoadFailed(LoadFailure::Permanent)
                }
            }
        }
    }

    /// True when a failure of `kind` after `retry_count` retries earns another attempt
    pub fn should_retry(&self, kind: ErrorKind, retry_count: u8) -> bool {
        kind.is_transient() && retry_count < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

fn is_transient_text(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}
