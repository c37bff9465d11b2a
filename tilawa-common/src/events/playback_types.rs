//! Playback-related type definitions
//!
//! Phase and error taxonomy of the verse playback engine. Shared so that
//! events and API responses describe the engine with the same vocabulary.

use serde::{Deserialize, Serialize};

/// Playback phase of a verse session
///
/// `Buffering` is an overlay: the engine remembers which phase it
/// interrupted and restores it when buffering ends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing requested, no primitive
    Idle,
    /// A verse was requested; the player has not been created yet
    LoadRequested,
    /// Player created and loading the clip
    Loading,
    Playing,
    /// Pause issued, not yet confirmed
    Pausing,
    Paused,
    /// Resume issued, waiting for playback to be confirmed
    Resuming,
    /// Seek issued, waiting for completion
    Seeking,
    /// Stop sequence in progress
    Stopping,
    /// Player reported it is waiting on data
    Buffering,
    /// The current attempt failed; see the recorded error
    Error,
}

impl Phase {
    /// Phases in which a load for the active verse is pending
    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::LoadRequested | Phase::Loading)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::LoadRequested => "load_requested",
            Phase::Loading => "loading",
            Phase::Playing => "playing",
            Phase::Pausing => "pausing",
            Phase::Paused => "paused",
            Phase::Resuming => "resuming",
            Phase::Seeking => "seeking",
            Phase::Stopping => "stopping",
            Phase::Buffering => "buffering",
            Phase::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Whether a load failure is worth retrying
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LoadFailure {
    /// Network or timeout class; retried locally
    Transient,
    /// Missing resource, unsupported format, etc.
    Permanent,
}

/// Error taxonomy of the playback engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ErrorKind {
    /// The clip could not be loaded
    LoadFailed(LoadFailure),
    /// Load or resume neither completed nor failed within the watchdog bound
    Stall,
    /// The platform output device refused an operation
    PlaybackDeviceError,
    /// Malformed or out-of-range verse reference
    InvalidKey,
    /// The player reported itself unloaded while the engine thought it was active
    PrimitiveLost,
}

impl ErrorKind {
    /// Transient failures are retried locally up to the retry bound
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::LoadFailed(LoadFailure::Transient) | ErrorKind::Stall)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::LoadFailed(LoadFailure::Transient) => write!(f, "load failed (transient)"),
            ErrorKind::LoadFailed(LoadFailure::Permanent) => write!(f, "load failed"),
            ErrorKind::Stall => write!(f, "playback stalled"),
            ErrorKind::PlaybackDeviceError => write!(f, "playback device error"),
            ErrorKind::InvalidKey => write!(f, "invalid verse reference"),
            ErrorKind::PrimitiveLost => write!(f, "player lost"),
        }
    }
}
