//! Platform audio primitive abstraction
//!
//! A primitive is the opaque platform object that can load and play exactly
//! one audio resource. A new resource always requires a new instance, created
//! through a `PrimitiveFactory`. Only the effect runner calls these methods.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tilawa_common::VerseKey;

/// Status notification emitted by a primitive instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveStatus {
    /// Resource loaded; duration known
    Loaded { duration_ms: u64 },
    /// Playback is audibly running
    Playing { position_ms: u64, duration_ms: u64 },
    Paused { position_ms: u64 },
    /// Entered (`true`) or left (`false`) a data stall
    Buffering(bool),
    /// Periodic position report
    Position {
        position_ms: u64,
        duration_ms: Option<u64>,
    },
    /// Played to the natural end
    Finished,
    Failed(PrimitiveFault),
    /// The instance lost its resource on its own
    Unloaded,
}

/// Callback receiving status notifications
pub type StatusListener = Arc<dyn Fn(PrimitiveStatus) + Send + Sync>;

/// Failure of a primitive call or of the loaded resource
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveFault {
    #[error("network error: {0}")]
    Network(String),

    #[error("operation timed out")]
    Timeout,

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("output device error: {0}")]
    Device(String),

    #[error("instance unloaded")]
    Unloaded,

    #[error("{0}")]
    Other(String),
}

/// One loadable, playable audio resource
///
/// Calls may suspend for network-bound durations. Implementations report
/// progress through the status listener; the listener may be replaced or
/// removed at any time and must not be called after removal.
#[async_trait]
pub trait VersePrimitive: Send + Sync {
    /// Load the resource; start playing as soon as it is ready when `play_when_ready`
    async fn load(&self, url: &str, play_when_ready: bool) -> Result<(), PrimitiveFault>;

    async fn play(&self) -> Result<(), PrimitiveFault>;

    async fn pause(&self) -> Result<(), PrimitiveFault>;

    async fn seek(&self, position_ms: u64) -> Result<(), PrimitiveFault>;

    /// Release the resource. The instance is unusable afterwards.
    async fn unload(&self) -> Result<(), PrimitiveFault>;

    /// Install or remove the status listener
    fn set_status_listener(&self, listener: Option<StatusListener>);
}

/// Creates primitive instances, one per resource
pub trait PrimitiveFactory: Send + Sync {
    fn create(&self, key: VerseKey, url: &str) -> Result<Arc<dyn VersePrimitive>, PrimitiveFault>;
}
