//! Verse playback engine
//!
//! Pure state machine (`state`, `events`, `transition`, `retry`) plus the
//! side-effecting half (`effects`, `watchdog`, `engine`) that drives a
//! `VersePrimitive`.

pub mod audio_session;
pub mod effects;
pub mod engine;
pub mod events;
pub mod primitive;
pub mod retry;
pub mod simulated;
pub mod state;
pub mod transition;
pub mod watchdog;

pub use engine::{EngineConfig, VersePlaybackEngine};
pub use events::PlaybackEvent;
pub use primitive::{PrimitiveFactory, PrimitiveFault, PrimitiveStatus, StatusListener, VersePrimitive};
pub use retry::RetryPolicy;
pub use state::{PlaybackSnapshot, PlaybackState};
