//! Internal playback events (not exposed via SSE)
//!
//! Everything that can change `PlaybackState` is one of these events: user
//! requests, status reported by the primitive, and completions of operations
//! issued by the effect runner. They are applied one at a time by the engine
//! loop. For events visible to clients, see `tilawa_common::events::TilawaEvent`.
//!
//! Primitive-originated events carry the key of the instance that produced
//! them so late events from a superseded instance can be recognized and
//! dropped.

use tilawa_common::events::ErrorKind;
use tilawa_common::VerseKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Listener asked to hear a verse
    RequestPlay(VerseKey),
    RequestPause,
    RequestResume,
    RequestStop,
    /// Seek to a position in milliseconds
    RequestSeek(u64),

    /// A primitive instance was created and bound to this verse
    PrimitiveLoadStarted(VerseKey),

    /// Playback is audibly running
    PrimitiveNowPlaying {
        key: VerseKey,
        duration_ms: u64,
        position_ms: u64,
    },

    PrimitivePaused {
        key: VerseKey,
        position_ms: u64,
    },

    PrimitiveBuffering {
        key: VerseKey,
        buffering: bool,
    },

    /// Periodic position report; best effort
    PrimitivePositionUpdate {
        key: VerseKey,
        position_ms: u64,
        duration_ms: Option<u64>,
    },

    /// The clip played to its natural end
    PrimitiveFinished { key: VerseKey },

    /// A failure, either reported by the primitive or synthesized (stall)
    PrimitiveError {
        kind: ErrorKind,
        key: Option<VerseKey>,
    },

    /// An issued seek settled
    PrimitiveSeekCompleted {
        key: VerseKey,
        position_ms: u64,
    },

    /// The stop sequence settled and no primitive remains
    PrimitiveStopped,

    /// The autoplay setting changed
    AutoplayChanged(bool),
}

impl PlaybackEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackEvent::RequestPlay(_) => "RequestPlay",
            PlaybackEvent::RequestPause => "RequestPause",
            PlaybackEvent::RequestResume => "RequestResume",
            PlaybackEvent::RequestStop => "RequestStop",
            PlaybackEvent::RequestSeek(_) => "RequestSeek",
            PlaybackEvent::PrimitiveLoadStarted(_) => "PrimitiveLoadStarted",
            PlaybackEvent::PrimitiveNowPlaying { .. } => "PrimitiveNowPlaying",
            PlaybackEvent::PrimitivePaused { .. } => "PrimitivePaused",
            PlaybackEvent::PrimitiveBuffering { .. } => "PrimitiveBuffering",
            PlaybackEvent::PrimitivePositionUpdate { .. } => "PrimitivePositionUpdate",
            PlaybackEvent::PrimitiveFinished { .. } => "PrimitiveFinished",
            PlaybackEvent::PrimitiveError { .. } => "PrimitiveError",
            PlaybackEvent::PrimitiveSeekCompleted { .. } => "PrimitiveSeekCompleted",
            PlaybackEvent::PrimitiveStopped => "PrimitiveStopped",
            PlaybackEvent::AutoplayChanged(_) => "AutoplayChanged",
        }
    }

    /// True for listener requests (as opposed to primitive feedback)
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            PlaybackEvent::RequestPlay(_)
                | PlaybackEvent::RequestPause
                | PlaybackEvent::RequestResume
                | PlaybackEvent::RequestStop
                | PlaybackEvent::RequestSeek(_)
        )
    }
}
