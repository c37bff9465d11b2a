//! Event types for the Tilawa event system
//!
//! Provides shared event definitions and the EventBus used to fan playback
//! notifications out to SSE clients and other listeners.

mod playback_types;

pub use playback_types::{ErrorKind, LoadFailure, Phase};

use crate::verse::{SurahContext, VerseKey};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Tilawa event types
///
/// Serialized with a `type` tag and pushed to clients over SSE.
/// Every playback event carries the id of the reading session that produced it,
/// so a client that switched surah can drop late events from the old session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TilawaEvent {
    /// A reading session was created (engine start or surah change)
    SessionStarted {
        session_id: Uuid,
        surah: SurahContext,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Engine phase changed
    ///
    /// Triggers:
    /// - SSE: Update play/pause controls and the highlighted verse
    PlaybackPhaseChanged {
        session_id: Uuid,
        /// Verse the listener currently intends to hear
        verse: Option<VerseKey>,
        old_phase: Phase,
        new_phase: Phase,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A verse clip started playing (first confirmation after a load)
    VerseStarted {
        session_id: Uuid,
        verse: VerseKey,
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A verse clip played to its end
    VerseCompleted {
        session_id: Uuid,
        verse: VerseKey,
        /// Verse requested by autoplay, if any
        autoplay_next: Option<VerseKey>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Position report of the playing verse
    ///
    /// Best effort, for progress bars only. Dropped freely under load.
    PlaybackProgress {
        session_id: Uuid,
        verse: VerseKey,
        position_ms: u64,
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The engine entered the Error phase
    PlaybackFailed {
        session_id: Uuid,
        verse: Option<VerseKey>,
        error: ErrorKind,
        /// Retries spent before giving up
        retry_count: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Autoplay setting changed
    AutoplayChanged {
        enabled: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TilawaEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            TilawaEvent::SessionStarted { .. } => "SessionStarted",
            TilawaEvent::PlaybackPhaseChanged { .. } => "PlaybackPhaseChanged",
            TilawaEvent::VerseStarted { .. } => "VerseStarted",
            TilawaEvent::VerseCompleted { .. } => "VerseCompleted",
            TilawaEvent::PlaybackProgress { .. } => "PlaybackProgress",
            TilawaEvent::PlaybackFailed { .. } => "PlaybackFailed",
            TilawaEvent::AutoplayChanged { .. } => "AutoplayChanged",
        }
    }
}

/// Fan-out of `TilawaEvent`s to SSE clients and tests
///
/// Backed by a bounded broadcast channel: publishing never waits, and a
/// subscriber that falls more than `capacity` events behind sees a lag
/// error and skips ahead.
///
/// # Examples
///
/// ```
/// use tilawa_common::events::{EventBus, TilawaEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(TilawaEvent::AutoplayChanged {
///     enabled: true,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "AutoplayChanged");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TilawaEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Receiver for events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TilawaEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers; fails when nobody is listening
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TilawaEvent,
    ) -> Result<usize, broadcast::error::SendError<TilawaEvent>> {
        self.tx.send(event)
    }

    /// Publish, dropping the event when nobody is listening
    pub fn emit_lossy(&self, event: TilawaEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
