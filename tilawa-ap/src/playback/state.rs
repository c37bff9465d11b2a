//! Playback state of a verse reading session
//!
//! `PlaybackState` is what the engine currently believes is true. It is never
//! mutated in place: the transition function returns a fresh value for every
//! event and the engine swaps it in wholesale.

use serde::Serialize;
use tilawa_common::events::{ErrorKind, Phase};
use tilawa_common::{SurahContext, VerseKey};
use uuid::Uuid;

/// Complete engine state for one reading session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackState {
    /// Identifies the reading session; changes on every surah change
    pub session_id: Uuid,

    /// Verse the listener currently intends to hear (loading, playing or paused)
    pub active_verse: Option<VerseKey>,

    /// Verse bound to the live primitive instance, if any
    pub loaded_verse: Option<VerseKey>,

    pub phase: Phase,

    /// Last known position; reset to 0 whenever `loaded_verse` changes.
    /// During a pending seek this is the requested target.
    pub position_ms: u64,

    /// Last known clip duration, 0 while unknown
    pub duration_ms: u64,

    pub last_error: Option<ErrorKind>,

    /// External setting, pushed in
    pub autoplay_enabled: bool,

    /// Surah of this session; `total_verses` bounds autoplay
    pub surah: SurahContext,

    /// Retries spent on the current load of `active_verse`
    pub retry_count: u8,

    /// Seek target awaiting execution
    pub pending_seek: Option<u64>,

    /// Phase interrupted by a `Buffering` overlay
    pub interrupted_phase: Option<Phase>,

    /// Phase to return to once the pending seek completes
    pub seek_origin: Option<Phase>,

    /// Incremented on every entry into `LoadRequested`
    pub load_generation: u64,

    /// Incremented on every accepted seek request
    pub seek_seq: u64,
}

impl PlaybackState {
    /// Fresh `Idle` state for a new reading session
    pub fn new(surah: SurahContext, autoplay_enabled: bool) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            active_verse: None,
            loaded_verse: None,
            phase: Phase::Idle,
            position_ms: 0,
            duration_ms: 0,
            last_error: None,
            autoplay_enabled,
            surah,
            retry_count: 0,
            pending_seek: None,
            interrupted_phase: None,
            seek_origin: None,
            load_generation: 0,
            seek_seq: 0,
        }
    }

    /// Phase requests are judged against: the interrupted phase while buffering
    pub fn effective_phase(&self) -> Phase {
        match (self.phase, self.interrupted_phase) {
            (Phase::Buffering, Some(interrupted)) => interrupted,
            (phase, _) => phase,
        }
    }

    /// True when `key` is both the intended and the loaded verse
    pub fn is_bound_to(&self, key: VerseKey) -> bool {
        self.active_verse == Some(key) && self.loaded_verse == Some(key)
    }

    /// Read-only projection for rendering
    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            session_id: self.session_id,
            surah: self.surah.surah,
            total_verses: self.surah.total_verses,
            verse: self.active_verse.map(|k| k.verse),
            phase: self.phase,
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            error: self.last_error,
            autoplay_enabled: self.autoplay_enabled,
            retry_count: self.retry_count,
        }
    }
}

/// What the UI needs to render the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackSnapshot {
    pub session_id: Uuid,
    pub surah: u16,
    pub total_verses: u16,
    /// Current verse number within the surah
    pub verse: Option<u16>,
    pub phase: Phase,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub error: Option<ErrorKind>,
    pub autoplay_enabled: bool,
    pub retry_count: u8,
}
