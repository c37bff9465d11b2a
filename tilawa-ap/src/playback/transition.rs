//! Playback state machine
//!
//! `transition` is the only place playback state changes are decided. It is a
//! pure function of the current state and one event: no I/O, no clock, no
//! primitive access. The effect runner observes the resulting state and
//! performs whatever primitive calls it implies.
//!
//! Primitive status arrives asynchronously and can race with newer requests,
//! so every primitive-originated event is checked against the verse the state
//! is currently bound to and silently dropped when it does not match.

use crate::playback::events::PlaybackEvent;
use crate::playback::retry::RetryPolicy;
use crate::playback::state::PlaybackState;
use tilawa_common::events::{ErrorKind, Phase};
use tilawa_common::VerseKey;

/// Apply one event to the state, returning the successor state
///
/// Events that are not valid in the current phase, or that refer to a verse
/// the state is no longer bound to, return an unchanged copy.
pub fn transition(state: &PlaybackState, event: &PlaybackEvent, retry: &RetryPolicy) -> PlaybackState {
    match event {
        PlaybackEvent::RequestPlay(key) => request_play(state, *key),
        PlaybackEvent::RequestPause => request_pause(state),
        PlaybackEvent::RequestResume => request_resume(state),
        PlaybackEvent::RequestStop => request_stop(state),
        PlaybackEvent::RequestSeek(position_ms) => request_seek(state, *position_ms),
        PlaybackEvent::PrimitiveLoadStarted(key) => load_started(state, *key),
        PlaybackEvent::PrimitiveNowPlaying {
            key,
            duration_ms,
            position_ms,
        } => now_playing(state, *key, *duration_ms, *position_ms),
        PlaybackEvent::PrimitivePaused { key, position_ms } => paused(state, *key, *position_ms),
        PlaybackEvent::PrimitiveBuffering { key, buffering } => buffering_changed(state, *key, *buffering),
        PlaybackEvent::PrimitivePositionUpdate {
            key,
            position_ms,
            duration_ms,
        } => position_update(state, *key, *position_ms, *duration_ms),
        PlaybackEvent::PrimitiveFinished { key } => finished(state, *key),
        PlaybackEvent::PrimitiveError { kind, key } => primitive_error(state, *kind, *key, retry),
        PlaybackEvent::PrimitiveSeekCompleted { key, position_ms } => seek_completed(state, *key, *position_ms),
        PlaybackEvent::PrimitiveStopped => stopped(state),
        PlaybackEvent::AutoplayChanged(enabled) => PlaybackState {
            autoplay_enabled: *enabled,
            ..state.clone()
        },
    }
}

// ============================================================================
// Listener requests
// ============================================================================

fn request_play(state: &PlaybackState, key: VerseKey) -> PlaybackState {
    if !key.is_within(&state.surah) {
        return state.clone();
    }

    let effective = state.effective_phase();

    if state.active_verse == Some(key) {
        // Resume in place: the loaded resource is reused, never reloaded
        if state.loaded_verse == Some(key) && matches!(effective, Phase::Paused | Phase::Pausing) {
            return PlaybackState {
                phase: Phase::Resuming,
                interrupted_phase: None,
                ..state.clone()
            };
        }

        // Already heading for (or at) audible playback of this verse
        if matches!(
            effective,
            Phase::LoadRequested | Phase::Loading | Phase::Playing | Phase::Resuming | Phase::Seeking
        ) {
            return state.clone();
        }
    }

    begin_load(state, key)
}

fn request_pause(state: &PlaybackState) -> PlaybackState {
    let allowed = matches!(state.effective_phase(), Phase::Playing | Phase::Resuming)
        || state.phase == Phase::Buffering;

    if !allowed || state.loaded_verse.is_none() {
        return state.clone();
    }

    PlaybackState {
        phase: Phase::Pausing,
        interrupted_phase: None,
        ..state.clone()
    }
}

fn request_resume(state: &PlaybackState) -> PlaybackState {
    if !matches!(state.effective_phase(), Phase::Paused | Phase::Pausing) || state.loaded_verse.is_none() {
        return state.clone();
    }

    PlaybackState {
        phase: Phase::Resuming,
        interrupted_phase: None,
        ..state.clone()
    }
}

fn request_stop(state: &PlaybackState) -> PlaybackState {
    if matches!(state.phase, Phase::Idle | Phase::Stopping) {
        return state.clone();
    }

    PlaybackState {
        phase: Phase::Stopping,
        pending_seek: None,
        interrupted_phase: None,
        seek_origin: None,
        ..state.clone()
    }
}

fn request_seek(state: &PlaybackState, position_ms: u64) -> PlaybackState {
    let effective = state.effective_phase();
    let allowed = match state.phase {
        Phase::Playing | Phase::Paused => true,
        Phase::Buffering => matches!(
            effective,
            Phase::Playing | Phase::Paused | Phase::Resuming | Phase::Seeking
        ),
        _ => false,
    };

    if !allowed || state.loaded_verse.is_none() {
        return state.clone();
    }

    let target = clamp_to_duration(position_ms, state.duration_ms);
    let origin = match effective {
        Phase::Paused => Phase::Paused,
        Phase::Seeking => state.seek_origin.unwrap_or(Phase::Playing),
        _ => Phase::Playing,
    };

    PlaybackState {
        phase: Phase::Seeking,
        pending_seek: Some(target),
        position_ms: target,
        seek_origin: Some(origin),
        interrupted_phase: None,
        seek_seq: state.seek_seq + 1,
        ..state.clone()
    }
}

// ============================================================================
// Primitive feedback
// ============================================================================

fn load_started(state: &PlaybackState, key: VerseKey) -> PlaybackState {
    if state.active_verse != Some(key) || state.phase != Phase::LoadRequested {
        return state.clone();
    }

    // retry_count survives: only a confirmed playback resets it
    PlaybackState {
        loaded_verse: Some(key),
        phase: Phase::Loading,
        position_ms: 0,
        duration_ms: 0,
        ..state.clone()
    }
}

fn now_playing(state: &PlaybackState, key: VerseKey, duration_ms: u64, position_ms: u64) -> PlaybackState {
    if !state.is_bound_to(key)
        || !matches!(
            state.effective_phase(),
            Phase::Loading | Phase::Resuming | Phase::Playing
        )
    {
        return state.clone();
    }

    PlaybackState {
        phase: Phase::Playing,
        duration_ms,
        position_ms: clamp_to_duration(position_ms, duration_ms),
        last_error: None,
        retry_count: 0,
        interrupted_phase: None,
        ..state.clone()
    }
}

fn paused(state: &PlaybackState, key: VerseKey, position_ms: u64) -> PlaybackState {
    if !state.is_bound_to(key) || !matches!(state.effective_phase(), Phase::Pausing | Phase::Playing) {
        return state.clone();
    }

    PlaybackState {
        phase: Phase::Paused,
        position_ms: clamp_to_duration(position_ms, state.duration_ms),
        interrupted_phase: None,
        ..state.clone()
    }
}

fn buffering_changed(state: &PlaybackState, key: VerseKey, buffering: bool) -> PlaybackState {
    if !state.is_bound_to(key) {
        return state.clone();
    }

    if buffering {
        if matches!(
            state.phase,
            Phase::Idle | Phase::Error | Phase::Stopping | Phase::LoadRequested | Phase::Buffering
        ) {
            return state.clone();
        }
        return PlaybackState {
            phase: Phase::Buffering,
            interrupted_phase: Some(state.phase),
            ..state.clone()
        };
    }

    match (state.phase, state.interrupted_phase) {
        (Phase::Buffering, Some(interrupted)) => PlaybackState {
            phase: interrupted,
            interrupted_phase: None,
            ..state.clone()
        },
        _ => state.clone(),
    }
}

fn position_update(
    state: &PlaybackState,
    key: VerseKey,
    position_ms: u64,
    duration_ms: Option<u64>,
) -> PlaybackState {
    if !state.is_bound_to(key)
        || state.phase == Phase::Seeking
        || matches!(
            state.effective_phase(),
            Phase::Idle | Phase::Error | Phase::Stopping | Phase::LoadRequested | Phase::Seeking
        )
    {
        return state.clone();
    }

    let duration_ms = duration_ms.unwrap_or(state.duration_ms);
    PlaybackState {
        position_ms: clamp_to_duration(position_ms, duration_ms),
        duration_ms,
        ..state.clone()
    }
}

/// Natural end of a clip: advance when autoplay allows it, otherwise go idle
///
/// Advancing goes through exactly the same path as a listener's play request.
fn finished(state: &PlaybackState, key: VerseKey) -> PlaybackState {
    if !state.is_bound_to(key)
        || matches!(
            state.phase,
            Phase::Idle | Phase::LoadRequested | Phase::Stopping | Phase::Error
        )
    {
        return state.clone();
    }

    let listener_paused = matches!(state.effective_phase(), Phase::Pausing | Phase::Paused);
    if state.autoplay_enabled
        && !listener_paused
        && key.surah == state.surah.surah
        && key.verse < state.surah.total_verses
    {
        return request_play(state, key.next());
    }

    idle(state)
}

fn primitive_error(
    state: &PlaybackState,
    kind: ErrorKind,
    key: Option<VerseKey>,
    retry: &RetryPolicy,
) -> PlaybackState {
    if matches!(state.phase, Phase::Idle | Phase::Stopping | Phase::Error) || state.active_verse.is_none() {
        return state.clone();
    }
    if key.is_some() && key != state.active_verse {
        return state.clone();
    }

    if kind == ErrorKind::PrimitiveLost {
        // An instance that is not (or no longer) bound cannot be lost
        if key.is_some() && key != state.loaded_verse {
            return state.clone();
        }
        return idle(state);
    }

    if retry.should_retry(kind, state.retry_count) && state.effective_phase().is_loading() {
        if let Some(active) = state.active_verse {
            let reload = begin_load(state, active);
            return PlaybackState {
                retry_count: state.retry_count + 1,
                ..reload
            };
        }
    }

    PlaybackState {
        phase: Phase::Error,
        last_error: Some(kind),
        loaded_verse: None,
        pending_seek: None,
        interrupted_phase: None,
        seek_origin: None,
        ..state.clone()
    }
}

fn seek_completed(state: &PlaybackState, key: VerseKey, position_ms: u64) -> PlaybackState {
    if !state.is_bound_to(key) {
        return state.clone();
    }

    let origin = state.seek_origin.unwrap_or(Phase::Playing);
    let position_ms = clamp_to_duration(position_ms, state.duration_ms);

    match (state.phase, state.interrupted_phase) {
        (Phase::Seeking, _) => PlaybackState {
            phase: origin,
            position_ms,
            pending_seek: None,
            seek_origin: None,
            ..state.clone()
        },
        (Phase::Buffering, Some(Phase::Seeking)) => PlaybackState {
            interrupted_phase: Some(origin),
            position_ms,
            pending_seek: None,
            seek_origin: None,
            ..state.clone()
        },
        _ => state.clone(),
    }
}

fn stopped(state: &PlaybackState) -> PlaybackState {
    if state.phase != Phase::Stopping {
        return state.clone();
    }
    idle(state)
}

// ============================================================================
// Helpers
// ============================================================================

/// Enter `LoadRequested` for `key`, discarding everything tied to the previous load
fn begin_load(state: &PlaybackState, key: VerseKey) -> PlaybackState {
    PlaybackState {
        active_verse: Some(key),
        loaded_verse: None,
        phase: Phase::LoadRequested,
        position_ms: 0,
        duration_ms: 0,
        last_error: None,
        retry_count: 0,
        pending_seek: None,
        interrupted_phase: None,
        seek_origin: None,
        load_generation: state.load_generation + 1,
        ..state.clone()
    }
}

fn idle(state: &PlaybackState) -> PlaybackState {
    PlaybackState {
        active_verse: None,
        loaded_verse: None,
        phase: Phase::Idle,
        position_ms: 0,
        duration_ms: 0,
        last_error: None,
        retry_count: 0,
        pending_seek: None,
        interrupted_phase: None,
        seek_origin: None,
        ..state.clone()
    }
}

fn clamp_to_duration(position_ms: u64, duration_ms: u64) -> u64 {
    if duration_ms > 0 {
        position_ms.min(duration_ms)
    } else {
        position_ms
    }
}
