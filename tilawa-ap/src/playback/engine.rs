//! Verse playback engine - serialized event loop and public handle
//!
//! **Responsibilities:**
//! - Own the `PlaybackState` of the current reading session and apply every
//!   event to it, strictly one at a time
//! - Drive the `EffectRunner` after each state change
//! - Publish state snapshots (watch channel) and client events (`EventBus`)
//!
//! All inputs arrive as `EngineMessage`s on a single channel: listener
//! requests from the handle, primitive status from listeners, settled
//! operations, and watchdog expiries. The loop task is the only owner of the
//! state and the runner, so no locking is needed around either.

use crate::error::{Error, Result};
use crate::playback::effects::{EffectRunner, Settled};
use crate::playback::events::PlaybackEvent;
use crate::playback::primitive::PrimitiveFactory;
use crate::playback::retry::RetryPolicy;
use crate::playback::state::{PlaybackSnapshot, PlaybackState};
use crate::playback::transition::transition;
use crate::playback::watchdog::DEFAULT_STALL_TIMEOUT;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tilawa_common::events::{EventBus, Phase, TilawaEvent};
use tilawa_common::{AudioSource, SurahContext, VerseKey};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Input to the engine loop
#[derive(Debug)]
pub enum EngineMessage {
    /// Listener request or setting change
    Event(PlaybackEvent),
    /// Status from a primitive instance, stamped with the runner's instance id
    Status { instance: u64, event: PlaybackEvent },
    /// A primitive operation finished
    Settled(Settled),
    /// A watchdog timer expired
    StallDetected { arm_id: u64 },
    /// Discard the session and start a new one for another surah
    ChangeSurah {
        surah: SurahContext,
        ack: oneshot::Sender<()>,
    },
    Shutdown { ack: oneshot::Sender<()> },
}

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub source: AudioSource,
    /// Bound for a load or resume to reach playback; also bounds each primitive call
    pub stall_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source: AudioSource::default(),
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Cloneable handle to a running engine
///
/// Every request is fire-and-forget: it is queued for the loop and the
/// outcome becomes visible through `subscribe()` / `events()`.
#[derive(Clone)]
pub struct VersePlaybackEngine {
    tx: mpsc::UnboundedSender<EngineMessage>,
    state_rx: watch::Receiver<PlaybackState>,
    event_bus: EventBus,
}

impl VersePlaybackEngine {
    /// Start the engine loop for `surah`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: EngineConfig,
        factory: Arc<dyn PrimitiveFactory>,
        surah: SurahContext,
        autoplay_enabled: bool,
        event_bus: EventBus,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = PlaybackState::new(surah, autoplay_enabled);
        let (state_tx, state_rx) = watch::channel(state.clone());

        let runner = EffectRunner::new(
            factory,
            config.source,
            config.retry,
            config.stall_timeout,
            tx.clone(),
        );

        emit_session_started(&event_bus, &state);
        info!(
            "Playback engine started for surah {} ({} verses), autoplay {}",
            surah.surah, surah.total_verses, autoplay_enabled
        );

        let engine_loop = EngineLoop {
            state,
            runner,
            retry: config.retry,
            state_tx,
            event_bus: event_bus.clone(),
            rx,
        };
        tokio::spawn(engine_loop.run());

        Self {
            tx,
            state_rx,
            event_bus,
        }
    }

    /// Play a verse of the current surah by its number
    pub fn request_play(&self, verse: u16) -> Result<()> {
        let surah = self.state_rx.borrow().surah;
        self.request_play_key(surah.key(verse))
    }

    /// Play a verse by key; the key must belong to the current surah
    pub fn request_play_key(&self, key: VerseKey) -> Result<()> {
        let surah = self.state_rx.borrow().surah;
        if !key.is_within(&surah) {
            return Err(Error::InvalidKey(format!(
                "{} is not a verse of surah {} (1-{})",
                key, surah.surah, surah.total_verses
            )));
        }
        info!("Play requested: {}", key);
        self.send_event(PlaybackEvent::RequestPlay(key))
    }

    pub fn request_pause(&self) -> Result<()> {
        info!("Pause requested");
        self.send_event(PlaybackEvent::RequestPause)
    }

    pub fn request_resume(&self) -> Result<()> {
        info!("Resume requested");
        self.send_event(PlaybackEvent::RequestResume)
    }

    pub fn request_stop(&self) -> Result<()> {
        info!("Stop requested");
        self.send_event(PlaybackEvent::RequestStop)
    }

    pub fn request_seek(&self, position_ms: u64) -> Result<()> {
        info!("Seek requested: {}ms", position_ms);
        self.send_event(PlaybackEvent::RequestSeek(position_ms))
    }

    /// Push the external autoplay setting into the engine
    pub fn set_autoplay(&self, enabled: bool) -> Result<()> {
        self.send_event(PlaybackEvent::AutoplayChanged(enabled))
    }

    /// Tear down the current session and start a fresh one for `surah`
    ///
    /// Returns once the old primitive has been released.
    pub async fn change_surah(&self, surah: SurahContext) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(EngineMessage::ChangeSurah { surah, ack })
            .map_err(|_| Error::EngineStopped)?;
        done.await.map_err(|_| Error::EngineStopped)
    }

    /// Stop the loop after releasing the primitive
    pub async fn shutdown(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(EngineMessage::Shutdown { ack })
            .map_err(|_| Error::EngineStopped)?;
        done.await.map_err(|_| Error::EngineStopped)
    }

    /// Current state (read-only copy)
    pub fn state(&self) -> PlaybackState {
        self.state_rx.borrow().clone()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state_rx.borrow().snapshot()
    }

    /// Receiver that observes every published state
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_rx.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    fn send_event(&self, event: PlaybackEvent) -> Result<()> {
        self.tx
            .send(EngineMessage::Event(event))
            .map_err(|_| Error::EngineStopped)
    }
}

struct EngineLoop {
    state: PlaybackState,
    runner: EffectRunner,
    retry: RetryPolicy,
    state_tx: watch::Sender<PlaybackState>,
    event_bus: EventBus,
    rx: mpsc::UnboundedReceiver<EngineMessage>,
}

impl EngineLoop {
    async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            match message {
                EngineMessage::Event(event) => self.dispatch(vec![event]),

                EngineMessage::Status { instance, event } => {
                    if self.runner.is_current(instance) {
                        self.dispatch(vec![event]);
                    } else {
                        debug!("Dropping {} from released player {}", event.name(), instance);
                    }
                }

                EngineMessage::Settled(settled) => {
                    let mut feedback = self.runner.settle(settled);
                    if feedback.is_empty() {
                        feedback = self.runner.reconcile(&self.state);
                    }
                    self.dispatch(feedback);
                }

                EngineMessage::StallDetected { arm_id } => {
                    if let Some(event) = self.runner.stall_fired(arm_id) {
                        self.dispatch(vec![event]);
                    }
                }

                EngineMessage::ChangeSurah { surah, ack } => {
                    self.runner.shutdown().await;
                    let next = PlaybackState::new(surah, self.state.autoplay_enabled);
                    info!(
                        "Reading session reset for surah {} ({} verses)",
                        surah.surah, surah.total_verses
                    );
                    self.replace_session(next);
                    let _ = ack.send(());
                }

                EngineMessage::Shutdown { ack } => {
                    self.runner.shutdown().await;
                    info!("Playback engine stopped");
                    let _ = ack.send(());
                    break;
                }
            }
        }
    }

    /// Apply events in order; each may produce feedback that is applied next
    fn dispatch(&mut self, events: Vec<PlaybackEvent>) {
        let mut queue: VecDeque<PlaybackEvent> = events.into();

        while let Some(event) = queue.pop_front() {
            self.runner.observe(&event);

            let next = transition(&self.state, &event, &self.retry);
            if next == self.state {
                if !event.is_request() {
                    debug!("{} ignored in phase {}", event.name(), self.state.phase);
                }
            } else {
                self.publish(&event, next);
            }

            // Feedback answers the state it was produced for; apply it first
            for feedback in self.runner.reconcile(&self.state).into_iter().rev() {
                queue.push_front(feedback);
            }
        }
    }

    fn publish(&mut self, event: &PlaybackEvent, next: PlaybackState) {
        let prev = std::mem::replace(&mut self.state, next);
        let state = &self.state;
        let now = Utc::now();

        if prev.phase != state.phase {
            debug!(
                "{}: {} -> {} ({:?})",
                event.name(),
                prev.phase,
                state.phase,
                state.active_verse
            );
            self.event_bus.emit_lossy(TilawaEvent::PlaybackPhaseChanged {
                session_id: state.session_id,
                verse: state.active_verse,
                old_phase: prev.phase,
                new_phase: state.phase,
                timestamp: now,
            });
        }

        match event {
            PlaybackEvent::PrimitiveNowPlaying { key, duration_ms, .. }
                if prev.effective_phase().is_loading() && state.phase == Phase::Playing =>
            {
                info!("Now playing {} ({}ms)", key, duration_ms);
                self.event_bus.emit_lossy(TilawaEvent::VerseStarted {
                    session_id: state.session_id,
                    verse: *key,
                    duration_ms: *duration_ms,
                    timestamp: now,
                });
            }

            PlaybackEvent::PrimitiveFinished { key } => {
                let autoplay_next = state.active_verse.filter(|next| next != key);
                info!("Finished {}, next: {:?}", key, autoplay_next);
                self.event_bus.emit_lossy(TilawaEvent::VerseCompleted {
                    session_id: state.session_id,
                    verse: *key,
                    autoplay_next,
                    timestamp: now,
                });
            }

            PlaybackEvent::PrimitivePositionUpdate { key, .. } => {
                self.event_bus.emit_lossy(TilawaEvent::PlaybackProgress {
                    session_id: state.session_id,
                    verse: *key,
                    position_ms: state.position_ms,
                    duration_ms: state.duration_ms,
                    timestamp: now,
                });
            }

            PlaybackEvent::PrimitiveError { kind, .. } => {
                if state.phase == Phase::Error {
                    warn!(
                        "Playback of {:?} failed: {} after {} retries",
                        state.active_verse, kind, state.retry_count
                    );
                    self.event_bus.emit_lossy(TilawaEvent::PlaybackFailed {
                        session_id: state.session_id,
                        verse: state.active_verse,
                        error: *kind,
                        retry_count: state.retry_count,
                        timestamp: now,
                    });
                } else if state.retry_count > prev.retry_count {
                    warn!(
                        "{} for {:?}, retry {}/{}",
                        kind, state.active_verse, state.retry_count, self.retry.max_retries
                    );
                } else if state.phase == Phase::Idle {
                    warn!("Player for {:?} was lost, going idle", prev.active_verse);
                }
            }

            PlaybackEvent::AutoplayChanged(enabled) => {
                info!("Autoplay {}", if *enabled { "enabled" } else { "disabled" });
                self.event_bus.emit_lossy(TilawaEvent::AutoplayChanged {
                    enabled: *enabled,
                    timestamp: now,
                });
            }

            _ => {}
        }

        self.state_tx.send_replace(self.state.clone());
    }

    fn replace_session(&mut self, next: PlaybackState) {
        self.state = next;
        emit_session_started(&self.event_bus, &self.state);
        self.state_tx.send_replace(self.state.clone());
    }
}

fn emit_session_started(event_bus: &EventBus, state: &PlaybackState) {
    event_bus.emit_lossy(TilawaEvent::SessionStarted {
        session_id: state.session_id,
        surah: state.surah,
        timestamp: Utc::now(),
    });
}
