//! Effect runner: the only code that touches a primitive
//!
//! The runner owns the single live primitive instance and the operation lock.
//! After every state change the engine loop calls `reconcile`, which compares
//! what the state asks for with what the primitive is doing and issues at most
//! one primitive call. The call runs on its own task; its completion comes
//! back as a `Settled` message, which clears the lock and triggers another
//! `reconcile` against whatever the state is by then.
//!
//! `reconcile` is level-triggered and idempotent: calling it twice for the
//! same state issues nothing the second time.

use crate::playback::engine::EngineMessage;
use crate::playback::events::PlaybackEvent;
use crate::playback::primitive::{
    PrimitiveFactory, PrimitiveFault, PrimitiveStatus, StatusListener, VersePrimitive,
};
use crate::playback::retry::RetryPolicy;
use crate::playback::state::PlaybackState;
use crate::playback::watchdog::{StallStage, StallTarget, StallWatchdog};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tilawa_common::events::{ErrorKind, Phase};
use tilawa_common::{AudioSource, VerseKey};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Completion of a primitive operation issued by the runner
#[derive(Debug)]
pub struct Settled {
    op_id: u64,
    outcome: OpOutcome,
}

#[derive(Debug)]
enum OpOutcome {
    Load {
        key: VerseKey,
        instance: u64,
        result: Result<(), PrimitiveFault>,
    },
    Pause {
        instance: u64,
        result: Result<(), PrimitiveFault>,
    },
    Resume {
        instance: u64,
        result: Result<(), PrimitiveFault>,
    },
    Seek {
        key: VerseKey,
        instance: u64,
        position_ms: u64,
        result: Result<(), PrimitiveFault>,
    },
    /// Stop sequence finished; the instance is gone
    Stop,
    /// Unwanted instance unloaded
    Teardown,
}

/// What the live instance was last told (or reported) to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrimitiveMode {
    Loading,
    Playing,
    Paused,
}

struct BoundPrimitive {
    key: VerseKey,
    /// Load generation of the state that created this instance
    generation: u64,
    /// Runner-wide instance counter stamped on status messages
    instance: u64,
    primitive: Arc<dyn VersePrimitive>,
    mode: PrimitiveMode,
    last_seek_seq: u64,
}

impl BoundPrimitive {
    /// Remove the status subscription; must precede any unload
    fn detach(&self) {
        self.primitive.set_status_listener(None);
    }
}

struct InFlight {
    op_id: u64,
    name: &'static str,
    handle: JoinHandle<()>,
    /// Instance being released by a stop or teardown; no longer in `bound`
    releasing: Option<Arc<dyn VersePrimitive>>,
}

pub struct EffectRunner {
    factory: Arc<dyn PrimitiveFactory>,
    source: AudioSource,
    retry: RetryPolicy,
    tx: mpsc::UnboundedSender<EngineMessage>,
    bound: Option<BoundPrimitive>,
    /// Operation lock
    in_flight: Option<InFlight>,
    watchdog: StallWatchdog,
    /// Upper bound for any single primitive call
    op_timeout: Duration,
    next_op_id: u64,
    next_instance: u64,
}

impl EffectRunner {
    pub fn new(
        factory: Arc<dyn PrimitiveFactory>,
        source: AudioSource,
        retry: RetryPolicy,
        stall_timeout: Duration,
        tx: mpsc::UnboundedSender<EngineMessage>,
    ) -> Self {
        Self {
            factory,
            source,
            retry,
            watchdog: StallWatchdog::new(stall_timeout, tx.clone()),
            tx,
            bound: None,
            in_flight: None,
            op_timeout: stall_timeout,
            next_op_id: 0,
            next_instance: 0,
        }
    }

    /// True when a status message stamped with `instance` comes from the live primitive
    pub fn is_current(&self, instance: u64) -> bool {
        self.bound.as_ref().is_some_and(|b| b.instance == instance)
    }

    /// Track what the live instance reported, independent of whether the state accepts it
    pub fn observe(&mut self, event: &PlaybackEvent) {
        let Some(bound) = self.bound.as_mut() else {
            return;
        };
        match event {
            PlaybackEvent::PrimitiveNowPlaying { key, .. } if *key == bound.key => {
                bound.mode = PrimitiveMode::Playing;
            }
            PlaybackEvent::PrimitivePaused { key, .. } if *key == bound.key => {
                bound.mode = PrimitiveMode::Paused;
            }
            _ => {}
        }
    }

    /// Bring the primitive in line with `state`
    ///
    /// Returns events to feed back into the transition function immediately.
    pub fn reconcile(&mut self, state: &PlaybackState) -> Vec<PlaybackEvent> {
        self.update_watchdog(state);

        if let Some(in_flight) = &self.in_flight {
            debug!("{} in flight, deferring phase {}", in_flight.name, state.phase);
            return Vec::new();
        }

        if state.phase == Phase::Stopping {
            return self.begin_stop();
        }

        if let Some(bound) = &self.bound {
            let wanted = state.active_verse == Some(bound.key)
                && state.load_generation == bound.generation
                && !matches!(state.phase, Phase::Idle | Phase::Error);
            if !wanted {
                self.begin_teardown();
                return Vec::new();
            }
        }

        match state.effective_phase() {
            Phase::LoadRequested => self.begin_load(state),
            Phase::Pausing => self.ensure_paused(state),
            Phase::Resuming => self.ensure_playing(state),
            Phase::Seeking => self.ensure_seeked(state),
            _ => Vec::new(),
        }
    }

    /// Handle a settled operation; returns feedback events
    pub fn settle(&mut self, settled: Settled) -> Vec<PlaybackEvent> {
        match &self.in_flight {
            Some(in_flight) if in_flight.op_id == settled.op_id => {
                debug!("{} settled", in_flight.name);
                self.in_flight = None;
            }
            _ => {
                debug!("Ignoring settlement of abandoned operation {}", settled.op_id);
                return Vec::new();
            }
        }

        match settled.outcome {
            OpOutcome::Load { key, instance, result } => match result {
                Ok(()) => Vec::new(),
                Err(fault) if self.is_current(instance) => {
                    warn!("Load of {} failed: {}", key, fault);
                    vec![PlaybackEvent::PrimitiveError {
                        kind: self.retry.classify(&fault),
                        key: Some(key),
                    }]
                }
                Err(fault) => {
                    debug!("Load of superseded {} failed: {}", key, fault);
                    Vec::new()
                }
            },
            OpOutcome::Pause { instance, result } => {
                self.settle_mode_change(instance, result, PrimitiveMode::Paused)
            }
            OpOutcome::Resume { instance, result } => {
                self.settle_mode_change(instance, result, PrimitiveMode::Playing)
            }
            OpOutcome::Seek {
                key,
                instance,
                position_ms,
                result,
            } => {
                if !self.is_current(instance) {
                    return Vec::new();
                }
                match result {
                    Ok(()) => vec![PlaybackEvent::PrimitiveSeekCompleted { key, position_ms }],
                    Err(fault) => {
                        warn!("Seek on {} failed: {}", key, fault);
                        vec![PlaybackEvent::PrimitiveError {
                            kind: ErrorKind::PlaybackDeviceError,
                            key: Some(key),
                        }]
                    }
                }
            }
            OpOutcome::Stop => vec![PlaybackEvent::PrimitiveStopped],
            OpOutcome::Teardown => Vec::new(),
        }
    }

    /// Validate a watchdog expiry and turn it into a stall failure
    pub fn stall_fired(&mut self, arm_id: u64) -> Option<PlaybackEvent> {
        self.watchdog.fired(arm_id).map(|target| PlaybackEvent::PrimitiveError {
            kind: ErrorKind::Stall,
            key: Some(target.key),
        })
    }

    /// Release everything: wait out the in-flight call, then unload the live instance
    pub async fn shutdown(&mut self) {
        self.watchdog.disarm();

        if let Some(in_flight) = self.in_flight.take() {
            let abort = in_flight.handle.abort_handle();
            if tokio::time::timeout(self.op_timeout, in_flight.handle).await.is_err() {
                warn!("{} did not settle during shutdown, aborting", in_flight.name);
                abort.abort();

                // The aborted stop/teardown may not have reached its unload
                if let Some(primitive) = in_flight.releasing {
                    if let Err(e) = bounded(self.op_timeout, primitive.unload()).await {
                        warn!("Failed to unload released player during shutdown: {}", e);
                    }
                }
            }
        }

        if let Some(bound) = self.bound.take() {
            bound.detach();
            if let Err(e) = bounded(self.op_timeout, bound.primitive.unload()).await {
                warn!("Failed to unload {} during shutdown: {}", bound.key, e);
            }
            info!("Released player for {}", bound.key);
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    fn begin_load(&mut self, state: &PlaybackState) -> Vec<PlaybackEvent> {
        if self.bound.is_some() {
            return Vec::new();
        }
        let Some(key) = state.active_verse else {
            return Vec::new();
        };

        let url = self.source.url_for(key);
        let primitive = match self.factory.create(key, &url) {
            Ok(primitive) => primitive,
            Err(fault) => {
                warn!("Could not create player for {}: {}", key, fault);
                return vec![PlaybackEvent::PrimitiveError {
                    kind: self.retry.classify(&fault),
                    key: Some(key),
                }];
            }
        };

        self.next_instance += 1;
        let instance = self.next_instance;
        primitive.set_status_listener(Some(self.status_listener(key, instance)));

        info!(
            "Loading {} from {} (attempt {})",
            key,
            url,
            u32::from(state.retry_count) + 1
        );

        let op_primitive = Arc::clone(&primitive);
        let limit = self.op_timeout;
        self.spawn_op("load", async move {
            let result = bounded(limit, op_primitive.load(&url, true)).await;
            OpOutcome::Load { key, instance, result }
        });

        self.bound = Some(BoundPrimitive {
            key,
            generation: state.load_generation,
            instance,
            primitive,
            mode: PrimitiveMode::Loading,
            last_seek_seq: state.seek_seq,
        });

        vec![PlaybackEvent::PrimitiveLoadStarted(key)]
    }

    fn ensure_paused(&mut self, state: &PlaybackState) -> Vec<PlaybackEvent> {
        let Some(bound) = &self.bound else {
            return vec![lost(state)];
        };
        if bound.mode == PrimitiveMode::Paused {
            return vec![PlaybackEvent::PrimitivePaused {
                key: bound.key,
                position_ms: state.position_ms,
            }];
        }

        debug!("Pausing {}", bound.key);
        let primitive = Arc::clone(&bound.primitive);
        let instance = bound.instance;
        let limit = self.op_timeout;
        self.spawn_op("pause", async move {
            let result = bounded(limit, primitive.pause()).await;
            OpOutcome::Pause { instance, result }
        });
        Vec::new()
    }

    fn ensure_playing(&mut self, state: &PlaybackState) -> Vec<PlaybackEvent> {
        let Some(bound) = &self.bound else {
            return vec![lost(state)];
        };
        if bound.mode == PrimitiveMode::Playing {
            return vec![PlaybackEvent::PrimitiveNowPlaying {
                key: bound.key,
                duration_ms: state.duration_ms,
                position_ms: state.position_ms,
            }];
        }

        debug!("Resuming {}", bound.key);
        let primitive = Arc::clone(&bound.primitive);
        let instance = bound.instance;
        let limit = self.op_timeout;
        self.spawn_op("resume", async move {
            let result = bounded(limit, primitive.play()).await;
            OpOutcome::Resume { instance, result }
        });
        Vec::new()
    }

    fn ensure_seeked(&mut self, state: &PlaybackState) -> Vec<PlaybackEvent> {
        let Some(bound) = self.bound.as_mut() else {
            return vec![lost(state)];
        };
        let Some(position_ms) = state.pending_seek else {
            return Vec::new();
        };
        if bound.last_seek_seq == state.seek_seq {
            return Vec::new();
        }
        bound.last_seek_seq = state.seek_seq;

        debug!("Seeking {} to {}ms", bound.key, position_ms);
        let primitive = Arc::clone(&bound.primitive);
        let key = bound.key;
        let instance = bound.instance;
        let limit = self.op_timeout;
        self.spawn_op("seek", async move {
            let result = bounded(limit, primitive.seek(position_ms)).await;
            OpOutcome::Seek {
                key,
                instance,
                position_ms,
                result,
            }
        });
        Vec::new()
    }

    /// Pause, rewind and unload the live instance
    fn begin_stop(&mut self) -> Vec<PlaybackEvent> {
        let Some(bound) = self.bound.take() else {
            return vec![PlaybackEvent::PrimitiveStopped];
        };
        bound.detach();

        info!("Stopping {}", bound.key);
        let limit = self.op_timeout;
        let releasing = Arc::clone(&bound.primitive);
        self.spawn_releasing_op("stop", releasing, async move {
            let primitive = bound.primitive;
            if let Err(e) = bounded(limit, primitive.pause()).await {
                debug!("Pause before stop failed for {}: {}", bound.key, e);
            }
            if let Err(e) = bounded(limit, primitive.seek(0)).await {
                debug!("Rewind before stop failed for {}: {}", bound.key, e);
            }
            if let Err(e) = bounded(limit, primitive.unload()).await {
                warn!("Unload failed for {}: {}", bound.key, e);
            }
            OpOutcome::Stop
        });
        Vec::new()
    }

    /// Destroy an instance the state no longer wants
    fn begin_teardown(&mut self) {
        let Some(bound) = self.bound.take() else {
            return;
        };
        bound.detach();

        debug!("Tearing down player for {} (generation {})", bound.key, bound.generation);
        let limit = self.op_timeout;
        let releasing = Arc::clone(&bound.primitive);
        self.spawn_releasing_op("teardown", releasing, async move {
            if let Err(e) = bounded(limit, bound.primitive.unload()).await {
                warn!("Unload failed for {}: {}", bound.key, e);
            }
            OpOutcome::Teardown
        });
    }

    fn settle_mode_change(
        &mut self,
        instance: u64,
        result: Result<(), PrimitiveFault>,
        mode: PrimitiveMode,
    ) -> Vec<PlaybackEvent> {
        let Some(bound) = self.bound.as_mut().filter(|b| b.instance == instance) else {
            return Vec::new();
        };
        match result {
            Ok(()) => {
                bound.mode = mode;
                Vec::new()
            }
            Err(fault) => {
                warn!("{:?} on {} failed: {}", mode, bound.key, fault);
                vec![PlaybackEvent::PrimitiveError {
                    kind: ErrorKind::PlaybackDeviceError,
                    key: Some(bound.key),
                }]
            }
        }
    }

    fn spawn_op<F>(&mut self, name: &'static str, op: F)
    where
        F: Future<Output = OpOutcome> + Send + 'static,
    {
        self.spawn_tracked(name, None, op);
    }

    /// Spawn an operation that unloads `primitive`, which is no longer bound
    fn spawn_releasing_op<F>(&mut self, name: &'static str, primitive: Arc<dyn VersePrimitive>, op: F)
    where
        F: Future<Output = OpOutcome> + Send + 'static,
    {
        self.spawn_tracked(name, Some(primitive), op);
    }

    fn spawn_tracked<F>(&mut self, name: &'static str, releasing: Option<Arc<dyn VersePrimitive>>, op: F)
    where
        F: Future<Output = OpOutcome> + Send + 'static,
    {
        self.next_op_id += 1;
        let op_id = self.next_op_id;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let outcome = op.await;
            let _ = tx.send(EngineMessage::Settled(Settled { op_id, outcome }));
        });
        self.in_flight = Some(InFlight {
            op_id,
            name,
            handle,
            releasing,
        });
    }

    fn status_listener(&self, key: VerseKey, instance: u64) -> StatusListener {
        let tx = self.tx.clone();
        let retry = self.retry;
        Arc::new(move |status: PrimitiveStatus| {
            let event = status_event(key, status, &retry);
            let _ = tx.send(EngineMessage::Status { instance, event });
        })
    }

    /// The watchdog guards exactly the load or resume the state is waiting on
    ///
    /// A load is only watched once it has been issued (`Loading`); time spent
    /// in `LoadRequested` waiting for a teardown to settle is not a stall.
    fn update_watchdog(&mut self, state: &PlaybackState) {
        let stage = match state.effective_phase() {
            Phase::Loading => Some(StallStage::Load),
            Phase::Resuming => Some(StallStage::Resume),
            _ => None,
        };

        match (stage, state.active_verse) {
            (Some(stage), Some(key)) => self.watchdog.arm(StallTarget {
                key,
                generation: state.load_generation,
                stage,
            }),
            _ => self.watchdog.disarm(),
        }
    }
}

/// Translate a primitive notification into an engine event stamped with its key
fn status_event(key: VerseKey, status: PrimitiveStatus, retry: &RetryPolicy) -> PlaybackEvent {
    match status {
        PrimitiveStatus::Loaded { duration_ms } => PlaybackEvent::PrimitivePositionUpdate {
            key,
            position_ms: 0,
            duration_ms: Some(duration_ms),
        },
        PrimitiveStatus::Playing {
            position_ms,
            duration_ms,
        } => PlaybackEvent::PrimitiveNowPlaying {
            key,
            duration_ms,
            position_ms,
        },
        PrimitiveStatus::Paused { position_ms } => PlaybackEvent::PrimitivePaused { key, position_ms },
        PrimitiveStatus::Buffering(buffering) => PlaybackEvent::PrimitiveBuffering { key, buffering },
        PrimitiveStatus::Position {
            position_ms,
            duration_ms,
        } => PlaybackEvent::PrimitivePositionUpdate {
            key,
            position_ms,
            duration_ms,
        },
        PrimitiveStatus::Finished => PlaybackEvent::PrimitiveFinished { key },
        PrimitiveStatus::Failed(fault) => PlaybackEvent::PrimitiveError {
            kind: retry.classify(&fault),
            key: Some(key),
        },
        PrimitiveStatus::Unloaded => PlaybackEvent::PrimitiveError {
            kind: ErrorKind::PrimitiveLost,
            key: Some(key),
        },
    }
}

/// State says a primitive is loaded but none exists
fn lost(state: &PlaybackState) -> PlaybackEvent {
    warn!("No player bound while {} expects {:?}", state.phase, state.loaded_verse);
    PlaybackEvent::PrimitiveError {
        kind: ErrorKind::PrimitiveLost,
        key: None,
    }
}

async fn bounded<F>(limit: Duration, call: F) -> Result<(), PrimitiveFault>
where
    F: Future<Output = Result<(), PrimitiveFault>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(PrimitiveFault::Timeout))
}
