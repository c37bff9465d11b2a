//! Clock-driven stand-in for a platform player
//!
//! Decoding and output are out of scope for this service, so the binary
//! drives the engine with a player that only simulates timing: a configurable
//! load latency, a fixed clip length, and periodic position reports. It
//! honors the full `VersePrimitive` contract, which makes it useful for
//! exercising the engine end to end.

use crate::playback::audio_session::AudioSession;
use crate::playback::primitive::{
    PrimitiveFactory, PrimitiveFault, PrimitiveStatus, StatusListener, VersePrimitive,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tilawa_common::VerseKey;
use tokio::task::JoinHandle;
use tracing::debug;

/// Timing of simulated players
#[derive(Debug, Clone, Copy)]
pub struct SimulatedTiming {
    pub clip_duration: Duration,
    pub load_latency: Duration,
    /// Interval between position reports
    pub tick: Duration,
}

impl Default for SimulatedTiming {
    fn default() -> Self {
        Self {
            clip_duration: Duration::from_secs(8),
            load_latency: Duration::from_millis(300),
            tick: Duration::from_millis(250),
        }
    }
}

pub struct SimulatedPlayerFactory {
    session: &'static AudioSession,
    timing: SimulatedTiming,
}

impl SimulatedPlayerFactory {
    pub fn new(session: &'static AudioSession, timing: SimulatedTiming) -> Self {
        Self { session, timing }
    }
}

impl PrimitiveFactory for SimulatedPlayerFactory {
    fn create(&self, key: VerseKey, url: &str) -> Result<Arc<dyn VersePrimitive>, PrimitiveFault> {
        debug!(
            "Creating simulated player for {} ({}), background={}",
            key,
            url,
            self.session.config().stay_active_in_background
        );
        Ok(Arc::new(SimulatedPlayer::new(key, self.timing)))
    }
}

#[derive(Default)]
struct PlayerInner {
    listener: Option<StatusListener>,
    loaded: bool,
    released: bool,
    position_ms: u64,
    duration_ms: u64,
    ticker: Option<JoinHandle<()>>,
}

impl PlayerInner {
    fn notify(&self, status: PrimitiveStatus) {
        if let Some(listener) = &self.listener {
            listener(status);
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

pub struct SimulatedPlayer {
    key: VerseKey,
    timing: SimulatedTiming,
    inner: Arc<Mutex<PlayerInner>>,
}

impl SimulatedPlayer {
    pub fn new(key: VerseKey, timing: SimulatedTiming) -> Self {
        Self {
            key,
            timing,
            inner: Arc::new(Mutex::new(PlayerInner::default())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, PlayerInner>, PrimitiveFault> {
        self.inner
            .lock()
            .map_err(|_| PrimitiveFault::Other("player state poisoned".to_string()))
    }

    /// Start (or keep) the position clock; caller holds the lock
    fn start_playing(&self, inner: &mut PlayerInner) {
        inner.notify(PrimitiveStatus::Playing {
            position_ms: inner.position_ms,
            duration_ms: inner.duration_ms,
        });
        if inner.ticker.is_none() {
            inner.ticker = Some(tokio::spawn(run_clock(
                Arc::clone(&self.inner),
                self.timing.tick,
            )));
        }
    }
}

#[async_trait]
impl VersePrimitive for SimulatedPlayer {
    async fn load(&self, url: &str, play_when_ready: bool) -> Result<(), PrimitiveFault> {
        tokio::time::sleep(self.timing.load_latency).await;

        let mut inner = self.lock()?;
        if inner.released {
            return Err(PrimitiveFault::Unloaded);
        }
        inner.loaded = true;
        inner.position_ms = 0;
        inner.duration_ms = self.timing.clip_duration.as_millis() as u64;
        debug!("Simulated load of {} from {}", self.key, url);

        inner.notify(PrimitiveStatus::Loaded {
            duration_ms: inner.duration_ms,
        });
        if play_when_ready {
            self.start_playing(&mut inner);
        }
        Ok(())
    }

    async fn play(&self) -> Result<(), PrimitiveFault> {
        let mut inner = self.lock()?;
        if !inner.loaded {
            return Err(PrimitiveFault::Unloaded);
        }
        if inner.position_ms >= inner.duration_ms {
            inner.position_ms = 0;
        }
        self.start_playing(&mut inner);
        Ok(())
    }

    async fn pause(&self) -> Result<(), PrimitiveFault> {
        let mut inner = self.lock()?;
        if !inner.loaded {
            return Err(PrimitiveFault::Unloaded);
        }
        inner.stop_ticker();
        inner.notify(PrimitiveStatus::Paused {
            position_ms: inner.position_ms,
        });
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<(), PrimitiveFault> {
        let mut inner = self.lock()?;
        if !inner.loaded {
            return Err(PrimitiveFault::Unloaded);
        }
        inner.position_ms = position_ms.min(inner.duration_ms);
        inner.notify(PrimitiveStatus::Position {
            position_ms: inner.position_ms,
            duration_ms: Some(inner.duration_ms),
        });
        Ok(())
    }

    async fn unload(&self) -> Result<(), PrimitiveFault> {
        let mut inner = self.lock()?;
        inner.stop_ticker();
        inner.loaded = false;
        inner.released = true;
        debug!("Simulated player for {} released", self.key);
        Ok(())
    }

    fn set_status_listener(&self, listener: Option<StatusListener>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.listener = listener;
        }
    }
}

/// Advance the position every `tick` until the clip ends
async fn run_clock(inner: Arc<Mutex<PlayerInner>>, tick: Duration) {
    let tick_ms = tick.as_millis() as u64;
    loop {
        tokio::time::sleep(tick).await;

        let Ok(mut inner) = inner.lock() else {
            return;
        };
        inner.position_ms = (inner.position_ms + tick_ms).min(inner.duration_ms);
        inner.notify(PrimitiveStatus::Position {
            position_ms: inner.position_ms,
            duration_ms: Some(inner.duration_ms),
        });

        if inner.position_ms >= inner.duration_ms {
            inner.ticker = None;
            inner.notify(PrimitiveStatus::Finished);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::audio_session::{self, AudioSessionConfig};

    fn recording_listener() -> (StatusListener, Arc<Mutex<Vec<PrimitiveStatus>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: StatusListener = Arc::new(move |status: PrimitiveStatus| sink.lock().unwrap().push(status));
        (listener, seen)
    }

    fn timing() -> SimulatedTiming {
        SimulatedTiming {
            clip_duration: Duration::from_secs(1),
            load_latency: Duration::from_millis(100),
            tick: Duration::from_millis(250),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_to_the_end() {
        let session = audio_session::initialize(AudioSessionConfig::default());
        let factory = SimulatedPlayerFactory::new(session, timing());
        let player = factory.create(VerseKey::new(1, 1), "mem://1").unwrap();
        let (listener, seen) = recording_listener();
        player.set_status_listener(Some(listener));

        player.load("mem://1", true).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&PrimitiveStatus::Loaded { duration_ms: 1_000 }));
        assert_eq!(
            seen.get(1),
            Some(&PrimitiveStatus::Playing {
                position_ms: 0,
                duration_ms: 1_000
            })
        );
        assert_eq!(seen.last(), Some(&PrimitiveStatus::Finished));
        assert_eq!(
            seen.iter().filter(|s| **s == PrimitiveStatus::Finished).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_the_clock() {
        let player = SimulatedPlayer::new(VerseKey::new(1, 2), timing());
        let (listener, seen) = recording_listener();
        player.set_status_listener(Some(listener));

        player.load("mem://2", true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        player.pause().await.unwrap();
        let count = seen.lock().unwrap().len();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(seen.lock().unwrap().len(), count);
        assert!(matches!(
            seen.lock().unwrap().last(),
            Some(PrimitiveStatus::Paused { position_ms: 500 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_player_rejects_calls() {
        let player = SimulatedPlayer::new(VerseKey::new(1, 3), timing());
        player.load("mem://3", false).await.unwrap();
        player.unload().await.unwrap();

        assert_eq!(player.play().await, Err(PrimitiveFault::Unloaded));
        assert_eq!(player.load("mem://3", false).await, Err(PrimitiveFault::Unloaded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_listener_sees_nothing() {
        let player = SimulatedPlayer::new(VerseKey::new(1, 4), timing());
        let (listener, seen) = recording_listener();
        player.set_status_listener(Some(listener));
        player.set_status_listener(None);

        player.load("mem://4", true).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(seen.lock().unwrap().is_empty());
    }
}
