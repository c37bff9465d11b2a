//! Test helper modules for tilawa-ap integration tests
//!
//! - FakePlayerFactory: recording stand-in for the platform player
//! - Engine helpers: spawn an engine around a fake, wait for states

#![allow(dead_code)]

pub mod fake_player;

pub use fake_player::{Call, FakePlayer, FakePlayerFactory, LoadScript, FAKE_DURATION_MS};

use std::sync::Arc;
use std::time::Duration;
use tilawa_ap::playback::{EngineConfig, PlaybackState, RetryPolicy, VersePlaybackEngine};
use tilawa_common::events::{EventBus, Phase};
use tilawa_common::{AudioSource, SurahContext};

/// Generous bound for state waits; virtual time in paused tests
const WAIT_LIMIT: Duration = Duration::from_secs(120);

pub fn test_config() -> EngineConfig {
    EngineConfig {
        source: AudioSource::new("mem://audio", "test_reciter"),
        stall_timeout: Duration::from_secs(10),
        retry: RetryPolicy::new(3),
    }
}

/// Engine for a three-verse surah around a fresh fake factory
pub fn spawn_engine(autoplay: bool) -> (VersePlaybackEngine, FakePlayerFactory) {
    spawn_engine_for(SurahContext::new(1, 3), autoplay)
}

pub fn spawn_engine_for(surah: SurahContext, autoplay: bool) -> (VersePlaybackEngine, FakePlayerFactory) {
    let factory = FakePlayerFactory::new();
    let engine = VersePlaybackEngine::spawn(
        test_config(),
        Arc::new(factory.clone()),
        surah,
        autoplay,
        EventBus::new(256),
    );
    (engine, factory)
}

/// Wait until the published state satisfies `pred`
pub async fn wait_for_state<F>(engine: &VersePlaybackEngine, pred: F) -> PlaybackState
where
    F: Fn(&PlaybackState) -> bool,
{
    let mut rx = engine.subscribe();
    let state = tokio::time::timeout(WAIT_LIMIT, async move {
        rx.wait_for(|state| pred(state)).await.map(|state| state.clone())
    })
    .await
    .expect("timed out waiting for engine state")
    .expect("engine stopped");
    state
}

/// Wait until the engine plays `verse`
pub async fn wait_playing(engine: &VersePlaybackEngine, verse: u16) -> PlaybackState {
    wait_for_state(engine, |s| {
        s.phase == Phase::Playing && s.active_verse.map(|k| k.verse) == Some(verse)
    })
    .await
}

pub async fn wait_phase(engine: &VersePlaybackEngine, phase: Phase) -> PlaybackState {
    wait_for_state(engine, |s| s.phase == phase).await
}

/// Poll a condition outside the engine state (e.g. the fake's journal)
pub async fn wait_until<F>(cond: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(WAIT_LIMIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}
