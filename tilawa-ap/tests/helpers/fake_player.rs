//! Recording fake player
//!
//! Every instance created by `FakePlayerFactory` shares one journal with the
//! factory, so a test can ask how many players were created, how many are
//! still alive, the peak number alive at once, and which calls were made.
//! Loads follow a script; status can be injected into any instance, and
//! `pause`/`seek` can be made to hang.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tilawa_ap::playback::{
    PrimitiveFactory, PrimitiveFault, PrimitiveStatus, StatusListener, VersePrimitive,
};
use tilawa_common::VerseKey;

/// Clip length reported by every fake load
pub const FAKE_DURATION_MS: u64 = 5_000;

/// What the next `load` call does
#[derive(Debug, Clone)]
pub enum LoadScript {
    /// Report loaded, then playing
    Succeed,
    /// Return this fault
    Fail(PrimitiveFault),
    /// Report loaded but never start playing
    Silent,
    /// Never return
    Hang,
}

/// One recorded primitive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Load(VerseKey),
    Play(VerseKey),
    Pause(VerseKey),
    Seek(VerseKey, u64),
    Unload(VerseKey),
}

#[derive(Default)]
struct Journal {
    live: AtomicUsize,
    max_live: AtomicUsize,
    calls: Mutex<Vec<Call>>,
    players: Mutex<Vec<Arc<FakePlayer>>>,
    script: Mutex<VecDeque<LoadScript>>,
    /// `pause` and `seek` never return while set
    controls_hang: AtomicBool,
}

impl Journal {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[derive(Clone, Default)]
pub struct FakePlayerFactory {
    journal: Arc<Journal>,
}

impl FakePlayerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue behaviors for upcoming loads; loads beyond the script succeed
    pub fn script_loads(&self, script: impl IntoIterator<Item = LoadScript>) {
        self.journal.script.lock().unwrap().extend(script);
    }

    /// Make `pause` and `seek` on every player hang from now on
    pub fn hang_controls(&self) {
        self.journal.controls_hang.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.journal.players.lock().unwrap().len()
    }

    pub fn live(&self) -> usize {
        self.journal.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.journal.max_live.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.journal.calls.lock().unwrap().clone()
    }

    pub fn player(&self, index: usize) -> Arc<FakePlayer> {
        Arc::clone(&self.journal.players.lock().unwrap()[index])
    }

    pub fn latest(&self) -> Arc<FakePlayer> {
        let players = self.journal.players.lock().unwrap();
        Arc::clone(players.last().expect("no player created yet"))
    }
}

impl PrimitiveFactory for FakePlayerFactory {
    fn create(&self, key: VerseKey, _url: &str) -> Result<Arc<dyn VersePrimitive>, PrimitiveFault> {
        let live = self.journal.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.max_live.fetch_max(live, Ordering::SeqCst);

        let player = Arc::new(FakePlayer {
            key,
            journal: Arc::clone(&self.journal),
            listener: Mutex::new(None),
            released: AtomicBool::new(false),
            position_ms: Mutex::new(0),
        });
        self.journal.players.lock().unwrap().push(Arc::clone(&player));
        Ok(player)
    }
}

pub struct FakePlayer {
    pub key: VerseKey,
    journal: Arc<Journal>,
    listener: Mutex<Option<StatusListener>>,
    released: AtomicBool,
    position_ms: Mutex<u64>,
}

impl FakePlayer {
    /// Deliver a status notification; false when no listener is attached
    pub fn emit(&self, status: PrimitiveStatus) -> bool {
        let listener = self.listener.lock().unwrap().clone();
        match listener {
            Some(listener) => {
                listener(status);
                true
            }
            None => false,
        }
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().unwrap().is_some()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn position(&self) -> u64 {
        *self.position_ms.lock().unwrap()
    }

    async fn hang_if_requested(&self) {
        if self.journal.controls_hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl VersePrimitive for FakePlayer {
    async fn load(&self, _url: &str, play_when_ready: bool) -> Result<(), PrimitiveFault> {
        self.journal.record(Call::Load(self.key));
        let script = self
            .journal
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(LoadScript::Succeed);

        match script {
            LoadScript::Succeed => {
                self.emit(PrimitiveStatus::Loaded {
                    duration_ms: FAKE_DURATION_MS,
                });
                if play_when_ready {
                    self.emit(PrimitiveStatus::Playing {
                        position_ms: 0,
                        duration_ms: FAKE_DURATION_MS,
                    });
                }
                Ok(())
            }
            LoadScript::Fail(fault) => Err(fault),
            LoadScript::Silent => {
                self.emit(PrimitiveStatus::Loaded {
                    duration_ms: FAKE_DURATION_MS,
                });
                Ok(())
            }
            LoadScript::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    async fn play(&self) -> Result<(), PrimitiveFault> {
        self.journal.record(Call::Play(self.key));
        self.emit(PrimitiveStatus::Playing {
            position_ms: self.position(),
            duration_ms: FAKE_DURATION_MS,
        });
        Ok(())
    }

    async fn pause(&self) -> Result<(), PrimitiveFault> {
        self.journal.record(Call::Pause(self.key));
        self.hang_if_requested().await;
        self.emit(PrimitiveStatus::Paused {
            position_ms: self.position(),
        });
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<(), PrimitiveFault> {
        self.journal.record(Call::Seek(self.key, position_ms));
        self.hang_if_requested().await;
        *self.position_ms.lock().unwrap() = position_ms;
        Ok(())
    }

    async fn unload(&self) -> Result<(), PrimitiveFault> {
        self.journal.record(Call::Unload(self.key));
        if !self.released.swap(true, Ordering::SeqCst) {
            self.journal.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn set_status_listener(&self, listener: Option<StatusListener>) {
        *self.listener.lock().unwrap() = listener;
    }
}
