//! Stall detection for loads and resumes
//!
//! One timer task at most. Arming for a new target aborts the previous timer;
//! a firing timer only reports its `arm_id`, which the owner validates before
//! turning it into a `Stall` failure. A timer that was disarmed (or replaced)
//! after it already queued its message is therefore harmless.

use crate::playback::engine::EngineMessage;
use std::time::Duration;
use tilawa_common::VerseKey;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Reference bound for a load or resume to reach audible playback
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Operation the watchdog is guarding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallStage {
    Load,
    Resume,
}

/// What an armed timer is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallTarget {
    pub key: VerseKey,
    pub generation: u64,
    pub stage: StallStage,
}

struct ArmedTimer {
    arm_id: u64,
    target: StallTarget,
    handle: JoinHandle<()>,
}

pub struct StallWatchdog {
    timeout: Duration,
    tx: mpsc::UnboundedSender<EngineMessage>,
    armed: Option<ArmedTimer>,
    next_arm_id: u64,
}

impl StallWatchdog {
    pub fn new(timeout: Duration, tx: mpsc::UnboundedSender<EngineMessage>) -> Self {
        Self {
            timeout,
            tx,
            armed: None,
            next_arm_id: 0,
        }
    }

    /// Arm for `target`; a timer already running for the same target keeps running
    pub fn arm(&mut self, target: StallTarget) {
        if self.armed.as_ref().is_some_and(|armed| armed.target == target) {
            return;
        }
        self.disarm();

        self.next_arm_id += 1;
        let arm_id = self.next_arm_id;
        let timeout = self.timeout;
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(EngineMessage::StallDetected { arm_id });
        });

        debug!(
            "Stall watchdog armed for {} ({:?}, generation {}, {:?})",
            target.key, target.stage, target.generation, timeout
        );
        self.armed = Some(ArmedTimer {
            arm_id,
            target,
            handle,
        });
    }

    pub fn disarm(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.handle.abort();
            debug!("Stall watchdog disarmed for {}", armed.target.key);
        }
    }

    /// Validate a fired timer; returns its target only if it is still the live one
    pub fn fired(&mut self, arm_id: u64) -> Option<StallTarget> {
        match &self.armed {
            Some(armed) if armed.arm_id == arm_id => {
                let target = armed.target;
                self.armed = None;
                warn!(
                    "No playback confirmation for {} within {:?} ({:?})",
                    target.key, self.timeout, target.stage
                );
                Some(target)
            }
            _ => {
                debug!("Ignoring expired stall timer {}", arm_id);
                None
            }
        }
    }

    pub fn armed_target(&self) -> Option<StallTarget> {
        self.armed.as_ref().map(|armed| armed.target)
    }
}

impl Drop for StallWatchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}
