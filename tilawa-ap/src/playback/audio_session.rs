//! Process-wide audio session
//!
//! Output policy (mixing with other apps, background playback) is configured
//! once per process, before the first player is created. Players receive the
//! session explicitly instead of configuring the platform themselves.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, info};

static SESSION: OnceLock<AudioSession> = OnceLock::new();

/// How verse audio shares the output with other sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSessionConfig {
    /// Keep playing when the device is in silent mode
    pub play_in_silent_mode: bool,
    /// Keep playing when the UI is backgrounded
    pub stay_active_in_background: bool,
    /// Lower other audio while a verse plays instead of stopping it
    pub duck_others: bool,
}

impl Default for AudioSessionConfig {
    fn default() -> Self {
        Self {
            play_in_silent_mode: true,
            stay_active_in_background: true,
            duck_others: true,
        }
    }
}

#[derive(Debug)]
pub struct AudioSession {
    config: AudioSessionConfig,
}

impl AudioSession {
    pub fn config(&self) -> &AudioSessionConfig {
        &self.config
    }
}

/// Configure the audio session; later calls return the first configuration unchanged
pub fn initialize(config: AudioSessionConfig) -> &'static AudioSession {
    let mut fresh = false;
    let session = SESSION.get_or_init(|| {
        fresh = true;
        AudioSession {
            config: config.clone(),
        }
    });

    if fresh {
        info!("Audio session configured: {:?}", session.config);
    } else if session.config != config {
        debug!("Audio session already configured, ignoring {:?}", config);
    }
    session
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let first = initialize(AudioSessionConfig::default());
        let second = initialize(AudioSessionConfig {
            play_in_silent_mode: false,
            stay_active_in_background: false,
            duck_others: false,
        });

        assert!(std::ptr::eq(first, second));
        assert_eq!(second.config(), &AudioSessionConfig::default());
        assert!(SESSION.get().is_some());
    }
}
