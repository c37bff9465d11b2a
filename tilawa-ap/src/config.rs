//! Configuration management for tilawa-ap
//!
//! Two tiers, as for every Tilawa service:
//! 1. **TOML bootstrap**: database path, port, audio source, engine tuning,
//!    logging. Read once at startup.
//! 2. **Database runtime**: listener settings (`autoplay_enabled`,
//!    `last_surah`) in the `settings` table, see `db::settings`.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--port`, `--database`, `--surah`)
//! 2. TOML configuration file (`--config`, `TILAWA_CONFIG`, platform path)
//! 3. Built-in defaults (code constants)

use crate::error::{Error, Result};
use crate::playback::audio_session::AudioSessionConfig;
use crate::playback::engine::EngineConfig;
use crate::playback::retry::{RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::playback::simulated::SimulatedTiming;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tilawa_common::config::{default_data_folder, load_toml, resolve_config_file, CONFIG_ENV_VAR};
use tilawa_common::AudioSource;
use tracing::info;

/// Bootstrap configuration loaded from TOML file
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP server port
    ///
    /// Default: 5750
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where verse audio comes from and how it shares the output
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Reciter directory on the audio host
    #[serde(default = "default_reciter")]
    pub reciter: String,

    #[serde(default)]
    pub session: AudioSessionConfig,
}

/// Engine tuning
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Load/resume confirmation bound
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,

    /// Reloads after a transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,

    /// Position report interval of the simulated player
    #[serde(default = "default_position_interval_ms")]
    pub position_interval_ms: u64,

    /// Clip length of the simulated player
    #[serde(default = "default_clip_duration_ms")]
    pub clip_duration_ms: u64,

    /// Load latency of the simulated player
    #[serde(default = "default_load_latency_ms")]
    pub load_latency_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error, or a full EnvFilter directive)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_database_path() -> PathBuf {
    default_data_folder().join("tilawa.db")
}

fn default_port() -> u16 {
    5750
}

fn default_base_url() -> String {
    AudioSource::default().base_url
}

fn default_reciter() -> String {
    AudioSource::default().reciter
}

fn default_stall_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u8 {
    DEFAULT_MAX_RETRIES
}

fn default_position_interval_ms() -> u64 {
    250
}

fn default_clip_duration_ms() -> u64 {
    8_000
}

fn default_load_latency_ms() -> u64 {
    300
}

fn default_log_level() -> String {
    "tilawa_ap=debug,tower_http=debug".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            port: default_port(),
            audio: AudioConfig::default(),
            playback: PlaybackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            reciter: default_reciter(),
            session: AudioSessionConfig::default(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            stall_timeout_ms: default_stall_timeout_ms(),
            max_retries: default_max_retries(),
            position_interval_ms: default_position_interval_ms(),
            clip_duration_ms: default_clip_duration_ms(),
            load_latency_ms: default_load_latency_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TomlConfig {
    /// Locate and load the bootstrap file, falling back to built-in defaults
    ///
    /// An explicitly named file (CLI or environment) must exist and parse.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let cli_arg = cli_path.map(|p| p.to_string_lossy().into_owned());

        match resolve_config_file(cli_arg.as_deref(), CONFIG_ENV_VAR) {
            Some(path) => {
                let config = load_toml::<TomlConfig>(&path).map_err(|e| {
                    Error::Config(format!("Failed to load {}: {}", path.display(), e))
                })?;
                info!("Loaded TOML configuration from {}", path.display());
                config.validate()?;
                Ok(config)
            }
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.playback.stall_timeout_ms == 0 {
            return Err(Error::Config("playback.stall_timeout_ms must be positive".to_string()));
        }
        if self.playback.position_interval_ms == 0 {
            return Err(Error::Config(
                "playback.position_interval_ms must be positive".to_string(),
            ));
        }
        if self.audio.base_url.trim().is_empty() {
            return Err(Error::Config("audio.base_url must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn audio_source(&self) -> AudioSource {
        AudioSource::new(self.audio.base_url.clone(), self.audio.reciter.clone())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            source: self.audio_source(),
            stall_timeout: Duration::from_millis(self.playback.stall_timeout_ms),
            retry: RetryPolicy::new(self.playback.max_retries),
        }
    }

    pub fn simulated_timing(&self) -> SimulatedTiming {
        SimulatedTiming {
            clip_duration: Duration::from_millis(self.playback.clip_duration_ms),
            load_latency: Duration::from_millis(self.playback.load_latency_ms),
            tick: Duration::from_millis(self.playback.position_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5750);
        assert_eq!(config.playback.stall_timeout_ms, 10_000);
        assert_eq!(config.playback.max_retries, 3);
        assert_eq!(config.playback.position_interval_ms, 250);
        assert!(config.database_path.ends_with("tilawa.db"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 6000

            [audio]
            reciter = "Husary_64kbps"

            [playback]
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.audio.reciter, "Husary_64kbps");
        assert_eq!(config.audio.base_url, default_base_url());
        assert_eq!(config.playback.max_retries, 5);
        assert_eq!(config.playback.stall_timeout_ms, 10_000);
        assert_eq!(config.engine_config().retry.max_retries, 5);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = TomlConfig::default();
        config.playback.stall_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 7001\n[playback]\nstall_timeout_ms = 2500").unwrap();

        let config = TomlConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 7001);
        assert_eq!(config.engine_config().stall_timeout, Duration::from_millis(2_500));
    }

    #[test]
    #[serial]
    fn test_load_missing_explicit_path_fails() {
        let result = TomlConfig::load(Some(Path::new("/nonexistent/tilawa/config.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
