//! Configuration file and data folder resolution

use crate::{Error, Result};
use std::path::PathBuf;
use tracing::debug;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TILAWA_CONFIG";

/// Config file resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Platform config file (`~/.config/tilawa/config.toml`, `/etc/tilawa/config.toml` on Linux)
///
/// Returns `None` when no file is found; callers fall back to built-in defaults.
pub fn resolve_config_file(cli_arg: Option<&str>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            debug!("Config file from {}: {}", env_var_name, path);
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform location
    platform_config_file().ok()
}

/// Read a TOML config file into any deserializable type
pub fn load_toml<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Get the platform configuration file path, if one exists
fn platform_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("tilawa").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/tilawa/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default data folder (holds the SQLite database)
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("tilawa"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/tilawa"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("tilawa"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/tilawa"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("tilawa"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\tilawa"))
    } else {
        PathBuf::from("./tilawa_data")
    }
}
