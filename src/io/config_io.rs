use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::io::storage::atomic_write;
use crate::model::config::AppConfig;

/// Error type for config and session files
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("could not serialize session: {0}")]
    SessionSerialize(#[from] serde_json::Error),
}

/// Get the config file path, respecting XDG_CONFIG_HOME
pub fn config_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".config"));
    config_dir.join("kanboard").join("kanboard.toml")
}

/// Default data directory, respecting XDG_DATA_HOME
pub fn default_data_dir() -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".local").join("share"));
    data_dir.join("kanboard")
}

/// Get the user's home directory
fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Read the config from a specific path. A missing file gives the defaults.
pub fn read_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(AppConfig::default()),
        Err(source) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&text).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the config from the default location.
pub fn read_config() -> Result<AppConfig, ConfigError> {
    read_config_from(&config_path())
}

/// Resolve the data directory: explicit override, then config, then default
pub fn resolve_data_dir(override_dir: Option<&Path>, config: &AppConfig) -> PathBuf {
    override_dir
        .map(Path::to_path_buf)
        .or_else(|| config.storage.data_dir.clone())
        .unwrap_or_else(default_data_dir)
}

// ---------------------------------------------------------------------------
// Session file
// ---------------------------------------------------------------------------

/// The signed-in user, persisted as session.json in the data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    /// Fingerprint of the board as of the last successful sync. A local
    /// board that no longer matches it has changes the remote hasn't seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Session {
            user_id: user_id.into(),
            synced: None,
        }
    }
}

fn session_path(data_dir: &Path) -> PathBuf {
    data_dir.join("session.json")
}

/// Read the session. Missing or malformed files mean signed out.
pub fn read_session(data_dir: &Path) -> Option<Session> {
    let content = fs::read_to_string(session_path(data_dir)).ok()?;
    serde_json::from_str(&content).ok()
}

pub fn write_session(data_dir: &Path, session: &Session) -> Result<(), ConfigError> {
    let path = session_path(data_dir);
    let content = serde_json::to_string_pretty(session)?;
    fs::create_dir_all(data_dir)
        .and_then(|()| atomic_write(&path, content.as_bytes()))
        .map_err(|source| ConfigError::WriteError { path, source })
}

pub fn clear_session(data_dir: &Path) -> Result<(), ConfigError> {
    let path = session_path(data_dir);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ConfigError::WriteError { path, source }),
    }
}
