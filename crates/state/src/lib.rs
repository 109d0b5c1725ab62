//! Persisted user state.
//!
//! A small JSON document in the writable user directory recording when the
//! wrapper last checked for updates. Readers may race with writers and see
//! stale data; writers replace the file atomically.

use platwrap_config::{write_atomic, Config, ConfigError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub updates: Checked,
    #[serde(default)]
    pub config_updates: Checked,
}

/// Unix timestamp (seconds) of the last check. Zero means never.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checked {
    #[serde(default)]
    pub last_checked: i64,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load state for the active profile. A missing file yields the default.
pub fn load(cnf: &Config) -> Result<State, StateError> {
    load_from(&cnf.state_file()?)
}

/// Persist state for the active profile.
pub fn save(cnf: &Config, state: &State) -> Result<(), StateError> {
    save_to(&cnf.state_file()?, state)
}

pub fn load_from(path: &Path) -> Result<State, StateError> {
    let text = match fs::read(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(State::default()),
        Err(source) => {
            return Err(StateError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&text).map_err(|source| StateError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_to(path: &Path, state: &State) -> Result<(), StateError> {
    let data = serde_json::to_vec(state).map_err(|source| StateError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    write_atomic(path, &data, 0o600).map_err(|source| StateError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(target: "platwrap::state", path = %path.display(), "Saved state");
    Ok(())
}
