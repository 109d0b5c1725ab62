//! Remote vendor profiles.
//!
//! A profile installed from a URL remembers where it came from, so the
//! updater can replace it when the remote copy is newer. The same fetch
//! backs `config:install`, which writes the profile next to a small
//! launcher that runs this binary under the alternate identity.

mod fetch;
mod fs;
mod launcher;
mod path;
mod update;

pub use fetch::{fetch_config, FetchedConfig};
pub use fs::{find_bin_dir, find_config_dir, write_file};
pub use launcher::{executable_extension, Alt};
pub use path::{in_path, in_path_value};
pub use update::{should_update, update, UpdateOutcome};

use std::path::PathBuf;

use platwrap_config::ConfigError;
use platwrap_state::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AltError {
    #[error("invalid config URL: {0}")]
    InvalidUrl(String),

    #[error("failed to fetch config: {0}")]
    Http(#[from] reqwest::Error),

    #[error("received unexpected response code {0}")]
    UnexpectedStatus(u16),

    #[error("invalid config YAML: {0}")]
    Yaml(#[source] serde_yaml::Error),

    #[error("invalid config YAML: the document must be a mapping")]
    NotAMapping,

    #[error("could not encode config YAML: {0}")]
    Encode(#[source] serde_yaml::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("no config file path available")]
    NoSourceFile,

    #[error("could not stat config file {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not compare config versions: {0}")]
    CompareVersions(#[source] semver::Error),

    #[error("could not determine the user config directory")]
    NoConfigDir,

    #[error("config fetch cancelled")]
    Cancelled,

    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
