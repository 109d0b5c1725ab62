//! Wrapper around the embedded external agent.
//!
//! The agent is an opaque bundle run by an embedded interpreter. Both are
//! unpacked into a per-version cache directory guarded by an advisory lock,
//! along with a copy of the active profile, and then launched with the
//! caller's arguments and a prepared environment.

mod embedded;
mod file;
mod lock;
mod wrapper;

pub use embedded::{EmbeddedFile, Payload};
pub use file::{probably_matches, sha256_file, write_if_changed};
pub use lock::CacheLock;
pub use wrapper::{AgentInvocation, AgentOutput, AgentRunner, AgentWrapper, OutputTarget};

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("could not create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not acquire lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("checksum mismatch for {path}: expected {expected}, found {actual}")]
    Checksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("agent bundle not found: {path}")]
    BundleNotFound { path: PathBuf },

    #[error("could not run agent command: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to wait for agent process: {0}")]
    Wait(#[source] io::Error),

    /// The agent ran and exited non-zero. The code is the wrapper's exit code.
    #[error("agent command exited with code {code}")]
    Exited { code: i32, stderr: String },

    #[error("agent process was terminated by a signal")]
    Terminated,

    #[error("agent command cancelled")]
    Cancelled,

    #[error("agent task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AgentError {
    /// Exit code to propagate, when the agent itself decided it.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            AgentError::Exited { code, .. } => Some(*code),
            _ => None,
        }
    }
}
