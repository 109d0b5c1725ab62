//! AI-assisted project configuration.
//!
//! A digest of the repository is posted to the configuration service, which
//! replies with an NDJSON stream of progress logs and, finally, the
//! generated configuration. The result is shown, then saved under the
//! service's project config directory.

mod digest;
mod git;
mod pipeline;
mod printer;
mod prompt;

pub use digest::{Digest, DigestProvider, FileTreeDigest};
pub use git::find_git_root;
pub use pipeline::{
    ai_service_url, check_ai_available, run_ai_config, show_digest, Input, Options, Output,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use printer::{LogPrinter, SPIN_TAG};
pub use prompt::{Confirmer, FixedAnswer, TerminalConfirmer};

use std::path::PathBuf;

use platwrap_auth::TransportError;
use platwrap_stream::StreamError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("this command can only be run inside a Git repository")]
    NotInGitRepo,

    #[error("cannot use AI: {0}")]
    CannotUseAi(&'static str),

    #[error("invalid AI service URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("rate limit exceeded: please try again after {0} seconds")]
    RateLimitedFor(String),

    #[error("rate limit exceeded: please try again later")]
    RateLimited,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unexpected status code {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("unexpected data key: {0}")]
    UnexpectedDataKey(String),

    #[error("could not decode output: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("could not encode digest: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("no valid configuration received")]
    NoValidConfig,

    #[error("the configuration file already exists: {}", .0.display())]
    ConfigExists(PathBuf),

    #[error(transparent)]
    Prompt(#[from] inquire::InquireError),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
