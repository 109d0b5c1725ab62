//! Token-aware HTTP client for the platform API.
//!
//! Tokens come from the external agent, which owns the login session. The
//! transport stack injects them as bearer headers and retries a request
//! once when the API answers 401.

mod client;
mod context;
mod credential;
mod jwt;
mod transport;

pub use client::ApiClient;
pub use context::{event_name_from_context, transport_from_context, with_event_name, with_transport};
pub use credential::{AgentCredentialSource, Credential, CredentialSource};
pub use jwt::unsafe_token_expiry;
pub use transport::{
    ApiRequest, AuthTransport, BearerTransport, EventTransport, HttpTransport, ReqwestTransport,
    EVENT_HEADER,
};

use platwrap_agent::AgentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("jwt: empty token")]
    Empty,

    #[error("jwt: malformed token, expected 3 parts, got {parts}")]
    Malformed { parts: usize },

    #[error("jwt: decode payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("jwt: unmarshal claims: {0}")]
    Claims(#[from] serde_json::Error),

    #[error("jwt: no expiry time found")]
    NoExpiry,

    #[error("cannot retrieve token: {0}")]
    Retrieve(#[source] AgentError),

    #[error("cannot refresh token: {0}")]
    Refresh(#[source] AgentError),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Credential(#[from] TokenError),

    #[error("not authenticated, please run: {executable} login ({source})")]
    NotAuthenticated {
        executable: String,
        #[source]
        source: TokenError,
    },

    #[error("request body cannot be buffered for replay")]
    UnreplayableBody,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("could not encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("request cancelled")]
    Cancelled,
}
