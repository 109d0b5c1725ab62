//! Consumer for newline-delimited JSON job streams.

mod consumer;
mod lines;
mod message;

pub use consumer::{consume, handle_response, NDJSON_CONTENT_TYPE};
pub use lines::{LineSplitter, MAX_LINE_BYTES};
pub use message::{LogLevel, Message};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("unexpected status code {0}")]
    UnexpectedStatus(u16),

    #[error("unexpected content type: {0}")]
    UnexpectedContentType(String),

    #[error("failed to decode line: {source}: {line}")]
    Decode {
        #[source]
        source: serde_json::Error,
        line: String,
    },

    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("failed to read stream: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stream cancelled")]
    Cancelled,

    #[error("message handler stopped")]
    ReceiverClosed,
}
