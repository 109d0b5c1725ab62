use futures::StreamExt;
use reqwest::{header::CONTENT_TYPE, Response, StatusCode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::lines::LineSplitter;
use crate::message::Message;
use crate::StreamError;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Messages buffered between the reader and the handler.
const CHANNEL_CAPACITY: usize = 32;

/// Read an NDJSON response and forward its messages to `tx`.
///
/// Keep-alives are dropped and a `done` message ends the stream. The
/// sender is dropped on return, which closes the channel.
pub async fn handle_response(
    cancel: &CancellationToken,
    response: Response,
    tx: mpsc::Sender<Message>,
) -> Result<(), StreamError> {
    if response.status() != StatusCode::OK {
        return Err(StreamError::UnexpectedStatus(response.status().as_u16()));
    }
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if content_type != NDJSON_CONTENT_TYPE {
        return Err(StreamError::UnexpectedContentType(content_type));
    }

    let mut body = response.bytes_stream();
    let mut splitter = LineSplitter::new();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            chunk = body.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        for line in splitter.push(&chunk?)? {
            if forward(cancel, &tx, &line).await? {
                return Ok(());
            }
        }
    }
    if let Some(line) = splitter.finish() {
        forward(cancel, &tx, &line).await?;
    }
    tracing::debug!(target: "platwrap::stream", "Stream ended without a done message");
    Ok(())
}

/// Decode and send one line. Returns true once `done` is seen.
async fn forward(
    cancel: &CancellationToken,
    tx: &mpsc::Sender<Message>,
    line: &[u8],
) -> Result<bool, StreamError> {
    let message: Message =
        serde_json::from_slice(line).map_err(|source| StreamError::Decode {
            source,
            line: String::from_utf8_lossy(line).into_owned(),
        })?;
    match message {
        Message::KeepAlive { .. } => Ok(false),
        Message::Done { .. } => {
            tracing::debug!(target: "platwrap::stream", "Stream done");
            Ok(true)
        }
        message => {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(StreamError::Cancelled),
                sent = tx.send(message) => sent.map(|_| false).map_err(|_| StreamError::ReceiverClosed),
            }
        }
    }
}

/// Run the reader and `handle` concurrently until the stream ends or either fails.
pub async fn consume<F, E>(
    cancel: &CancellationToken,
    response: Response,
    mut handle: F,
) -> Result<(), E>
where
    F: FnMut(Message) -> Result<(), E>,
    E: From<StreamError>,
{
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let reader = async {
        handle_response(cancel, response, tx)
            .await
            .map_err(E::from)
    };
    let handler = async {
        while let Some(message) = rx.recv().await {
            handle(message)?;
        }
        Ok::<(), E>(())
    };
    tokio::try_join!(reader, handler)?;
    Ok(())
}
