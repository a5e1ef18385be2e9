//! Socket Mode listener.
//!
//! Each envelope is handled in two explicit steps: acknowledge it, then
//! forward any `message` event it carries. Acknowledgment never waits on
//! extraction or dispatch.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMsg};
use tracing::{debug, info, warn};

use super::client::SlackClient;
use super::{IncomingEvent, SlackError};

/// First reconnect delay (milliseconds).
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum reconnect backoff (milliseconds).
const MAX_BACKOFF_MS: u64 = 30_000;

/// An envelope that must be acknowledged.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Id echoed back in the acknowledgment.
    pub envelope_id: String,
    /// Envelope type, e.g. `events_api`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Envelope payload.
    #[serde(default)]
    pub payload: Value,
}

/// A decoded Socket Mode text frame.
#[derive(Debug, Clone)]
pub enum SocketFrame {
    /// Connection established.
    Hello,
    /// Slack asks us to reconnect.
    Disconnect {
        /// Slack's reason, e.g. `refresh_requested`.
        reason: String,
    },
    /// Anything carrying an `envelope_id`.
    Envelope(Envelope),
}

/// Decode one text frame.
///
/// # Errors
///
/// Returns `SlackError::Frame` for non-JSON frames and envelopes without an id.
pub fn parse_frame(text: &str) -> Result<SocketFrame, SlackError> {
    let raw: Value = serde_json::from_str(text).map_err(|e| SlackError::Frame(e.to_string()))?;
    match raw.get("type").and_then(Value::as_str) {
        Some("hello") => Ok(SocketFrame::Hello),
        Some("disconnect") => Ok(SocketFrame::Disconnect {
            reason: raw
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_owned(),
        }),
        _ => serde_json::from_value(raw)
            .map(SocketFrame::Envelope)
            .map_err(|e| SlackError::Frame(e.to_string())),
    }
}

/// Acknowledgment frame for an envelope.
pub fn ack_frame(envelope_id: &str) -> String {
    serde_json::json!({ "envelope_id": envelope_id }).to_string()
}

/// What the connection does after one text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Keep reading.
    Continue,
    /// Slack asked for a new connection.
    Reconnect,
    /// Nobody is receiving events any more.
    ReceiverClosed,
}

/// Why a connection ended without error.
enum SessionEnd {
    Reconnect,
    ReceiverClosed,
}

/// Handle one text frame: acknowledge any envelope on `write`, then forward
/// the `message` event it carries to `event_tx`.
///
/// The ack is written before the payload is inspected, so it goes out even
/// when the event is ignored, cannot be extracted later, or cannot be queued.
///
/// # Errors
///
/// Returns `SlackError::WebSocket` when the ack cannot be written.
pub async fn handle_frame<S>(
    text: &str,
    write: &mut S,
    event_tx: &mpsc::Sender<IncomingEvent>,
) -> Result<FrameOutcome, SlackError>
where
    S: Sink<WsMsg, Error = WsError> + Unpin,
{
    let envelope = match parse_frame(text) {
        Ok(SocketFrame::Hello) => {
            debug!("Socket Mode hello received");
            return Ok(FrameOutcome::Continue);
        }
        Ok(SocketFrame::Disconnect { reason }) => {
            info!(%reason, "Slack requested disconnect");
            return Ok(FrameOutcome::Reconnect);
        }
        Ok(SocketFrame::Envelope(envelope)) => envelope,
        Err(e) => {
            warn!(error = %e, "ignoring Socket Mode frame");
            return Ok(FrameOutcome::Continue);
        }
    };

    write
        .send(WsMsg::Text(ack_frame(&envelope.envelope_id)))
        .await?;

    if envelope.kind != "events_api" {
        debug!(kind = %envelope.kind, "ignoring non-events envelope");
        return Ok(FrameOutcome::Continue);
    }
    let Some(event) = IncomingEvent::from_events_api(envelope.payload) else {
        return Ok(FrameOutcome::Continue);
    };
    if event_tx.send(event).await.is_err() {
        return Ok(FrameOutcome::ReceiverClosed);
    }
    Ok(FrameOutcome::Continue)
}

/// Spawn the Socket Mode listener, forwarding message events to `event_tx`.
///
/// Returns immediately. The listener reconnects with exponential backoff on
/// errors and stops once the receiving side of `event_tx` is dropped.
pub fn spawn_socket_listener(
    client: Arc<SlackClient>,
    event_tx: mpsc::Sender<IncomingEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            match listen(&client, &event_tx).await {
                Ok(SessionEnd::ReceiverClosed) => {
                    info!("event receiver closed, stopping Socket Mode listener");
                    break;
                }
                Ok(SessionEnd::Reconnect) => {
                    backoff_ms = INITIAL_BACKOFF_MS;
                    info!("Socket Mode session ended, reconnecting");
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms, "Socket Mode error, reconnecting");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
                }
            }
        }
    })
}

async fn listen(
    client: &SlackClient,
    event_tx: &mpsc::Sender<IncomingEvent>,
) -> Result<SessionEnd, SlackError> {
    let url = client.open_connection().await?;
    let (stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    let (mut write, mut read) = stream.split();
    info!("Socket Mode connected");

    while let Some(message) = read.next().await {
        match message? {
            WsMsg::Text(text) => match handle_frame(&text, &mut write, event_tx).await? {
                FrameOutcome::Continue => {}
                FrameOutcome::Reconnect => return Ok(SessionEnd::Reconnect),
                FrameOutcome::ReceiverClosed => return Ok(SessionEnd::ReceiverClosed),
            },
            WsMsg::Ping(data) => write.send(WsMsg::Pong(data)).await?,
            WsMsg::Close(_) => return Ok(SessionEnd::Reconnect),
            _ => {}
        }
    }

    Ok(SessionEnd::Reconnect)
}
