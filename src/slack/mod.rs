//! Slack adapter: Web API client, Socket Mode listener and inbound events.
//!
//! The listener acknowledges every envelope before anything looks at its
//! payload, then forwards `message` events over an mpsc channel. Replies go
//! out through the [`ReplyPoster`] trait so the dispatcher never depends on a
//! live connection.

use async_trait::async_trait;
use serde_json::Value;

pub mod client;
pub mod socket;

/// Errors from the Slack adapter.
#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    /// HTTP request to the Web API failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The Web API answered `ok: false`.
    #[error("Slack API error in {method}: {error}")]
    Api {
        /// Web API method.
        method: String,
        /// Slack's error code.
        error: String,
    },

    /// The Socket Mode connection failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A Socket Mode frame could not be understood.
    #[error("invalid Socket Mode frame: {0}")]
    Frame(String),
}

/// Posts replies into message threads.
#[async_trait]
pub trait ReplyPoster: Send + Sync {
    /// Post `text` into the thread rooted at `thread_ts` in `channel_id`.
    async fn post_reply(&self, channel_id: &str, thread_ts: &str, text: &str)
        -> Result<(), SlackError>;
}

/// Who this bot is, from `auth.test`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotIdentity {
    /// Bot user id (`U..`).
    pub user_id: Option<String>,
    /// Bot id (`B..`).
    pub bot_id: Option<String>,
}

/// Message subtypes that carry form posts. Edits, deletions and joins do not.
const FORWARDED_SUBTYPES: &[&str] = &["bot_message"];

/// A `message` event delivered through the Events API.
#[derive(Debug, Clone)]
pub struct IncomingEvent {
    /// Raw channel id.
    pub channel_id: String,
    /// Message timestamp.
    pub ts: String,
    /// Parent thread timestamp, when the message is itself a reply.
    pub thread_ts: Option<String>,
    /// Posting user, if any.
    pub user: Option<String>,
    /// Posting bot, if any.
    pub bot_id: Option<String>,
    /// The events-API payload, holding `event`.
    pub payload: Value,
}

impl IncomingEvent {
    /// Build from an `events_api` envelope payload.
    ///
    /// Returns `None` for non-message events, unsupported subtypes and
    /// events missing a channel or timestamp.
    pub fn from_events_api(payload: Value) -> Option<Self> {
        let event = payload.get("event")?;
        if event.get("type").and_then(Value::as_str) != Some("message") {
            return None;
        }
        if let Some(subtype) = event.get("subtype").and_then(Value::as_str) {
            if !FORWARDED_SUBTYPES.contains(&subtype) {
                return None;
            }
        }

        let text_field = |key: &str| event.get(key).and_then(Value::as_str).map(str::to_owned);
        let channel_id = text_field("channel")?;
        let ts = text_field("ts")?;
        let thread_ts = text_field("thread_ts");
        let user = text_field("user");
        let bot_id = text_field("bot_id");

        Some(Self {
            channel_id,
            ts,
            thread_ts,
            user,
            bot_id,
            payload,
        })
    }

    /// Thread to reply into: the parent thread, or this message.
    pub fn reply_thread(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }

    /// Whether this bot posted the event.
    pub fn is_from(&self, identity: &BotIdentity) -> bool {
        let same = |ours: &Option<String>, theirs: &Option<String>| {
            matches!((ours, theirs), (Some(a), Some(b)) if a == b)
        };
        same(&identity.bot_id, &self.bot_id) || same(&identity.user_id, &self.user)
    }
}
