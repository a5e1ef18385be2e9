//! Slack Web API client.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{BotIdentity, ReplyPoster, SlackError};

/// Default Web API origin.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Web API client holding the bot token (`xoxb-`) and app token (`xapp-`).
pub struct SlackClient {
    client: reqwest::Client,
    bot_token: String,
    app_token: String,
    api_base: String,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("api_base", &self.api_base)
            .field("bot_token", &"[REDACTED]")
            .field("app_token", &"[REDACTED]")
            .finish()
    }
}

impl SlackClient {
    /// Create a client against [`DEFAULT_API_BASE`].
    pub fn new(bot_token: String, app_token: String) -> Self {
        Self::with_api_base(bot_token, app_token, DEFAULT_API_BASE)
    }

    /// Create a client against a custom API origin.
    pub fn with_api_base(bot_token: String, app_token: String, api_base: &str) -> Self {
        Self {
            client: crate::gateway::http_client(),
            bot_token,
            app_token,
            api_base: api_base.trim_end_matches('/').to_owned(),
        }
    }

    async fn call(&self, method: &str, token: &str, body: &Value) -> Result<Value, SlackError> {
        let url = format!("{}/{method}", self.api_base);
        let response: Value = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        if response.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = response
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_owned();
            return Err(SlackError::Api {
                method: method.to_owned(),
                error,
            });
        }
        Ok(response)
    }

    /// Resolve the bot's own user and bot ids.
    pub async fn auth_test(&self) -> Result<BotIdentity, SlackError> {
        let response = self.call("auth.test", &self.bot_token, &json!({})).await?;
        let field = |key: &str| response.get(key).and_then(Value::as_str).map(str::to_owned);
        Ok(BotIdentity {
            user_id: field("user_id"),
            bot_id: field("bot_id"),
        })
    }

    /// Request a Socket Mode WebSocket URL.
    pub async fn open_connection(&self) -> Result<String, SlackError> {
        let response = self
            .call("apps.connections.open", &self.app_token, &json!({}))
            .await?;
        let url = response
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| SlackError::Frame("apps.connections.open returned no url".to_owned()))?;
        if !url.starts_with("wss://") {
            return Err(SlackError::Frame(format!(
                "Socket Mode URL must use wss://, got {}",
                url.split("://").next().unwrap_or("unknown")
            )));
        }
        Ok(url.to_owned())
    }
}

#[async_trait]
impl ReplyPoster for SlackClient {
    async fn post_reply(
        &self,
        channel_id: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<(), SlackError> {
        let body = json!({
            "channel": channel_id,
            "text": text,
            "thread_ts": thread_ts,
        });
        self.call("chat.postMessage", &self.bot_token, &body).await?;
        debug!(channel_id, thread_ts, "reply posted");
        Ok(())
    }
}
