//! Gmail `users.messages.send` from a verified sender alias.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use serde::Deserialize;
use tracing::{info, instrument};

use super::google::GoogleTokenManager;
use super::{check_status, http_client, EmailGateway, GatewayError, OutboundEmail};

/// Default Gmail API origin.
pub const DEFAULT_GMAIL_API: &str = "https://gmail.googleapis.com";

/// Gmail client sending as `sender_alias` on behalf of the token's account.
pub struct GmailGateway {
    client: reqwest::Client,
    tokens: Arc<GoogleTokenManager>,
    sender_alias: String,
    api_base: String,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

impl GmailGateway {
    /// Create a gateway against [`DEFAULT_GMAIL_API`].
    pub fn new(tokens: Arc<GoogleTokenManager>, sender_alias: String) -> Self {
        Self::with_api_base(tokens, sender_alias, DEFAULT_GMAIL_API)
    }

    /// Create a gateway against a custom API origin.
    pub fn with_api_base(
        tokens: Arc<GoogleTokenManager>,
        sender_alias: String,
        api_base: &str,
    ) -> Self {
        Self {
            client: http_client(),
            tokens,
            sender_alias,
            api_base: api_base.trim_end_matches('/').to_owned(),
        }
    }
}

/// Render `email` as an RFC 822 message from `sender`.
pub fn build_raw_message(sender: &str, email: &OutboundEmail) -> String {
    format!(
        "MIME-Version: 1.0\r\n\
         Content-Type: text/plain; charset=\"utf-8\"\r\n\
         Content-Transfer-Encoding: 8bit\r\n\
         To: {}\r\n\
         From: {}\r\n\
         Subject: {}\r\n\
         \r\n\
         {}",
        email.to,
        sender,
        encode_header(&email.subject),
        email.body
    )
}

/// RFC 2047-encode a header value when it is not plain ASCII.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        return value.to_owned();
    }
    format!("=?utf-8?B?{}?=", STANDARD.encode(value))
}

#[async_trait]
impl EmailGateway for GmailGateway {
    #[instrument(skip(self, email))]
    async fn send(&self, email: &OutboundEmail) -> Result<(), GatewayError> {
        let token = self.tokens.access_token().await?;
        let raw = URL_SAFE.encode(build_raw_message(&self.sender_alias, email));

        let url = format!("{}/gmail/v1/users/me/messages/send", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await?;
        let body = check_status(response, &[200]).await?;
        let sent: SentMessage =
            serde_json::from_str(&body).map_err(|e| GatewayError::Parse(e.to_string()))?;
        info!(message_id = %sent.id, "email sent");
        Ok(())
    }
}
