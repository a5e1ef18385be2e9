//! Jira Cloud issue creation.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{check_status, http_client, with_retries, GatewayError, TicketGateway};
use crate::ticket::TicketRequest;

const CREATED: u16 = 201;
const NO_CONTENT: u16 = 204;

/// Jira REST client authenticated with an account email and API token.
pub struct JiraGateway {
    client: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
    retries: u32,
}

impl std::fmt::Debug for JiraGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraGateway")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_token", &"[REDACTED]")
            .field("retries", &self.retries)
            .finish()
    }
}

#[derive(Deserialize)]
struct CreatedIssue {
    key: String,
}

impl JiraGateway {
    /// Create a client for `base_url` (e.g. `https://acme.atlassian.net`).
    ///
    /// `retries` is the total number of attempts per issue.
    pub fn new(base_url: &str, email: String, api_token: String, retries: u32) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            email,
            api_token,
            retries,
        }
    }

    async fn create_once(&self, payload: &serde_json::Value) -> Result<String, GatewayError> {
        let url = format!("{}/rest/api/3/issue", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.email, Some(&self.api_token))
            .json(payload)
            .send()
            .await?;
        let body = check_status(response, &[CREATED]).await?;
        let created: CreatedIssue =
            serde_json::from_str(&body).map_err(|e| GatewayError::Parse(e.to_string()))?;
        Ok(created.key)
    }
}

#[async_trait]
impl TicketGateway for JiraGateway {
    #[instrument(skip(self, ticket), fields(issue_type = ticket.issue_type.as_str()))]
    async fn submit(&self, ticket: &TicketRequest) -> Result<String, GatewayError> {
        let payload = ticket.to_payload();
        let key = with_retries("jira create issue", self.retries, || {
            self.create_once(&payload)
        })
        .await?;
        info!(%key, "Jira issue created");
        Ok(key)
    }

    async fn add_to_sprint(&self, sprint_id: u64, issue_key: &str) -> Result<(), GatewayError> {
        let url = format!("{}/rest/agile/1.0/sprint/{sprint_id}/issue", self.base_url);
        let body = serde_json::json!({ "issues": [issue_key] });
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&body)
            .send()
            .await?;
        check_status(response, &[NO_CONTENT]).await?;
        debug!(issue_key, sprint_id, "issue added to sprint");
        Ok(())
    }
}
