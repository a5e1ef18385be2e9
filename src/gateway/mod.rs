//! Outbound gateways: issue tracker, email and spreadsheet.
//!
//! The dispatcher only sees the [`TicketGateway`], [`EmailGateway`] and
//! [`SheetGateway`] traits; the concrete HTTP clients are constructed once at
//! startup and injected.
//!
//! Implementations:
//! - [`jira::JiraGateway`]: Jira Cloud REST v3 issue creation
//! - [`gmail::GmailGateway`]: Gmail `users.messages.send`
//! - [`sheets::SheetsGateway`]: Google Sheets `values.append`

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use crate::ticket::TicketRequest;

pub mod gmail;
pub mod google;
pub mod jira;
pub mod sheets;

/// HTTP connect timeout for gateway clients.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout for gateway clients.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Longest error body kept in a [`GatewayError::HttpStatus`].
const MAX_ERROR_BODY_CHARS: usize = 256;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// An email to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// A spreadsheet row, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// Submitter organization.
    pub organization: String,
    /// Submitter name.
    pub name: String,
    /// Submitter email.
    pub email: String,
    /// Free-text issue.
    pub issue: String,
    /// Row status.
    pub status: String,
}

impl SheetRow {
    /// Cell values in column order.
    pub fn cells(&self) -> [&str; 5] {
        [
            self.organization.as_str(),
            self.name.as_str(),
            self.email.as_str(),
            self.issue.as_str(),
            self.status.as_str(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Issue tracker.
#[async_trait]
pub trait TicketGateway: Send + Sync {
    /// Create an issue and return its key.
    async fn submit(&self, ticket: &TicketRequest) -> Result<String, GatewayError>;

    /// Move an existing issue into a sprint.
    async fn add_to_sprint(&self, sprint_id: u64, issue_key: &str) -> Result<(), GatewayError>;
}

/// Email service.
#[async_trait]
pub trait EmailGateway: Send + Sync {
    /// Send an email.
    async fn send(&self, email: &OutboundEmail) -> Result<(), GatewayError>;
}

/// Spreadsheet.
#[async_trait]
pub trait SheetGateway: Send + Sync {
    /// Append one row.
    async fn append(&self, row: &SheetRow) -> Result<(), GatewayError>;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by outbound gateways.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// HTTP transport failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The destination answered with an unexpected status.
    #[error("unexpected status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized, truncated response body.
        body: String,
    },
    /// The response did not have the expected shape.
    #[error("response parse error: {0}")]
    Parse(String),
    /// Credentials are missing, unreadable or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Every attempt failed.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: Box<GatewayError>,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build the shared gateway HTTP client with connect and request timeouts.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to build HTTP client with timeouts, using default");
            reqwest::Client::default()
        })
}

/// Read a response body, failing with a sanitized [`GatewayError::HttpStatus`]
/// unless the status is one of `expected`.
///
/// # Errors
///
/// Returns `GatewayError::Request` on transport failure and
/// `GatewayError::HttpStatus` on an unexpected status.
pub async fn check_status(
    response: reqwest::Response,
    expected: &[u16],
) -> Result<String, GatewayError> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    if !expected.contains(&status) {
        return Err(GatewayError::HttpStatus {
            status,
            body: sanitize_error_body(&body),
        });
    }
    Ok(body)
}

/// Collapse whitespace, redact token-like values and truncate.
pub fn sanitize_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"xox[abpr]-[A-Za-z0-9\-]{10,}",
        r"xapp-[A-Za-z0-9\-]{10,}",
        r"ya29\.[A-Za-z0-9_\-\.]{10,}",
        r"ATATT[A-Za-z0-9_\-=]{10,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

/// Run `call` up to `attempts` times with immediate retry.
///
/// # Errors
///
/// Returns [`GatewayError::RetriesExhausted`] wrapping the last failure.
pub async fn with_retries<T, F, Fut>(
    operation: &str,
    attempts: u32,
    mut call: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let attempts = attempts.max(1);
    let mut attempt: u32 = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                warn!(operation, attempt, error = %e, "final attempt failed");
                return Err(GatewayError::RetriesExhausted {
                    attempts,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                warn!(operation, attempt, error = %e, "attempt failed, retrying");
                attempt = attempt.saturating_add(1);
            }
        }
    }
}
