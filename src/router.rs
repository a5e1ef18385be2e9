//! Dispatch routing: record to destination, outcome to in-thread reply.
//!
//! | Record                     | Destination              | Reply                       |
//! |----------------------------|--------------------------|-----------------------------|
//! | Idea, Issue                | ticket gateway           | issue key or failure cause  |
//! | Feedback, negative         | ticket gateway           | issue key or failure cause  |
//! | Feedback, positive         | email gateway, if any    | none                        |
//! | TestEcho                   | none                     | echo text                   |
//!
//! Ticket paths always reply, success or failure.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::extractor::{ExtractedRecord, FeedbackRecord, LogicalChannel, TicketType};
use crate::gateway::{EmailGateway, SheetGateway, TicketGateway};
use crate::slack::{IncomingEvent, ReplyPoster};
use crate::ticket;

/// Thread a reply is posted into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    /// Raw channel id.
    pub channel_id: String,
    /// Thread timestamp.
    pub thread_ts: String,
}

impl ReplyTarget {
    /// Reply in the event's own thread.
    pub fn for_event(event: &IncomingEvent) -> Self {
        Self {
            channel_id: event.channel_id.clone(),
            thread_ts: event.reply_thread().to_owned(),
        }
    }
}

/// Result of dispatching one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A ticket was created.
    Submitted {
        /// Tracker issue key, e.g. `SER-42`.
        issue_key: String,
    },
    /// Ticket creation failed after retries.
    Failed {
        /// Human-readable cause.
        cause: String,
    },
    /// Nothing to submit. Positive feedback with email disabled or failing.
    Acknowledged,
    /// A thank-you email was sent.
    Emailed,
    /// Test channel echo.
    Echoed {
        /// Echo text.
        message: String,
    },
    /// Not processed: unparseable, unrecognized or our own message.
    Dropped,
}

impl DispatchOutcome {
    /// Text to post in-thread, if this outcome warrants a reply.
    pub fn reply_text(&self) -> Option<String> {
        match self {
            Self::Submitted { issue_key } => Some(format!("Jira Issue Key: {issue_key}")),
            Self::Failed { cause } => Some(format!("Jira Issue creation failed: {cause}")),
            Self::Echoed { message } => Some(message.clone()),
            Self::Acknowledged | Self::Emailed | Self::Dropped => None,
        }
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted { issue_key } => write!(f, "submitted({issue_key})"),
            Self::Failed { .. } => f.write_str("failed"),
            Self::Acknowledged => f.write_str("acknowledged"),
            Self::Emailed => f.write_str("emailed"),
            Self::Echoed { .. } => f.write_str("echoed"),
            Self::Dropped => f.write_str("dropped"),
        }
    }
}

/// Dispatch settings taken from configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Tracker project receiving new issues.
    pub project_key: String,
    /// Sprint for newly created bugs.
    pub intake_sprint_id: Option<u64>,
    /// Subject of thank-you emails.
    pub email_subject: String,
}

/// Routes records to gateways and posts replies.
pub struct Dispatcher {
    replies: Arc<dyn ReplyPoster>,
    tickets: Arc<dyn TicketGateway>,
    email: Option<Arc<dyn EmailGateway>>,
    sheets: Option<Arc<dyn SheetGateway>>,
    settings: DispatchSettings,
}

impl Dispatcher {
    /// Create a dispatcher with ticketing only.
    pub fn new(
        replies: Arc<dyn ReplyPoster>,
        tickets: Arc<dyn TicketGateway>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            replies,
            tickets,
            email: None,
            sheets: None,
            settings,
        }
    }

    /// Send thank-you emails for positive feedback.
    #[must_use]
    pub fn with_email(mut self, email: Arc<dyn EmailGateway>) -> Self {
        self.email = Some(email);
        self
    }

    /// Append a spreadsheet row for each created ticket.
    #[must_use]
    pub fn with_sheets(mut self, sheets: Arc<dyn SheetGateway>) -> Self {
        self.sheets = Some(sheets);
        self
    }

    /// Deliver `record` and post the resulting reply into `target`.
    ///
    /// Reply failures are logged; they never change the outcome.
    pub async fn route(
        &self,
        channel: &LogicalChannel,
        record: &ExtractedRecord,
        target: &ReplyTarget,
    ) -> DispatchOutcome {
        let outcome = match (channel, record) {
            (LogicalChannel::Unrecognized(_), _) => DispatchOutcome::Dropped,
            (_, ExtractedRecord::TestEcho { message }) => DispatchOutcome::Echoed {
                message: message.clone(),
            },
            (_, ExtractedRecord::Feedback(feedback)) if !feedback.is_negative() => {
                self.thank_submitter(feedback).await
            }
            _ => self.submit_ticket(record).await,
        };

        if let Some(text) = outcome.reply_text() {
            if let Err(e) = self
                .replies
                .post_reply(&target.channel_id, &target.thread_ts, &text)
                .await
            {
                warn!(%channel, error = %e, "failed to post reply");
            }
        }

        info!(%channel, %outcome, "event dispatched");
        outcome
    }

    async fn submit_ticket(&self, record: &ExtractedRecord) -> DispatchOutcome {
        let Some(request) = ticket::format(record, &self.settings.project_key) else {
            return DispatchOutcome::Acknowledged;
        };

        match self.tickets.submit(&request).await {
            Ok(issue_key) => {
                self.after_submit(record, request.issue_type, &issue_key).await;
                DispatchOutcome::Submitted { issue_key }
            }
            Err(e) => {
                warn!(error = %e, "ticket submission failed");
                DispatchOutcome::Failed {
                    cause: e.to_string(),
                }
            }
        }
    }

    /// Sprint placement and spreadsheet logging, both best-effort.
    async fn after_submit(
        &self,
        record: &ExtractedRecord,
        issue_type: TicketType,
        issue_key: &str,
    ) {
        if let (Some(sprint_id), TicketType::Bug) = (self.settings.intake_sprint_id, issue_type) {
            if let Err(e) = self.tickets.add_to_sprint(sprint_id, issue_key).await {
                warn!(issue_key, sprint_id, error = %e, "failed to add issue to sprint");
            }
        }

        if let (Some(sheets), Some(row)) = (&self.sheets, ticket::sheet_row(record)) {
            if let Err(e) = sheets.append(&row).await {
                warn!(issue_key, error = %e, "failed to append spreadsheet row");
            }
        }
    }

    async fn thank_submitter(&self, feedback: &FeedbackRecord) -> DispatchOutcome {
        let Some(email) = &self.email else {
            debug!("positive feedback acknowledged, email disabled");
            return DispatchOutcome::Acknowledged;
        };

        let message = ticket::format_email(feedback, &self.settings.email_subject);
        match email.send(&message).await {
            Ok(()) => DispatchOutcome::Emailed,
            Err(e) => {
                warn!(error = %e, "failed to send thank-you email");
                DispatchOutcome::Acknowledged
            }
        }
    }
}
