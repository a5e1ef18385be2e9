//! Ticket formatting: extracted records to tracker, email and sheet requests.
//!
//! Body templates are chosen by submission kind. Submitter fields are
//! interpolated verbatim; nothing here re-validates extracted values.

use serde_json::{json, Value};

use crate::extractor::{ExtractedRecord, FeedbackRecord, SubmissionKind, Submitter, TicketType};
use crate::gateway::{OutboundEmail, SheetRow};

/// Status written to new spreadsheet rows.
pub const NEW_ROW_STATUS: &str = "New";

/// A create-issue request for the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRequest {
    /// Tracker project key.
    pub project_key: String,
    /// Tracker issue type.
    pub issue_type: TicketType,
    /// One-line summary.
    pub summary: String,
    /// Templated body, sent as a single paragraph.
    pub body: String,
}

impl TicketRequest {
    /// Render the tracker's create-issue JSON body.
    pub fn to_payload(&self) -> Value {
        json!({
            "fields": {
                "project": { "key": self.project_key },
                "issuetype": { "name": self.issue_type.as_str() },
                "summary": self.summary,
                "description": {
                    "type": "doc",
                    "version": 1,
                    "content": [{
                        "type": "paragraph",
                        "content": [{ "type": "text", "text": self.body }]
                    }]
                }
            }
        })
    }
}

/// Build the ticket for a record.
///
/// Returns `None` for records that must not be ticketed: positive feedback
/// and test echoes. Callers treat `None` as "acknowledge only".
pub fn format(record: &ExtractedRecord, project_key: &str) -> Option<TicketRequest> {
    let issue_type = record.ticket_type()?;
    let submitter = record.submitter()?;
    let body = match record {
        ExtractedRecord::Feedback(feedback) => lines(
            submitter,
            &[
                ("User Request", &feedback.request),
                ("User Feedback", &feedback.feedback),
                ("Feedback Origin", &feedback.origin),
            ],
        ),
        ExtractedRecord::Issue(issue) => lines(
            submitter,
            &[
                ("Issue Type", &issue.issue_type),
                ("Issue Urgency", &issue.issue_urgency),
                ("Issue Description", &issue.issue_description),
                ("Issue ID", &issue.issue_id),
            ],
        ),
        ExtractedRecord::Idea(idea) => lines(submitter, &[("Idea Description", &idea.text)]),
        ExtractedRecord::TestEcho { .. } => return None,
    };

    Some(TicketRequest {
        project_key: project_key.to_owned(),
        issue_type,
        summary: summary(record.kind(), submitter),
        body,
    })
}

fn summary(kind: SubmissionKind, submitter: &Submitter) -> String {
    format!(
        "Auto Generated {} Ticket from {}",
        kind.label(),
        submitter.organization
    )
}

fn lines(submitter: &Submitter, fields: &[(&str, &String)]) -> String {
    let mut out = format!(
        "From: {} - {}\nOrganization: {}\n",
        submitter.name, submitter.email, submitter.organization
    );
    for (label, value) in fields {
        out.push_str(label);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push_str("Submitted at: ");
    out.push_str(&submitter.timestamp);
    out
}

/// Spreadsheet row for a ticketed record: organization, name, email, text, status.
pub fn sheet_row(record: &ExtractedRecord) -> Option<SheetRow> {
    let submitter = record.submitter()?;
    let issue = match record {
        ExtractedRecord::Idea(idea) => &idea.text,
        ExtractedRecord::Issue(issue) => &issue.issue_description,
        ExtractedRecord::Feedback(feedback) => &feedback.feedback,
        ExtractedRecord::TestEcho { .. } => return None,
    };
    Some(SheetRow {
        organization: submitter.organization.clone(),
        name: submitter.name.clone(),
        email: submitter.email.clone(),
        issue: issue.clone(),
        status: NEW_ROW_STATUS.to_owned(),
    })
}

/// Thank-you email for positive feedback.
pub fn format_email(record: &FeedbackRecord, subject: &str) -> OutboundEmail {
    let body = format!(
        "Thank you for your feedback on your request: \"{}\". We're glad it was helpful.",
        record.request
    );
    OutboundEmail {
        to: record.submitter.email.clone(),
        subject: subject.to_owned(),
        body: customer_template(&record.submitter.name, &body),
    }
}

fn customer_template(recipient_name: &str, body: &str) -> String {
    format!("Hi {recipient_name},\n\n{body}\n\nBest regards,\nThe Support Team")
}
