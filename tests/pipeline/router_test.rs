//! Dispatch routing per record kind.

use std::sync::Arc;

use formrelay::extractor::{extract, ExtractedRecord, LogicalChannel, TicketType};
use formrelay::router::{DispatchOutcome, Dispatcher, ReplyTarget};

use crate::fakes::{
    dispatcher, settings, FailingSheets, FakeEmail, FakeTickets, RecordingPoster, ISSUE_KEY,
    SPRINT_ID,
};
use crate::fixtures::{feedback_payload, idea_payload, issue_payload, IDEA_CHANNEL, MESSAGE_TS};

fn target() -> ReplyTarget {
    ReplyTarget {
        channel_id: IDEA_CHANNEL.to_owned(),
        thread_ts: MESSAGE_TS.to_owned(),
    }
}

fn record(channel: &LogicalChannel, payload: &serde_json::Value) -> ExtractedRecord {
    match extract(channel, payload) {
        Ok(record) => record,
        Err(err) => panic!("fixture should extract: {err}"),
    }
}

#[test]
fn reply_texts() {
    let submitted = DispatchOutcome::Submitted {
        issue_key: "SER-42".to_owned(),
    };
    assert_eq!(submitted.reply_text().as_deref(), Some("Jira Issue Key: SER-42"));

    let failed = DispatchOutcome::Failed {
        cause: "timed out".to_owned(),
    };
    assert_eq!(
        failed.reply_text().as_deref(),
        Some("Jira Issue creation failed: timed out")
    );

    assert!(DispatchOutcome::Acknowledged.reply_text().is_none());
    assert!(DispatchOutcome::Emailed.reply_text().is_none());
    assert!(DispatchOutcome::Dropped.reply_text().is_none());
}

#[tokio::test]
async fn idea_is_ticketed_as_task() {
    let replies = Arc::new(RecordingPoster::default());
    let tickets = Arc::new(FakeTickets::default());
    let router = dispatcher(&replies, &tickets);

    let idea = record(&LogicalChannel::Idea, &idea_payload());
    let outcome = router.route(&LogicalChannel::Idea, &idea, &target()).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Submitted {
            issue_key: ISSUE_KEY.to_owned()
        }
    );
    let submitted = tickets.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].issue_type, TicketType::Task);
    assert_eq!(submitted[0].summary, "Auto Generated idea Ticket from Acme");
    assert!(submitted[0].body.contains("Idea Description: Build a widget"));
}

#[tokio::test]
async fn failure_reply_embeds_cause() {
    let replies = Arc::new(RecordingPoster::default());
    let tickets = Arc::new(FakeTickets::failing());
    let router = dispatcher(&replies, &tickets);

    let issue = record(&LogicalChannel::Issue, &issue_payload());
    let outcome = router.route(&LogicalChannel::Issue, &issue, &target()).await;

    assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
    let posted = replies.replies();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].text.starts_with("Jira Issue creation failed: "));
    assert!(posted[0].text.contains("500"));
}

#[tokio::test]
async fn negative_feedback_is_ticketed_as_bug() {
    let replies = Arc::new(RecordingPoster::default());
    let tickets = Arc::new(FakeTickets::default());
    let router = dispatcher(&replies, &tickets);

    let feedback = record(
        &LogicalChannel::Feedback,
        &feedback_payload(":thumbsdown: Negative feedback"),
    );
    router
        .route(&LogicalChannel::Feedback, &feedback, &target())
        .await;

    let submitted = tickets.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].issue_type, TicketType::Bug);
    assert_eq!(
        submitted[0].summary,
        "Auto Generated thumbsdown Ticket from Acme"
    );
    assert!(submitted[0]
        .body
        .contains("User Request: How do I reset my password?"));
}

#[tokio::test]
async fn positive_feedback_sends_thank_you_email() {
    let replies = Arc::new(RecordingPoster::default());
    let tickets = Arc::new(FakeTickets::default());
    let email = Arc::new(FakeEmail::default());
    let router = dispatcher(&replies, &tickets).with_email(email.clone());

    let feedback = record(
        &LogicalChannel::Feedback,
        &feedback_payload(":thumbsup: Positive feedback"),
    );
    let outcome = router
        .route(&LogicalChannel::Feedback, &feedback, &target())
        .await;

    assert_eq!(outcome, DispatchOutcome::Emailed);
    assert!(tickets.submitted().is_empty());
    assert!(replies.replies().is_empty());

    let sent = email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "jane@x.com");
    assert_eq!(sent[0].subject, "Feedback received");
    assert!(sent[0].body.starts_with("Hi Jane Doe,"));
}

#[tokio::test]
async fn follow_ups_are_best_effort() {
    let replies = Arc::new(RecordingPoster::default());
    let tickets = Arc::new(FakeTickets::default());
    let sheets = Arc::new(FailingSheets::default());
    let router = Dispatcher::new(replies.clone(), tickets.clone(), settings(Some(SPRINT_ID)))
        .with_sheets(sheets.clone());

    let issue = record(&LogicalChannel::Issue, &issue_payload());
    let outcome = router.route(&LogicalChannel::Issue, &issue, &target()).await;

    // Sprint placement and the sheet row both fail; the reply is unchanged.
    assert_eq!(
        outcome,
        DispatchOutcome::Submitted {
            issue_key: ISSUE_KEY.to_owned()
        }
    );
    assert_eq!(tickets.sprint_calls(), vec![(SPRINT_ID, ISSUE_KEY.to_owned())]);
    assert_eq!(sheets.attempts(), 1);
    assert_eq!(sheets.rows()[0].issue, "Login page times out");
    assert_eq!(replies.replies()[0].text, "Jira Issue Key: SER-42");
}

#[tokio::test]
async fn tasks_are_not_added_to_sprint() {
    let replies = Arc::new(RecordingPoster::default());
    let tickets = Arc::new(FakeTickets::default());
    let router = Dispatcher::new(replies.clone(), tickets.clone(), settings(Some(SPRINT_ID)));

    let idea = record(&LogicalChannel::Idea, &idea_payload());
    router.route(&LogicalChannel::Idea, &idea, &target()).await;

    assert!(tickets.sprint_calls().is_empty());
}
