//! Idea channel extraction.

use formrelay::extractor::{extract, ExtractError, ExtractedRecord, LogicalChannel, TicketType};

use crate::fixtures::{idea_payload, idea_payload_with, IDEA_HEADER};

#[test]
fn extracts_header_fields_and_idea_text() {
    let record = match extract(&LogicalChannel::Idea, &idea_payload()) {
        Ok(record) => record,
        Err(err) => panic!("idea payload should extract: {err}"),
    };

    assert_eq!(record.ticket_type(), Some(TicketType::Task));
    let idea = match record {
        ExtractedRecord::Idea(idea) => idea,
        other => panic!("expected idea record, got {other:?}"),
    };
    assert_eq!(idea.submitter.name, "Jane");
    assert_eq!(idea.submitter.email, "jane@x.com");
    assert_eq!(idea.submitter.organization, "Acme");
    assert_eq!(idea.submitter.timestamp, "2024-01-01");
    assert_eq!(idea.user_id, "U1");
    assert_eq!(idea.text, "Build a widget");
}

#[test]
fn mailto_link_reduces_to_address() {
    let header = IDEA_HEADER.replace(
        "<mailto:jane@x.com|jane@x.com>",
        "<mailto:a@b.com|a@b.com>",
    );
    let payload = idea_payload_with("New idea from Jane: Faster search", &header);

    match extract(&LogicalChannel::Idea, &payload) {
        Ok(ExtractedRecord::Idea(idea)) => assert_eq!(idea.submitter.email, "a@b.com"),
        other => panic!("expected idea record, got {other:?}"),
    }
}

#[test]
fn label_drift_is_a_parse_failure() {
    let header = IDEA_HEADER.replace("*Organization:* ", "*Org:* ");
    let payload = idea_payload_with("New idea from Jane: Build a widget", &header);

    let failure = match extract(&LogicalChannel::Idea, &payload) {
        Ok(record) => panic!("drifted label should fail, got {record:?}"),
        Err(failure) => failure,
    };
    assert!(matches!(
        failure.cause,
        ExtractError::MissingLabel { ref label, .. } if label == "*Organization:* "
    ));
    assert_eq!(failure.payload, payload);
}

#[test]
fn event_text_without_submitter_prefix_fails() {
    let payload = idea_payload_with("Someone else: Build a widget", IDEA_HEADER);
    assert!(extract(&LogicalChannel::Idea, &payload).is_err());
}

#[test]
fn truncated_header_fails() {
    let payload = idea_payload_with(
        "New idea from Jane: Build a widget",
        "*Submitted by:* Jane\n*Email:* <mailto:jane@x.com|jane@x.com>",
    );

    let failure = match extract(&LogicalChannel::Idea, &payload) {
        Ok(record) => panic!("short header should fail, got {record:?}"),
        Err(failure) => failure,
    };
    assert!(matches!(
        failure.cause,
        ExtractError::MissingSegment { index: 2, .. }
    ));
}

#[test]
fn missing_header_block_fails() {
    let mut payload = idea_payload();
    if let Some(blocks) = payload
        .pointer_mut("/event/blocks")
        .and_then(serde_json::Value::as_array_mut)
    {
        blocks.truncate(1);
    }

    let failure = match extract(&LogicalChannel::Idea, &payload) {
        Ok(record) => panic!("missing block should fail, got {record:?}"),
        Err(failure) => failure,
    };
    assert_eq!(failure.channel, LogicalChannel::Idea);
    assert!(matches!(failure.cause, ExtractError::MissingPath { .. }));
}
