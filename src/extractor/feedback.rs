//! Thumbs up/down channel.
//!
//! `blocks[0]` holds the sentiment, `blocks[1]` the submitter metadata as
//! `*Label:* value` lines walked by `*`-delimited segment position, and
//! `blocks[4]` the feedback fenced by triple backticks. The original request
//! is whatever follows the submitter's name in `event.text`.

use serde_json::Value;

use super::fields::{segment, text_at, trim_chars};
use super::{ExtractError, FeedbackRecord, Submitter};

const SENTIMENT: &str = "/event/blocks/0/text/text";
const SOURCE: &str = "/event/blocks/1/text/text";
const MESSAGE: &str = "/event/blocks/4/text/text";
const EVENT_TEXT: &str = "/event/text";

pub(super) fn extract(payload: &Value) -> Result<FeedbackRecord, ExtractError> {
    let sentiment = text_at(payload, SENTIMENT)?;
    let source = text_at(payload, SOURCE)?;
    let lines: Vec<&str> = source.split('\n').collect();

    let name = trim_chars(segment(source.split('*'), 2, "name")?, 1, 1, "name")?;
    if name.is_empty() {
        return Err(ExtractError::TooShort {
            field: "name",
            len: 0,
        });
    }

    let email_value = value_segment(&lines, 1, "email")?;
    let email = trim_chars(segment(email_value.split('|'), 1, "email")?, 0, 1, "email")?;
    let organization = trim_chars(value_segment(&lines, 2, "organization")?, 1, 0, "organization")?;
    let origin = trim_chars(value_segment(&lines, 4, "origin")?, 1, 0, "origin")?;
    let timestamp = trim_chars(value_segment(&lines, 5, "timestamp")?, 1, 0, "timestamp")?;

    // Request follows "{name}: " up to any repeat of the name.
    let after_name = segment(text_at(payload, EVENT_TEXT)?.split(name), 1, "request")?;
    let request = trim_chars(after_name, 2, 0, "request")?;

    let fenced = segment(text_at(payload, MESSAGE)?.split("```"), 1, "feedback")?;
    let feedback = trim_chars(fenced, 1, 1, "feedback")?;

    Ok(FeedbackRecord {
        submitter: Submitter {
            name: name.to_owned(),
            email: email.to_owned(),
            organization: organization.to_owned(),
            timestamp: timestamp.to_owned(),
        },
        sentiment: sentiment.to_owned(),
        request: request.to_owned(),
        feedback: feedback.to_owned(),
        origin: origin.to_owned(),
    })
}

/// Third `*`-delimited segment of line `index`: the value after `*Label:*`.
fn value_segment<'a>(
    lines: &[&'a str],
    index: usize,
    field: &'static str,
) -> Result<&'a str, ExtractError> {
    let line = lines
        .get(index)
        .copied()
        .ok_or(ExtractError::MissingSegment { field, index })?;
    segment(line.split('*'), 2, field)
}
