//! Positional helpers shared by the per-channel extractors.
//!
//! Every helper fails closed: a missing node, label, line or delimiter is an
//! [`ExtractError`], never a panic and never a best-effort guess.

use serde_json::Value;

use super::{ExtractError, Submitter};

pub(crate) const SUBMITTED_BY: &str = "*Submitted by:* ";
pub(crate) const EMAIL: &str = "*Email:* ";
pub(crate) const ORGANIZATION: &str = "*Organization:* ";
pub(crate) const USER_ID: &str = "*User ID:* ";
pub(crate) const TIMESTAMP: &str = "*Timestamp:* ";

const MAILTO_OPEN: &str = "<mailto:";

/// Resolve a JSON pointer to a string node.
pub(crate) fn text_at<'a>(payload: &'a Value, pointer: &str) -> Result<&'a str, ExtractError> {
    let node = payload
        .pointer(pointer)
        .ok_or_else(|| ExtractError::MissingPath {
            pointer: pointer.to_owned(),
        })?;
    node.as_str().ok_or_else(|| ExtractError::NotText {
        pointer: pointer.to_owned(),
    })
}

/// Resolve a JSON pointer to an element label.
///
/// Slack renders element labels either as a bare string or as a text object
/// (`{"type": "plain_text", "text": ".."}`); both carry the label verbatim.
pub(crate) fn label_at<'a>(payload: &'a Value, pointer: &str) -> Result<&'a str, ExtractError> {
    let node = payload
        .pointer(pointer)
        .ok_or_else(|| ExtractError::MissingPath {
            pointer: pointer.to_owned(),
        })?;
    match node {
        Value::String(text) => Ok(text),
        Value::Object(map) => map.get("text").and_then(Value::as_str).ok_or_else(|| {
            ExtractError::NotText {
                pointer: format!("{pointer}/text"),
            }
        }),
        _ => Err(ExtractError::NotText {
            pointer: pointer.to_owned(),
        }),
    }
}

/// Remove a literal label prefix. Whitespace or punctuation drift is an error.
pub(crate) fn strip_label<'a>(line: &'a str, label: &str) -> Result<&'a str, ExtractError> {
    line.strip_prefix(label)
        .ok_or_else(|| ExtractError::MissingLabel {
            label: label.to_owned(),
            found: line.to_owned(),
        })
}

/// Take the `index`-th item of a split, naming the field on failure.
pub(crate) fn segment<'a>(
    mut parts: impl Iterator<Item = &'a str>,
    index: usize,
    field: &'static str,
) -> Result<&'a str, ExtractError> {
    parts
        .nth(index)
        .ok_or(ExtractError::MissingSegment { field, index })
}

/// Drop `leading` and `trailing` characters from `value`.
///
/// Counts characters, not bytes. A value shorter than the trim is an error.
pub(crate) fn trim_chars<'a>(
    value: &'a str,
    leading: usize,
    trailing: usize,
    field: &'static str,
) -> Result<&'a str, ExtractError> {
    let total = value.chars().count();
    let keep = total
        .checked_sub(leading)
        .and_then(|rest| rest.checked_sub(trailing))
        .ok_or(ExtractError::TooShort { field, len: total })?;
    let start = byte_offset(value, leading);
    let end = byte_offset(value, leading.saturating_add(keep));
    Ok(&value[start..end])
}

fn byte_offset(value: &str, chars: usize) -> usize {
    value
        .char_indices()
        .nth(chars)
        .map_or(value.len(), |(offset, _)| offset)
}

/// Unwrap `<mailto:ADDRESS|LABEL>` to `ADDRESS`.
pub(crate) fn mailto_address(value: &str) -> Result<&str, ExtractError> {
    let inner = strip_label(value, MAILTO_OPEN)?;
    let inner = inner
        .strip_suffix('>')
        .ok_or(ExtractError::MissingDelimiter {
            field: "email",
            delimiter: ">",
        })?;
    inner
        .split_once('|')
        .map(|(address, _label)| address)
        .ok_or(ExtractError::MissingDelimiter {
            field: "email",
            delimiter: "|",
        })
}

/// The five positional `*Label:* value` lines that open idea and issue posts.
#[derive(Debug)]
pub(crate) struct HeaderLines {
    pub submitter: Submitter,
    pub user_id: String,
}

impl HeaderLines {
    /// Parse lines 0..4: submitter, email, organization, user id, timestamp.
    pub(crate) fn parse(text: &str) -> Result<Self, ExtractError> {
        let lines: Vec<&str> = text.split('\n').collect();
        let line = |index: usize| -> Result<&str, ExtractError> {
            lines.get(index).copied().ok_or(ExtractError::MissingSegment {
                field: "header line",
                index,
            })
        };

        let name = strip_label(line(0)?, SUBMITTED_BY)?;
        let email = mailto_address(strip_label(line(1)?, EMAIL)?)?;
        let organization = strip_label(line(2)?, ORGANIZATION)?;
        let user_id = strip_label(line(3)?, USER_ID)?;
        let timestamp = strip_label(line(4)?, TIMESTAMP)?;

        Ok(Self {
            submitter: Submitter {
                name: name.to_owned(),
                email: email.to_owned(),
                organization: organization.to_owned(),
                timestamp: timestamp.to_owned(),
            },
            user_id: user_id.to_owned(),
        })
    }
}
