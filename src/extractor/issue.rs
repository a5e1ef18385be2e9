//! Issue channel: everything lives in `attachments[0].blocks`.
//!
//! Block layout:
//! - `[1]` header lines
//! - `[3]` issue type, second token of line 1
//! - `[4]` urgency, everything after the first word of line 1
//! - `[5]` description fenced by "```\n" and a 4-character closing sentinel
//! - `[7]` action element whose label ends in "(ISSUE-ID)"

use serde_json::Value;

use super::fields::{label_at, segment, text_at, trim_chars, HeaderLines};
use super::{ExtractError, IssueRecord};

const HEADER: &str = "/event/attachments/0/blocks/1/text/text";
const ISSUE_TYPE: &str = "/event/attachments/0/blocks/3/text/text";
const URGENCY: &str = "/event/attachments/0/blocks/4/text/text";
const DESCRIPTION: &str = "/event/attachments/0/blocks/5/text/text";
const ACTION_LABEL: &str = "/event/attachments/0/blocks/7/elements/0/text";

const FENCE_OPEN: &str = "```\n";
const FENCE_CLOSE_LEN: usize = 4;

pub(super) fn extract(payload: &Value) -> Result<IssueRecord, ExtractError> {
    let header = HeaderLines::parse(text_at(payload, HEADER)?)?;

    let type_line = segment(text_at(payload, ISSUE_TYPE)?.split('\n'), 1, "issue type")?;
    let issue_type = segment(type_line.split(' '), 1, "issue type")?;

    let urgency_line = segment(text_at(payload, URGENCY)?.split('\n'), 1, "issue urgency")?;
    let (_, issue_urgency) = urgency_line
        .split_once(' ')
        .ok_or(ExtractError::MissingSegment {
            field: "issue urgency",
            index: 1,
        })?;

    let fenced = segment(
        text_at(payload, DESCRIPTION)?.split(FENCE_OPEN),
        1,
        "issue description",
    )?;
    let issue_description = trim_chars(fenced, 0, FENCE_CLOSE_LEN, "issue description")?;

    let label = label_at(payload, ACTION_LABEL)?;
    let last_token = label.rsplit(' ').next().unwrap_or(label);
    let issue_id = trim_chars(last_token, 1, 1, "issue id")?;

    Ok(IssueRecord {
        submitter: header.submitter,
        user_id: header.user_id,
        issue_type: issue_type.to_owned(),
        issue_urgency: issue_urgency.to_owned(),
        issue_description: issue_description.to_owned(),
        issue_id: issue_id.to_owned(),
    })
}
