//! Idea channel: header lines in `blocks[1]`, idea body in `event.text`.

use serde_json::Value;

use super::fields::{strip_label, text_at, HeaderLines};
use super::{ExtractError, IdeaRecord};

const HEADER: &str = "/event/blocks/1/text/text";
const EVENT_TEXT: &str = "/event/text";

pub(super) fn extract(payload: &Value) -> Result<IdeaRecord, ExtractError> {
    let header = HeaderLines::parse(text_at(payload, HEADER)?)?;

    // `event.text` reads "New idea from {name}: {idea}".
    let prefix = format!("New idea from {}: ", header.submitter.name);
    let text = strip_label(text_at(payload, EVENT_TEXT)?, &prefix)?;

    Ok(IdeaRecord {
        submitter: header.submitter,
        user_id: header.user_id,
        text: text.to_owned(),
    })
}
