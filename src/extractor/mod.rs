//! Field extraction from Slack form posts.
//!
//! Each logical channel renders its form into a hand-authored block layout,
//! so each has its own positional extractor:
//! - [`LogicalChannel::Idea`]: header lines in `blocks[1]`, idea body in `event.text`
//! - [`LogicalChannel::Issue`]: header lines one level deeper, inside `attachments[0]`
//! - [`LogicalChannel::Feedback`]: `*`-delimited metadata and a fenced message
//! - [`LogicalChannel::TestEcho`]: no extraction, echoes `event.text`
//!
//! Extraction is pure. Any shape mismatch becomes a [`ParseFailure`] carrying
//! the raw payload; no partial record is ever produced.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

mod feedback;
pub(crate) mod fields;
mod idea;
mod issue;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// The form type a Slack channel carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalChannel {
    /// Feature ideas, ticketed as tasks.
    Idea,
    /// Bug reports, ticketed as bugs.
    Issue,
    /// Thumbs up/down feedback on assistant answers.
    Feedback,
    /// Connectivity check channel; replies with an echo.
    TestEcho,
    /// A channel this bridge does not model. Carries the raw channel id.
    Unrecognized(String),
}

impl LogicalChannel {
    /// Parse a configured channel name (`idea`, `issue`, `feedback`, `test`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "idea" => Some(Self::Idea),
            "issue" => Some(Self::Issue),
            "feedback" => Some(Self::Feedback),
            "test" => Some(Self::TestEcho),
            _ => None,
        }
    }
}

impl fmt::Display for LogicalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idea => f.write_str("idea"),
            Self::Issue => f.write_str("issue"),
            Self::Feedback => f.write_str("feedback"),
            Self::TestEcho => f.write_str("test"),
            Self::Unrecognized(id) => write!(f, "unrecognized({id})"),
        }
    }
}

/// Static raw-channel-id to logical-channel mapping, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    channels: HashMap<String, LogicalChannel>,
}

impl ChannelMap {
    /// Build a map from `(raw channel id, logical channel)` pairs.
    pub fn new(entries: impl IntoIterator<Item = (String, LogicalChannel)>) -> Self {
        Self {
            channels: entries.into_iter().collect(),
        }
    }

    /// Resolve a raw channel id. Unknown ids map to [`LogicalChannel::Unrecognized`].
    pub fn resolve(&self, channel_id: &str) -> LogicalChannel {
        self.channels
            .get(channel_id)
            .cloned()
            .unwrap_or_else(|| LogicalChannel::Unrecognized(channel_id.to_owned()))
    }

    /// Number of mapped channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` when no channel is mapped.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Iterate mapped channels sorted by raw id.
    pub fn entries(&self) -> Vec<(&str, &LogicalChannel)> {
        let mut entries: Vec<_> = self
            .channels
            .iter()
            .map(|(id, channel)| (id.as_str(), channel))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Who submitted a form, as rendered in its header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submitter {
    /// Display name.
    pub name: String,
    /// Email address, unwrapped from its mailto link.
    pub email: String,
    /// Organization name.
    pub organization: String,
    /// Submission timestamp, verbatim.
    pub timestamp: String,
}

/// An idea submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdeaRecord {
    /// Header fields.
    #[serde(flatten)]
    pub submitter: Submitter,
    /// Slack user id of the submitter.
    pub user_id: String,
    /// Free-text idea body.
    pub text: String,
}

/// An issue report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueRecord {
    /// Header fields.
    #[serde(flatten)]
    pub submitter: Submitter,
    /// Slack user id of the submitter.
    pub user_id: String,
    /// Issue type chosen in the form.
    pub issue_type: String,
    /// Urgency chosen in the form.
    pub issue_urgency: String,
    /// Fenced free-text description.
    pub issue_description: String,
    /// Identifier from the trailing parenthesized token of the action label.
    pub issue_id: String,
}

/// Thumbs up/down feedback on an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackRecord {
    /// Header fields.
    #[serde(flatten)]
    pub submitter: Submitter,
    /// Sentiment text, e.g. `:thumbsdown: Negative feedback`.
    pub sentiment: String,
    /// The user request the feedback refers to.
    pub request: String,
    /// The feedback message.
    pub feedback: String,
    /// Where the feedback was given.
    pub origin: String,
}

impl FeedbackRecord {
    /// Negative feedback mentions `thumbsdown`, in any case.
    pub fn is_negative(&self) -> bool {
        self.sentiment.to_lowercase().contains("thumbsdown")
    }
}

/// Discriminator of an [`ExtractedRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    /// See [`IdeaRecord`].
    Idea,
    /// See [`IssueRecord`].
    Issue,
    /// See [`FeedbackRecord`].
    Feedback,
    /// Connectivity echo.
    TestEcho,
}

impl SubmissionKind {
    /// Label used in ticket summaries.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idea => "idea",
            Self::Issue => "issue",
            Self::Feedback => "thumbsdown",
            Self::TestEcho => "test",
        }
    }
}

/// Issue classification in the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TicketType {
    /// Defect.
    Bug,
    /// Planned work.
    Task,
}

impl TicketType {
    /// Tracker issue type name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bug => "Bug",
            Self::Task => "Task",
        }
    }
}

/// A flat record extracted from one inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "submission_kind", rename_all = "snake_case")]
pub enum ExtractedRecord {
    /// Idea channel.
    Idea(IdeaRecord),
    /// Issue channel.
    Issue(IssueRecord),
    /// Feedback channel.
    Feedback(FeedbackRecord),
    /// Test channel.
    TestEcho {
        /// Acknowledgment text embedding the raw event text.
        message: String,
    },
}

impl ExtractedRecord {
    /// The record's discriminator.
    pub fn kind(&self) -> SubmissionKind {
        match self {
            Self::Idea(_) => SubmissionKind::Idea,
            Self::Issue(_) => SubmissionKind::Issue,
            Self::Feedback(_) => SubmissionKind::Feedback,
            Self::TestEcho { .. } => SubmissionKind::TestEcho,
        }
    }

    /// Tracker classification. `None` means acknowledge only, never ticket.
    pub fn ticket_type(&self) -> Option<TicketType> {
        match self {
            Self::Idea(_) => Some(TicketType::Task),
            Self::Issue(_) => Some(TicketType::Bug),
            Self::Feedback(record) if record.is_negative() => Some(TicketType::Bug),
            Self::Feedback(_) | Self::TestEcho { .. } => None,
        }
    }

    /// Submitter header, absent for test echoes.
    pub fn submitter(&self) -> Option<&Submitter> {
        match self {
            Self::Idea(record) => Some(&record.submitter),
            Self::Issue(record) => Some(&record.submitter),
            Self::Feedback(record) => Some(&record.submitter),
            Self::TestEcho { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a payload did not match its channel's layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// A JSON pointer did not resolve.
    #[error("missing node at {pointer}")]
    MissingPath {
        /// The pointer that failed.
        pointer: String,
    },
    /// A node resolved but was not text.
    #[error("node at {pointer} is not text")]
    NotText {
        /// The pointer that failed.
        pointer: String,
    },
    /// A line did not start with its literal label.
    #[error("expected label {label:?}, found {found:?}")]
    MissingLabel {
        /// The expected label.
        label: String,
        /// The line as received.
        found: String,
    },
    /// A split produced fewer parts than required.
    #[error("{field}: no part at index {index}")]
    MissingSegment {
        /// Field being extracted.
        field: &'static str,
        /// Index that was absent.
        index: usize,
    },
    /// A required delimiter was absent.
    #[error("{field}: missing delimiter {delimiter:?}")]
    MissingDelimiter {
        /// Field being extracted.
        field: &'static str,
        /// The absent delimiter.
        delimiter: &'static str,
    },
    /// A value was shorter than its fixed trim.
    #[error("{field}: value of {len} chars is too short")]
    TooShort {
        /// Field being extracted.
        field: &'static str,
        /// Length in characters.
        len: usize,
    },
    /// The channel has no extraction rule.
    #[error("no extraction rule for channel {channel_id}")]
    UnrecognizedChannel {
        /// Raw channel id.
        channel_id: String,
    },
}

/// A payload that could not be turned into a record.
#[derive(Debug, Clone, thiserror::Error)]
#[error("could not extract {channel} submission: {cause}")]
pub struct ParseFailure {
    /// Channel the payload arrived on.
    pub channel: LogicalChannel,
    /// What did not match.
    pub cause: ExtractError,
    /// The raw payload, kept for diagnostics.
    pub payload: Value,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Extract a record from an events-API payload (the object holding `event`).
///
/// # Errors
///
/// Returns [`ParseFailure`] when the payload does not match the channel's
/// layout or the channel is unrecognized.
pub fn extract(channel: &LogicalChannel, payload: &Value) -> Result<ExtractedRecord, ParseFailure> {
    let result = match channel {
        LogicalChannel::Idea => idea::extract(payload).map(ExtractedRecord::Idea),
        LogicalChannel::Issue => issue::extract(payload).map(ExtractedRecord::Issue),
        LogicalChannel::Feedback => feedback::extract(payload).map(ExtractedRecord::Feedback),
        LogicalChannel::TestEcho => fields::text_at(payload, "/event/text").map(|text| {
            ExtractedRecord::TestEcho {
                message: format!("Message successfully received from bot-testing: {text}"),
            }
        }),
        LogicalChannel::Unrecognized(id) => Err(ExtractError::UnrecognizedChannel {
            channel_id: id.clone(),
        }),
    };

    result.map_err(|cause| ParseFailure {
        channel: channel.clone(),
        cause,
        payload: payload.clone(),
    })
}
