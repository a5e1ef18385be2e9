//! Formrelay: a Slack form-submission bridge.
//!
//! Listens to Slack over Socket Mode, extracts fields from form posts in a
//! fixed set of channels, and routes them to Jira, Gmail or Google Sheets.
//! Each event is acknowledged before it is parsed; the outcome is posted
//! back into the originating thread.
//!
//! See `DESIGN.md` for the module layout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;

pub mod extractor;
pub mod ticket;

pub mod gateway;
pub mod slack;

pub mod pipeline;
pub mod router;
