//! Slack socket-mode transport for Herald.
//!
//! Connects to Slack, normalizes inbound envelopes into the chat message
//! model, and feeds them through the rule dispatcher. The Web API client
//! behind the gateway handles posting, channel lookups, thread transcripts,
//! and permalinks.

mod slack_runtime;

pub use slack_runtime::{run_slack_runtime, SlackRuntimeConfig};
