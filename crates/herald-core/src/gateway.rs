//! Transport gateway trait consumed by dispatch and rule callbacks.

use anyhow::Result;
use async_trait::async_trait;

use crate::reply::{ReplyPayload, RouteDirective};

/// A message successfully posted by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel_id: String,
    pub ts: String,
}

/// One message of a thread transcript, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMessage {
    pub user_id: String,
    pub text: String,
}

/// The chat-platform operations Herald's core needs. The Slack runtime
/// provides the production implementation; tests substitute doubles.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Posts `reply` where `route` directs, opening a direct-message
    /// conversation first when the route asks for one.
    async fn post_reply(
        &self,
        route: &RouteDirective,
        reply: &ReplyPayload,
    ) -> Result<PostedMessage>;

    /// Resolves a channel ID to its display name.
    async fn channel_name(&self, channel_id: &str) -> Result<String>;

    /// Fetches the transcript of a thread.
    async fn thread_replies(&self, channel_id: &str, thread_ts: &str)
        -> Result<Vec<ThreadMessage>>;

    /// Permalink for a message, used when filed issues reference the thread
    /// they came from.
    async fn message_permalink(&self, channel_id: &str, ts: &str) -> Result<String>;
}
