//! Chat gateway backed by the Slack Web API client.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use herald_core::{
    ChatGateway, MessageFragment, PostedMessage, ReplyPayload, RouteDirective, ThreadMessage,
};
use serde_json::{json, Value};

use super::web_api::SlackWebApi;

pub(super) struct SlackGateway {
    client: SlackWebApi,
    /// Channel names resolve through the API once per process.
    channel_names: Mutex<HashMap<String, String>>,
}

impl SlackGateway {
    pub(super) fn new(client: SlackWebApi) -> Self {
        Self {
            client,
            channel_names: Mutex::new(HashMap::new()),
        }
    }
}

/// Section blocks for payloads that carry markdown fragments; plain text
/// payloads post without blocks.
fn render_blocks(reply: &ReplyPayload) -> Option<Vec<Value>> {
    let has_block = reply
        .fragments
        .iter()
        .any(|fragment| matches!(fragment, MessageFragment::MarkdownBlock(_)));
    if !has_block {
        return None;
    }
    let blocks = reply
        .fragments
        .iter()
        .map(|fragment| {
            let text = match fragment {
                MessageFragment::Text(text) => text,
                MessageFragment::MarkdownBlock(text) => text,
            };
            json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": text },
            })
        })
        .collect();
    Some(blocks)
}

#[async_trait]
impl ChatGateway for SlackGateway {
    async fn post_reply(
        &self,
        route: &RouteDirective,
        reply: &ReplyPayload,
    ) -> Result<PostedMessage> {
        let text = reply.rendered_text();
        let blocks = render_blocks(reply);
        let (channel, thread_ts) = match route {
            RouteDirective::DirectMessage { user_id } => {
                (self.client.open_direct_channel(user_id).await?, None)
            }
            RouteDirective::Thread {
                channel_id,
                thread_ts,
            } => (channel_id.clone(), Some(thread_ts.as_str())),
            RouteDirective::Channel { channel_id } => (channel_id.clone(), None),
        };
        let posted = self
            .client
            .post_chat_message(&channel, &text, blocks.as_deref(), thread_ts)
            .await?;
        Ok(PostedMessage {
            channel_id: posted.channel,
            ts: posted.ts,
        })
    }

    async fn channel_name(&self, channel_id: &str) -> Result<String> {
        {
            let cache = self
                .channel_names
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(name) = cache.get(channel_id) {
                return Ok(name.clone());
            }
        }
        let name = self.client.channel_info_name(channel_id).await?;
        self.channel_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel_id.to_string(), name.clone());
        Ok(name)
    }

    async fn thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
    ) -> Result<Vec<ThreadMessage>> {
        let entries = self.client.thread_replies(channel_id, thread_ts).await?;
        Ok(entries
            .into_iter()
            .map(|entry| ThreadMessage {
                user_id: entry.user.unwrap_or_default(),
                text: entry.text.unwrap_or_default(),
            })
            .collect())
    }

    async fn message_permalink(&self, channel_id: &str, ts: &str) -> Result<String> {
        self.client.message_permalink(channel_id, ts).await
    }
}
