//! Inbound message model produced by the transport runtime.

/// How the message reached the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// The bot was addressed with an `app_mention` event.
    AppMention,
    /// An ordinary channel message the bot can observe.
    ChannelMessage,
    /// A message in a direct-message conversation with the bot.
    DirectMessage,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::AppMention => "app_mention",
            MessageKind::ChannelMessage => "channel_message",
            MessageKind::DirectMessage => "direct_message",
        }
    }
}

/// One inbound chat message, normalized from a transport envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub kind: MessageKind,
    /// Set when the author is a bot (including this one); dispatch drops
    /// these outright.
    pub from_bot: bool,
}

impl ChatMessage {
    /// True when the message carries thread context.
    pub fn is_in_thread(&self) -> bool {
        matches!(&self.thread_ts, Some(ts) if !ts.trim().is_empty())
    }

    pub fn is_app_mention(&self) -> bool {
        self.kind == MessageKind::AppMention
    }
}
