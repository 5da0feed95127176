//! Outbound reply payloads and their routing directives.

/// One piece of an outbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageFragment {
    /// Plain message text.
    Text(String),
    /// Markdown rendered as its own section block so links stay clickable.
    MarkdownBlock(String),
}

/// Ordered reply fragments produced by a rule callback.
///
/// An empty payload means the rule declined to answer; dispatch moves on to
/// the next candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyPayload {
    pub fragments: Vec<MessageFragment>,
}

impl ReplyPayload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![MessageFragment::Text(text.into())],
        }
    }

    /// A markdown body followed by one block per URL.
    pub fn markdown_with_links(body: impl Into<String>, urls: &[String]) -> Self {
        let mut fragments = vec![MessageFragment::MarkdownBlock(body.into())];
        for url in urls {
            fragments.push(MessageFragment::MarkdownBlock(format!("<{url}>")));
        }
        Self { fragments }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Flattened text of every fragment, used for logs and tests.
    pub fn rendered_text(&self) -> String {
        self.fragments
            .iter()
            .map(|fragment| match fragment {
                MessageFragment::Text(text) => text.as_str(),
                MessageFragment::MarkdownBlock(text) => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Where the transport should post a reply. Resolved by the dispatcher from
/// the matched rule's routing flags; exactly one directive applies per
/// dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDirective {
    /// Open or reuse a direct-message conversation with the sender.
    DirectMessage { user_id: String },
    /// Post in the channel anchored under `thread_ts`.
    Thread { channel_id: String, thread_ts: String },
    /// Post in the channel with no thread anchor.
    Channel { channel_id: String },
}
