//! YAML knowledge-asset model and its rule-descriptor form.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use herald_core::{ChatMessage, ReplyPayload};
use herald_dispatch::{
    ChannelContextRule, DispatchContext, InterestSpec, KnowledgeGates, RuleCallback,
    RuleDescriptor,
};
use herald_match::MatchNode;
use serde::Deserialize;

use crate::platforms::path_context_tokens;

const TOPIC_PREAMBLE: &str = "This may be a topic that I can help with.";

/// One knowledge rule file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KnowledgeAsset {
    pub name: String,
    /// Condition tree the normalized message tokens must satisfy.
    pub on: MatchNode,
    pub markdown_prompt: String,
    pub urls: Vec<String>,
    /// Channels whose name implies extra context tokens for this rule.
    pub channel_context: Option<ChannelContext>,
    /// When non-empty, only these channel names can trigger the rule.
    pub require_in_channel: Vec<String>,
    /// Consider messages inside threads as well.
    pub watch_threads: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelContext {
    pub channels: Vec<String>,
    /// Platform-catalog path, resolved to injected tokens at ingestion.
    pub context_path: String,
}

struct KnowledgeReply {
    prompt: String,
    urls: Vec<String>,
}

#[async_trait]
impl RuleCallback for KnowledgeReply {
    async fn execute(
        &self,
        _ctx: &DispatchContext,
        _message: &ChatMessage,
        _args: &[String],
    ) -> Result<ReplyPayload> {
        let text = format!("{TOPIC_PREAMBLE}\n\n{}", self.prompt);
        if self.urls.is_empty() {
            Ok(ReplyPayload::text(text))
        } else {
            Ok(ReplyPayload::markdown_with_links(text, &self.urls))
        }
    }
}

/// Builds the dispatcher descriptor for a loaded asset: match-tree interest,
/// quote globbing disabled, mention not required, allow list waived, and the
/// knowledge gates carried over from the asset.
pub fn knowledge_rule(asset: KnowledgeAsset) -> RuleDescriptor {
    let callback = Arc::new(KnowledgeReply {
        prompt: asset.markdown_prompt,
        urls: asset.urls,
    });
    let mut rule = RuleDescriptor::new(asset.name, InterestSpec::MatchTree, callback);
    rule.match_tree = Some(asset.on);
    rule.glob_quotes = false;
    rule.restrict_to_known_users = false;
    rule.knowledge = Some(KnowledgeGates {
        watch_threads: asset.watch_threads,
        channel_restriction: asset.require_in_channel,
        channel_context: asset
            .channel_context
            .map(|context| ChannelContextRule {
                channels: context.channels,
                inject_tokens: path_context_tokens(&context.context_path),
            })
            .into_iter()
            .collect(),
    });
    rule
}
