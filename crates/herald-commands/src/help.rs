//! `help` lists every registered rule that carries help text.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use herald_core::{ChatMessage, ReplyPayload};
use herald_dispatch::{DispatchContext, InterestSpec, RuleCallback, RuleDescriptor, RuleRegistry};

struct HelpReply {
    registry: Arc<RuleRegistry>,
}

#[async_trait]
impl RuleCallback for HelpReply {
    async fn execute(
        &self,
        _ctx: &DispatchContext,
        _message: &ChatMessage,
        _args: &[String],
    ) -> Result<ReplyPayload> {
        let mut lines = vec!["These are the commands I understand:".to_string()];
        for rule in self.registry.snapshot() {
            if !rule.help_markdown.is_empty() {
                lines.push(format!("- {}", rule.help_markdown));
            }
        }
        Ok(ReplyPayload::text(lines.join("\n")))
    }
}

pub fn help_rule(registry: Arc<RuleRegistry>) -> RuleDescriptor {
    let mut rule = RuleDescriptor::new(
        "help",
        InterestSpec::token_prefix(["help"]),
        Arc::new(HelpReply { registry }),
    );
    rule.require_mention = true;
    rule.required_args = 1;
    rule.max_args = Some(1);
    rule.help_markdown = "show the commands I understand: `help`".to_string();
    rule.should_match = vec!["help".to_string()];
    rule.should_not_match = vec!["helper".to_string()];
    rule
}
