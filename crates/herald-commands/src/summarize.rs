//! `summary` condenses the surrounding thread with the completion model.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use herald_core::{bot_mention, ChatMessage, ReplyPayload};
use herald_dispatch::{DispatchContext, InterestSpec, RuleCallback, RuleDescriptor};

use crate::completion::CompletionClient;

const SUMMARY_PROMPT: &str = "can you summarize this thread a short paragraph?";

struct SummarizeReply {
    completion: Arc<dyn CompletionClient>,
}

#[async_trait]
impl RuleCallback for SummarizeReply {
    async fn execute(
        &self,
        ctx: &DispatchContext,
        message: &ChatMessage,
        _args: &[String],
    ) -> Result<ReplyPayload> {
        let thread_ts = match message.thread_ts.as_deref() {
            Some(thread_ts) => thread_ts,
            None => bail!("summarize only works inside a thread"),
        };

        let transcript = ctx
            .gateway
            .thread_replies(&message.channel_id, thread_ts)
            .await
            .context("fetching thread messages")?;

        // Requests aimed at the bot are chatter about the bot, not thread
        // content worth summarizing.
        let mention = bot_mention(&ctx.bot_user_id);
        let mut prompt = format!("{SUMMARY_PROMPT}\n");
        for entry in &transcript {
            if entry.text.contains(&mention) {
                continue;
            }
            prompt.push_str(&entry.text);
            prompt.push('\n');
        }

        let summary = self
            .completion
            .complete(&prompt)
            .await
            .context("unable to get summary")?;
        Ok(ReplyPayload::text(format!(
            "WIP: will summarize thread: {summary}"
        )))
    }
}

pub fn summarize_rule(completion: Arc<dyn CompletionClient>) -> Result<RuleDescriptor> {
    let interest =
        InterestSpec::pattern("summary").context("compiling summarize interest pattern")?;
    let mut rule = RuleDescriptor::new(
        "summarize-thread",
        interest,
        Arc::new(SummarizeReply { completion }),
    );
    rule.require_mention = true;
    rule.required_args = 1;
    rule.must_be_in_thread = true;
    rule.help_markdown = "summarize this thread: `summary`".to_string();
    rule.should_match = vec![
        "summary".to_string(),
        "can I get a summary of this thread?".to_string(),
    ];
    rule.should_not_match = vec!["sum it up".to_string()];
    Ok(rule)
}
