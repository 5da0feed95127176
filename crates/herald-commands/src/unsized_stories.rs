//! `jira unsized` lists a project's unestimated stories.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use herald_core::{ChatMessage, ReplyPayload};
use herald_dispatch::{DispatchContext, InterestSpec, RuleCallback, RuleDescriptor};

use crate::error_reply;
use crate::tracker::TrackerClient;

struct UnsizedStoriesReply {
    tracker: Arc<dyn TrackerClient>,
}

#[async_trait]
impl RuleCallback for UnsizedStoriesReply {
    async fn execute(
        &self,
        _ctx: &DispatchContext,
        _message: &ChatMessage,
        args: &[String],
    ) -> Result<ReplyPayload> {
        let project = args.get(2).map(String::as_str).unwrap_or_default();
        let issues = match self.tracker.search_unsized(project).await {
            Ok(issues) => issues,
            Err(error) => return Ok(error_reply("error querying issues", &error)),
        };

        if issues.is_empty() {
            return Ok(ReplyPayload::text("no issues found"));
        }

        let mut listing = String::new();
        for issue in &issues {
            let _ = writeln!(listing, "{} - {}", issue.key, issue.summary);
        }
        Ok(ReplyPayload::text(listing))
    }
}

pub fn unsized_stories_rule(tracker: Arc<dyn TrackerClient>) -> RuleDescriptor {
    let mut rule = RuleDescriptor::new(
        "jira-unsized",
        InterestSpec::token_prefix(["jira", "unsized"]),
        Arc::new(UnsizedStoriesReply { tracker }),
    );
    rule.require_mention = true;
    rule.required_args = 3;
    rule.help_markdown =
        "outputs a list of unsized stories for import in to PlanIt Poker: `jira unsized [project]`"
            .to_string();
    rule.should_match = vec!["jira unsized HERALD".to_string()];
    rule.should_not_match = vec!["jira unsize HERALD".to_string()];
    rule
}
