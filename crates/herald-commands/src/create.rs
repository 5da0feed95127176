//! `jira create` files a tracker issue scaffolded from a short description.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use herald_core::{ChatMessage, ReplyPayload};
use herald_dispatch::{DispatchContext, InterestSpec, RuleCallback, RuleDescriptor};
use tracing::debug;

use crate::error_reply;
use crate::tracker::{CreatedIssue, TrackerClient};

/// Issue body scaffold. The placeholder sections prompt the author to fill
/// in what a one-line chat description cannot carry.
fn scaffold_description(goal: &str, outcome: &str) -> String {
    format!(
        "*User Story:*\nAs an engineer I want {goal} so {outcome}.\n\n\
         *Description:*\n< Record any background information >\n\n\
         *Acceptance Criteria:*\n< Record how we'll know we're done >\n\n\
         *Other Information:*\n< Record anything else that may be helpful to someone else picking up the card >\n\n\
         issue created by herald"
    )
}

struct CreateIssueReply {
    tracker: Arc<dyn TrackerClient>,
    /// When set, skip the tracker call and reply with a stub issue.
    test_mode: bool,
}

#[async_trait]
impl RuleCallback for CreateIssueReply {
    async fn execute(
        &self,
        ctx: &DispatchContext,
        message: &ChatMessage,
        args: &[String],
    ) -> Result<ReplyPayload> {
        let summary = args.get(2).map(String::as_str).unwrap_or_default();
        let (goal, outcome) = if args.len() >= 4 {
            (args[2].as_str(), args[3].as_str())
        } else {
            ("___", "___")
        };

        let mut description = scaffold_description(goal, outcome);
        if let Some(thread_ts) = message.thread_ts.as_deref() {
            match ctx
                .gateway
                .message_permalink(&message.channel_id, thread_ts)
                .await
            {
                Ok(permalink) => {
                    description = format!("{description}\n\ncreated from thread: {permalink}");
                }
                Err(error) => debug!("thread permalink unavailable: {error:#}"),
            }
        }

        let issue = if self.test_mode {
            CreatedIssue {
                key: "TEST-0".to_string(),
                browse_url: "https://tracker.invalid/browse/TEST-0".to_string(),
            }
        } else {
            match self
                .tracker
                .create_issue(summary, &description, "Task")
                .await
            {
                Ok(issue) => issue,
                Err(error) => return Ok(error_reply("error creating issue", &error)),
            }
        };

        Ok(ReplyPayload::text(format!(
            "issue <{}|{}> created",
            issue.browse_url, issue.key
        )))
    }
}

pub fn create_issue_rule(tracker: Arc<dyn TrackerClient>, test_mode: bool) -> RuleDescriptor {
    let mut rule = RuleDescriptor::new(
        "jira-create",
        InterestSpec::token_prefix(["jira", "create"]),
        Arc::new(CreateIssueReply { tracker, test_mode }),
    );
    rule.require_mention = true;
    rule.required_args = 2;
    rule.max_args = Some(4);
    rule.help_markdown = "create a Jira issue: `jira create \"[description]\"`".to_string();
    rule.should_match = vec![
        "jira create \"fix the conveyor belt\"".to_string(),
        "jira create \"faster builds\" \"we stop waiting\"".to_string(),
    ];
    rule.should_not_match = vec![
        "jira created an issue for me".to_string(),
        "create jira".to_string(),
    ];
    rule
}
