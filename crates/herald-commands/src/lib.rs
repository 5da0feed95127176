//! Built-in command rules and the external clients they call.
//!
//! Each module contributes one rule descriptor; [`register_builtin_rules`]
//! registers them in their fixed scan order. Tracker and completion access
//! go through traits so tests can script them.

pub mod completion;
pub mod create;
pub mod help;
pub mod summarize;
pub mod tracker;
pub mod unsized_stories;

use std::sync::Arc;

use anyhow::Result;
use herald_core::ReplyPayload;
use herald_dispatch::RuleRegistry;

pub use completion::{CompletionClient, OllamaClient};
pub use tracker::{CreatedIssue, HttpTrackerClient, IssueSummary, TrackerClient, TrackerConfig};

/// An external-service failure rendered as a user-visible reply rather than
/// a callback fault, so the sender learns the command ran and failed.
pub(crate) fn error_reply(context: &str, error: &anyhow::Error) -> ReplyPayload {
    ReplyPayload::text(format!("{context}: {error:#}"))
}

/// Registers every built-in command. Call before loading knowledge rules so
/// commands win ties in scan order.
pub fn register_builtin_rules(
    registry: &Arc<RuleRegistry>,
    tracker: Arc<dyn TrackerClient>,
    completion: Arc<dyn CompletionClient>,
    tracker_test_mode: bool,
) -> Result<()> {
    registry.register(help::help_rule(Arc::clone(registry)));
    registry.register(create::create_issue_rule(
        Arc::clone(&tracker),
        tracker_test_mode,
    ));
    registry.register(unsized_stories::unsized_stories_rule(tracker));
    registry.register(summarize::summarize_rule(completion)?);
    Ok(())
}
