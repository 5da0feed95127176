//! Rule descriptors: what a rule wants, how it gates, and how it replies.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use herald_core::{is_bot_mention_token, ChatGateway, ChatMessage, ReplyPayload};
use herald_match::{evaluate_match_tree, render_match_trace, tokenize, MatchNode, TokenSet};
use regex::Regex;
use tracing::debug;

/// How a rule announces which messages it wants.
#[derive(Debug, Clone)]
pub enum InterestSpec {
    /// The leading message tokens must equal these trigger tokens, position
    /// by position. A message with fewer tokens than the trigger never
    /// matches.
    TokenPrefix { tokens: Vec<String> },
    /// The raw message text matches this pattern.
    Pattern { pattern: Regex },
    /// The rule's match tree decides after token normalization.
    MatchTree,
}

impl InterestSpec {
    pub fn token_prefix<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::TokenPrefix {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Pattern {
            pattern: Regex::new(pattern)?,
        })
    }
}

pub(crate) fn matches_token_prefix(trigger: &[String], args: &[String]) -> bool {
    if args.len() < trigger.len() {
        return false;
    }
    trigger.iter().zip(args).all(|(want, got)| want == got)
}

/// Channel-scoped token injection. When the message's channel name appears
/// in `channels`, `inject_tokens` join the normalized token list before the
/// match tree runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelContextRule {
    pub channels: Vec<String>,
    pub inject_tokens: Vec<String>,
}

/// Gates applied to knowledge rules ahead of interest evaluation. Channel
/// fields hold channel names, not channel IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeGates {
    /// Consider messages inside threads. Off by default for knowledge rules.
    pub watch_threads: bool,
    /// When non-empty, only these channels can trigger the rule.
    pub channel_restriction: Vec<String>,
    pub channel_context: Vec<ChannelContextRule>,
}

/// What a rule callback can reach while producing a reply.
#[derive(Clone)]
pub struct DispatchContext {
    pub gateway: Arc<dyn ChatGateway>,
    pub bot_user_id: String,
}

/// Reply producer for a matched rule. An `Ok` payload with no fragments
/// means the rule declined the message and scanning continues.
#[async_trait]
pub trait RuleCallback: Send + Sync {
    async fn execute(
        &self,
        ctx: &DispatchContext,
        message: &ChatMessage,
        args: &[String],
    ) -> Result<ReplyPayload>;
}

/// A registered rule: interest predicate, gate policy, and reply callback.
/// Commands and knowledge assets share this shape.
#[derive(Clone)]
pub struct RuleDescriptor {
    pub name: String,
    pub interest: InterestSpec,
    /// Token condition evaluated when `interest` is [`InterestSpec::MatchTree`].
    pub match_tree: Option<MatchNode>,
    /// Only consider messages that mention the bot or arrive as app mentions.
    pub require_mention: bool,
    /// Minimum token count, counting the trigger tokens themselves.
    pub required_args: usize,
    /// Upper token bound. `None` leaves the count unbounded.
    pub max_args: Option<usize>,
    /// Honor double quotes while tokenizing, so a quoted run is one token.
    pub glob_quotes: bool,
    /// Enforce the allow list for this rule.
    pub restrict_to_known_users: bool,
    /// Skip messages that are not thread replies.
    pub must_be_in_thread: bool,
    /// Route the reply to a direct message with the sender.
    pub respond_in_dm: bool,
    /// Route the reply to the channel rather than a thread under the message.
    pub respond_in_channel: bool,
    /// Present on knowledge rules only.
    pub knowledge: Option<KnowledgeGates>,
    pub help_markdown: String,
    /// Sample texts the interest predicate must accept. Exercised by tests.
    pub should_match: Vec<String>,
    /// Sample texts the interest predicate must reject. Exercised by tests.
    pub should_not_match: Vec<String>,
    pub callback: Arc<dyn RuleCallback>,
}

impl RuleDescriptor {
    /// A descriptor with the default gate policy: mention not required, no
    /// argument bounds, quotes honored, allow list enforced.
    pub fn new(
        name: impl Into<String>,
        interest: InterestSpec,
        callback: Arc<dyn RuleCallback>,
    ) -> Self {
        Self {
            name: name.into(),
            interest,
            match_tree: None,
            require_mention: false,
            required_args: 0,
            max_args: None,
            glob_quotes: true,
            restrict_to_known_users: true,
            must_be_in_thread: false,
            respond_in_dm: false,
            respond_in_channel: false,
            knowledge: None,
            help_markdown: String::new(),
            should_match: Vec::new(),
            should_not_match: Vec::new(),
            callback,
        }
    }

    /// True when the interest predicate accepts these tokens. `raw_text` is
    /// the untokenized message, consulted by pattern rules.
    pub fn interest_matches(&self, args: &[String], raw_text: &str) -> bool {
        match &self.interest {
            InterestSpec::TokenPrefix { tokens } => matches_token_prefix(tokens, args),
            InterestSpec::Pattern { pattern } => pattern.is_match(raw_text),
            InterestSpec::MatchTree => match &self.match_tree {
                Some(tree) => {
                    let trace = evaluate_match_tree(tree, &TokenSet::from_tokens(args));
                    if trace.satisfied {
                        debug!(
                            "rule {} match trace:\n{}",
                            self.name,
                            render_match_trace(&trace).join("\n")
                        );
                    }
                    trace.satisfied
                }
                None => false,
            },
        }
    }

    /// Mirrors the dispatcher's candidate test for a bare message text,
    /// without the surrounding gate chain. Used to exercise the sample
    /// texts rules carry in `should_match` and `should_not_match`.
    pub fn is_interested_in_text(&self, text: &str, bot_user_id: &str) -> bool {
        let mut args = tokenize(text, self.glob_quotes);
        args.retain(|token| !is_bot_mention_token(token, bot_user_id));
        self.interest_matches(&args, text)
    }
}

impl fmt::Debug for RuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleDescriptor")
            .field("name", &self.name)
            .field("interest", &self.interest)
            .finish_non_exhaustive()
    }
}
