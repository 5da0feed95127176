//! First-match-wins scan over the registered rules.
//!
//! The dispatcher owns the gate chain for one inbound message: bot-echo
//! drop, mention gate, tokenization, knowledge channel gates, interest
//! check, allow list, thread gate, argument bounds, callback, and reply
//! routing. The first rule whose callback yields a non-empty payload ends
//! the scan; rules that decline leave the message available to later rules.

use std::sync::Arc;

use anyhow::Result;
use herald_core::{
    contains_bot_mention, is_bot_mention_token, ChatGateway, ChatMessage, ReplyPayload,
    RouteDirective,
};
use herald_match::tokenize;
use tracing::{debug, warn};

use crate::allow_list::AllowList;
use crate::descriptor::{DispatchContext, KnowledgeGates, RuleDescriptor};
use crate::registry::RuleRegistry;

/// What a dispatch cycle did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The bot's own message was dropped before any rule ran.
    BotEcho,
    /// A rule matched and its reply was routed. Scanning stopped there.
    Replied { rule: String },
    /// A matched rule's argument policy replied with usage help instead of
    /// running the callback.
    UsageReplied { rule: String },
    /// The sender failed the allow list for a matched rule. No reply is
    /// sent.
    PermissionDenied { rule: String },
    /// A matched rule's callback failed, ending work on the message.
    CallbackFailed { rule: String },
    /// No rule replied.
    NoMatch,
}

pub struct Dispatcher {
    registry: Arc<RuleRegistry>,
    gateway: Arc<dyn ChatGateway>,
    allow_list: AllowList,
    bot_user_id: String,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<RuleRegistry>,
        gateway: Arc<dyn ChatGateway>,
        allow_list: AllowList,
        bot_user_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            gateway,
            allow_list,
            bot_user_id: bot_user_id.into(),
        }
    }

    /// Runs one dispatch cycle. Faults inside the cycle are logged and
    /// folded into the outcome; they never propagate to the consumer loop.
    pub async fn handle(&self, message: &ChatMessage) -> DispatchOutcome {
        if message.from_bot || message.user_id == self.bot_user_id {
            debug!("dropping bot-authored message");
            return DispatchOutcome::BotEcho;
        }

        let mentioned =
            contains_bot_mention(&message.text, &self.bot_user_id) || message.is_app_mention();
        // Channel names resolve through the gateway at most once per message.
        let mut channel_name: Option<String> = None;

        for rule in self.registry.snapshot() {
            debug!("checking rule: {}", rule.name);
            if rule.require_mention && !mentioned {
                continue;
            }

            let mut args = tokenize(&message.text, rule.glob_quotes);
            args.retain(|token| !is_bot_mention_token(token, &self.bot_user_id));

            if let Some(gates) = &rule.knowledge {
                if !gates.watch_threads && message.is_in_thread() {
                    continue;
                }
                if !self
                    .passes_channel_gates(&rule.name, gates, message, &mut args, &mut channel_name)
                    .await
                {
                    continue;
                }
            }

            if !rule.interest_matches(&args, &message.text) {
                continue;
            }
            debug!("message matched rule: {}", rule.name);

            if rule.restrict_to_known_users && !self.allow_list.permits(&message.user_id) {
                warn!(
                    "user {} is not permitted to use rule: {}",
                    message.user_id, rule.name
                );
                return DispatchOutcome::PermissionDenied {
                    rule: rule.name.clone(),
                };
            }

            if rule.must_be_in_thread && !message.is_in_thread() {
                continue;
            }

            if args.len() < rule.required_args {
                let usage = ReplyPayload::text(format!(
                    "command requires {} arguments.\n{}\n",
                    rule.required_args, rule.help_markdown
                ));
                return self.post(rule.as_ref(), message, usage, true).await;
            }
            if let Some(max_args) = rule.max_args {
                if args.len() > max_args {
                    let usage = ReplyPayload::text(format!(
                        "command requires {} arguments. if an argument is greater than \
                         one word, be sure to wrap that argument in quotes.\n{}\n",
                        rule.required_args, rule.help_markdown
                    ));
                    return self.post(rule.as_ref(), message, usage, true).await;
                }
            }

            let context = DispatchContext {
                gateway: Arc::clone(&self.gateway),
                bot_user_id: self.bot_user_id.clone(),
            };
            let reply = match rule.callback.execute(&context, message, &args).await {
                Ok(reply) => reply,
                Err(error) => {
                    warn!("rule {} callback failed: {error:#}", rule.name);
                    return DispatchOutcome::CallbackFailed {
                        rule: rule.name.clone(),
                    };
                }
            };
            if reply.is_empty() {
                debug!("rule {} produced no reply, continuing scan", rule.name);
                continue;
            }
            return self.post(rule.as_ref(), message, reply, false).await;
        }

        DispatchOutcome::NoMatch
    }

    /// Returns false when the rule's channel gates reject the message.
    /// Appends channel-context tokens to `args` when an injection entry
    /// names the message's channel. A failed name lookup rejects the rule,
    /// not the message.
    async fn passes_channel_gates(
        &self,
        rule_name: &str,
        gates: &KnowledgeGates,
        message: &ChatMessage,
        args: &mut Vec<String>,
        channel_name: &mut Option<String>,
    ) -> bool {
        if gates.channel_context.is_empty() && gates.channel_restriction.is_empty() {
            return true;
        }
        let name = match self.channel_name(message, channel_name).await {
            Ok(name) => name,
            Err(error) => {
                warn!("channel lookup failed for rule {rule_name}: {error:#}");
                return false;
            }
        };
        for context in &gates.channel_context {
            if context.channels.iter().any(|channel| channel == &name) {
                args.extend(context.inject_tokens.iter().cloned());
            }
        }
        if !gates.channel_restriction.is_empty()
            && !gates.channel_restriction.iter().any(|channel| channel == &name)
        {
            debug!("rule {rule_name} is not watching channel {name}");
            return false;
        }
        true
    }

    async fn channel_name(
        &self,
        message: &ChatMessage,
        cached: &mut Option<String>,
    ) -> Result<String> {
        if let Some(name) = cached {
            return Ok(name.clone());
        }
        let name = self.gateway.channel_name(&message.channel_id).await?;
        *cached = Some(name.clone());
        Ok(name)
    }

    async fn post(
        &self,
        rule: &RuleDescriptor,
        message: &ChatMessage,
        reply: ReplyPayload,
        usage: bool,
    ) -> DispatchOutcome {
        let route = resolve_route(rule, message);
        if let Err(error) = self.gateway.post_reply(&route, &reply).await {
            warn!("failed to post reply for rule {}: {error:#}", rule.name);
        }
        if usage {
            DispatchOutcome::UsageReplied {
                rule: rule.name.clone(),
            }
        } else {
            DispatchOutcome::Replied {
                rule: rule.name.clone(),
            }
        }
    }
}

/// Reply routing ladder: a direct message wins, then an explicit channel
/// reply, then the default of threading under the originating message.
fn resolve_route(rule: &RuleDescriptor, message: &ChatMessage) -> RouteDirective {
    if rule.respond_in_dm {
        return RouteDirective::DirectMessage {
            user_id: message.user_id.clone(),
        };
    }
    if !rule.respond_in_channel {
        return RouteDirective::Thread {
            channel_id: message.channel_id.clone(),
            thread_ts: message.ts.clone(),
        };
    }
    // Channel replies stay inside an existing thread rather than splitting
    // the conversation.
    match message.thread_ts.as_deref().map(str::trim) {
        Some(thread_ts) if !thread_ts.is_empty() => RouteDirective::Thread {
            channel_id: message.channel_id.clone(),
            thread_ts: thread_ts.to_string(),
        },
        _ => RouteDirective::Channel {
            channel_id: message.channel_id.clone(),
        },
    }
}

#[cfg(test)]
mod tests;
