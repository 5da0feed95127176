use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::bail;
use async_trait::async_trait;
use herald_core::{MessageKind, PostedMessage, ThreadMessage};
use herald_match::MatchNode;

use crate::descriptor::{ChannelContextRule, InterestSpec, RuleCallback};

const BOT_USER: &str = "U0BOT";

struct RecordingGateway {
    posts: Mutex<Vec<(RouteDirective, String)>>,
    channel: Option<String>,
    channel_lookups: AtomicUsize,
}

impl RecordingGateway {
    fn new() -> Self {
        Self::in_channel("general")
    }

    fn in_channel(name: &str) -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            channel: Some(name.to_string()),
            channel_lookups: AtomicUsize::new(0),
        }
    }

    fn without_channel_names() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            channel: None,
            channel_lookups: AtomicUsize::new(0),
        }
    }

    fn posts(&self) -> Vec<(RouteDirective, String)> {
        self.posts.lock().expect("posts lock").clone()
    }

    fn lookups(&self) -> usize {
        self.channel_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn post_reply(
        &self,
        route: &RouteDirective,
        reply: &ReplyPayload,
    ) -> Result<PostedMessage> {
        self.posts
            .lock()
            .expect("posts lock")
            .push((route.clone(), reply.rendered_text()));
        Ok(PostedMessage {
            channel_id: "C100".to_string(),
            ts: "1700000000.000500".to_string(),
        })
    }

    async fn channel_name(&self, _channel_id: &str) -> Result<String> {
        self.channel_lookups.fetch_add(1, Ordering::SeqCst);
        match &self.channel {
            Some(name) => Ok(name.clone()),
            None => bail!("channel lookup unavailable"),
        }
    }

    async fn thread_replies(
        &self,
        _channel_id: &str,
        _thread_ts: &str,
    ) -> Result<Vec<ThreadMessage>> {
        Ok(Vec::new())
    }

    async fn message_permalink(&self, _channel_id: &str, _ts: &str) -> Result<String> {
        Ok("https://chat.example.test/permalink".to_string())
    }
}

struct StaticReply(&'static str);

#[async_trait]
impl RuleCallback for StaticReply {
    async fn execute(
        &self,
        _ctx: &DispatchContext,
        _message: &ChatMessage,
        _args: &[String],
    ) -> Result<ReplyPayload> {
        Ok(ReplyPayload::text(self.0))
    }
}

struct CountingReply {
    calls: Arc<AtomicUsize>,
    reply: &'static str,
}

#[async_trait]
impl RuleCallback for CountingReply {
    async fn execute(
        &self,
        _ctx: &DispatchContext,
        _message: &ChatMessage,
        _args: &[String],
    ) -> Result<ReplyPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reply.is_empty() {
            Ok(ReplyPayload::empty())
        } else {
            Ok(ReplyPayload::text(self.reply))
        }
    }
}

struct FailingReply;

#[async_trait]
impl RuleCallback for FailingReply {
    async fn execute(
        &self,
        _ctx: &DispatchContext,
        _message: &ChatMessage,
        _args: &[String],
    ) -> Result<ReplyPayload> {
        bail!("callback exploded")
    }
}

struct CapturingReply {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RuleCallback for CapturingReply {
    async fn execute(
        &self,
        _ctx: &DispatchContext,
        _message: &ChatMessage,
        args: &[String],
    ) -> Result<ReplyPayload> {
        *self.seen.lock().expect("args lock") = args.to_vec();
        Ok(ReplyPayload::text("captured"))
    }
}

fn channel_message(text: &str) -> ChatMessage {
    ChatMessage {
        channel_id: "C100".to_string(),
        user_id: "U100".to_string(),
        text: text.to_string(),
        ts: "1700000000.000100".to_string(),
        thread_ts: None,
        kind: MessageKind::ChannelMessage,
        from_bot: false,
    }
}

fn threaded_message(text: &str) -> ChatMessage {
    ChatMessage {
        thread_ts: Some("1699999999.000001".to_string()),
        ..channel_message(text)
    }
}

fn prefix_rule(name: &str, trigger: &[&str], callback: Arc<dyn RuleCallback>) -> RuleDescriptor {
    RuleDescriptor::new(
        name,
        InterestSpec::token_prefix(trigger.iter().copied()),
        callback,
    )
}

fn token_tree(tokens: &[&str]) -> MatchNode {
    MatchNode {
        tokens: tokens.iter().map(|token| token.to_string()).collect(),
        ..MatchNode::default()
    }
}

fn knowledge_rule(
    name: &str,
    tree: MatchNode,
    gates: KnowledgeGates,
    callback: Arc<dyn RuleCallback>,
) -> RuleDescriptor {
    let mut rule = RuleDescriptor::new(name, InterestSpec::MatchTree, callback);
    rule.match_tree = Some(tree);
    rule.knowledge = Some(gates);
    rule.glob_quotes = false;
    rule.restrict_to_known_users = false;
    rule
}

fn dispatcher(rules: Vec<RuleDescriptor>, gateway: Arc<RecordingGateway>) -> Dispatcher {
    dispatcher_with_allow_list(rules, gateway, AllowList::default())
}

fn dispatcher_with_allow_list(
    rules: Vec<RuleDescriptor>,
    gateway: Arc<RecordingGateway>,
    allow_list: AllowList,
) -> Dispatcher {
    let registry = Arc::new(RuleRegistry::new());
    for rule in rules {
        registry.register(rule);
    }
    Dispatcher::new(registry, gateway, allow_list, BOT_USER)
}

#[tokio::test]
async fn functional_bot_authored_messages_are_dropped() {
    let gateway = Arc::new(RecordingGateway::new());
    let dispatch = dispatcher(
        vec![prefix_rule("echo", &["ping"], Arc::new(StaticReply("pong")))],
        gateway.clone(),
    );

    let mut message = channel_message("ping");
    message.from_bot = true;
    assert_eq!(dispatch.handle(&message).await, DispatchOutcome::BotEcho);

    let mut own = channel_message("ping");
    own.user_id = BOT_USER.to_string();
    assert_eq!(dispatch.handle(&own).await, DispatchOutcome::BotEcho);

    assert!(gateway.posts().is_empty());
}

#[tokio::test]
async fn functional_first_matching_rule_wins() {
    let gateway = Arc::new(RecordingGateway::new());
    let later_calls = Arc::new(AtomicUsize::new(0));
    let dispatch = dispatcher(
        vec![
            prefix_rule("first", &["ping"], Arc::new(StaticReply("pong one"))),
            prefix_rule(
                "second",
                &["ping"],
                Arc::new(CountingReply {
                    calls: later_calls.clone(),
                    reply: "pong two",
                }),
            ),
        ],
        gateway.clone(),
    );

    let outcome = dispatch.handle(&channel_message("ping")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Replied {
            rule: "first".to_string()
        }
    );
    assert_eq!(later_calls.load(Ordering::SeqCst), 0);

    let posts = gateway.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].1, "pong one");
}

#[tokio::test]
async fn functional_empty_reply_continues_scan() {
    let gateway = Arc::new(RecordingGateway::new());
    let declined = Arc::new(AtomicUsize::new(0));
    let dispatch = dispatcher(
        vec![
            prefix_rule(
                "quiet",
                &["ping"],
                Arc::new(CountingReply {
                    calls: declined.clone(),
                    reply: "",
                }),
            ),
            prefix_rule("loud", &["ping"], Arc::new(StaticReply("pong"))),
        ],
        gateway.clone(),
    );

    let outcome = dispatch.handle(&channel_message("ping")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Replied {
            rule: "loud".to_string()
        }
    );
    assert_eq!(declined.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.posts().len(), 1);
}

#[tokio::test]
async fn functional_callback_error_ends_the_scan() {
    let gateway = Arc::new(RecordingGateway::new());
    let later_calls = Arc::new(AtomicUsize::new(0));
    let dispatch = dispatcher(
        vec![
            prefix_rule("broken", &["ping"], Arc::new(FailingReply)),
            prefix_rule(
                "second",
                &["ping"],
                Arc::new(CountingReply {
                    calls: later_calls.clone(),
                    reply: "pong",
                }),
            ),
        ],
        gateway.clone(),
    );

    let outcome = dispatch.handle(&channel_message("ping")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::CallbackFailed {
            rule: "broken".to_string()
        }
    );
    assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    assert!(gateway.posts().is_empty());
}

#[tokio::test]
async fn functional_mention_gate_accepts_mention_text_or_app_mention() {
    let gateway = Arc::new(RecordingGateway::new());
    let mut rule = prefix_rule("helper", &["help"], Arc::new(StaticReply("hi")));
    rule.require_mention = true;
    let dispatch = dispatcher(vec![rule], gateway.clone());

    assert_eq!(
        dispatch.handle(&channel_message("help")).await,
        DispatchOutcome::NoMatch
    );

    assert_eq!(
        dispatch.handle(&channel_message("<@U0BOT> help")).await,
        DispatchOutcome::Replied {
            rule: "helper".to_string()
        }
    );

    let mut app_mention = channel_message("help");
    app_mention.kind = MessageKind::AppMention;
    assert_eq!(
        dispatch.handle(&app_mention).await,
        DispatchOutcome::Replied {
            rule: "helper".to_string()
        }
    );
}

#[tokio::test]
async fn functional_mention_tokens_are_stripped_from_arguments() {
    let gateway = Arc::new(RecordingGateway::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let dispatch = dispatcher(
        vec![prefix_rule(
            "create",
            &["jira", "create"],
            Arc::new(CapturingReply { seen: seen.clone() }),
        )],
        gateway,
    );

    let outcome = dispatch
        .handle(&channel_message("<@U0BOT> jira create widget"))
        .await;
    assert_eq!(
        outcome,
        DispatchOutcome::Replied {
            rule: "create".to_string()
        }
    );
    assert_eq!(
        *seen.lock().expect("args lock"),
        vec![
            "jira".to_string(),
            "create".to_string(),
            "widget".to_string()
        ]
    );
}

#[tokio::test]
async fn functional_allow_list_blocks_unlisted_sender() {
    let gateway = Arc::new(RecordingGateway::new());
    let dispatch = dispatcher_with_allow_list(
        vec![prefix_rule("guarded", &["ping"], Arc::new(StaticReply("pong")))],
        gateway.clone(),
        AllowList::from_csv("U900"),
    );

    let outcome = dispatch.handle(&channel_message("ping")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::PermissionDenied {
            rule: "guarded".to_string()
        }
    );
    assert!(gateway.posts().is_empty());
}

#[tokio::test]
async fn functional_allow_list_exempt_rule_still_replies() {
    let gateway = Arc::new(RecordingGateway::new());
    let mut rule = prefix_rule("open", &["ping"], Arc::new(StaticReply("pong")));
    rule.restrict_to_known_users = false;
    let dispatch =
        dispatcher_with_allow_list(vec![rule], gateway.clone(), AllowList::from_csv("U900"));

    let outcome = dispatch.handle(&channel_message("ping")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Replied {
            rule: "open".to_string()
        }
    );
    assert_eq!(gateway.posts().len(), 1);
}

#[tokio::test]
async fn functional_required_args_sends_usage_help() {
    let gateway = Arc::new(RecordingGateway::new());
    let mut rule = prefix_rule("create", &["jira", "create"], Arc::new(StaticReply("made")));
    rule.required_args = 3;
    rule.help_markdown = "create an issue: `jira create \"[description]\"`".to_string();
    let dispatch = dispatcher(vec![rule], gateway.clone());

    let outcome = dispatch.handle(&channel_message("jira create")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::UsageReplied {
            rule: "create".to_string()
        }
    );

    let posts = gateway.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(
        posts[0].1,
        "command requires 3 arguments.\ncreate an issue: `jira create \"[description]\"`\n"
    );
}

#[tokio::test]
async fn functional_max_args_sends_quoting_hint() {
    let gateway = Arc::new(RecordingGateway::new());
    let mut rule = prefix_rule("create", &["jira", "create"], Arc::new(StaticReply("made")));
    rule.required_args = 3;
    rule.max_args = Some(4);
    let dispatch = dispatcher(vec![rule], gateway.clone());

    let outcome = dispatch
        .handle(&channel_message("jira create fix the belts"))
        .await;
    assert_eq!(
        outcome,
        DispatchOutcome::UsageReplied {
            rule: "create".to_string()
        }
    );

    let posts = gateway.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.contains("wrap that argument in quotes"));
}

#[tokio::test]
async fn functional_quoted_arguments_collapse_for_bounds() {
    let gateway = Arc::new(RecordingGateway::new());
    let mut rule = prefix_rule("create", &["jira", "create"], Arc::new(StaticReply("made")));
    rule.required_args = 3;
    rule.max_args = Some(3);
    let dispatch = dispatcher(vec![rule], gateway.clone());

    let outcome = dispatch
        .handle(&channel_message("jira create \"fix the belts\""))
        .await;
    assert_eq!(
        outcome,
        DispatchOutcome::Replied {
            rule: "create".to_string()
        }
    );
}

#[tokio::test]
async fn functional_thread_gate_skips_unthreaded_messages() {
    let gateway = Arc::new(RecordingGateway::new());
    let mut rule = prefix_rule("summarize", &["summary"], Arc::new(StaticReply("done")));
    rule.must_be_in_thread = true;
    let dispatch = dispatcher(vec![rule], gateway.clone());

    assert_eq!(
        dispatch.handle(&channel_message("summary")).await,
        DispatchOutcome::NoMatch
    );
    assert_eq!(
        dispatch.handle(&threaded_message("summary")).await,
        DispatchOutcome::Replied {
            rule: "summarize".to_string()
        }
    );
}

#[tokio::test]
async fn regression_short_message_never_matches_longer_prefix() {
    let gateway = Arc::new(RecordingGateway::new());
    let dispatch = dispatcher(
        vec![prefix_rule(
            "create",
            &["jira", "create"],
            Arc::new(StaticReply("made")),
        )],
        gateway.clone(),
    );

    assert_eq!(
        dispatch.handle(&channel_message("jira")).await,
        DispatchOutcome::NoMatch
    );
    assert!(gateway.posts().is_empty());
}

#[tokio::test]
async fn functional_usage_reply_routes_like_the_rule() {
    let gateway = Arc::new(RecordingGateway::new());
    let mut rule = prefix_rule("task", &["task"], Arc::new(StaticReply("made")));
    rule.required_args = 2;
    rule.respond_in_dm = true;
    let dispatch = dispatcher(vec![rule], gateway.clone());

    let outcome = dispatch.handle(&channel_message("task")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::UsageReplied {
            rule: "task".to_string()
        }
    );

    let posts = gateway.posts();
    assert_eq!(
        posts[0].0,
        RouteDirective::DirectMessage {
            user_id: "U100".to_string()
        }
    );
}

#[tokio::test]
async fn functional_knowledge_rules_skip_threads_by_default() {
    let gateway = Arc::new(RecordingGateway::new());
    let dispatch = dispatcher(
        vec![knowledge_rule(
            "deploys",
            token_tree(&["deploy"]),
            KnowledgeGates::default(),
            Arc::new(StaticReply("deploy docs")),
        )],
        gateway.clone(),
    );

    assert_eq!(
        dispatch.handle(&threaded_message("deploy")).await,
        DispatchOutcome::NoMatch
    );
    assert_eq!(
        dispatch.handle(&channel_message("deploy")).await,
        DispatchOutcome::Replied {
            rule: "deploys".to_string()
        }
    );
}

#[tokio::test]
async fn functional_channel_restriction_matches_resolved_name() {
    let gates = KnowledgeGates {
        channel_restriction: vec!["ops".to_string()],
        ..KnowledgeGates::default()
    };

    let in_ops = Arc::new(RecordingGateway::in_channel("ops"));
    let dispatch = dispatcher(
        vec![knowledge_rule(
            "deploys",
            token_tree(&["deploy"]),
            gates.clone(),
            Arc::new(StaticReply("deploy docs")),
        )],
        in_ops.clone(),
    );
    assert_eq!(
        dispatch.handle(&channel_message("deploy")).await,
        DispatchOutcome::Replied {
            rule: "deploys".to_string()
        }
    );

    let elsewhere = Arc::new(RecordingGateway::in_channel("random"));
    let dispatch = dispatcher(
        vec![knowledge_rule(
            "deploys",
            token_tree(&["deploy"]),
            gates,
            Arc::new(StaticReply("deploy docs")),
        )],
        elsewhere.clone(),
    );
    assert_eq!(
        dispatch.handle(&channel_message("deploy")).await,
        DispatchOutcome::NoMatch
    );
    assert!(elsewhere.posts().is_empty());
}

#[tokio::test]
async fn functional_channel_context_injects_tokens() {
    let gates = KnowledgeGates {
        channel_context: vec![ChannelContextRule {
            channels: vec!["platform-ops".to_string()],
            inject_tokens: vec!["platform".to_string()],
        }],
        ..KnowledgeGates::default()
    };

    let in_context = Arc::new(RecordingGateway::in_channel("platform-ops"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let dispatch = dispatcher(
        vec![knowledge_rule(
            "platform-deploys",
            token_tree(&["deploy", "platform"]),
            gates.clone(),
            Arc::new(CapturingReply { seen: seen.clone() }),
        )],
        in_context,
    );
    assert_eq!(
        dispatch.handle(&channel_message("deploy now")).await,
        DispatchOutcome::Replied {
            rule: "platform-deploys".to_string()
        }
    );
    assert!(seen
        .lock()
        .expect("args lock")
        .contains(&"platform".to_string()));

    let outside = Arc::new(RecordingGateway::in_channel("random"));
    let dispatch = dispatcher(
        vec![knowledge_rule(
            "platform-deploys",
            token_tree(&["deploy", "platform"]),
            gates,
            Arc::new(StaticReply("docs")),
        )],
        outside,
    );
    assert_eq!(
        dispatch.handle(&channel_message("deploy now")).await,
        DispatchOutcome::NoMatch
    );
}

#[tokio::test]
async fn functional_channel_name_resolves_once_per_cycle() {
    let gateway = Arc::new(RecordingGateway::in_channel("general"));
    let restricted = |name: &str, channel: &str| {
        knowledge_rule(
            name,
            token_tree(&["deploy"]),
            KnowledgeGates {
                channel_restriction: vec![channel.to_string()],
                ..KnowledgeGates::default()
            },
            Arc::new(StaticReply("docs")),
        )
    };
    let dispatch = dispatcher(
        vec![restricted("first", "ops-a"), restricted("second", "ops-b")],
        gateway.clone(),
    );

    assert_eq!(
        dispatch.handle(&channel_message("deploy")).await,
        DispatchOutcome::NoMatch
    );
    assert_eq!(gateway.lookups(), 1);
}

#[tokio::test]
async fn functional_channel_lookup_failure_skips_rule_only() {
    let gateway = Arc::new(RecordingGateway::without_channel_names());
    let dispatch = dispatcher(
        vec![
            knowledge_rule(
                "gated",
                token_tree(&["deploy"]),
                KnowledgeGates {
                    channel_restriction: vec!["ops".to_string()],
                    ..KnowledgeGates::default()
                },
                Arc::new(StaticReply("docs")),
            ),
            prefix_rule("fallback", &["deploy"], Arc::new(StaticReply("manual"))),
        ],
        gateway.clone(),
    );

    let outcome = dispatch.handle(&channel_message("deploy")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Replied {
            rule: "fallback".to_string()
        }
    );
    assert_eq!(gateway.posts().len(), 1);
}

#[test]
fn unit_route_prefers_direct_message() {
    let mut rule = prefix_rule("dm", &["ping"], Arc::new(StaticReply("pong")));
    rule.respond_in_dm = true;
    rule.respond_in_channel = true;
    let route = resolve_route(&rule, &threaded_message("ping"));
    assert_eq!(
        route,
        RouteDirective::DirectMessage {
            user_id: "U100".to_string()
        }
    );
}

#[test]
fn unit_route_defaults_to_thread_under_message() {
    let rule = prefix_rule("plain", &["ping"], Arc::new(StaticReply("pong")));
    let route = resolve_route(&rule, &channel_message("ping"));
    assert_eq!(
        route,
        RouteDirective::Thread {
            channel_id: "C100".to_string(),
            thread_ts: "1700000000.000100".to_string(),
        }
    );
}

#[test]
fn unit_route_channel_reply_keeps_existing_thread() {
    let mut rule = prefix_rule("channel", &["ping"], Arc::new(StaticReply("pong")));
    rule.respond_in_channel = true;
    let route = resolve_route(&rule, &threaded_message("ping"));
    assert_eq!(
        route,
        RouteDirective::Thread {
            channel_id: "C100".to_string(),
            thread_ts: "1699999999.000001".to_string(),
        }
    );
}

#[test]
fn unit_route_channel_reply_posts_plain_without_thread() {
    let mut rule = prefix_rule("channel", &["ping"], Arc::new(StaticReply("pong")));
    rule.respond_in_channel = true;
    let route = resolve_route(&rule, &channel_message("ping"));
    assert_eq!(
        route,
        RouteDirective::Channel {
            channel_id: "C100".to_string()
        }
    );
}
