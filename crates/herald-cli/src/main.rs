//! The `herald` binary: argument parsing, tracing bootstrap, rule
//! registration, and the Slack runtime loop.

mod cli_args;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use herald_commands::{
    register_builtin_rules, CompletionClient, HttpTrackerClient, OllamaClient, TrackerClient,
    TrackerConfig,
};
use herald_dispatch::{AllowList, RuleRegistry};
use herald_knowledge::register_knowledge_rules;
use herald_slack_runtime::{run_slack_runtime, SlackRuntimeConfig};

use crate::cli_args::Cli;

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let registry = Arc::new(RuleRegistry::new());

    let tracker: Arc<dyn TrackerClient> = Arc::new(HttpTrackerClient::new(TrackerConfig {
        base_url: cli.tracker_base_url,
        token: cli.tracker_token,
        project_key: cli.tracker_project,
    }));
    let completion: Arc<dyn CompletionClient> = Arc::new(OllamaClient::new(
        cli.completion_endpoint,
        cli.completion_model,
    ));
    register_builtin_rules(&registry, tracker, completion, cli.tracker_test_mode)?;

    // Knowledge ingestion failures degrade to a commands-only bot rather
    // than aborting startup.
    match register_knowledge_rules(&cli.knowledge_dir, &registry) {
        Ok(count) => info!(
            "loaded {count} knowledge rules from {}",
            cli.knowledge_dir.display()
        ),
        Err(error) => warn!("knowledge rules unavailable, serving commands only: {error:#}"),
    }
    info!("{} rules registered", registry.len());

    run_slack_runtime(SlackRuntimeConfig {
        registry,
        allow_list: AllowList::from_csv(&cli.allowed_users),
        api_base: cli.slack_api_base,
        app_token: cli.slack_app_token,
        bot_token: cli.slack_bot_token,
        bot_user_id: cli.slack_bot_user_id,
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts.max(1),
        retry_base_delay_ms: cli.retry_base_delay_ms.max(1),
        reconnect_delay: Duration::from_millis(cli.reconnect_delay_ms.max(1)),
        max_event_age_seconds: cli.max_event_age_seconds,
    })
    .await
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli).await
}
