use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{ArgAction, Parser};

/// Value parser for flags where zero would stall a retry or poll loop.
fn positive<T>(value: &str) -> Result<T, String>
where
    T: FromStr<Err = ParseIntError> + Default + PartialEq,
{
    match value.parse::<T>() {
        Ok(parsed) if parsed != T::default() => Ok(parsed),
        Ok(_) => Err("expected a value of at least 1".to_string()),
        Err(error) => Err(format!("not a whole number: {error}")),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "herald",
    about = "Slack knowledge bot with first-match-wins command dispatch",
    version
)]
pub struct Cli {
    #[arg(
        long = "slack-app-token",
        env = "HERALD_SLACK_APP_TOKEN",
        hide_env_values = true,
        help = "Slack Socket Mode app token (xapp-...)"
    )]
    pub slack_app_token: String,

    #[arg(
        long = "slack-bot-token",
        env = "HERALD_SLACK_BOT_TOKEN",
        hide_env_values = true,
        help = "Slack bot token for Web API calls (xoxb-...)"
    )]
    pub slack_bot_token: String,

    #[arg(
        long = "slack-bot-user-id",
        env = "HERALD_SLACK_BOT_USER_ID",
        help = "Bot user id used to detect mentions; resolved through auth.test when omitted"
    )]
    pub slack_bot_user_id: Option<String>,

    #[arg(
        long = "slack-api-base",
        env = "HERALD_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Slack Web API base URL"
    )]
    pub slack_api_base: String,

    #[arg(
        long = "knowledge-dir",
        env = "HERALD_KNOWLEDGE_DIR",
        default_value = "/usr/src/app/knowledge_prompts",
        help = "Directory scanned recursively for knowledge rule YAML files"
    )]
    pub knowledge_dir: PathBuf,

    #[arg(
        long = "allowed-users",
        env = "HERALD_ALLOWED_USERS",
        default_value = "",
        help = "Comma-delimited user ids permitted to run restricted commands (empty permits everyone)"
    )]
    pub allowed_users: String,

    #[arg(
        long = "tracker-base-url",
        env = "HERALD_TRACKER_BASE_URL",
        default_value = "",
        help = "Issue tracker REST base URL"
    )]
    pub tracker_base_url: String,

    #[arg(
        long = "tracker-token",
        env = "HERALD_TRACKER_TOKEN",
        hide_env_values = true,
        default_value = "",
        help = "Issue tracker API token"
    )]
    pub tracker_token: String,

    #[arg(
        long = "tracker-project",
        env = "HERALD_TRACKER_PROJECT",
        default_value = "",
        help = "Project key new issues are created under"
    )]
    pub tracker_project: String,

    #[arg(
        long = "tracker-test-mode",
        env = "HERALD_TRACKER_TEST_MODE",
        action = ArgAction::Set,
        default_value_t = false,
        default_missing_value = "true",
        num_args = 0..=1,
        require_equals = true,
        help = "Skip tracker writes and reply with a stub issue link"
    )]
    pub tracker_test_mode: bool,

    #[arg(
        long = "completion-endpoint",
        env = "HERALD_COMPLETION_ENDPOINT",
        default_value = "http://localhost:11434",
        help = "Ollama-compatible endpoint used for thread summaries"
    )]
    pub completion_endpoint: String,

    #[arg(
        long = "completion-model",
        env = "HERALD_COMPLETION_MODEL",
        default_value = "llama2",
        help = "Completion model used for thread summaries"
    )]
    pub completion_model: String,

    #[arg(
        long = "request-timeout-ms",
        env = "HERALD_REQUEST_TIMEOUT_MS",
        value_parser = positive::<u64>,
        default_value_t = 30_000,
        help = "HTTP request timeout for Slack Web API calls in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "HERALD_RETRY_MAX_ATTEMPTS",
        value_parser = positive::<usize>,
        default_value_t = 4,
        help = "Maximum attempts for retryable slack api failures (429/5xx/transport)"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "HERALD_RETRY_BASE_DELAY_MS",
        value_parser = positive::<u64>,
        default_value_t = 500,
        help = "Base backoff delay in milliseconds for slack api retries"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long = "reconnect-delay-ms",
        env = "HERALD_RECONNECT_DELAY_MS",
        value_parser = positive::<u64>,
        default_value_t = 1_000,
        help = "Delay before reconnecting after socket/session errors"
    )]
    pub reconnect_delay_ms: u64,

    #[arg(
        long = "max-event-age-seconds",
        env = "HERALD_MAX_EVENT_AGE_SECONDS",
        default_value_t = 7_200,
        help = "Ignore inbound Slack events older than this many seconds (0 disables age checks)"
    )]
    pub max_event_age_seconds: u64,
}
