//! Socket-mode consumer loop and inbound event normalization.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use herald_core::{contains_bot_mention, ChatMessage, MessageKind};
use herald_dispatch::{AllowList, Dispatcher, RuleRegistry};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

mod gateway;
mod helpers;
mod web_api;

use gateway::SlackGateway;
use web_api::SlackWebApi;

/// Runtime configuration for the Slack transport loop.
#[derive(Clone)]
pub struct SlackRuntimeConfig {
    pub registry: Arc<RuleRegistry>,
    pub allow_list: AllowList,
    pub api_base: String,
    pub app_token: String,
    pub bot_token: String,
    /// Resolved through `auth.test` at startup when not configured.
    pub bot_user_id: Option<String>,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub reconnect_delay: Duration,
    /// Events older than this are acknowledged but never dispatched.
    /// Zero disables the check.
    pub max_event_age_seconds: u64,
}

/// Runs the Slack transport loop until ctrl-c.
pub async fn run_slack_runtime(config: SlackRuntimeConfig) -> Result<()> {
    let consumer = SlackConsumer::new(config).await?;
    consumer.run().await
}

struct SlackConsumer {
    config: SlackRuntimeConfig,
    client: SlackWebApi,
    dispatcher: Dispatcher,
    bot_user_id: String,
}

impl SlackConsumer {
    async fn new(config: SlackRuntimeConfig) -> Result<Self> {
        let client = SlackWebApi::new(
            config.api_base.clone(),
            config.bot_token.clone(),
            config.app_token.clone(),
            Duration::from_millis(config.request_timeout_ms),
            config.retry_max_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
        )?;

        let bot_user_id = match config.bot_user_id.as_deref().map(str::trim) {
            Some(configured) if !configured.is_empty() => configured.to_string(),
            _ => client.resolve_bot_user_id().await?,
        };

        let gateway = Arc::new(SlackGateway::new(client.clone()));
        let dispatcher = Dispatcher::new(
            Arc::clone(&config.registry),
            gateway,
            config.allow_list.clone(),
            bot_user_id.clone(),
        );

        Ok(Self {
            config,
            client,
            dispatcher,
            bot_user_id,
        })
    }

    async fn run(&self) -> Result<()> {
        loop {
            match self.client.open_socket_connection().await {
                Ok(socket_url) => {
                    info!("slack socket connected");
                    if let Err(error) = self.drive_socket(&socket_url).await {
                        warn!("socket session ended with error: {error:#}");
                    }
                }
                Err(error) => warn!("failed to open socket connection: {error:#}"),
            }

            if pause_or_shutdown(self.config.reconnect_delay).await {
                info!("shutdown requested");
                return Ok(());
            }
        }
    }

    async fn drive_socket(&self, socket_url: &str) -> Result<()> {
        let (stream, _response) = connect_async(socket_url)
            .await
            .context("connecting slack socket mode websocket")?;
        let (mut sink, mut source) = stream.split();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => return Ok(()),
                frame = source.next() => {
                    let Some(frame) = frame else { return Ok(()) };
                    let frame = frame.context("reading slack websocket message")?;
                    match decode_socket_frame(frame) {
                        Ok(Some(envelope)) => {
                            if !envelope.envelope_id.is_empty() {
                                send_ack(&mut sink, &envelope.envelope_id).await?;
                            }
                            if envelope.kind == "disconnect" {
                                info!("slack requested socket disconnect");
                                return Ok(());
                            }
                            self.consume_envelope(&envelope).await;
                        }
                        Ok(None) => {}
                        Err(error) => warn!("discarding unreadable socket frame: {error:#}"),
                    }
                }
            }
        }
    }

    /// Normalizes and dispatches one envelope. Faults are logged; a bad
    /// event never ends the session.
    async fn consume_envelope(&self, envelope: &SocketEnvelope) {
        let event = match event_from_envelope(envelope, &self.bot_user_id) {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(error) => {
                warn!("discarding undecodable event payload: {error:#}");
                return;
            }
        };

        if is_expired_event(
            event.event_unix_ms,
            self.config.max_event_age_seconds,
            current_unix_ms(),
        ) {
            debug!("skipping stale event {}", event.event_id);
            return;
        }

        let outcome = self.dispatcher.handle(&event.message).await;
        debug!("event {} dispatched: {outcome:?}", event.event_id);
    }
}

/// True when ctrl-c arrived before the delay elapsed.
async fn pause_or_shutdown(delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

async fn send_ack<S>(sink: &mut S, envelope_id: &str) -> Result<()>
where
    S: futures_util::Sink<WsMessage> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let ack = json!({ "envelope_id": envelope_id });
    sink.send(WsMessage::Text(ack.to_string().into()))
        .await
        .context("sending slack socket ack")
}

#[derive(Debug, Clone, Deserialize)]
struct SocketEnvelope {
    /// Empty for `hello` and `disconnect` frames, which carry no ack.
    #[serde(default)]
    envelope_id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct EventCallback {
    #[serde(rename = "type")]
    kind: String,
    event_id: String,
    event_time: u64,
    event: EventBody,
}

#[derive(Debug, Deserialize)]
struct EventBody {
    #[serde(rename = "type")]
    kind: String,
    subtype: Option<String>,
    user: Option<String>,
    text: Option<String>,
    channel: Option<String>,
    channel_type: Option<String>,
    ts: Option<String>,
    thread_ts: Option<String>,
}

#[derive(Debug, Clone)]
struct InboundEvent {
    event_id: String,
    event_unix_ms: u64,
    message: ChatMessage,
}

fn decode_socket_frame(frame: WsMessage) -> Result<Option<SocketEnvelope>> {
    let text = match frame {
        WsMessage::Text(text) => text.to_string(),
        WsMessage::Binary(bytes) => {
            String::from_utf8(bytes.to_vec()).context("slack socket frame is not utf-8")?
        }
        _ => return Ok(None),
    };
    serde_json::from_str(&text)
        .map(Some)
        .context("undecodable slack socket envelope")
}

fn event_from_envelope(
    envelope: &SocketEnvelope,
    bot_user_id: &str,
) -> Result<Option<InboundEvent>> {
    if envelope.kind != "events_api" {
        return Ok(None);
    }

    let EventCallback {
        kind: callback_kind,
        event_id,
        event_time,
        event,
    } = serde_json::from_value(envelope.payload.clone())
        .context("decoding slack event callback payload")?;
    if callback_kind != "event_callback" || event.subtype.as_deref() == Some("bot_message") {
        return Ok(None);
    }

    let Some(user_id) = filled(event.user) else {
        return Ok(None);
    };
    if bot_user_id == user_id {
        return Ok(None);
    }
    let Some(channel_id) = filled(event.channel) else {
        return Ok(None);
    };
    let Some(ts) = filled(event.ts) else {
        return Ok(None);
    };
    let text = event.text.unwrap_or_default();

    let kind = match event.kind.as_str() {
        "app_mention" => MessageKind::AppMention,
        "message" => {
            if event.channel_type.as_deref() == Some("im") || channel_id.starts_with('D') {
                MessageKind::DirectMessage
            } else {
                MessageKind::ChannelMessage
            }
        }
        _ => return Ok(None),
    };

    // A channel message that mentions the bot also arrives as an
    // app_mention event; keep only the app_mention copy.
    if kind == MessageKind::ChannelMessage && contains_bot_mention(&text, bot_user_id) {
        return Ok(None);
    }

    let message = ChatMessage {
        channel_id,
        user_id,
        text,
        ts,
        thread_ts: filled(event.thread_ts),
        kind,
        from_bot: false,
    };

    Ok(Some(InboundEvent {
        event_id,
        event_unix_ms: event_time.saturating_mul(1000),
        message,
    }))
}

fn filled(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn is_expired_event(event_unix_ms: u64, max_age_seconds: u64, now_unix_ms: u64) -> bool {
    max_age_seconds > 0
        && now_unix_ms.saturating_sub(event_unix_ms) > max_age_seconds.saturating_mul(1000)
}

fn current_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
