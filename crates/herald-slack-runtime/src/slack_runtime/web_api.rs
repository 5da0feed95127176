//! Slack Web API client used by the consumer loop and the chat gateway.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::helpers::{
    backoff_delay, clip_for_log, retry_after_seconds, should_retry_status, should_retry_transport,
};

/// Slack wraps every Web API response in an `ok`/`error` envelope around the
/// method-specific fields.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    ok: bool,
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

impl<T> ApiEnvelope<T> {
    fn into_body(self, method: &str) -> Result<T> {
        if self.ok {
            return Ok(self.body);
        }
        let reason = self.error.as_deref().unwrap_or("unknown error");
        Err(anyhow!("slack {method} answered not-ok: {reason}"))
    }
}

#[derive(Debug, Deserialize)]
struct AuthIdentity {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SocketUrl {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostMessageAck {
    ts: Option<String>,
    channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationBody {
    channel: Option<ConversationRecord>,
}

#[derive(Debug, Deserialize)]
struct ConversationRecord {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadHistory {
    #[serde(default)]
    messages: Vec<ThreadEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ThreadEntry {
    pub(super) user: Option<String>,
    pub(super) text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PermalinkBody {
    permalink: Option<String>,
}

#[derive(Debug, Serialize)]
struct PostMessageBody<'a> {
    channel: &'a str,
    text: &'a str,
    unfurl_links: bool,
    unfurl_media: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DmRequest<'a> {
    users: &'a str,
}

#[derive(Debug, Clone)]
pub(super) struct PostReceipt {
    pub(super) channel: String,
    pub(super) ts: String,
}

#[derive(Clone)]
pub(super) struct SlackWebApi {
    api_base: String,
    http: reqwest::Client,
    bot_token: String,
    app_token: String,
    retry_budget: usize,
    retry_base_delay: Duration,
}

impl SlackWebApi {
    pub(super) fn new(
        api_base: String,
        bot_token: String,
        app_token: String,
        request_timeout: Duration,
        retry_budget: usize,
        retry_base_delay: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("herald-slack-runtime")
            .timeout(request_timeout.max(Duration::from_millis(1)))
            .build()
            .context("building slack http client")?;

        let api_base = api_base.trim_end_matches('/').to_string();
        Ok(Self {
            api_base,
            http,
            bot_token: bot_token.trim().to_string(),
            app_token: app_token.trim().to_string(),
            retry_budget: retry_budget.max(1),
            retry_base_delay: retry_base_delay.max(Duration::from_millis(1)),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    pub(super) async fn resolve_bot_user_id(&self) -> Result<String> {
        let request = self
            .http
            .post(self.endpoint("auth.test"))
            .bearer_auth(&self.bot_token);
        let identity: AuthIdentity = self.dispatch("auth.test", request).await?;
        nonblank(identity.user_id)
            .ok_or_else(|| anyhow!("slack auth.test response omitted user_id"))
    }

    pub(super) async fn open_socket_connection(&self) -> Result<String> {
        let request = self
            .http
            .post(self.endpoint("apps.connections.open"))
            .bearer_auth(&self.app_token);
        let socket: SocketUrl = self.dispatch("apps.connections.open", request).await?;
        nonblank(socket.url)
            .ok_or_else(|| anyhow!("slack apps.connections.open response omitted url"))
    }

    pub(super) async fn post_chat_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<&[Value]>,
        thread_ts: Option<&str>,
    ) -> Result<PostReceipt> {
        let body = PostMessageBody {
            channel,
            text,
            unfurl_links: false,
            unfurl_media: false,
            blocks,
            thread_ts,
        };
        let request = self
            .http
            .post(self.endpoint("chat.postMessage"))
            .bearer_auth(&self.bot_token)
            .json(&body);
        let ack: PostMessageAck = self.dispatch("chat.postMessage", request).await?;
        Ok(PostReceipt {
            channel: ack.channel.unwrap_or_else(|| channel.to_string()),
            ts: ack
                .ts
                .ok_or_else(|| anyhow!("slack chat.postMessage response omitted ts"))?,
        })
    }

    pub(super) async fn open_direct_channel(&self, user_id: &str) -> Result<String> {
        let request = self
            .http
            .post(self.endpoint("conversations.open"))
            .bearer_auth(&self.bot_token)
            .json(&DmRequest { users: user_id });
        let opened: ConversationBody = self.dispatch("conversations.open", request).await?;
        nonblank(opened.channel.and_then(|channel| channel.id))
            .ok_or_else(|| anyhow!("slack conversations.open response omitted channel id"))
    }

    pub(super) async fn channel_info_name(&self, channel_id: &str) -> Result<String> {
        let request = self
            .http
            .get(self.endpoint("conversations.info"))
            .bearer_auth(&self.bot_token)
            .query(&[("channel", channel_id)]);
        let info: ConversationBody = self.dispatch("conversations.info", request).await?;
        nonblank(info.channel.and_then(|channel| channel.name))
            .ok_or_else(|| anyhow!("slack conversations.info response omitted channel name"))
    }

    pub(super) async fn thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
    ) -> Result<Vec<ThreadEntry>> {
        let request = self
            .http
            .get(self.endpoint("conversations.replies"))
            .bearer_auth(&self.bot_token)
            .query(&[("channel", channel_id), ("ts", thread_ts), ("limit", "200")]);
        let history: ThreadHistory = self.dispatch("conversations.replies", request).await?;
        Ok(history.messages)
    }

    pub(super) async fn message_permalink(&self, channel_id: &str, ts: &str) -> Result<String> {
        let request = self
            .http
            .get(self.endpoint("chat.getPermalink"))
            .bearer_auth(&self.bot_token)
            .query(&[("channel", channel_id), ("message_ts", ts)]);
        let link: PermalinkBody = self.dispatch("chat.getPermalink", request).await?;
        nonblank(link.permalink)
            .ok_or_else(|| anyhow!("slack chat.getPermalink response omitted permalink"))
    }

    /// Sends the request up to the retry budget, sleeping between attempts
    /// on rate limits, server faults, and transient transport errors. The
    /// envelope's `ok` flag is unwrapped here so callers only see their
    /// method-specific fields.
    async fn dispatch<T>(&self, method: &'static str, request: reqwest::RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut attempt: usize = 0;
        loop {
            attempt += 1;
            let Some(prepared) = request.try_clone() else {
                bail!("slack {method} request cannot be retried");
            };
            let exhausted = attempt >= self.retry_budget;
            let sent = prepared
                .header("x-herald-retry-attempt", (attempt - 1).to_string())
                .send()
                .await;
            match sent {
                Ok(response) if response.status().is_success() => {
                    let envelope = response
                        .json::<ApiEnvelope<T>>()
                        .await
                        .with_context(|| format!("undecodable slack {method} response"))?;
                    return envelope.into_body(method);
                }
                Ok(response) => {
                    let status = response.status();
                    let hint = retry_after_seconds(response.headers());
                    if exhausted || !should_retry_status(status) {
                        let body = response.text().await.unwrap_or_default();
                        bail!(
                            "slack {method} returned {}: {}",
                            status.as_u16(),
                            clip_for_log(&body, 800)
                        );
                    }
                    tokio::time::sleep(backoff_delay(attempt, self.retry_base_delay, hint)).await;
                }
                Err(error) => {
                    if exhausted || !should_retry_transport(&error) {
                        return Err(error)
                            .with_context(|| format!("slack {method} request failed"));
                    }
                    tokio::time::sleep(backoff_delay(attempt, self.retry_base_delay, None)).await;
                }
            }
        }
    }
}

fn nonblank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
