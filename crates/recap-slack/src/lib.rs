//! Slack adapter.
//!
//! This crate implements the `recap-core` ChatPort over the Slack Web API and
//! serves the HTTP endpoints Slack calls (events, slash commands, shortcuts).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, warn};

pub mod handlers;
pub mod router;
pub mod signature;

use recap_core::{
    domain::{ChannelId, Ts, UserId},
    errors::Error,
    messaging::{
        port::ChatPort,
        types::{Block, EphemeralReply, Message, UserProfile},
    },
    Result,
};

/// Largest page Slack recommends for history-style methods.
const PAGE_LIMIT: usize = 200;

#[derive(Clone, Debug)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesPage {
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

impl MessagesPage {
    fn next_cursor(&self) -> Option<String> {
        self.response_metadata
            .as_ref()
            .and_then(|m| m.next_cursor.clone())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    profile: SlackProfile,
}

#[derive(Debug, Default, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name_normalized: Option<String>,
    #[serde(default)]
    real_name_normalized: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationInfo {
    channel: SlackChannel,
}

#[derive(Debug, Deserialize)]
struct SlackChannel {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Posted {
    ts: Ts,
}

impl SlackClient {
    pub fn new(
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("slack http client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into().trim().to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    fn get(&self, method: &str, query: &[(&str, String)]) -> RequestBuilder {
        self.http
            .get(self.url(method))
            .bearer_auth(&self.bot_token)
            .query(query)
    }

    fn post(&self, method: &str, body: &Value) -> RequestBuilder {
        self.http
            .post(self.url(method))
            .bearer_auth(&self.bot_token)
            .json(body)
    }

    /// Send a Web API request, retrying once on a 429, and unwrap the
    /// `{ ok, error }` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        mut builder: impl FnMut() -> RequestBuilder,
    ) -> Result<T> {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            let resp = builder()
                .send()
                .await
                .map_err(|e| Error::External(format!("slack {method} request error: {e}")))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempts < MAX_RETRIES {
                attempts += 1;
                let wait = retry_after(resp.headers());
                warn!(method, wait_secs = wait.as_secs(), "slack rate limited, retrying");
                sleep(wait).await;
                continue;
            }
            if !status.is_success() {
                return Err(Error::Slack {
                    method: method.to_string(),
                    error: format!("http {}", status.as_u16()),
                });
            }

            let v: Value = resp
                .json()
                .await
                .map_err(|e| Error::External(format!("slack {method} json error: {e}")))?;
            return parse_envelope(method, v);
        }
    }

    async fn paged_messages(
        &self,
        method: &str,
        base_query: Vec<(&str, String)>,
        max: Option<usize>,
    ) -> Result<Vec<Message>> {
        let mut out: Vec<Message> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let remaining = max.map(|m| m.saturating_sub(out.len())).unwrap_or(PAGE_LIMIT);
            let mut query = base_query.clone();
            query.push(("limit", remaining.clamp(1, PAGE_LIMIT).to_string()));
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page: MessagesPage = self.call(method, || self.get(method, &query)).await?;
            cursor = page.next_cursor();
            out.extend(page.messages);

            let full = max.is_some_and(|m| out.len() >= m);
            if full || cursor.is_none() {
                break;
            }
        }
        if let Some(m) = max {
            out.truncate(m);
        }
        debug!(method, count = out.len(), "fetched messages");
        Ok(out)
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    let secs = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(1);
    Duration::from_secs(secs.clamp(1, 60))
}

fn parse_envelope<T: DeserializeOwned>(method: &str, v: Value) -> Result<T> {
    if !v.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        let error = v
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error")
            .to_string();
        return Err(Error::Slack {
            method: method.to_string(),
            error,
        });
    }
    Ok(serde_json::from_value(v)?)
}

#[async_trait]
impl ChatPort for SlackClient {
    async fn history(
        &self,
        channel: &ChannelId,
        oldest: Option<&Ts>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let mut query = vec![("channel", channel.0.clone())];
        if let Some(oldest) = oldest {
            query.push(("oldest", oldest.0.clone()));
        }
        self.paged_messages("conversations.history", query, Some(limit))
            .await
    }

    async fn replies(&self, channel: &ChannelId, thread_ts: &Ts) -> Result<Vec<Message>> {
        let query = vec![("channel", channel.0.clone()), ("ts", thread_ts.0.clone())];
        self.paged_messages("conversations.replies", query, None).await
    }

    async fn user_info(&self, user: &UserId) -> Result<UserProfile> {
        let query = [("user", user.0.clone())];
        let info: UserInfo = self
            .call("users.info", || self.get("users.info", &query))
            .await?;
        Ok(UserProfile {
            name: info.user.name,
            display_name_normalized: info.user.profile.display_name_normalized,
            real_name_normalized: info.user.profile.real_name_normalized,
        })
    }

    async fn channel_name(&self, channel: &ChannelId) -> Result<String> {
        let query = [("channel", channel.0.clone())];
        let info: ConversationInfo = self
            .call("conversations.info", || {
                self.get("conversations.info", &query)
            })
            .await?;
        info.channel.name.ok_or_else(|| Error::Slack {
            method: "conversations.info".to_string(),
            error: "missing_name".to_string(),
        })
    }

    async fn post_message(
        &self,
        channel: &ChannelId,
        thread_ts: Option<&Ts>,
        text: &str,
        blocks: &[Block],
    ) -> Result<Ts> {
        let body = post_message_body(channel, thread_ts, text, blocks);
        let posted: Posted = self
            .call("chat.postMessage", || self.post("chat.postMessage", &body))
            .await?;
        Ok(posted.ts)
    }

    async fn post_ephemeral(&self, channel: &ChannelId, user: &UserId, text: &str) -> Result<()> {
        let body = json!({
            "channel": channel,
            "user": user,
            "text": text,
        });
        let _: Value = self
            .call("chat.postEphemeral", || {
                self.post("chat.postEphemeral", &body)
            })
            .await?;
        Ok(())
    }

    async fn respond(&self, response_url: &str, reply: &EphemeralReply) -> Result<()> {
        let body = json!({
            "response_type": "ephemeral",
            "replace_original": false,
            "text": reply.text,
            "blocks": reply.blocks,
        });
        let resp = self
            .http
            .post(response_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("slack response_url error: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Slack {
                method: "response_url".to_string(),
                error: format!("http {}", resp.status().as_u16()),
            });
        }
        Ok(())
    }
}

fn post_message_body(
    channel: &ChannelId,
    thread_ts: Option<&Ts>,
    text: &str,
    blocks: &[Block],
) -> Value {
    let mut body = json!({
        "channel": channel,
        "text": text,
        "blocks": blocks,
        "unfurl_links": false,
        "unfurl_media": false,
    });
    if let Some(ts) = thread_ts {
        body["thread_ts"] = Value::String(ts.0.clone());
    }
    body
}
