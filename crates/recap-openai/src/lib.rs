//! Completion adapter for OpenAI-compatible `chat/completions` endpoints.
//!
//! The default endpoint needs no key; a bearer token is sent when one is
//! configured.

use std::time::Duration;

use async_trait::async_trait;
use recap_core::{errors::Error, model::client::CompletionClient, Result};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct OpenAiCompletionClient {
    url: String,
    api_key: Option<String>,
    model: Option<String>,
    http: reqwest::Client,
}

impl OpenAiCompletionClient {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        model: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("completion http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            api_key,
            model,
            http,
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(model) = &self.model {
            body["model"] = Value::String(model.clone());
        }
        body
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut req = self.http.post(&self.url).json(&self.request_body(prompt));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        debug!(url = %self.url, prompt_chars = prompt.chars().count(), "completion request");
        let resp = req
            .send()
            .await
            .map_err(|e| Error::External(format!("completion request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "completion request failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("completion json error: {e}")))?;

        extract_content(&v)
    }
}

/// `choices[0].message.content` of a chat completion response.
fn extract_content(v: &Value) -> Result<String> {
    v.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            let detail = v
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("missing choices[0].message.content");
            Error::External(format!("completion response malformed: {detail}"))
        })
}
