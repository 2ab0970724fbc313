//! Upstream chat-completions client and stream wire types.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::types::ConversationTurn;

/// HTTP client for the upstream chat-completions API.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    config: RelayConfig,
}

impl UpstreamClient {
    pub fn new(config: RelayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)) {
            headers.insert(AUTHORIZATION, val);
        }
        if let Ok(val) = HeaderValue::from_str(&self.config.referer) {
            headers.insert("HTTP-Referer", val);
        }
        if let Ok(val) = HeaderValue::from_str(&self.config.title) {
            headers.insert("X-Title", val);
        }
        headers
    }

    /// Build a streaming request body. `tools` carries the function
    /// descriptors for the initial request; the continuation passes `None`.
    pub fn build_body(
        &self,
        messages: &[ConversationTurn],
        model: &str,
        temperature: f64,
        tools: Option<&[serde_json::Value]>,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": self.config.max_tokens,
            "frequency_penalty": self.config.frequency_penalty,
            "presence_penalty": self.config.presence_penalty,
            "stream": true,
        });

        if let Some(tools) = tools {
            if !tools.is_empty() {
                let obj = body.as_object_mut().unwrap();
                obj.insert("tools".into(), tools.into());
                obj.insert("tool_choice".into(), "auto".into());
            }
        }

        body
    }

    /// Issue the streaming request, mapping non-2xx to an API error that
    /// carries the upstream body.
    pub async fn chat_stream(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.base_url);
        debug!(url = %url, "upstream chat-completions request");

        let resp = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(RelayError::api(status, body_text));
        }
        Ok(resp)
    }
}

// Upstream stream-chunk wire types (one per SSE `data:` payload).

#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// One incremental fragment of a tool call. The id and function name arrive
/// once; argument text is split across many fragments.
#[derive(Debug, Deserialize)]
pub struct ToolCallDelta {
    pub id: Option<String>,
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}
