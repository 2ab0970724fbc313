//! The streaming relay pipeline.
//!
//! One cycle per caller request: forward the conversation upstream with the
//! tool catalog, relay content deltas as they arrive, and if the upstream
//! finishes with `tool_calls`, execute the captured tool once, append the
//! tool turns, and relay the continuation. A tool call requested by the
//! continuation is never executed and never triggers a third request.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::sse::{classify_line, LineBuffer, LineOutcome};
use crate::tools::ToolRegistry;
use crate::types::{ConversationTurn, RelayEvent};
use crate::upstream::{ToolCallDelta, UpstreamClient};

/// Window inspected for degenerate generations, in characters.
pub const REPEAT_WINDOW: usize = 50;
/// Consecutive identical characters that count as a degenerate generation.
pub const REPEAT_LIMIT: usize = 20;

/// Incoming chat request from the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ConversationTurn>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Tool-call fragments accumulated across stream chunks: the id and name
/// arrive once, argument text concatenates in arrival order.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl ToolCallAccumulator {
    pub fn absorb(&mut self, delta: &ToolCallDelta) {
        if self.id.is_none() {
            if let Some(id) = delta.id.as_deref().filter(|s| !s.is_empty()) {
                self.id = Some(id.to_string());
            }
        }
        if let Some(function) = &delta.function {
            if self.name.is_none() {
                if let Some(name) = function.name.as_deref().filter(|s| !s.is_empty()) {
                    self.name = Some(name.to_string());
                }
            }
            if let Some(args) = &function.arguments {
                self.arguments.push_str(args);
            }
        }
    }

    /// A call is usable once a name has been seen.
    pub fn is_complete(&self) -> bool {
        self.name.is_some()
    }

    /// Consume the accumulator. Some upstreams never send an id; fall back
    /// to a generated one so the tool turns still pair up.
    pub fn finalize(self) -> Option<(String, String, String)> {
        let name = self.name?;
        let id = self
            .id
            .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
        Some((id, name, self.arguments))
    }
}

/// True if the tail of `text` looks like a degenerate repeating generation:
/// any single character repeated [`REPEAT_LIMIT`] or more times in a row
/// within the last [`REPEAT_WINDOW`] characters.
pub fn has_repetition(text: &str) -> bool {
    let mut run = 0usize;
    let mut prev: Option<char> = None;
    // The tail reversed; run lengths are the same either way.
    for c in text.chars().rev().take(REPEAT_WINDOW) {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run >= REPEAT_LIMIT {
            return true;
        }
    }
    false
}

/// Extract the first balanced `{...}` object from `raw` by brace counting,
/// ignoring braces inside string literals. Defends against trailing garbage
/// or several concatenated JSON fragments: only the first complete object
/// is taken.
pub fn extract_first_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// The streaming relay: one upstream client plus the tool catalog.
#[derive(Clone)]
pub struct Relay {
    upstream: UpstreamClient,
    tools: ToolRegistry,
}

impl Relay {
    pub fn new(upstream: UpstreamClient, tools: ToolRegistry) -> Self {
        Self { upstream, tools }
    }

    /// Start a relay cycle.
    ///
    /// Fails only if the initial upstream request is rejected, so the caller
    /// can surface the upstream status before any streaming begins. Once a
    /// stream is returned, every later failure ends it cleanly: the caller
    /// always gets a well-formed (possibly truncated) event sequence.
    pub async fn stream(&self, request: ChatRequest) -> crate::error::Result<BoxStream<'static, RelayEvent>> {
        let config = self.upstream.config();
        let model = request
            .model
            .unwrap_or_else(|| config.default_model.clone());
        let temperature = request
            .temperature
            .unwrap_or(config.default_temperature);

        let schemas = self.tools.schemas();
        let body = self
            .upstream
            .build_body(&request.messages, &model, temperature, Some(&schemas));
        let response = self.upstream.chat_stream(&body).await?;

        let upstream = self.upstream.clone();
        let tools = self.tools.clone();
        let messages = request.messages;

        let stream = async_stream::stream! {
            let mut transcript = String::new();
            let mut call = ToolCallAccumulator::default();
            let mut tool_phase = false;

            // Phase one: relay the initial response.
            {
                let mut lines = LineBuffer::new();
                let mut body_stream = response.bytes_stream();
                'initial: while let Some(chunk) = body_stream.next().await {
                    let chunk = match chunk {
                        Ok(c) => c,
                        Err(err) => {
                            warn!(error = %err, "upstream body read failed mid-stream");
                            return;
                        }
                    };
                    for line in lines.push(&chunk) {
                        let event = match classify_line(&line) {
                            LineOutcome::Skip => continue,
                            LineOutcome::EndOfStream => break 'initial,
                            LineOutcome::Event(event) => event,
                        };
                        let Some(choice) = event.choices.into_iter().next() else {
                            continue;
                        };
                        if let Some(deltas) = &choice.delta.tool_calls {
                            for delta in deltas {
                                call.absorb(delta);
                            }
                        }
                        if let Some(content) = choice.delta.content {
                            if !content.is_empty() {
                                transcript.push_str(&content);
                                yield RelayEvent::Content(content);
                                if has_repetition(&transcript) {
                                    warn!("degenerate generation detected, cutting stream short");
                                    return;
                                }
                            }
                        }
                        if choice.finish_reason.as_deref() == Some("tool_calls") && call.is_complete() {
                            tool_phase = true;
                            break 'initial;
                        }
                    }
                }
            }

            if !tool_phase {
                return;
            }

            // Phase two: resolve the captured tool call, then relay the
            // continuation. Exactly one tool call per cycle.
            let Some((call_id, name, raw_args)) = call.finalize() else {
                return;
            };
            debug!(tool = %name, "resolving tool call");

            let Some(object) = extract_first_object(&raw_args) else {
                warn!(tool = %name, "tool arguments never formed a complete object");
                return;
            };
            let args: serde_json::Value = match serde_json::from_str(object) {
                Ok(v) => v,
                Err(err) => {
                    warn!(tool = %name, error = %err, "unparseable tool arguments");
                    return;
                }
            };

            let (result, flag) = match tools.execute(&name, args).await {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(tool = %name, error = %err, "tool dispatch failed");
                    return;
                }
            };
            yield RelayEvent::tool_executed(&name, flag);

            let mut continuation = messages;
            continuation.push(ConversationTurn::assistant_tool_call(&call_id, &name, &raw_args));
            continuation.push(ConversationTurn::tool_result(&call_id, &result));

            let body = upstream.build_body(&continuation, &model, temperature, None);
            let response = match upstream.chat_stream(&body).await {
                Ok(r) => r,
                Err(err) => {
                    warn!(error = %err, "continuation request failed");
                    return;
                }
            };

            // Only content relays from the continuation; a second tool call
            // is ignored.
            let mut lines = LineBuffer::new();
            let mut body_stream = response.bytes_stream();
            'cont: while let Some(chunk) = body_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(err) => {
                        warn!(error = %err, "continuation body read failed mid-stream");
                        return;
                    }
                };
                for line in lines.push(&chunk) {
                    match classify_line(&line) {
                        LineOutcome::Skip => continue,
                        LineOutcome::EndOfStream => break 'cont,
                        LineOutcome::Event(event) => {
                            let Some(choice) = event.choices.into_iter().next() else {
                                continue;
                            };
                            if let Some(content) = choice.delta.content {
                                if !content.is_empty() {
                                    transcript.push_str(&content);
                                    yield RelayEvent::Content(content);
                                    if has_repetition(&transcript) {
                                        warn!("degenerate continuation detected, cutting stream short");
                                        return;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
